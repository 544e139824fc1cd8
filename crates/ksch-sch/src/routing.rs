//! Orthogonal (Manhattan) wire routing between two points.
//!
//! Schematic wires run horizontally or vertically. Routing between two pins
//! is either direct (the points share an axis) or an L: one corner, two
//! segments, horizontal-then-vertical or vertical-then-horizontal.

use crate::types::Point;

/// Which leg of an L-shaped route runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CornerDirection {
    #[default]
    HorizontalFirst,
    VerticalFirst,
}

/// A computed route: one segment when direct, two when cornered.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingResult {
    pub segments: Vec<(Point, Point)>,
    pub corner: Option<Point>,
    pub is_direct: bool,
}

/// Route with the default horizontal-first corner preference.
pub fn route_orthogonal(start: Point, end: Point) -> RoutingResult {
    route_orthogonal_with(start, end, CornerDirection::HorizontalFirst)
}

/// Route between two points, choosing the corner leg order explicitly.
///
/// Aligned points (including coincident ones) produce a single direct
/// segment and no corner.
pub fn route_orthogonal_with(
    start: Point,
    end: Point,
    direction: CornerDirection,
) -> RoutingResult {
    if start.x == end.x || start.y == end.y {
        return RoutingResult {
            segments: vec![(start, end)],
            corner: None,
            is_direct: true,
        };
    }

    let corner = match direction {
        CornerDirection::HorizontalFirst => Point::new(end.x, start.y),
        CornerDirection::VerticalFirst => Point::new(start.x, end.y),
    };

    RoutingResult {
        segments: vec![(start, corner), (corner, end)],
        corner: Some(corner),
        is_direct: false,
    }
}

/// Check that a route is well-formed: every segment orthogonal, segments
/// contiguous, corner consistent with the segment chain.
pub fn validate_routing(result: &RoutingResult) -> bool {
    if result.segments.is_empty() {
        return false;
    }
    for (a, b) in &result.segments {
        if a.x != b.x && a.y != b.y {
            return false;
        }
    }
    for pair in result.segments.windows(2) {
        if pair[0].1 != pair[1].0 {
            return false;
        }
    }
    match (&result.corner, result.segments.len()) {
        (None, 1) => result.is_direct,
        (Some(corner), 2) => !result.is_direct && result.segments[0].1 == *corner,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_direct() {
        let result = route_orthogonal(Point::new(100.0, 100.0), Point::new(150.0, 100.0));
        assert!(result.is_direct);
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.corner, None);
        assert!(validate_routing(&result));
    }

    #[test]
    fn vertical_direct() {
        let result = route_orthogonal(Point::new(100.0, 100.0), Point::new(100.0, 150.0));
        assert!(result.is_direct);
        assert_eq!(result.segments, vec![(Point::new(100.0, 100.0), Point::new(100.0, 150.0))]);
        assert!(validate_routing(&result));
    }

    #[test]
    fn direct_works_in_negative_direction() {
        let result = route_orthogonal(Point::new(150.0, 100.0), Point::new(100.0, 100.0));
        assert!(result.is_direct);
        // Lower Y is visually higher in KiCad; direction does not matter here.
        let result = route_orthogonal(Point::new(100.0, 150.0), Point::new(100.0, 100.0));
        assert!(result.is_direct);
    }

    #[test]
    fn zero_distance_is_direct() {
        let result = route_orthogonal(Point::new(100.0, 100.0), Point::new(100.0, 100.0));
        assert!(result.is_direct);
        assert_eq!(result.segments.len(), 1);
        assert!(validate_routing(&result));
    }

    #[test]
    fn horizontal_first_corner() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(150.0, 130.0);
        let result = route_orthogonal_with(start, end, CornerDirection::HorizontalFirst);
        assert!(!result.is_direct);
        assert_eq!(result.corner, Some(Point::new(150.0, 100.0)));
        assert_eq!(result.segments.len(), 2);
        assert!(validate_routing(&result));
    }

    #[test]
    fn vertical_first_corner() {
        let start = Point::new(100.0, 100.0);
        let end = Point::new(150.0, 130.0);
        let result = route_orthogonal_with(start, end, CornerDirection::VerticalFirst);
        assert_eq!(result.corner, Some(Point::new(100.0, 130.0)));
        assert!(validate_routing(&result));
    }

    #[test]
    fn validation_rejects_diagonals_and_gaps() {
        let diagonal = RoutingResult {
            segments: vec![(Point::new(0.0, 0.0), Point::new(1.0, 1.0))],
            corner: None,
            is_direct: true,
        };
        assert!(!validate_routing(&diagonal));

        let gapped = RoutingResult {
            segments: vec![
                (Point::new(0.0, 0.0), Point::new(1.0, 0.0)),
                (Point::new(2.0, 0.0), Point::new(2.0, 1.0)),
            ],
            corner: Some(Point::new(1.0, 0.0)),
            is_direct: false,
        };
        assert!(!validate_routing(&gapped));
    }
}
