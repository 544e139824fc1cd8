//! Generic indexed entity store.
//!
//! An [`IndexedCollection`] keeps entities in insertion order and maintains
//! declared name -> position indexes that are rebuilt lazily: mutations only
//! mark the indexes stale, the next read rebuilds them. Uniqueness is
//! enforced at rebuild time - two items sharing a key in a unique index
//! surface as a [`ConflictError`] on the first read *through that index*,
//! never at `add` time. Reads through a conflict-free index (uuid, usually)
//! keep working so the caller can rename or remove one of the duplicates;
//! the next rebuild then clears the conflict. This keeps `add` O(1) and lets
//! [`batch_mode`] coalesce any number of mutations into a single rebuild.
//!
//! [`batch_mode`]: IndexedCollection::batch_mode

use std::collections::HashMap;

use globset::{Glob, GlobMatcher};

use crate::error::{ConflictError, Error};

/// Declaration of one index over a collection.
pub struct IndexSpec<T> {
    pub name: &'static str,
    pub key_fn: fn(&T) -> Option<String>,
    pub unique: bool,
}

/// Trait for entities that can live in an [`IndexedCollection`].
pub trait Indexable {
    /// Index used by the key-based `get`/`remove`/`modify` shorthands.
    const DEFAULT_INDEX: &'static str;

    fn uuid(&self) -> &str;

    fn index_specs() -> &'static [IndexSpec<Self>]
    where
        Self: Sized;
}

/// A string match criterion: exact, or glob when the pattern contains `*`.
#[derive(Debug, Clone)]
pub enum Pattern {
    Exact(String),
    Glob(Box<GlobMatcher>),
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        if pattern.contains('*') {
            match Glob::new(pattern) {
                Ok(glob) => return Pattern::Glob(Box::new(glob.compile_matcher())),
                Err(err) => {
                    log::warn!("invalid glob pattern '{pattern}', matching exactly: {err}");
                }
            }
        }
        Pattern::Exact(pattern.to_string())
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(s) => s == value,
            Pattern::Glob(matcher) => matcher.is_match(value),
        }
    }

    /// The literal key when this pattern can use an exact index lookup.
    pub fn as_exact(&self) -> Option<&str> {
        match self {
            Pattern::Exact(s) => Some(s),
            Pattern::Glob(_) => None,
        }
    }
}

/// A typed, AND-combined filter over one entity kind.
pub trait Criteria<T> {
    fn matches(&self, item: &T) -> bool;

    /// `(index_name, key)` when one criterion can seed candidates from a
    /// declared index instead of a linear scan.
    fn index_hint(&self) -> Option<(&'static str, &str)> {
        None
    }
}

#[derive(Debug)]
struct Index {
    map: HashMap<String, Vec<usize>>,
    /// Recorded duplicate-key violation from the last rebuild. Reads through
    /// this index fail until the caller resolves it.
    conflict: Option<ConflictError>,
}

impl Index {
    fn empty() -> Self {
        Self {
            map: HashMap::new(),
            conflict: None,
        }
    }
}

/// Insertion-ordered entity store with lazily rebuilt named indexes.
///
/// Reads that consult an index take `&mut self`: a lazy rebuild is a real
/// mutation and may surface a [`ConflictError`], and hiding either behind
/// interior mutability would defeat the point of explicit mutation methods.
#[derive(Debug)]
pub struct IndexedCollection<T: Indexable> {
    /// Tombstoned storage; position = insertion order, `None` = removed.
    items: Vec<Option<T>>,
    live: usize,
    indexes: Vec<Index>,
    stale: bool,
    in_batch: bool,
    rebuilds: u64,
}

impl<T: Indexable + 'static> Default for IndexedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Indexable + 'static> IndexedCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            live: 0,
            indexes: T::index_specs().iter().map(|_| Index::empty()).collect(),
            stale: false,
            in_batch: false,
            rebuilds: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate live items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(Option::as_ref)
    }

    /// Append an item. O(1); indexes go stale, uniqueness is not checked
    /// here (see module docs).
    pub fn add(&mut self, item: T) -> &T {
        log::trace!("add item uuid={}", item.uuid());
        self.items.push(Some(item));
        self.live += 1;
        self.stale = true;
        self.items
            .last()
            .and_then(Option::as_ref)
            .expect("item was just pushed")
    }

    /// Look up by the collection's default index key.
    pub fn get(&mut self, key: &str) -> Result<Option<&T>, ConflictError> {
        self.lookup_one(T::DEFAULT_INDEX, key)
    }

    pub fn get_by_uuid(&mut self, uuid: &str) -> Result<Option<&T>, ConflictError> {
        self.lookup_one("uuid", uuid)
    }

    /// Look up a single item in a named index.
    pub fn lookup_one(
        &mut self,
        index_name: &'static str,
        key: &str,
    ) -> Result<Option<&T>, ConflictError> {
        let positions = self.positions(index_name, key)?;
        Ok(positions
            .first()
            .and_then(|&pos| self.items.get(pos).and_then(Option::as_ref)))
    }

    /// Look up all items sharing a key in a named (non-unique) index,
    /// in insertion order.
    pub fn lookup(
        &mut self,
        index_name: &'static str,
        key: &str,
    ) -> Result<Vec<&T>, ConflictError> {
        let mut positions = self.positions(index_name, key)?;
        positions.sort_unstable();
        Ok(positions
            .into_iter()
            .filter_map(|pos| self.items.get(pos).and_then(Option::as_ref))
            .collect())
    }

    /// Remove by default-index key. O(1) once indexes are built.
    pub fn remove(&mut self, key: &str) -> Result<Option<T>, ConflictError> {
        let positions = self.positions(T::DEFAULT_INDEX, key)?;
        Ok(self.take_at(positions.first().copied()))
    }

    pub fn remove_by_uuid(&mut self, uuid: &str) -> Result<Option<T>, ConflictError> {
        let positions = self.positions("uuid", uuid)?;
        Ok(self.take_at(positions.first().copied()))
    }

    /// Apply a mutation to the item under `key`, marking indexes stale.
    ///
    /// This is the supported way to edit a stored entity: going through the
    /// collection keeps the dirty-tracking coherent with the indexes.
    pub fn modify<R>(
        &mut self,
        key: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, ConflictError> {
        let positions = self.positions(T::DEFAULT_INDEX, key)?;
        Ok(self.modify_at(positions.first().copied(), f))
    }

    /// Like [`modify`](Self::modify) but keyed by uuid - the escape hatch
    /// for resolving a conflict on another index (rename one duplicate).
    pub fn modify_by_uuid<R>(
        &mut self,
        uuid: &str,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>, ConflictError> {
        let positions = self.positions("uuid", uuid)?;
        Ok(self.modify_at(positions.first().copied(), f))
    }

    fn modify_at<R>(&mut self, pos: Option<usize>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let item = self.items.get_mut(pos?).and_then(Option::as_mut)?;
        let result = f(item);
        self.stale = true;
        Some(result)
    }

    /// Filter by AND-combined criteria, preserving insertion order.
    ///
    /// Uses an index when the criteria expose an exact-key hint; otherwise a
    /// linear scan.
    pub fn filter(&mut self, criteria: &impl Criteria<T>) -> Result<Vec<&T>, ConflictError> {
        if let Some((index_name, key)) = criteria.index_hint() {
            let mut positions = self.positions(index_name, key)?;
            positions.sort_unstable();
            return Ok(positions
                .into_iter()
                .filter_map(|pos| self.items.get(pos).and_then(Option::as_ref))
                .filter(|item| criteria.matches(item))
                .collect());
        }
        self.rebuild_if_stale();
        Ok(self.iter().filter(|item| criteria.matches(item)).collect())
    }

    /// Run `f` with index rebuilds suppressed; exactly one rebuild happens
    /// when the scope exits, no matter how many mutations ran inside.
    ///
    /// Not reentrant: nesting returns [`Error::BatchReentry`]. The batch flag
    /// is cleared on every exit path; a duplicate key introduced inside the
    /// batch surfaces as the returned [`Error::Conflict`].
    pub fn batch_mode<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, Error> {
        if self.in_batch {
            return Err(Error::BatchReentry);
        }
        self.in_batch = true;
        let result = f(self);
        self.in_batch = false;
        self.rebuild_if_stale();
        if let Some(conflict) = self.indexes.iter().find_map(|i| i.conflict.as_ref()) {
            return Err(conflict.clone().into());
        }
        Ok(result)
    }

    /// Number of index rebuilds so far (coalescing instrumentation).
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn positions(
        &mut self,
        index_name: &'static str,
        key: &str,
    ) -> Result<Vec<usize>, ConflictError> {
        self.rebuild_if_stale();
        if self.stale {
            // Inside batch_mode the indexes stay stale; fall back to a scan
            // so reads remain correct, just not O(1).
            let spec = Self::spec(index_name);
            return Ok(self
                .items
                .iter()
                .enumerate()
                .filter_map(|(pos, slot)| slot.as_ref().map(|item| (pos, item)))
                .filter(|(_, item)| (spec.key_fn)(item).as_deref() == Some(key))
                .map(|(pos, _)| pos)
                .collect());
        }
        let index = &self.indexes[Self::spec_position(index_name)];
        if let Some(conflict) = &index.conflict {
            return Err(conflict.clone());
        }
        Ok(index.map.get(key).cloned().unwrap_or_default())
    }

    fn take_at(&mut self, pos: Option<usize>) -> Option<T> {
        let taken = self.items.get_mut(pos?).and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
            self.stale = true;
        }
        taken
    }

    /// Rebuild every index, recording duplicate keys in unique ones.
    fn rebuild_if_stale(&mut self) {
        if !self.stale || self.in_batch {
            return;
        }

        let specs = T::index_specs();
        let mut fresh: Vec<Index> = specs.iter().map(|_| Index::empty()).collect();

        for (pos, item) in self.items.iter().enumerate() {
            let Some(item) = item.as_ref() else { continue };
            for (spec, index) in specs.iter().zip(fresh.iter_mut()) {
                if let Some(key) = (spec.key_fn)(item) {
                    index.map.entry(key).or_default().push(pos);
                }
            }
        }

        for (spec, index) in specs.iter().zip(fresh.iter_mut()) {
            if !spec.unique {
                continue;
            }
            // Smallest duplicated key, for deterministic reporting.
            let duplicate = index
                .map
                .iter()
                .filter(|(_, positions)| positions.len() > 1)
                .min_by(|a, b| a.0.cmp(b.0));
            if let Some((key, positions)) = duplicate {
                let item_ids = positions
                    .iter()
                    .filter_map(|&pos| self.items.get(pos).and_then(Option::as_ref))
                    .map(|item| item.uuid().to_string())
                    .collect();
                index.conflict = Some(ConflictError {
                    index_name: spec.name.to_string(),
                    key: key.clone(),
                    item_ids,
                });
            }
        }

        self.indexes = fresh;
        self.stale = false;
        self.rebuilds += 1;
        log::trace!(
            "rebuilt {} indexes (rebuild #{})",
            self.indexes.len(),
            self.rebuilds
        );
    }

    fn spec(index_name: &'static str) -> &'static IndexSpec<T> {
        &T::index_specs()[Self::spec_position(index_name)]
    }

    fn spec_position(index_name: &'static str) -> usize {
        T::index_specs()
            .iter()
            .position(|s| s.name == index_name)
            .unwrap_or_else(|| panic!("no index named '{index_name}' declared for this collection"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Part {
        uuid: String,
        reference: String,
        value: String,
    }

    impl Part {
        fn new(uuid: &str, reference: &str, value: &str) -> Self {
            Self {
                uuid: uuid.into(),
                reference: reference.into(),
                value: value.into(),
            }
        }
    }

    impl Indexable for Part {
        const DEFAULT_INDEX: &'static str = "reference";

        fn uuid(&self) -> &str {
            &self.uuid
        }

        fn index_specs() -> &'static [IndexSpec<Self>] {
            &[
                IndexSpec {
                    name: "uuid",
                    key_fn: |p| Some(p.uuid.clone()),
                    unique: true,
                },
                IndexSpec {
                    name: "reference",
                    key_fn: |p| Some(p.reference.clone()),
                    unique: true,
                },
                IndexSpec {
                    name: "value",
                    key_fn: |p| Some(p.value.clone()),
                    unique: false,
                },
            ]
        }
    }

    struct ValueIs(Pattern);

    impl Criteria<Part> for ValueIs {
        fn matches(&self, item: &Part) -> bool {
            self.0.matches(&item.value)
        }
        fn index_hint(&self) -> Option<(&'static str, &str)> {
            self.0.as_exact().map(|k| ("value", k))
        }
    }

    #[test]
    fn add_then_get_returns_same_item() {
        let mut parts = IndexedCollection::new();
        parts.add(Part::new("u1", "R1", "10k"));
        let got = parts.get("R1").unwrap().expect("R1 present");
        assert_eq!(got.uuid, "u1");
        assert!(parts.get("R2").unwrap().is_none());
    }

    #[test]
    fn conflict_raised_lazily_and_names_both_items() {
        let mut parts = IndexedCollection::new();
        parts.add(Part::new("u1", "R1", "10k"));
        // Second R1 is accepted - add never validates.
        parts.add(Part::new("u2", "R1", "22k"));

        let err = parts.get("R1").unwrap_err();
        assert_eq!(err.index_name, "reference");
        assert_eq!(err.key, "R1");
        assert_eq!(err.item_ids, vec!["u1".to_string(), "u2".to_string()]);

        // The uuid index is unaffected: resolution stays possible.
        assert!(parts.get_by_uuid("u2").unwrap().is_some());
        parts
            .modify_by_uuid("u2", |p| p.reference = "R2".into())
            .unwrap();
        assert!(parts.get("R1").unwrap().is_some());
        assert!(parts.get("R2").unwrap().is_some());
    }

    #[test]
    fn batch_mode_coalesces_rebuilds() {
        let mut parts = IndexedCollection::new();

        // Interleaved add + read: one rebuild per read.
        for i in 0..5 {
            parts.add(Part::new(&format!("u{i}"), &format!("R{i}"), "10k"));
            parts.get(&format!("R{i}")).unwrap();
        }
        assert_eq!(parts.rebuild_count(), 5);

        // The same mutation burst inside batch_mode: exactly one more.
        parts
            .batch_mode(|c| {
                for i in 5..25 {
                    c.add(Part::new(&format!("u{i}"), &format!("R{i}"), "22k"));
                }
            })
            .unwrap();
        assert_eq!(parts.rebuild_count(), 6);
        assert_eq!(parts.len(), 25);
    }

    #[test]
    fn batch_mode_is_not_reentrant() {
        let mut parts: IndexedCollection<Part> = IndexedCollection::new();
        let err = parts
            .batch_mode(|c| c.batch_mode(|_| ()).err())
            .unwrap()
            .expect("nested batch must fail");
        assert!(matches!(err, Error::BatchReentry));
    }

    #[test]
    fn batch_mode_surfaces_conflicts_introduced_inside() {
        let mut parts = IndexedCollection::new();
        let result = parts.batch_mode(|c| {
            c.add(Part::new("u1", "R1", "10k"));
            c.add(Part::new("u2", "R1", "22k"));
        });
        match result {
            Err(Error::Conflict(conflict)) => assert_eq!(conflict.key, "R1"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn reads_inside_batch_fall_back_to_scan() {
        let mut parts = IndexedCollection::new();
        parts
            .batch_mode(|c| {
                c.add(Part::new("u1", "R1", "10k"));
                let found = c.get("R1").unwrap().is_some();
                assert!(found);
                assert_eq!(c.rebuild_count(), 0);
            })
            .unwrap();
        assert_eq!(parts.rebuild_count(), 1);
    }

    #[test]
    fn remove_is_keyed_and_preserves_order() {
        let mut parts = IndexedCollection::new();
        parts.add(Part::new("u1", "R1", "10k"));
        parts.add(Part::new("u2", "R2", "22k"));
        parts.add(Part::new("u3", "R3", "10k"));

        let removed = parts.remove("R2").unwrap().expect("R2 existed");
        assert_eq!(removed.uuid, "u2");
        assert_eq!(parts.len(), 2);

        let order: Vec<&str> = parts.iter().map(|p| p.reference.as_str()).collect();
        assert_eq!(order, vec!["R1", "R3"]);
    }

    #[test]
    fn filter_exact_and_glob() {
        let mut parts = IndexedCollection::new();
        parts.add(Part::new("u1", "R1", "10k"));
        parts.add(Part::new("u2", "R2", "22k"));
        parts.add(Part::new("u3", "R3", "10k"));

        let tens = parts.filter(&ValueIs(Pattern::new("10k"))).unwrap();
        assert_eq!(tens.len(), 2);
        assert_eq!(tens[0].reference, "R1");
        assert_eq!(tens[1].reference, "R3");

        let globbed = parts.filter(&ValueIs(Pattern::new("*k"))).unwrap();
        assert_eq!(globbed.len(), 3);
    }

    #[test]
    fn lookup_latency_is_flat_at_ten_thousand_items() {
        let mut parts = IndexedCollection::new();
        parts
            .batch_mode(|c| {
                for i in 0..10_000 {
                    c.add(Part::new(&format!("u{i}"), &format!("R{i}"), "1k"));
                }
            })
            .unwrap();

        // After the single rebuild, point lookups touch the index only: no
        // further rebuilds regardless of how many reads run.
        let before = parts.rebuild_count();
        for i in (0..10_000).step_by(997) {
            assert!(parts.get(&format!("R{i}")).unwrap().is_some());
        }
        assert_eq!(parts.rebuild_count(), before);
    }
}
