//! Symbol library directory discovery.
//!
//! `KICAD_SYMBOL_DIR` wins when set; otherwise the platform's conventional
//! KiCad install locations are probed. Only directories that actually exist
//! are returned.

use std::path::PathBuf;

#[cfg(target_os = "macos")]
fn default_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/Applications/KiCad/KiCad.app/Contents/SharedSupport/symbols"),
        PathBuf::from("/Library/Application Support/kicad/symbols"),
    ]
}

#[cfg(target_os = "windows")]
fn default_dirs() -> Vec<PathBuf> {
    ["9.0", "8.0", "7.0"]
        .iter()
        .map(|version| {
            PathBuf::from(format!(
                r"C:\Program Files\KiCad\{version}\share\kicad\symbols"
            ))
        })
        .collect()
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn default_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/share/kicad/symbols"),
        PathBuf::from("/usr/local/share/kicad/symbols"),
    ]
}

/// Candidate symbol library directories, existing ones only.
pub fn discover_symbol_dirs() -> Vec<PathBuf> {
    let candidates = match std::env::var("KICAD_SYMBOL_DIR") {
        Ok(dir) if !dir.is_empty() => vec![PathBuf::from(dir)],
        _ => default_dirs(),
    };

    let found: Vec<PathBuf> = candidates.into_iter().filter(|p| p.is_dir()).collect();
    log::debug!("discovered {} symbol director(ies)", found.len());
    found
}
