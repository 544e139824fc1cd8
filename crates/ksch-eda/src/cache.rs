//! Symbol cache: the filesystem-backed `SymbolProvider`.
//!
//! The cache is an explicit service with a defined lifecycle - construct it
//! over a set of library directories (or [`SymbolCache::discover`]), inject
//! it into the facade, `invalidate` when libraries change on disk. Libraries
//! parse lazily on first use and stay resident until invalidated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use ksch_sch::library::{LibraryError, ResolvedSymbol, SymbolProvider};

use crate::discovery::discover_symbol_dirs;
use crate::kicad::library::KicadSymbolLibrary;

pub struct SymbolCache {
    dirs: Vec<PathBuf>,
    /// Lazily parsed libraries by nickname (file stem). Interior mutability
    /// is confined to this memo; the provider interface stays `&self`.
    libraries: RefCell<HashMap<String, Rc<KicadSymbolLibrary>>>,
}

impl SymbolCache {
    /// Cache over an explicit set of library directories.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            libraries: RefCell::new(HashMap::new()),
        }
    }

    /// Cache over the platform's discovered KiCad install.
    pub fn discover() -> Self {
        Self::new(discover_symbol_dirs())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Drop every parsed library; the next resolve re-reads from disk.
    pub fn invalidate(&self) {
        self.libraries.borrow_mut().clear();
        log::debug!("symbol cache invalidated");
    }

    /// Swap the directory set and drop the parsed state.
    pub fn rebuild(&mut self, dirs: Vec<PathBuf>) {
        self.dirs = dirs;
        self.invalidate();
    }

    /// Nicknames of every `.kicad_sym` library visible in the directories.
    pub fn available_libraries(&self) -> Vec<String> {
        let mut names = Vec::new();
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("kicad_sym") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    fn library(&self, nickname: &str) -> Result<Rc<KicadSymbolLibrary>, LibraryError> {
        if let Some(lib) = self.libraries.borrow().get(nickname) {
            return Ok(Rc::clone(lib));
        }

        let filename = format!("{nickname}.kicad_sym");
        let path = self
            .dirs
            .iter()
            .map(|dir| dir.join(&filename))
            .find(|p| p.is_file())
            .ok_or_else(|| LibraryError::Unreadable {
                library: nickname.to_string(),
                reason: "no such library file in configured directories".to_string(),
            })?;

        let lib = KicadSymbolLibrary::from_file(&path).map_err(|err| LibraryError::Unreadable {
            library: nickname.to_string(),
            reason: err.to_string(),
        })?;
        let lib = Rc::new(lib);
        self.libraries
            .borrow_mut()
            .insert(nickname.to_string(), Rc::clone(&lib));
        Ok(lib)
    }
}

impl SymbolProvider for SymbolCache {
    fn resolve(&self, lib_id: &str) -> Result<ResolvedSymbol, LibraryError> {
        let (nickname, symbol_name) =
            lib_id
                .split_once(':')
                .ok_or_else(|| LibraryError::SymbolNotFound {
                    lib_id: lib_id.to_string(),
                })?;
        let library = self.library(nickname)?;
        let symbol = library
            .get_symbol(symbol_name)
            .ok_or_else(|| LibraryError::SymbolNotFound {
                lib_id: lib_id.to_string(),
            })?;
        Ok(symbol.resolve(nickname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LIB: &str = r#"(kicad_symbol_lib
	(version 20241209)
	(generator "kicad_symbol_editor")
	(symbol "R"
		(property "Reference" "R" (at 2.032 0 90))
		(property "Value" "R" (at 0 0 90))
		(symbol "R_1_1"
			(pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1"))
			(pin passive line (at 0 -3.81 90) (length 1.27) (name "~") (number "2"))
		)
	)
)"#;

    fn lib_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("Device.kicad_sym")).unwrap();
        file.write_all(LIB.as_bytes()).unwrap();
        dir
    }

    #[test]
    fn resolves_lib_ids_through_the_cache() {
        let dir = lib_dir();
        let cache = SymbolCache::new(vec![dir.path().to_path_buf()]);

        let symbol = cache.resolve("Device:R").unwrap();
        assert_eq!(symbol.reference_prefix, "R");
        assert_eq!(symbol.pins.len(), 2);

        // Second hit comes from the memo, same result.
        let again = cache.resolve("Device:R").unwrap();
        assert_eq!(again.pins.len(), 2);
    }

    #[test]
    fn unknown_library_and_symbol_are_distinct_errors() {
        let dir = lib_dir();
        let cache = SymbolCache::new(vec![dir.path().to_path_buf()]);

        assert!(matches!(
            cache.resolve("Nope:R").unwrap_err(),
            LibraryError::Unreadable { .. }
        ));
        assert!(matches!(
            cache.resolve("Device:Nope").unwrap_err(),
            LibraryError::SymbolNotFound { .. }
        ));
        assert!(matches!(
            cache.resolve("NotALibId").unwrap_err(),
            LibraryError::SymbolNotFound { .. }
        ));
    }

    #[test]
    fn invalidate_forces_reread() {
        let dir = lib_dir();
        let cache = SymbolCache::new(vec![dir.path().to_path_buf()]);
        cache.resolve("Device:R").unwrap();

        // Replace the library on disk with one that renames the symbol.
        let renamed = LIB.replace("\"R\"", "\"R2\"");
        std::fs::write(dir.path().join("Device.kicad_sym"), renamed).unwrap();

        // Cached copy still answers until invalidated.
        assert!(cache.resolve("Device:R").is_ok());
        cache.invalidate();
        assert!(cache.resolve("Device:R").is_err());
        assert!(cache.resolve("Device:R2").is_ok());
    }

    #[test]
    fn lists_available_libraries() {
        let dir = lib_dir();
        let cache = SymbolCache::new(vec![dir.path().to_path_buf()]);
        assert_eq!(cache.available_libraries(), vec!["Device".to_string()]);
    }
}
