//! Filesystem capability consumed by the hot-reload path.
//!
//! The registry stamps a write time on every shader entry at load, and the
//! watcher re-reads it each poll. Both go through [`SourceFiles`] so tests
//! can drive the clock and the lock state without touching a disk.

use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

/// File metadata queries the registry and watcher rely on.
pub trait SourceFiles {
    /// Whether the file is currently held open for writing elsewhere.
    ///
    /// A locked file is mid-write; reading it would compile a partial
    /// source, so the watcher skips the poll cycle instead.
    fn is_locked(&self, path: &Path) -> bool;

    /// Last modification time, or `None` when the file is missing.
    fn last_write_time(&self, path: &Path) -> Option<SystemTime>;
}

/// Local-disk implementation over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskSources;

impl SourceFiles for DiskSources {
    fn is_locked(&self, path: &Path) -> bool {
        // An editor or compiler still flushing the file refuses the open;
        // a missing file is not contention, just absent.
        if !path.exists() {
            return false;
        }
        std::fs::File::open(path).is_err()
    }

    fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
    }
}

impl<S: SourceFiles + ?Sized> SourceFiles for Rc<S> {
    fn is_locked(&self, path: &Path) -> bool {
        (**self).is_locked(path)
    }

    fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        (**self).last_write_time(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::SourceFiles;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    #[derive(Clone, Copy)]
    struct FileState {
        write_time: SystemTime,
        locked: bool,
    }

    /// In-memory [`SourceFiles`] with settable write times and lock flags.
    #[derive(Default)]
    pub struct FakeSources {
        files: RefCell<HashMap<PathBuf, FileState>>,
    }

    impl FakeSources {
        pub fn new() -> Self {
            FakeSources::default()
        }

        pub fn set_write_time(&self, path: impl AsRef<Path>, write_time: SystemTime) {
            let mut files = self.files.borrow_mut();
            let state = files
                .entry(path.as_ref().to_path_buf())
                .or_insert(FileState {
                    write_time,
                    locked: false,
                });
            state.write_time = write_time;
        }

        pub fn set_locked(&self, path: impl AsRef<Path>, locked: bool) {
            if let Some(state) = self.files.borrow_mut().get_mut(path.as_ref()) {
                state.locked = locked;
            }
        }
    }

    impl SourceFiles for FakeSources {
        fn is_locked(&self, path: &Path) -> bool {
            self.files
                .borrow()
                .get(path)
                .map(|state| state.locked)
                .unwrap_or(false)
        }

        fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
            self.files.borrow().get(path).map(|state| state.write_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn disk_sources_reads_write_time() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("shader.vs");
        fs::write(&path, "float4 main() : SV_POSITION { return 0; }")
            .expect("failed to write shader file");

        let sources = DiskSources;
        assert!(sources.last_write_time(&path).is_some());
        assert!(!sources.is_locked(&path));
    }

    #[test]
    fn disk_sources_missing_file() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("nope.vs");

        let sources = DiskSources;
        assert_eq!(sources.last_write_time(&path), None);
        assert!(!sources.is_locked(&path));
    }
}
