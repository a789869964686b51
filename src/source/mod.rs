//! Source Controller (C3): reads/writes one file per asset under
//! `<source_root>/<domain>/<scope…>/<name>.<ext>`.
//!
//! Grounded in the teacher's `source/filesystem.rs` (`FileSystem` wrapping
//! a root `PathBuf`, `path_of` building a file path from an id); the
//! hot-reload watcher that file carries is dropped (see DESIGN.md).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::SourceError;
use crate::path::AssetPath;

/// The result of [`SourceController::probe_import`]: whether a path has
/// source bytes available to import, and a hint at the stored extension
/// (the concrete type is determined by the caller from the extension and
/// the registry, not by this controller).
#[derive(Debug, Clone)]
pub struct ImportProbe {
    pub exists: bool,
    pub extension: String,
    pub modified: Option<SystemTime>,
}

/// Synchronous filesystem-backed source tree for one `source_root`.
///
/// All methods perform blocking I/O; the operation controller is
/// responsible for running them on a worker thread, never under a registry
/// lock.
pub struct SourceController {
    root: PathBuf,
}

impl SourceController {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SourceController { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &AssetPath) -> PathBuf {
        let mut full = self.root.clone();
        full.push(path.domain());
        let scope = path.scope();
        if !scope.is_empty() {
            for segment in scope.split('/') {
                full.push(segment);
            }
        }
        full.push(path.name());
        full
    }

    pub fn get_source_bytes(&self, path: &AssetPath) -> Result<Vec<u8>, SourceError> {
        let file = self.file_path(path);
        fs::read(&file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(path.clone())
            } else {
                SourceError::from(e)
            }
        })
    }

    pub fn write_source(&self, path: &AssetPath, bytes: &[u8]) -> Result<(), SourceError> {
        let file = self.file_path(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file, bytes)?;
        log::trace!("wrote source file {}", file.display());
        Ok(())
    }

    pub fn remove_source(&self, path: &AssetPath) -> Result<(), SourceError> {
        let file = self.file_path(path);
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SourceError::from(e)),
        }
    }

    pub fn exists(&self, path: &AssetPath) -> bool {
        self.file_path(path).is_file()
    }

    pub fn modified(&self, path: &AssetPath) -> Option<SystemTime> {
        fs::metadata(self.file_path(path)).ok()?.modified().ok()
    }

    /// Tests for existence and reports the stored extension without doing
    /// a full import.
    pub fn probe_import(&self, path: &AssetPath) -> ImportProbe {
        let file = self.file_path(path);
        match fs::metadata(&file) {
            Ok(meta) => ImportProbe {
                exists: true,
                extension: path.extension().to_owned(),
                modified: meta.modified().ok(),
            },
            Err(_) => ImportProbe {
                exists: false,
                extension: path.extension().to_owned(),
                modified: None,
            },
        }
    }

    /// Enumerates every asset currently present under a domain's source
    /// tree, lazily, mirroring the teacher's iterator-based directory
    /// walking rather than collecting eagerly.
    pub fn enumerate(&self, domain: &str) -> impl Iterator<Item = AssetPath> + '_ {
        let domain_root = self.root.join(domain);
        let domain_owned = domain.to_owned();
        WalkSourceTree::new(domain_root).map(move |(scope, name)| {
            let raw = if scope.is_empty() {
                format!("{}//{}", domain_owned, name)
            } else {
                format!("{}//{}/{}", domain_owned, scope, name)
            };
            AssetPath::new(&raw)
        })
    }
}

/// Depth-first walk over a domain's source tree, yielding `(scope, name)`
/// pairs relative to the domain root.
struct WalkSourceTree {
    dirs: Vec<(PathBuf, String)>,
    pending: Vec<(String, String)>,
}

impl WalkSourceTree {
    fn new(root: PathBuf) -> Self {
        WalkSourceTree {
            dirs: vec![(root, String::new())],
            pending: Vec::new(),
        }
    }
}

impl Iterator for WalkSourceTree {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop() {
                return Some(item);
            }

            let (dir, scope) = self.dirs.pop()?;
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if path.is_dir() {
                    let child_scope = if scope.is_empty() {
                        file_name
                    } else {
                        format!("{scope}/{file_name}")
                    };
                    self.dirs.push((path, child_scope));
                } else {
                    self.pending.push((scope.clone(), file_name));
                }
            }
        }
    }
}
