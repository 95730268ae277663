// =============================================================================
// FILE SCANNER - src/scanner/mod.rs
// Lazy target discovery beneath a guarded root
// =============================================================================

//! Target discovery.
//!
//! [`scan`] walks a directory tree lazily (via `walkdir`) and yields every regular file whose
//! lowercase extension passes the [`ExtensionFilter`]. Directories named
//! [`ENCRYPTED_DIRNAME`](crate::ENCRYPTED_DIRNAME) are never entered, at any
//! depth, so a run can never pick up its own artifacts. Symlinks are not
//! followed. Each call starts a fresh walk; there is no snapshot, and a tree
//! mutated during iteration may or may not be reflected in the output.

use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use shared::{SimulationError, SimulationResult};

use crate::safe_zone::SafeZone;
use crate::ENCRYPTED_DIRNAME;

/// Extensions targeted when the operator does not ask for every file.
pub const DEFAULT_TARGET_EXTENSIONS: &[&str] = &[".txt", ".pdf", ".docx", ".png", ".jpg"];

/// File name used for dropped notes.
pub const NOTE_FILE_NAME: &str = "README.txt";

/// Extension key used for files that have none.
pub const NO_EXTENSION: &str = "(none)";

/// A candidate file found by the scanner. Read-only: the scanner and the
/// encryptor never modify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: PathBuf,
    /// Path relative to the scanned root.
    pub relative_path: PathBuf,
    pub size: u64,
    /// Lowercase extension with its leading dot, or [`NO_EXTENSION`].
    pub extension: String,
}

/// Set of lowercase extensions (with leading dot). Empty means "all files".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: BTreeSet<String>,
}

impl ExtensionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn default_targets() -> Self {
        Self::new(DEFAULT_TARGET_EXTENSIONS)
    }

    pub fn accepts_everything(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.accepts_everything() || self.allowed.contains(&extension_key(path))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

/// `"TXT"` and `".txt"` both become `".txt"`.
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed)
    }
}

/// Extension key used for filtering and for the run's extension distribution.
pub fn extension_key(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_ascii_lowercase()),
        None => NO_EXTENSION.to_string(),
    }
}

type ShadowSkippingWalk = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// Depth-first walk of `root` that never enters `encrypted/` directories and
/// does not follow symlinks.
pub(crate) fn shadow_skipping_walk(root: &Path) -> ShadowSkippingWalk {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(outside_shadow_tree as fn(&DirEntry) -> bool)
}

fn outside_shadow_tree(entry: &DirEntry) -> bool {
    let shadow = entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ENCRYPTED_DIRNAME;
    if shadow {
        debug!("Not descending into shadow directory {}", entry.path().display());
    }
    !shadow
}

/// Unwrap a walk step, logging and skipping unreadable entries.
fn readable(step: walkdir::Result<DirEntry>) -> Option<DirEntry> {
    match step {
        Ok(entry) => Some(entry),
        Err(e) => {
            let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
            warn!("Skipping unreadable entry {}: {}", path, e);
            None
        }
    }
}

/// Lazy sequence of [`TargetFile`]s produced by [`scan`].
pub struct TargetScanner {
    root: PathBuf,
    filter: ExtensionFilter,
    walk: ShadowSkippingWalk,
}

impl TargetScanner {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for TargetScanner {
    type Item = TargetFile;

    fn next(&mut self) -> Option<TargetFile> {
        loop {
            let Some(entry) = readable(self.walk.next()?) else {
                continue;
            };
            if !entry.file_type().is_file() || !self.filter.matches(entry.path()) {
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!("Cannot read metadata for {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let path = entry.into_path();
            let relative_path = match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            debug!("Found target {}", relative_path.display());
            return Some(TargetFile {
                extension: extension_key(&path),
                path,
                relative_path,
                size,
            });
        }
    }
}

/// Start a fresh lazy walk of `root`.
///
/// `root` is checked against the zone before any filesystem access; an empty
/// filter selects every regular file.
pub fn scan(zone: &SafeZone, root: &Path, filter: &ExtensionFilter) -> SimulationResult<TargetScanner> {
    let root = zone.ensure_contained(root)?;
    if !root.is_dir() {
        return Err(SimulationError::missing("scan root is not a directory", root));
    }
    Ok(TargetScanner {
        walk: shadow_skipping_walk(&root),
        filter: filter.clone(),
        root,
    })
}

/// Write `content` verbatim to `README.txt` in every directory the walk
/// visits. Best effort: a directory that cannot be written is logged and
/// skipped. Returns the notes written.
pub fn drop_decoy_notes(zone: &SafeZone, root: &Path, content: &str) -> SimulationResult<Vec<PathBuf>> {
    let root = zone.ensure_contained(root)?;
    let mut written = Vec::new();

    for entry in shadow_skipping_walk(&root).filter_map(readable) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let note = dir.join(NOTE_FILE_NAME);
        let result = zone
            .ensure_contained(&note)
            .and_then(|target| fs::write(&target, content).map_err(|e| SimulationError::io(&target, e)));
        match result {
            Ok(()) => {
                debug!("Dropped note {}", note.display());
                written.push(note);
            }
            Err(e) => warn!("Failed to drop note in {}: {}", dir.display(), e),
        }
    }

    info!("Dropped {} notes", written.len());
    Ok(written)
}
