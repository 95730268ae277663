// =============================================================================
// SAFE-ZONE GUARD - src/safe_zone/mod.rs
// Path containment enforcement for every filesystem-touching operation
// =============================================================================

//! Safe-zone containment.
//!
//! The simulator may only read and write beneath a single sandbox root. The
//! root is resolved once, when the [`SafeZone`] is established, and every
//! component that touches the filesystem calls [`SafeZone::ensure_contained`]
//! immediately before doing so. A path that cannot be resolved is treated as
//! outside the zone.
//!
//! Resolution follows symlinks for every segment that exists on disk, chases
//! dangling symlinks to their targets and normalizes the remaining segments
//! lexically, so destinations that do not exist yet (artifacts, key files) are
//! judged by where they would land.

use log::{debug, error};
use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use shared::{SimulationError, SimulationResult};

pub mod populate;

pub use self::populate::populate_safe_zone;

/// Well-known sandbox directory name, created under the working directory.
pub const SAFE_ZONE_NAME: &str = "Ransomware_Test";

/// The single directory under which simulated attack and decoy operations
/// are permitted. Cheap to clone; the root never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeZone {
    root: Arc<PathBuf>,
}

impl SafeZone {
    /// Establish the zone at `<base>/<name>`, creating the directory when it
    /// does not exist yet.
    pub fn establish(base: &Path, name: &str) -> SimulationResult<Self> {
        if name.is_empty() || Path::new(name).components().count() != 1 {
            return Err(SimulationError::configuration(format!(
                "safe zone name '{}' must be a single path segment",
                name
            )));
        }
        let candidate = base.join(name);
        fs::create_dir_all(&candidate).map_err(|e| SimulationError::io(&candidate, e))?;
        Self::at(&candidate)
    }

    /// Establish the zone under the process working directory using the
    /// well-known name.
    pub fn from_working_directory() -> SimulationResult<Self> {
        let cwd = env::current_dir().map_err(|e| SimulationError::io(".", e))?;
        Self::establish(&cwd, SAFE_ZONE_NAME)
    }

    /// Use an existing directory as the zone root.
    pub fn at(root: &Path) -> SimulationResult<Self> {
        let resolved = fs::canonicalize(root)
            .map_err(|_| SimulationError::missing("safe zone root does not exist", root))?;
        if !resolved.is_dir() {
            return Err(SimulationError::missing("safe zone root is not a directory", root));
        }
        debug!("Safe zone established at {}", resolved.display());
        Ok(Self { root: Arc::new(resolved) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True iff `path` resolves to the root or to a descendant of it.
    /// Never fails: resolution errors count as "outside".
    pub fn is_contained(&self, path: &Path) -> bool {
        match resolve_path(path) {
            Ok(resolved) => resolved.starts_with(self.root.as_path()),
            Err(e) => {
                debug!("Containment check could not resolve {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Fail-closed gate: returns the resolved path when contained, a
    /// containment violation otherwise.
    pub fn ensure_contained(&self, path: &Path) -> SimulationResult<PathBuf> {
        match resolve_path(path) {
            Ok(resolved) if resolved.starts_with(self.root.as_path()) => Ok(resolved),
            _ => {
                error!(
                    "Refusing operation on {}: outside safe zone {}",
                    path.display(),
                    self.root.display()
                );
                Err(SimulationError::ContainmentViolation {
                    path: path.to_path_buf(),
                    root: self.root.to_path_buf(),
                })
            }
        }
    }

    /// Resolve a path the same way the guard does.
    pub fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        resolve_path(path)
    }
}

/// Symlink redirections followed for segments that do not exist on disk.
const MAX_SYMLINK_HOPS: u32 = 40;

/// Resolve `path` to an absolute form: segments that exist are canonicalized
/// (following symlinks), dangling symlinks are chased to their targets, and
/// segments that are genuinely absent are normalized lexically.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    resolve_within(path, MAX_SYMLINK_HOPS)
}

fn resolve_within(path: &Path, hops_left: u32) -> io::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path"));
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    let mut components = absolute.components();
    while let Some(component) = components.next() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(segment) => {
                let candidate = resolved.join(segment);
                match fs::canonicalize(&candidate) {
                    Ok(real) => resolved = real,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => match fs::symlink_metadata(&candidate) {
                        // Dangling link: judge it by where a write would land.
                        Ok(meta) if meta.file_type().is_symlink() => {
                            if hops_left == 0 {
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidInput,
                                    format!("too many symlink hops resolving {}", path.display()),
                                ));
                            }
                            let target = fs::read_link(&candidate)?;
                            let redirected = resolved.join(target).join(components.as_path());
                            return resolve_within(&redirected, hops_left - 1);
                        }
                        Ok(_) => return Err(e),
                        Err(missing) if missing.kind() == io::ErrorKind::NotFound => resolved = candidate,
                        Err(other) => return Err(other),
                    },
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn zone() -> (TempDir, SafeZone) {
        let dir = tempfile::tempdir().expect("tempdir");
        let zone = SafeZone::establish(dir.path(), SAFE_ZONE_NAME).expect("zone");
        (dir, zone)
    }

    #[test]
    fn root_and_descendants_are_contained() {
        let (_dir, zone) = zone();
        let root = zone.root().to_path_buf();
        assert!(zone.is_contained(&root));
        fs::create_dir_all(root.join("Documents")).unwrap();
        assert!(zone.is_contained(&root.join("Documents")));
        assert!(zone.is_contained(&root.join("Documents/not-yet-written.txt")));
    }

    #[test]
    fn parent_and_siblings_are_not_contained() {
        let (dir, zone) = zone();
        assert!(!zone.is_contained(dir.path()));
        assert!(!zone.is_contained(&dir.path().join("Ransomware_Test_sibling")));
        assert!(!zone.is_contained(Path::new("/")));
    }

    #[test]
    fn dot_dot_escape_is_rejected() {
        let (_dir, zone) = zone();
        let escape = zone.root().join("Documents/../../outside.txt");
        assert!(!zone.is_contained(&escape));
        let stays = zone.root().join("a/b/../c.txt");
        assert!(zone.is_contained(&stays));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_pointing_outside_is_rejected() {
        let (dir, zone) = zone();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let link = zone.root().join("link");
        std::os::unix::fs::symlink(&outside, &link).unwrap();
        assert!(!zone.is_contained(&link));
        assert!(!zone.is_contained(&link.join("file.txt")));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_judged_by_its_target() {
        let (dir, zone) = zone();
        let escape = zone.root().join("link.txt");
        let outside_target = dir.path().join("outside_created.txt");
        std::os::unix::fs::symlink(&outside_target, &escape).unwrap();
        assert!(!zone.is_contained(&escape));
        assert!(zone.ensure_contained(&escape).unwrap_err().is_containment_violation());
        assert!(!outside_target.exists());

        let inside = zone.root().join("inside_link.txt");
        std::os::unix::fs::symlink("not_yet/written.txt", &inside).unwrap();
        assert_eq!(
            zone.ensure_contained(&inside).unwrap(),
            zone.root().join("not_yet/written.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_chain_escaping_the_zone_is_rejected() {
        let (dir, zone) = zone();
        let first = zone.root().join("first");
        std::os::unix::fs::symlink(zone.root().join("second"), &first).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), zone.root().join("second")).unwrap();
        assert!(!zone.is_contained(&first.join("artifact.encrypted")));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_fails_closed() {
        let (_dir, zone) = zone();
        let a = zone.root().join("a");
        let b = zone.root().join("b");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();
        assert!(!zone.is_contained(&a));
    }

    #[test]
    fn ensure_contained_fails_closed() {
        let (dir, zone) = zone();
        let err = zone.ensure_contained(&dir.path().join("x")).unwrap_err();
        assert!(err.is_containment_violation());
        let ok = zone.ensure_contained(&zone.root().join("x")).unwrap();
        assert_eq!(ok, zone.root().join("x"));
    }

    #[test]
    fn zone_name_must_be_single_segment() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SafeZone::establish(dir.path(), "a/b").is_err());
        assert!(SafeZone::establish(dir.path(), "").is_err());
    }

    #[test]
    fn missing_root_is_a_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let err = SafeZone::at(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_missing_resource());
    }

    proptest! {
        #[test]
        fn contained_iff_resolved_under_root(
            segments in proptest::collection::vec(
                prop_oneof![Just("..".to_string()), Just(".".to_string()), "[a-z]{1,6}"],
                0..8,
            )
        ) {
            let (_dir, zone) = zone();
            let mut candidate = zone.root().to_path_buf();
            // Lexical model: track depth below the root.
            let mut depth: i64 = 0;
            let mut escaped = false;
            for segment in &segments {
                candidate.push(segment);
                match segment.as_str() {
                    ".." => depth -= 1,
                    "." => {}
                    _ => depth += 1,
                }
                if depth < 0 {
                    escaped = true;
                }
            }
            // Once above the root, later segments can only re-enter through
            // the zone's own name, which the generator never produces.
            prop_assert_eq!(zone.is_contained(&candidate), !escaped);
        }
    }
}
