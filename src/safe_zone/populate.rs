// =============================================================================
// SAFE-ZONE POPULATION - src/safe_zone/populate.rs
// Realistic dummy tree for a fresh sandbox
// =============================================================================

use log::{info, warn};
use rand::{Rng, RngCore};
use std::fs;
use std::path::{Path, PathBuf};

use shared::{SimulationError, SimulationResult};

use super::SafeZone;

const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";

const TEXT_EXTENSIONS: &[&str] = &["txt", "html", "css", "js", "py"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png"];

/// Directory -> files, relative to the zone root.
const LAYOUT: &[(&str, &[&str])] = &[
    ("Documents/Work", &["report.docx", "presentation.pptx", "data.xlsx"]),
    ("Documents/Personal", &["resume.pdf", "letter.txt"]),
    ("Images/Vacation", &["photo1.jpg", "photo2.jpg", "photo3.png"]),
    ("Images/Family", &["family_gathering.jpg"]),
    ("Projects/Project_Alpha", &["main.py", "utils.py", "requirements.txt"]),
    ("Projects/Project_Beta", &["index.html", "style.css", "script.js"]),
    ("Archives", &["backup_2023.zip", "old_files.tar.gz"]),
];

/// Fill the zone with a small office-like tree of dummy files.
///
/// Returns the files that were written. A file that cannot be written is
/// logged and skipped; a directory outside the zone aborts population.
pub fn populate_safe_zone(zone: &SafeZone) -> SimulationResult<Vec<PathBuf>> {
    info!("Populating safe zone {}", zone.root().display());
    let mut rng = rand::thread_rng();
    let mut written = Vec::new();

    for (directory, files) in LAYOUT {
        let dir_path = zone.ensure_contained(&zone.root().join(directory))?;
        fs::create_dir_all(&dir_path).map_err(|e| SimulationError::io(&dir_path, e))?;

        for file in files.iter() {
            let file_path = dir_path.join(file);
            let contents = dummy_contents(&file_path, &mut rng);
            let result = zone
                .ensure_contained(&file_path)
                .and_then(|target| fs::write(&target, &contents).map_err(|e| SimulationError::io(&target, e)));
            match result {
                Ok(()) => written.push(file_path),
                Err(e) => warn!("Failed to create dummy file {}: {}", file_path.display(), e),
            }
        }
    }

    info!("Safe zone population complete: {} files", written.len());
    Ok(written)
}

fn dummy_contents(path: &Path, rng: &mut impl RngCore) -> Vec<u8> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        return LOREM_IPSUM.as_bytes().to_vec();
    }
    let len = if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        rng.gen_range(1024..=4096)
    } else {
        rng.gen_range(100..=512)
    };
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populates_expected_tree() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        let written = populate_safe_zone(&zone).unwrap();

        assert_eq!(written.len(), 17);
        let letter = zone.root().join("Documents/Personal/letter.txt");
        assert_eq!(fs::read_to_string(letter).unwrap(), LOREM_IPSUM);

        let photo = fs::metadata(zone.root().join("Images/Vacation/photo1.jpg")).unwrap();
        assert!((1024..=4096).contains(&photo.len()));

        let archive = fs::metadata(zone.root().join("Archives/backup_2023.zip")).unwrap();
        assert!((100..=512).contains(&archive.len()));
    }

    #[test]
    fn population_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        populate_safe_zone(&zone).unwrap();
        assert_eq!(populate_safe_zone(&zone).unwrap().len(), 17);
    }
}
