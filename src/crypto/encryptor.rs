// =============================================================================
// FILE ENCRYPTOR - src/crypto/encryptor.rs
// =============================================================================

//! Copy-only file encryption. The source is read, sealed and written to a new
//! artifact path; it is never modified or removed.

use log::debug;
use std::fs;
use std::path::{Component, Path};

use shared::{EncryptionAlgorithm, FileTelemetry, SimulationError, SimulationResult};

use super::envelope::{open_envelope, seal_envelope};
use super::keys::{CipherKey, DecryptionKey};
use crate::safe_zone::SafeZone;
use crate::scanner::extension_key;
use crate::telemetry::shannon_entropy;
use crate::ENCRYPTED_SUFFIX;

/// Flattened artifact file name for a path relative to the scan root:
/// `docs/q1/report.txt` becomes `docs__q1__report.txt.encrypted`.
pub fn artifact_name(relative: &Path) -> String {
    let segments: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect();
    format!("{}{}", segments.join("__"), ENCRYPTED_SUFFIX)
}

/// Encrypts files with one run key. Both ends of every operation pass the
/// safe-zone guard first.
pub struct FileEncryptor {
    zone: SafeZone,
    key: CipherKey,
}

impl FileEncryptor {
    pub fn new(zone: SafeZone, key: CipherKey) -> Self {
        Self { zone, key }
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.key.algorithm()
    }

    /// Seal `source` into a new artifact at `dest`.
    pub fn encrypt(&self, source: &Path, dest: &Path) -> SimulationResult<FileTelemetry> {
        let source = self.zone.ensure_contained(source)?;
        let dest = self.zone.ensure_contained(dest)?;
        if !source.is_file() {
            return Err(SimulationError::missing("target file not found", source));
        }

        let plaintext = fs::read(&source).map_err(|e| SimulationError::io(&source, e))?;
        let entropy_before = shannon_entropy(&plaintext);

        let envelope = seal_envelope(&self.key, &plaintext)?;
        fs::write(&dest, &envelope).map_err(|e| SimulationError::io(&dest, e))?;

        debug!(
            "Sealed {} ({} bytes) into {} ({} bytes)",
            source.display(),
            plaintext.len(),
            dest.display(),
            envelope.len()
        );

        Ok(FileTelemetry {
            extension: extension_key(&source),
            original_bytes: plaintext.len() as u64,
            ciphertext_bytes: envelope.len() as u64,
            entropy_before,
            entropy_after: shannon_entropy(&envelope),
            source,
            artifact: dest,
        })
    }
}

/// Recover an artifact's plaintext into `dest`. Returns the plaintext length.
pub fn decrypt_file(
    zone: &SafeZone,
    source: &Path,
    dest: &Path,
    key: &DecryptionKey,
    algorithm: EncryptionAlgorithm,
) -> SimulationResult<u64> {
    let source = zone.ensure_contained(source)?;
    let dest = zone.ensure_contained(dest)?;
    if !source.is_file() {
        return Err(SimulationError::missing("artifact not found", source));
    }

    let envelope = fs::read(&source).map_err(|e| SimulationError::io(&source, e))?;
    let plaintext = open_envelope(algorithm, key, &envelope)?;
    fs::write(&dest, &plaintext).map_err(|e| SimulationError::io(&dest, e))?;
    Ok(plaintext.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::tests::test_keypair;
    use crate::crypto::keys::{generate_key, load_private_key};
    use crate::crypto::{NONCE_LEN, TAG_LEN};
    use std::path::PathBuf;

    fn zone() -> (tempfile::TempDir, SafeZone) {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        (dir, zone)
    }

    #[cfg(unix)]
    #[test]
    fn planted_artifact_link_cannot_redirect_writes() {
        let (dir, zone) = zone();
        let source = zone.root().join("x.txt");
        fs::write(&source, b"payload").unwrap();
        let shadow = zone.root().join("encrypted");
        fs::create_dir_all(&shadow).unwrap();
        let elsewhere = dir.path().join("elsewhere");
        let dest = shadow.join("x.txt.encrypted");
        std::os::unix::fs::symlink(&elsewhere, &dest).unwrap();

        let key = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        let err = FileEncryptor::new(zone, key).encrypt(&source, &dest).unwrap_err();
        assert!(err.is_containment_violation());
        assert!(!elsewhere.exists());
    }

    #[test]
    fn artifact_names_flatten_relative_paths() {
        assert_eq!(artifact_name(Path::new("a.txt")), "a.txt.encrypted");
        assert_eq!(
            artifact_name(&PathBuf::from("docs").join("q1").join("report.txt")),
            "docs__q1__report.txt.encrypted"
        );
    }

    #[test]
    fn encrypt_is_copy_only_and_records_telemetry() {
        let (_dir, zone) = zone();
        let source = zone.root().join("note.TXT");
        fs::write(&source, vec![b'a'; 100]).unwrap();
        let dest = zone.root().join("note.TXT.encrypted");

        let key = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        let telemetry = FileEncryptor::new(zone.clone(), key).encrypt(&source, &dest).unwrap();

        assert_eq!(fs::read(&source).unwrap(), vec![b'a'; 100]);
        assert_eq!(telemetry.original_bytes, 100);
        assert_eq!(telemetry.ciphertext_bytes as usize, NONCE_LEN + 100 + TAG_LEN);
        assert_eq!(fs::metadata(&dest).unwrap().len(), telemetry.ciphertext_bytes);
        assert_eq!(telemetry.extension, ".txt");
        assert_eq!(telemetry.entropy_before, 0.0);
        assert!(telemetry.entropy_delta() > 0.0);
    }

    #[test]
    fn destination_outside_zone_is_refused_before_writing() {
        let (dir, zone) = zone();
        let source = zone.root().join("a.txt");
        fs::write(&source, b"data").unwrap();
        let escape = dir.path().join("stolen.encrypted");

        let key = generate_key(EncryptionAlgorithm::ChaCha20Poly1305, None).unwrap();
        let err = FileEncryptor::new(zone, key).encrypt(&source, &escape).unwrap_err();
        assert!(err.is_containment_violation());
        assert!(!escape.exists());
    }

    #[test]
    fn missing_source_is_reported() {
        let (_dir, zone) = zone();
        let key = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        let err = FileEncryptor::new(zone.clone(), key)
            .encrypt(&zone.root().join("gone.txt"), &zone.root().join("gone.txt.encrypted"))
            .unwrap_err();
        assert!(err.is_missing_resource());
    }

    #[test]
    fn decrypt_file_restores_every_algorithm() {
        let (_dir, zone) = zone();
        let source = zone.root().join("ledger.pdf");
        let content: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(&source, &content).unwrap();
        let pair = test_keypair();

        for algorithm in EncryptionAlgorithm::ALL {
            let key = generate_key(algorithm, Some(&pair.public_pem)).unwrap();
            let opener = if algorithm.is_symmetric() {
                DecryptionKey::from_cipher_key(&key).unwrap()
            } else {
                load_private_key(&pair.private_pem).unwrap()
            };
            let artifact = zone.root().join(format!("ledger.{}.encrypted", algorithm.label()));
            let restored = zone.root().join(format!("ledger.{}.restored", algorithm.label()));

            FileEncryptor::new(zone.clone(), key).encrypt(&source, &artifact).unwrap();
            let written = decrypt_file(&zone, &artifact, &restored, &opener, algorithm).unwrap();
            assert_eq!(written, content.len() as u64);
            assert_eq!(fs::read(&restored).unwrap(), content);
        }
    }
}
