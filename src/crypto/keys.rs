// =============================================================================
// KEY MANAGEMENT - src/crypto/keys.rs
// =============================================================================

//! Run keys and operator key pairs.
//!
//! A run owns exactly one [`CipherKey`]. Symmetric runs draw 32 random bytes;
//! hybrid runs carry the operator's RSA public key and draw a fresh AES key per
//! file inside the envelope. Key files hold base64 text: the raw 32 bytes for
//! symmetric runs, the PEM public key for hybrid runs. Private keys belong to
//! the operator and are only ever parsed here, never stored.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use shared::{EncryptionAlgorithm, SimulationError, SimulationResult};

use crate::safe_zone::SafeZone;

pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Key material used to encrypt a run.
#[derive(Clone)]
pub enum CipherKey {
    Symmetric {
        algorithm: EncryptionAlgorithm,
        key: Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
    },
    HybridPublic {
        pem: String,
        public_key: RsaPublicKey,
    },
}

impl CipherKey {
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        match self {
            Self::Symmetric { algorithm, .. } => *algorithm,
            Self::HybridPublic { .. } => EncryptionAlgorithm::RsaHybrid,
        }
    }

    /// Build a symmetric key from raw bytes read elsewhere.
    pub fn symmetric(algorithm: EncryptionAlgorithm, bytes: &[u8]) -> SimulationResult<Self> {
        if !algorithm.is_symmetric() {
            return Err(key_error("hybrid mode needs a public key, not raw bytes"));
        }
        let raw: [u8; SYMMETRIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            key_error(format!(
                "symmetric key must be {} bytes, got {}",
                SYMMETRIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::Symmetric {
            algorithm,
            key: Zeroizing::new(raw),
        })
    }

    pub fn hybrid_from_pem(pem: &str) -> SimulationResult<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem.trim())
            .map_err(|e| key_error(format!("invalid RSA public key PEM: {}", e)))?;
        Ok(Self::HybridPublic {
            pem: pem.trim().to_string(),
            public_key,
        })
    }

    /// Text stored (base64-encoded) in the key file.
    fn key_file_payload(&self) -> Vec<u8> {
        match self {
            Self::Symmetric { key, .. } => key.to_vec(),
            Self::HybridPublic { pem, .. } => pem.as_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric { algorithm, .. } => f
                .debug_struct("Symmetric")
                .field("algorithm", algorithm)
                .field("key", &"<redacted>")
                .finish(),
            Self::HybridPublic { .. } => f.debug_struct("HybridPublic").finish_non_exhaustive(),
        }
    }
}

/// Key material that reverses an envelope.
pub enum DecryptionKey {
    Symmetric(Zeroizing<[u8; SYMMETRIC_KEY_LEN]>),
    RsaPrivate(Box<RsaPrivateKey>),
}

impl DecryptionKey {
    pub fn from_cipher_key(key: &CipherKey) -> SimulationResult<Self> {
        match key {
            CipherKey::Symmetric { key, .. } => Ok(Self::Symmetric(key.clone())),
            CipherKey::HybridPublic { .. } => Err(key_error(
                "hybrid envelopes can only be opened with the operator's private key",
            )),
        }
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric(_) => f.write_str("DecryptionKey::Symmetric(<redacted>)"),
            Self::RsaPrivate(_) => f.write_str("DecryptionKey::RsaPrivate(<redacted>)"),
        }
    }
}

/// Operator RSA key pair in PEM form.
pub struct OperatorKeyPair {
    pub private_pem: Zeroizing<String>,
    pub public_pem: String,
}

/// Produce the key for a run. Symmetric algorithms ignore
/// `operator_public_key_pem`; the hybrid algorithm requires it.
pub fn generate_key(
    algorithm: EncryptionAlgorithm,
    operator_public_key_pem: Option<&str>,
) -> SimulationResult<CipherKey> {
    match algorithm {
        EncryptionAlgorithm::Aes256Gcm | EncryptionAlgorithm::ChaCha20Poly1305 => {
            let mut raw = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
            OsRng.fill_bytes(&mut raw[..]);
            debug!("Generated fresh {} run key", algorithm);
            Ok(CipherKey::Symmetric { algorithm, key: raw })
        }
        EncryptionAlgorithm::RsaHybrid => {
            let pem = operator_public_key_pem.ok_or_else(|| {
                SimulationError::missing(
                    "hybrid mode requires the operator's RSA public key",
                    "<operator public key>",
                )
            })?;
            CipherKey::hybrid_from_pem(pem)
        }
    }
}

/// Persist the key as base64 text at `path` (guarded).
pub fn save_key(zone: &SafeZone, key: &CipherKey, path: &Path) -> SimulationResult<()> {
    let target = zone.ensure_contained(path)?;
    let payload = Zeroizing::new(key.key_file_payload());
    let encoded = Zeroizing::new(BASE64.encode(payload.as_slice()));
    fs::write(&target, encoded.as_bytes()).map_err(|e| SimulationError::io(&target, e))?;
    info!("Run key saved to {}", target.display());
    Ok(())
}

/// Key-load function for the recovery collaborator.
pub fn load_key(zone: &SafeZone, path: &Path, algorithm: EncryptionAlgorithm) -> SimulationResult<CipherKey> {
    let source = zone.ensure_contained(path)?;
    if !source.is_file() {
        return Err(SimulationError::missing("key file not found", source));
    }
    let encoded = Zeroizing::new(fs::read(&source).map_err(|e| SimulationError::io(&source, e))?);
    let decoded = Zeroizing::new(
        BASE64
            .decode(trim_ascii(&encoded))
            .map_err(|e| key_error(format!("key file is not valid base64: {}", e)))?,
    );
    if algorithm.is_symmetric() {
        CipherKey::symmetric(algorithm, &decoded)
    } else {
        let pem = std::str::from_utf8(&decoded).map_err(|_| key_error("hybrid key file does not hold PEM text"))?;
        CipherKey::hybrid_from_pem(pem)
    }
}

/// Generate an operator key pair for hybrid runs.
pub fn generate_operator_keypair(bits: usize) -> SimulationResult<OperatorKeyPair> {
    info!("Generating {}-bit RSA operator key pair", bits);
    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| key_error(format!("RSA key generation failed: {}", e)))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| key_error(format!("private key encoding failed: {}", e)))?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| key_error(format!("public key encoding failed: {}", e)))?;

    Ok(OperatorKeyPair {
        private_pem,
        public_pem,
    })
}

/// Parse the operator's PKCS#8 private key.
pub fn load_private_key(pem: &str) -> SimulationResult<DecryptionKey> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(pem.trim())
        .map_err(|e| key_error(format!("invalid RSA private key PEM: {}", e)))?;
    Ok(DecryptionKey::RsaPrivate(Box::new(private_key)))
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn key_error(message: impl Into<String>) -> SimulationError {
    SimulationError::KeyMaterial {
        message: message.into(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::OnceLock;

    /// Small key pair shared across tests; 1024 bits still wraps a 32-byte
    /// key under OAEP-SHA256.
    pub(crate) fn test_keypair() -> &'static OperatorKeyPair {
        static PAIR: OnceLock<OperatorKeyPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_operator_keypair(1024).expect("keypair"))
    }

    fn zone() -> (tempfile::TempDir, SafeZone) {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        (dir, zone)
    }

    #[test]
    fn symmetric_keys_are_fresh() {
        let a = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        let b = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        assert_ne!(a.key_file_payload(), b.key_file_payload());
        assert_eq!(a.key_file_payload().len(), SYMMETRIC_KEY_LEN);
    }

    #[test]
    fn hybrid_without_public_key_is_missing_resource() {
        let err = generate_key(EncryptionAlgorithm::RsaHybrid, None).unwrap_err();
        assert!(err.is_missing_resource());
    }

    #[test]
    fn symmetric_key_file_round_trips() {
        let (_dir, zone) = zone();
        let path = zone.root().join("sim_key.bin");
        let key = generate_key(EncryptionAlgorithm::ChaCha20Poly1305, None).unwrap();
        save_key(&zone, &key, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(BASE64.decode(text.trim()).unwrap(), key.key_file_payload());

        let loaded = load_key(&zone, &path, EncryptionAlgorithm::ChaCha20Poly1305).unwrap();
        assert_eq!(loaded.key_file_payload(), key.key_file_payload());
        assert_eq!(loaded.algorithm(), EncryptionAlgorithm::ChaCha20Poly1305);
    }

    #[test]
    fn hybrid_key_file_holds_the_public_pem() {
        let (_dir, zone) = zone();
        let path = zone.root().join("sim_key.bin");
        let key = generate_key(EncryptionAlgorithm::RsaHybrid, Some(&test_keypair().public_pem)).unwrap();
        save_key(&zone, &key, &path).unwrap();

        let decoded = BASE64.decode(fs::read_to_string(&path).unwrap().trim()).unwrap();
        assert!(String::from_utf8(decoded).unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
        let loaded = load_key(&zone, &path, EncryptionAlgorithm::RsaHybrid).unwrap();
        assert_eq!(loaded.algorithm(), EncryptionAlgorithm::RsaHybrid);
    }

    #[test]
    fn missing_key_file_is_reported() {
        let (_dir, zone) = zone();
        let err = load_key(&zone, &zone.root().join("absent.bin"), EncryptionAlgorithm::Aes256Gcm).unwrap_err();
        assert!(err.is_missing_resource());
    }

    #[test]
    fn key_file_outside_zone_is_refused() {
        let (dir, zone) = zone();
        let key = generate_key(EncryptionAlgorithm::Aes256Gcm, None).unwrap();
        let err = save_key(&zone, &key, &dir.path().join("leak.bin")).unwrap_err();
        assert!(err.is_containment_violation());
        assert!(!dir.path().join("leak.bin").exists());
    }

    #[test]
    fn wrong_length_symmetric_key_is_rejected() {
        assert!(CipherKey::symmetric(EncryptionAlgorithm::Aes256Gcm, &[0u8; 16]).is_err());
        assert!(CipherKey::symmetric(EncryptionAlgorithm::RsaHybrid, &[0u8; 32]).is_err());
    }

    #[test]
    fn debug_output_redacts_key_bytes() {
        let key = CipherKey::symmetric(EncryptionAlgorithm::Aes256Gcm, &[0xAB; 32]).unwrap();
        let text = format!("{:?}", key);
        assert!(text.contains("redacted"));
        assert!(!text.contains("171"));
    }

    #[test]
    fn private_key_pem_parses() {
        let key = load_private_key(&test_keypair().private_pem).unwrap();
        assert!(matches!(key, DecryptionKey::RsaPrivate(_)));
        assert!(load_private_key("not a pem").is_err());
    }
}
