// =============================================================================
// ENVELOPE FORMATS - src/crypto/envelope.rs
// =============================================================================

//! Fixed, versionless artifact layouts.
//!
//! ```text
//! symmetric: nonce(12) || ciphertext || tag(16)
//! hybrid:    wrapped_key_len(4, big-endian) || wrapped_key || nonce(12) || ciphertext || tag(16)
//! ```
//!
//! Every envelope gets a fresh random nonce. Hybrid envelopes also get a fresh
//! AES-256 key, wrapped with RSA-OAEP(SHA-256) under the operator public key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use shared::{EncryptionAlgorithm, SimulationError, SimulationResult};

use super::keys::{CipherKey, DecryptionKey, SYMMETRIC_KEY_LEN};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const WRAPPED_KEY_LEN_PREFIX: usize = 4;

/// Encrypt `plaintext` into the envelope format of the key's algorithm.
pub fn seal_envelope(key: &CipherKey, plaintext: &[u8]) -> SimulationResult<Vec<u8>> {
    match key {
        CipherKey::Symmetric { algorithm, key } => seal_symmetric(*algorithm, &key[..], plaintext),
        CipherKey::HybridPublic { public_key, .. } => seal_hybrid(public_key, plaintext),
    }
}

/// Reverse [`seal_envelope`] exactly.
pub fn open_envelope(
    algorithm: EncryptionAlgorithm,
    key: &DecryptionKey,
    envelope: &[u8],
) -> SimulationResult<Vec<u8>> {
    match (algorithm, key) {
        (EncryptionAlgorithm::RsaHybrid, DecryptionKey::RsaPrivate(private_key)) => {
            let (len_bytes, rest) = split(envelope, WRAPPED_KEY_LEN_PREFIX, "wrapped key length")?;
            let mut len_prefix = [0u8; WRAPPED_KEY_LEN_PREFIX];
            len_prefix.copy_from_slice(len_bytes);
            let wrapped_len = u32::from_be_bytes(len_prefix) as usize;
            let (wrapped, sealed) = split(rest, wrapped_len, "wrapped key")?;

            let file_key = Zeroizing::new(
                private_key
                    .decrypt(Oaep::new::<Sha256>(), wrapped)
                    .map_err(|e| crypto_error(format!("key unwrap failed: {}", e)))?,
            );
            if file_key.len() != SYMMETRIC_KEY_LEN {
                return Err(crypto_error("unwrapped file key has the wrong length"));
            }
            open_symmetric(EncryptionAlgorithm::Aes256Gcm, &file_key, sealed)
        }
        (EncryptionAlgorithm::RsaHybrid, DecryptionKey::Symmetric(_)) => Err(SimulationError::KeyMaterial {
            message: "hybrid envelopes need the operator's private key".into(),
        }),
        (symmetric, DecryptionKey::Symmetric(key)) => open_symmetric(symmetric, &key[..], envelope),
        (_, DecryptionKey::RsaPrivate(_)) => Err(SimulationError::KeyMaterial {
            message: format!("{} envelopes need the symmetric run key", algorithm),
        }),
    }
}

fn seal_symmetric(algorithm: EncryptionAlgorithm, key: &[u8], plaintext: &[u8]) -> SimulationResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = match algorithm {
        EncryptionAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| crypto_error("AES-256-GCM key must be 32 bytes"))?
            .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| crypto_error("AES-256-GCM encryption failed"))?,
        EncryptionAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| crypto_error("ChaCha20-Poly1305 key must be 32 bytes"))?
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| crypto_error("ChaCha20-Poly1305 encryption failed"))?,
        EncryptionAlgorithm::RsaHybrid => return Err(crypto_error("hybrid mode is not a symmetric cipher")),
    };

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

fn open_symmetric(algorithm: EncryptionAlgorithm, key: &[u8], envelope: &[u8]) -> SimulationResult<Vec<u8>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(malformed(format!(
            "envelope of {} bytes is shorter than nonce and tag",
            envelope.len()
        )));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    match algorithm {
        EncryptionAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| crypto_error("AES-256-GCM key must be 32 bytes"))?
            .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| crypto_error("AES-256-GCM authentication failed")),
        EncryptionAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| crypto_error("ChaCha20-Poly1305 key must be 32 bytes"))?
            .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| crypto_error("ChaCha20-Poly1305 authentication failed")),
        EncryptionAlgorithm::RsaHybrid => Err(crypto_error("hybrid mode is not a symmetric cipher")),
    }
}

fn seal_hybrid(public_key: &RsaPublicKey, plaintext: &[u8]) -> SimulationResult<Vec<u8>> {
    let mut file_key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    OsRng.fill_bytes(&mut file_key[..]);

    let wrapped = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &file_key[..])
        .map_err(|e| crypto_error(format!("key wrap failed: {}", e)))?;
    let wrapped_len = u32::try_from(wrapped.len()).map_err(|_| crypto_error("wrapped key too large"))?;

    let sealed = seal_symmetric(EncryptionAlgorithm::Aes256Gcm, &file_key[..], plaintext)?;

    let mut envelope = Vec::with_capacity(WRAPPED_KEY_LEN_PREFIX + wrapped.len() + sealed.len());
    envelope.extend_from_slice(&wrapped_len.to_be_bytes());
    envelope.extend_from_slice(&wrapped);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

fn split<'a>(bytes: &'a [u8], at: usize, what: &str) -> SimulationResult<(&'a [u8], &'a [u8])> {
    if bytes.len() < at {
        return Err(malformed(format!("truncated before end of {}", what)));
    }
    Ok(bytes.split_at(at))
}

fn crypto_error(message: impl Into<String>) -> SimulationError {
    SimulationError::Cryptographic {
        message: message.into(),
    }
}

fn malformed(message: impl Into<String>) -> SimulationError {
    SimulationError::MalformedEnvelope {
        message: message.into(),
    }
}
