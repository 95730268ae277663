// =============================================================================
// SHARED/SRC/TYPES/ALGORITHM.RS - Cipher selection
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SimulationError;

/// Cipher family used for a simulation run.
///
/// Symmetric modes share one 32-byte key across the run. The hybrid mode
/// wraps a fresh per-file AES-256-GCM key with the operator's RSA public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[serde(rename = "aes-256-gcm", alias = "aes")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305", alias = "chacha20")]
    ChaCha20Poly1305,
    #[serde(rename = "rsa-hybrid", alias = "rsa")]
    RsaHybrid,
}

impl EncryptionAlgorithm {
    pub const ALL: [EncryptionAlgorithm; 3] = [
        EncryptionAlgorithm::Aes256Gcm,
        EncryptionAlgorithm::ChaCha20Poly1305,
        EncryptionAlgorithm::RsaHybrid,
    ];

    pub fn is_symmetric(&self) -> bool {
        !matches!(self, Self::RsaHybrid)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
            Self::RsaHybrid => "rsa-hybrid",
        }
    }
}

impl Default for EncryptionAlgorithm {
    fn default() -> Self {
        Self::Aes256Gcm
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = SimulationError;

    /// Accepts operator spellings such as `AES 256`, `aes-256-gcm`, `RSA`,
    /// `ChaCha20`. Unknown names are rejected rather than defaulted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.starts_with("aes") {
            Ok(Self::Aes256Gcm)
        } else if normalized.starts_with("rsa") || normalized.starts_with("hybrid") {
            Ok(Self::RsaHybrid)
        } else if normalized.contains("chacha") {
            Ok(Self::ChaCha20Poly1305)
        } else {
            Err(SimulationError::configuration(format!(
                "unknown encryption algorithm '{}', expected aes, chacha20 or rsa",
                s
            )))
        }
    }
}
