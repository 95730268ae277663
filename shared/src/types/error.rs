// =============================================================================
// SHARED/SRC/TYPES/ERROR.RS - Error taxonomy
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by every library crate in the workspace.
pub type SimulationResult<T> = Result<T, SimulationError>;

/// Error taxonomy for the simulator and the sentinel.
///
/// Containment violations and missing resources are fatal to the operation
/// that raised them. Per-file I/O and cryptographic failures are recovered by
/// the orchestrator, which counts them and keeps going. Cancellation is not an
/// error and has no variant here.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Safe zone containment violation: {} is outside {}", path.display(), root.display())]
    ContainmentViolation { path: PathBuf, root: PathBuf },

    #[error("Missing resource {}: {message}", path.display())]
    MissingResource { message: String, path: PathBuf },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cryptographic operation failed: {message}")]
    Cryptographic { message: String },

    #[error("Key material error: {message}")]
    KeyMaterial { message: String },

    #[error("Malformed envelope: {message}")]
    MalformedEnvelope { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Canary detector error: {message}")]
    Detector { message: String },

    #[error("Background worker failed: {message}")]
    Worker { message: String },
}

impl SimulationError {
    /// Wrap an I/O error together with the path that produced it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingResource {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_containment_violation(&self) -> bool {
        matches!(self, Self::ContainmentViolation { .. })
    }

    pub fn is_missing_resource(&self) -> bool {
        matches!(self, Self::MissingResource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_message_names_both_paths() {
        let err = SimulationError::ContainmentViolation {
            path: PathBuf::from("/etc/passwd"),
            root: PathBuf::from("/srv/Ransomware_Test"),
        };
        let text = err.to_string();
        assert!(text.contains("/etc/passwd"));
        assert!(text.contains("/srv/Ransomware_Test"));
        assert!(err.is_containment_violation());
        assert!(!err.is_missing_resource());
    }

    #[test]
    fn io_error_keeps_its_source() {
        let err = SimulationError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
