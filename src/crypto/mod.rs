// =============================================================================
// MULTI-ALGORITHM ENCRYPTOR - src/crypto/mod.rs
// Key lifecycle, envelope formats and guarded file encryption
// =============================================================================

//! Cryptographic layer of the simulator.
//!
//! - [`keys`]: run key generation, key files, operator key pairs.
//! - [`envelope`]: the fixed on-disk byte layouts, sealing and opening.
//! - [`encryptor`]: guarded, copy-only file encryption with per-file telemetry.
//!
//! All primitives come from vetted crates (`aes-gcm`, `chacha20poly1305`,
//! `rsa`); nothing here implements a cipher.

pub mod encryptor;
pub mod envelope;
pub mod keys;

pub use self::encryptor::{artifact_name, decrypt_file, FileEncryptor};
pub use self::envelope::{open_envelope, seal_envelope, NONCE_LEN, TAG_LEN, WRAPPED_KEY_LEN_PREFIX};
pub use self::keys::{
    generate_key, generate_operator_keypair, load_key, load_private_key, save_key, CipherKey,
    DecryptionKey, OperatorKeyPair, SYMMETRIC_KEY_LEN,
};
