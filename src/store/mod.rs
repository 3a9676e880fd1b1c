//! Encrypted macro persistence
//!
//! A macro file is an opaque container: magic, random salt, random nonce,
//! then an AES-256-GCM ciphertext of the MessagePack-encoded macro. The
//! key is derived from a user password. Loading tracks failed attempts
//! per path and refuses further tries after the third failure; this is a
//! terminal reject, the file itself is never locked or deleted.

mod crypto;

use crate::data::Macro;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Failed decrypt attempts allowed per file before exhaustion.
pub const MAX_PASSWORD_ATTEMPTS: u8 = 3;

const MAGIC: &[u8; 4] = b"MPM1";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("password must be at least {MIN_PASSWORD_LEN} characters long")]
    PasswordTooShort,

    #[error("invalid password")]
    InvalidPassword,

    #[error("maximum password attempts exceeded")]
    PasswordExhausted,

    #[error("macro file appears to be corrupted")]
    Corrupted,

    #[error("macro file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

fn validate_password(password: &str) -> Result<(), StoreError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::PasswordTooShort);
    }
    Ok(())
}

/// Encrypt a macro into the container format.
pub fn encrypt_macro(password: &str, macro_def: &Macro) -> Result<Vec<u8>, StoreError> {
    validate_password(password)?;
    let plaintext = rmp_serde::to_vec(macro_def).map_err(|_| StoreError::Corrupted)?;
    let sealed = crypto::seal(password, &plaintext)?;
    let mut out = Vec::with_capacity(MAGIC.len() + sealed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a container back into a macro.
pub fn decrypt_macro(password: &str, data: &[u8]) -> Result<Macro, StoreError> {
    validate_password(password)?;
    if data.len() < MAGIC.len() + crypto::HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(StoreError::Corrupted);
    }
    let plaintext = crypto::open(password, &data[MAGIC.len()..])?;
    rmp_serde::from_slice(&plaintext).map_err(|_| StoreError::Corrupted)
}

/// Macro file store with per-path password-attempt accounting.
pub struct MacroStore {
    attempts: HashMap<PathBuf, u8>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self {
            attempts: HashMap::new(),
        }
    }

    pub fn save(&self, path: &Path, password: &str, macro_def: &Macro) -> Result<(), StoreError> {
        let data = encrypt_macro(password, macro_def)?;
        std::fs::write(path, data)?;
        info!("macro {:?} saved to {:?}", macro_def.name, path);
        Ok(())
    }

    /// Load and decrypt a macro file.
    ///
    /// Fails with [`StoreError::PasswordExhausted`] once three attempts
    /// against this path have failed; a successful load resets the count.
    pub fn load(&mut self, path: &Path, password: &str) -> Result<Macro, StoreError> {
        let attempts = self.attempts.get(path).copied().unwrap_or(0);
        if attempts >= MAX_PASSWORD_ATTEMPTS {
            warn!("password attempts exhausted for {:?}", path);
            return Err(StoreError::PasswordExhausted);
        }

        let data = std::fs::read(path)?;
        match decrypt_macro(password, &data) {
            Ok(macro_def) => {
                self.attempts.remove(path);
                info!("macro {:?} loaded from {:?}", macro_def.name, path);
                Ok(macro_def)
            }
            Err(e) => {
                // Short passwords never reached the cipher; only real
                // decrypt failures burn an attempt.
                if matches!(e, StoreError::InvalidPassword | StoreError::Corrupted) {
                    self.attempts.insert(path.to_path_buf(), attempts + 1);
                    warn!(
                        "failed decrypt attempt {} of {} for {:?}",
                        attempts + 1,
                        MAX_PASSWORD_ATTEMPTS,
                        path
                    );
                }
                Err(e)
            }
        }
    }
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ActionBlock, MacroBlock, MouseButton};
    use uuid::Uuid;

    fn sample_macro() -> Macro {
        Macro::new(
            "login-sequence",
            vec![MacroBlock::Action {
                action: ActionBlock::MouseClick {
                    button: MouseButton::Left,
                    x: 100.0,
                    y: 200.0,
                },
                delay_ms: 0,
            }],
        )
    }

    fn temp_path() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("macropilot-store-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("macro.mpm")
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path();
        let mut store = MacroStore::new();
        let original = sample_macro();

        store.save(&path, "correct horse", &original).unwrap();
        let loaded = store.load(&path, "correct horse").unwrap();
        assert_eq!(loaded, original);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn wrong_password_is_rejected() {
        let path = temp_path();
        let mut store = MacroStore::new();
        store.save(&path, "password-one", &sample_macro()).unwrap();

        assert!(matches!(
            store.load(&path, "password-two"),
            Err(StoreError::InvalidPassword)
        ));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn third_failure_exhausts_attempts() {
        let path = temp_path();
        let mut store = MacroStore::new();
        store.save(&path, "password-one", &sample_macro()).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                store.load(&path, "wrong-password"),
                Err(StoreError::InvalidPassword)
            ));
        }

        // Even the correct password is refused once exhausted.
        assert!(matches!(
            store.load(&path, "password-one"),
            Err(StoreError::PasswordExhausted)
        ));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn successful_load_resets_the_counter() {
        let path = temp_path();
        let mut store = MacroStore::new();
        store.save(&path, "password-one", &sample_macro()).unwrap();

        for _ in 0..2 {
            let _ = store.load(&path, "wrong-password");
        }
        store.load(&path, "password-one").unwrap();

        // Two more failures are again allowed before exhaustion.
        for _ in 0..2 {
            assert!(matches!(
                store.load(&path, "wrong-password"),
                Err(StoreError::InvalidPassword)
            ));
        }

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn short_passwords_are_rejected_without_burning_attempts() {
        let path = temp_path();
        let mut store = MacroStore::new();
        store.save(&path, "password-one", &sample_macro()).unwrap();

        for _ in 0..5 {
            assert!(matches!(
                store.load(&path, "short"),
                Err(StoreError::PasswordTooShort)
            ));
        }
        // Attempts were not consumed.
        store.load(&path, "password-one").unwrap();

        assert!(matches!(
            encrypt_macro("short", &sample_macro()),
            Err(StoreError::PasswordTooShort)
        ));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn truncated_or_foreign_files_are_corrupted() {
        assert!(matches!(
            decrypt_macro("password-one", b"tiny"),
            Err(StoreError::Corrupted)
        ));

        let mut data = encrypt_macro("password-one", &sample_macro()).unwrap();
        data[0] = b'X';
        assert!(matches!(
            decrypt_macro("password-one", &data),
            Err(StoreError::Corrupted)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let mut data = encrypt_macro("password-one", &sample_macro()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        assert!(matches!(
            decrypt_macro("password-one", &data),
            Err(StoreError::InvalidPassword)
        ));
    }

    #[test]
    fn each_encryption_uses_fresh_randomness() {
        let a = encrypt_macro("password-one", &sample_macro()).unwrap();
        let b = encrypt_macro("password-one", &sample_macro()).unwrap();
        // Same plaintext, different salt and nonce.
        assert_ne!(a, b);
    }
}
