//! Password-derived encryption for macro containers
//!
//! Key derivation is PBKDF2-HMAC-SHA256 over a random per-file salt;
//! the payload is sealed with AES-256-GCM, so a wrong password surfaces
//! as an authentication failure rather than garbage plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::StoreError;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Bytes of header (salt + nonce) preceding the ciphertext.
pub(super) const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt a payload: `salt || nonce || ciphertext`.
pub(super) fn seal(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StoreError::Corrupted)?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `salt || nonce || ciphertext` payload.
pub(super) fn open(password: &str, data: &[u8]) -> Result<Vec<u8>, StoreError> {
    if data.len() < HEADER_LEN {
        return Err(StoreError::Corrupted);
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        // GCM authentication failure is how a wrong password shows up.
        .map_err(|_| StoreError::InvalidPassword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open_round_trip() {
        let sealed = seal("a long password", b"payload bytes").unwrap();
        assert!(sealed.len() > HEADER_LEN);
        let opened = open("a long password", &sealed).unwrap();
        assert_eq!(opened, b"payload bytes");
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let sealed = seal("a long password", b"payload").unwrap();
        assert!(matches!(
            open("another password", &sealed),
            Err(StoreError::InvalidPassword)
        ));
    }

    #[test]
    fn key_derivation_is_stable_per_salt() {
        let salt = [7u8; SALT_LEN];
        assert_eq!(derive_key("pw", &salt), derive_key("pw", &salt));
        assert_ne!(derive_key("pw", &salt), derive_key("pw2", &salt));
        assert_ne!(derive_key("pw", &salt), derive_key("pw", &[8u8; SALT_LEN]));
    }

    #[test]
    fn short_input_is_corrupt() {
        assert!(matches!(
            open("a long password", &[0u8; 5]),
            Err(StoreError::Corrupted)
        ));
    }
}
