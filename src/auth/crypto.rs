//! Crypto primitives: the deterministic machine-key cipher, password
//! hashing and random secret generation.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256EcbEnc = ecb::Encryptor<Aes256>;
type Aes256EcbDec = ecb::Decryptor<Aes256>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("input cannot be empty")]
    EmptyInput,

    #[error("invalid ciphertext encoding")]
    InvalidEncoding,

    #[error("decryption failed")]
    DecryptionFailed,
}

/// Reversible symmetric cipher for machine-key secrets.
///
/// ECB mode is a deliberate choice: identical plaintext must produce
/// identical ciphertext so that a presented secret can be looked up
/// by a single indexed equality match on the encrypted column. The
/// plaintext domain is machine-generated 32-hex-char secrets (128
/// bits of entropy on a single block boundary), which bounds the
/// pattern-leak risk ECB carries for structured data. Swapping in a
/// randomized mode requires adding a keyed fingerprint column for
/// lookup instead.
#[derive(Clone)]
pub struct DeterministicCipher {
    key: [u8; 32],
}

impl DeterministicCipher {
    /// Derives the AES-256 key from the configured secret with a
    /// fixed KDF (SHA-256).
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EmptyInput);
        }

        let ciphertext = Aes256EcbEnc::new((&self.key).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(BASE64.encode(ciphertext))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        if ciphertext.is_empty() {
            return Err(CryptoError::EmptyInput);
        }

        let raw = BASE64
            .decode(ciphertext)
            .map_err(|_| CryptoError::InvalidEncoding)?;

        let plaintext = Aes256EcbDec::new((&self.key).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&raw)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Constant-time comparison of a presented password against its
/// stored bcrypt hash. A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Random hex string from a cryptographically strong source;
/// `bytes` bytes of entropy produce `2 * bytes` characters.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
