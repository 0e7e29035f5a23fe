//! Login password obfuscation.
//!
//! The stock backend expects `base64(iv || AES-256-CBC(password))` with PKCS#7
//! padding and a fresh 16-byte IV per call. The key ships with every client, so
//! this hides the password from casual inspection only; TLS is what protects it.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::api::ApiError;
use crate::config::{AuthConfig, PasswordCipher};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Transforms the password before it is placed in the signin body.
#[derive(Clone)]
pub enum PasswordEncoder {
    AesCbc { key: [u8; KEY_LEN] },
    Plain,
}

impl std::fmt::Debug for PasswordEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordEncoder::AesCbc { .. } => f.write_str("PasswordEncoder::AesCbc"),
            PasswordEncoder::Plain => f.write_str("PasswordEncoder::Plain"),
        }
    }
}

impl PasswordEncoder {
    /// Builds the encoder selected by `[auth] password_cipher`.
    ///
    /// # Errors
    /// Returns an encryption error if the AES key is not exactly 32 bytes.
    pub fn from_config(auth: &AuthConfig) -> Result<Self, ApiError> {
        match auth.password_cipher {
            PasswordCipher::None => Ok(PasswordEncoder::Plain),
            PasswordCipher::AesCbc => Self::aes_cbc(auth.encryption_key.as_bytes()),
        }
    }

    /// # Errors
    /// Returns an encryption error if `key` is not exactly 32 bytes.
    pub fn aes_cbc(key: &[u8]) -> Result<Self, ApiError> {
        let Ok(key) = <[u8; KEY_LEN]>::try_from(key) else {
            return Err(ApiError::encryption(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                key.len()
            )));
        };
        Ok(PasswordEncoder::AesCbc { key })
    }

    /// Encodes `password` for transmission.
    pub fn encode(&self, password: &str) -> String {
        match self {
            PasswordEncoder::Plain => password.to_string(),
            PasswordEncoder::AesCbc { key } => {
                let iv: [u8; IV_LEN] = rand::random();
                encrypt_with_iv(key, &iv, password)
            }
        }
    }
}

fn encrypt_with_iv(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], password: &str) -> String {
    let ciphertext = Aes256CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(password.as_bytes());

    let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
    combined.extend_from_slice(iv);
    combined.extend_from_slice(&ciphertext);
    STANDARD.encode(combined)
}
