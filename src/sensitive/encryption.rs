// src/sensitive/encryption.rs

//! Ephemeral encryption of sensitive values
//!
//! Generated bootstrap files sit on disk for the lifetime of a script, so
//! secrets are never written to them in plaintext. One random AES-256 key is
//! generated per agent run; every value is encrypted independently in CBC
//! mode with its own random IV. Only the ciphertext and IV are embedded in
//! the file. The key reaches the child solely as a command-line argument,
//! so a copied temp file is useless on its own.
//!
//! The same primitive decrypts password-protected sensitive variables files,
//! with the key derived as SHA-256 of the password.

use crate::error::{Error, Result};
use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// CBC IV length in bytes
pub const IV_LEN: usize = 16;

/// Marker preceding the IV in encrypted files
const FILE_IV_PREFIX: &[u8] = b"IV__";

/// A value encrypted under the run key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    /// Raw ciphertext (PKCS#7 padded)
    pub ciphertext: Vec<u8>,
    /// IV used for this value only
    pub iv: [u8; IV_LEN],
}

impl EncryptedValue {
    /// Ciphertext as standard base64, for embedding in scripts
    pub fn ciphertext_base64(&self) -> String {
        BASE64.encode(&self.ciphertext)
    }

    /// IV as uppercase hex, the form `openssl enc -iv` accepts
    pub fn iv_hex(&self) -> String {
        hex::encode_upper(self.iv)
    }
}

/// Symmetric encryptor holding the per-run key
pub struct VariableEncryptor {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for VariableEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableEncryptor").finish_non_exhaustive()
    }
}

impl VariableEncryptor {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Use an existing key
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Derive the key from a password (SHA-256)
    pub fn from_password(password: &str) -> Self {
        let digest = Sha256::digest(password.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Parse a hex key as passed on an interpreter command line
    pub fn from_key_hex(key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(key_hex).map_err(|e| Error::Crypto(format!("invalid key hex: {}", e)))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Crypto(format!("key must be {} bytes", KEY_LEN)))?;
        Ok(Self { key })
    }

    /// Key as uppercase hex, passed to child processes as an argument
    pub fn key_hex(&self) -> String {
        hex::encode_upper(self.key)
    }

    /// Encrypt a value with a fresh random IV
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedValue> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self.encrypt_with_iv(plaintext.as_bytes(), &iv)?;
        Ok(EncryptedValue { ciphertext, iv })
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt)
    pub fn decrypt(&self, value: &EncryptedValue) -> Result<String> {
        let plain = self.decrypt_with_iv(&value.ciphertext, &value.iv)?;
        String::from_utf8(plain).map_err(|e| Error::Crypto(format!("decrypted value is not UTF-8: {}", e)))
    }

    /// Encrypt file contents as `IV__` + IV + ciphertext
    pub fn encrypt_file_contents(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = self.encrypt_with_iv(plaintext, &iv)?;

        let mut out = Vec::with_capacity(FILE_IV_PREFIX.len() + IV_LEN + ciphertext.len());
        out.extend_from_slice(FILE_IV_PREFIX);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt file contents written by [`encrypt_file_contents`](Self::encrypt_file_contents)
    pub fn decrypt_file_contents(&self, contents: &[u8]) -> Result<Vec<u8>> {
        let rest = contents
            .strip_prefix(FILE_IV_PREFIX)
            .ok_or_else(|| Error::Crypto("encrypted file is missing its IV header".to_string()))?;
        if rest.len() < IV_LEN {
            return Err(Error::Crypto("encrypted file is truncated".to_string()));
        }
        let (iv, ciphertext) = rest.split_at(IV_LEN);
        self.decrypt_with_iv(ciphertext, iv)
    }

    fn encrypt_with_iv(&self, plaintext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, iv)
            .map_err(|e| Error::Crypto(format!("cipher init failed: {}", e)))?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt_with_iv(&self, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| Error::Crypto(format!("cipher init failed: {}", e)))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Crypto("decryption failed: wrong key or corrupt data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let encryptor = VariableEncryptor::generate();
        let encrypted = encryptor.encrypt("p@ssw0rd ünïcode").unwrap();
        assert_ne!(encrypted.ciphertext, "p@ssw0rd ünïcode".as_bytes());
        assert_eq!(encryptor.decrypt(&encrypted).unwrap(), "p@ssw0rd ünïcode");
    }

    #[test]
    fn test_fresh_iv_per_value() {
        let encryptor = VariableEncryptor::generate();
        let a = encryptor.encrypt("same").unwrap();
        let b = encryptor.encrypt("same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_cannot_decrypt() {
        let encrypted = VariableEncryptor::generate().encrypt("top secret value").unwrap();
        let other = VariableEncryptor::generate();
        match other.decrypt(&encrypted) {
            Ok(plain) => assert_ne!(plain, "top secret value"),
            Err(e) => assert!(matches!(e, Error::Crypto(_))),
        }
    }

    #[test]
    fn test_key_hex_round_trip() {
        let encryptor = VariableEncryptor::generate();
        let hex_key = encryptor.key_hex();
        assert_eq!(hex_key.len(), KEY_LEN * 2);

        let restored = VariableEncryptor::from_key_hex(&hex_key).unwrap();
        let encrypted = encryptor.encrypt("value").unwrap();
        assert_eq!(restored.decrypt(&encrypted).unwrap(), "value");
        assert!(VariableEncryptor::from_key_hex("abcd").is_err());
    }

    #[test]
    fn test_password_file_contents() {
        let encryptor = VariableEncryptor::from_password("correct horse");
        let sealed = encryptor.encrypt_file_contents(br#"{"Password":"x"}"#).unwrap();
        assert!(sealed.starts_with(b"IV__"));

        let opened = VariableEncryptor::from_password("correct horse")
            .decrypt_file_contents(&sealed)
            .unwrap();
        assert_eq!(opened, br#"{"Password":"x"}"#);

        assert!(encryptor.decrypt_file_contents(b"no header").is_err());
    }

    #[test]
    fn test_encoded_forms() {
        let value = EncryptedValue {
            ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
            iv: [0xab; IV_LEN],
        };
        assert_eq!(value.ciphertext_base64(), "3q2+7w==");
        assert_eq!(value.iv_hex(), "AB".repeat(IV_LEN));
    }
}
