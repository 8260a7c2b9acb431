//! AEAD payload encryption. Each variant requires a 32-byte key and binds
//! its key ID as associated data, so a cipher built with one key ID can
//! never decrypt a payload sealed under another — even given identical key
//! bytes. This AAD binding is the one place this module deliberately
//! diverges from the adapter it's grounded on: that adapter seals with an
//! empty AAD, which would let two differently-identified keys of the same
//! bytes silently decrypt each other's traffic.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use ring::rand::{SecureRandom, SystemRandom};

use tailpost_domain::value_objects::KeyMaterial;
use tailpost_domain::TailPostError;

const NONCE_LEN: usize = 12;

/// A configured AEAD cipher, bound to one key and one key ID.
pub enum PayloadCipher {
    Aes256Gcm { cipher: Aes256Gcm, key_id: String },
    ChaCha20Poly1305 { cipher: ChaCha20Poly1305, key_id: String },
}

impl PayloadCipher {
    pub fn aes256gcm(key: &KeyMaterial) -> Result<Self, TailPostError> {
        let cipher = Aes256Gcm::new_from_slice(key.key_bytes())
            .map_err(|e| TailPostError::crypto(format!("invalid AES-256-GCM key: {e}")))?;
        Ok(Self::Aes256Gcm {
            cipher,
            key_id: key.key_id().to_string(),
        })
    }

    pub fn chacha20poly1305(key: &KeyMaterial) -> Result<Self, TailPostError> {
        let cipher = ChaCha20Poly1305::new_from_slice(key.key_bytes())
            .map_err(|e| TailPostError::crypto(format!("invalid ChaCha20-Poly1305 key: {e}")))?;
        Ok(Self::ChaCha20Poly1305 {
            cipher,
            key_id: key.key_id().to_string(),
        })
    }

    pub fn key_id(&self) -> &str {
        match self {
            PayloadCipher::Aes256Gcm { key_id, .. } => key_id,
            PayloadCipher::ChaCha20Poly1305 { key_id, .. } => key_id,
        }
    }

    /// Returns `nonce ∥ sealed`, where `sealed` was produced with the key ID
    /// bound as associated data.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TailPostError> {
        let nonce_bytes = random_nonce()?;
        let key_id = self.key_id().as_bytes();

        let sealed = match self {
            PayloadCipher::Aes256Gcm { cipher, .. } => {
                let nonce = AesNonce::from_slice(&nonce_bytes);
                let payload = aes_gcm::aead::Payload {
                    msg: plaintext,
                    aad: key_id,
                };
                cipher
                    .encrypt(nonce, payload)
                    .map_err(|e| TailPostError::crypto(format!("AES-256-GCM seal failed: {e}")))?
            }
            PayloadCipher::ChaCha20Poly1305 { cipher, .. } => {
                let nonce = ChaChaNonce::from_slice(&nonce_bytes);
                let payload = chacha20poly1305::aead::Payload {
                    msg: plaintext,
                    aad: key_id,
                };
                cipher
                    .encrypt(nonce, payload)
                    .map_err(|e| TailPostError::crypto(format!("ChaCha20-Poly1305 seal failed: {e}")))?
            }
        };

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Splits off the leading nonce and opens the remainder, authenticating
    /// the key ID as associated data. Fails if the ciphertext was sealed
    /// under a different key or a different key ID.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, TailPostError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(TailPostError::crypto("ciphertext shorter than nonce"));
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let key_id = self.key_id().as_bytes();

        match self {
            PayloadCipher::Aes256Gcm { cipher, .. } => {
                let nonce = AesNonce::from_slice(nonce_bytes);
                let payload = aes_gcm::aead::Payload { msg: sealed, aad: key_id };
                cipher
                    .decrypt(nonce, payload)
                    .map_err(|e| TailPostError::crypto(format!("AES-256-GCM open failed: {e}")))
            }
            PayloadCipher::ChaCha20Poly1305 { cipher, .. } => {
                let nonce = ChaChaNonce::from_slice(nonce_bytes);
                let payload = chacha20poly1305::aead::Payload { msg: sealed, aad: key_id };
                cipher
                    .decrypt(nonce, payload)
                    .map_err(|e| TailPostError::crypto(format!("ChaCha20-Poly1305 open failed: {e}")))
            }
        }
    }
}

fn random_nonce() -> Result<[u8; NONCE_LEN], TailPostError> {
    let rng = SystemRandom::new();
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|_| TailPostError::crypto("failed to generate random nonce"))?;
    Ok(nonce)
}

/// Loads key bytes from exactly one of a file path or a hex-encoded
/// environment variable, and derives a `key-<unix_seconds>` id when none is
/// configured explicitly.
pub fn load_key_material(
    key_file: Option<&str>,
    key_env: Option<&str>,
    key_id: Option<&str>,
    now_unix_seconds: u64,
) -> Result<KeyMaterial, TailPostError> {
    let key_bytes = match (key_file, key_env) {
        (Some(path), None) => {
            let raw = std::fs::read(path).map_err(|e| TailPostError::crypto(format!("cannot read key_file {path}: {e}")))?;
            to_32_bytes(&raw)?
        }
        (None, Some(var)) => {
            let hex_value = std::env::var(var).map_err(|e| TailPostError::crypto(format!("cannot read key_env {var}: {e}")))?;
            let raw = hex::decode(hex_value.trim()).map_err(|e| TailPostError::crypto(format!("invalid hex in {var}: {e}")))?;
            to_32_bytes(&raw)?
        }
        (Some(_), Some(_)) => {
            return Err(TailPostError::crypto(
                "exactly one of key_file or key_env must be configured, not both",
            ))
        }
        (None, None) => return Err(TailPostError::crypto("one of key_file or key_env must be configured")),
    };

    let id = key_id
        .map(|s| s.to_string())
        .unwrap_or_else(|| KeyMaterial::generated_id(now_unix_seconds));
    Ok(KeyMaterial::new(key_bytes, id))
}

fn to_32_bytes(raw: &[u8]) -> Result<[u8; 32], TailPostError> {
    raw.try_into()
        .map_err(|_| TailPostError::crypto(format!("key material must be exactly 32 bytes, got {}", raw.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> KeyMaterial {
        KeyMaterial::new([7u8; 32], id)
    }

    #[test]
    fn aes_round_trips() {
        let cipher = PayloadCipher::aes256gcm(&key("k1")).unwrap();
        let plaintext = br#"["hello","world"]"#;
        let ciphertext = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn chacha_round_trips() {
        let cipher = PayloadCipher::chacha20poly1305(&key("k1")).unwrap();
        let plaintext = b"secret";
        let ciphertext = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn different_key_ids_cannot_cross_decrypt_same_key_bytes() {
        let cipher_a = PayloadCipher::aes256gcm(&key("k1")).unwrap();
        let cipher_b = PayloadCipher::aes256gcm(&key("k2")).unwrap();
        let ciphertext = cipher_a.encrypt(b"secret").unwrap();
        assert!(cipher_b.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn ciphertext_includes_nonce_and_tag_overhead() {
        let cipher = PayloadCipher::aes256gcm(&key("k7")).unwrap();
        let plaintext = b"secret";
        let ciphertext = cipher.encrypt(plaintext).unwrap();
        assert!(ciphertext.len() >= NONCE_LEN + plaintext.len() + 16);
    }
}
