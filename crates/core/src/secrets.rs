//! Credential encryption and layered environment-variable credential lookup.
//!
//! Mirrors the operator workflow described in the external-interfaces
//! section: secrets live in the environment either as plaintext or as an
//! `_ENCRYPTED` variant (base64 ciphertext), with the encrypted form taking
//! precedence whenever both are present. A master password, supplied via
//! `MASTER_PASSWORD`, derives the AES-256-GCM key through PBKDF2-HMAC-SHA256.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

const PBKDF2_ITERATIONS: u32 = 480_000;
const SALT: &[u8] = b"arb_engine_credential_salt_v1";
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("MASTER_PASSWORD is not set")]
    MissingMasterPassword,
    #[error("ciphertext is not valid base64")]
    BadEncoding(#[from] base64::DecodeError),
    #[error("ciphertext is shorter than the nonce")]
    Truncated,
    #[error("decryption failed; check MASTER_PASSWORD")]
    DecryptionFailed,
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
}

/// Derives a 32-byte AES-256-GCM key from the master password via
/// PBKDF2-HMAC-SHA256 with a fixed per-deployment salt.
fn derive_key(master_password: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(master_password.as_bytes(), SALT, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypts and decrypts credential strings using a key derived from a
/// master password, so plaintext secrets never touch the config files.
pub struct SecretsManager {
    cipher: Aes256Gcm,
}

impl SecretsManager {
    /// Builds a manager from an explicit master password, or from the
    /// `MASTER_PASSWORD` environment variable if `master_password` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::MissingMasterPassword`] if no password is
    /// supplied and `MASTER_PASSWORD` is unset.
    pub fn new(master_password: Option<SecretString>) -> Result<Self, SecretsError> {
        let password = match master_password {
            Some(p) => p,
            None => SecretString::new(
                std::env::var("MASTER_PASSWORD").map_err(|_| SecretsError::MissingMasterPassword)?,
            ),
        };
        let key = derive_key(password.expose_secret());
        let cipher = Aes256Gcm::new_from_slice(&key).expect("key is always 32 bytes");
        Ok(Self { cipher })
    }

    /// Encrypts a plaintext secret, returning a base64-encoded `nonce || ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::DecryptionFailed`]-class errors only on decrypt;
    /// encryption with a fresh random nonce does not fail in practice.
    pub fn encrypt_secret(&self, plaintext: &str) -> Result<String, SecretsError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SecretsError::DecryptionFailed)?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    /// Decrypts a payload produced by [`Self::encrypt_secret`].
    ///
    /// # Errors
    ///
    /// Returns an error if the payload isn't valid base64, is too short to
    /// contain a nonce, fails AEAD authentication (wrong password or
    /// corrupted ciphertext), or decodes to non-UTF-8 bytes.
    pub fn decrypt_secret(&self, encoded: &str) -> Result<String, SecretsError> {
        let payload = STANDARD.decode(encoded)?;
        if payload.len() < NONCE_LEN {
            return Err(SecretsError::Truncated);
        }
        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SecretsError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| SecretsError::NotUtf8)
    }

    /// Resolves a credential by checking `{name}_ENCRYPTED` first (decrypting
    /// it with this manager), then falling back to the plaintext `{name}`.
    /// A decrypt failure on the encrypted variant is logged and falls
    /// through to plaintext rather than failing the whole lookup.
    #[must_use]
    pub fn resolve_credential(&self, name: &str) -> Option<SecretString> {
        if let Ok(encrypted) = std::env::var(format!("{name}_ENCRYPTED")) {
            match self.decrypt_secret(&encrypted) {
                Ok(plaintext) => return Some(SecretString::new(plaintext)),
                Err(e) => {
                    tracing::warn!("failed to decrypt {name}_ENCRYPTED: {e}; falling back to plaintext");
                }
            }
        }
        std::env::var(name).ok().map(SecretString::new)
    }
}

/// API credentials for Venue A (Kalshi-style RSA-PSS signing).
pub struct KalshiCredentials {
    pub api_key_id: SecretString,
    pub private_key_pem: SecretString,
}

/// API credentials for Venue B (Polymarket-style EIP-712/CLOB signing).
pub struct PolymarketCredentials {
    pub wallet_private_key: SecretString,
    pub clob_api_key: SecretString,
    pub clob_api_secret: SecretString,
    pub clob_passphrase: SecretString,
}

/// Bot token and chat id for the Telegram alert channel.
pub struct TelegramCredentials {
    pub bot_token: SecretString,
    pub chat_id: SecretString,
}

impl SecretsManager {
    #[must_use]
    pub fn kalshi_credentials(&self) -> Option<KalshiCredentials> {
        Some(KalshiCredentials {
            api_key_id: self.resolve_credential("KALSHI_API_KEY_ID")?,
            private_key_pem: self.resolve_credential("KALSHI_PRIVATE_KEY")?,
        })
    }

    #[must_use]
    pub fn polymarket_credentials(&self) -> Option<PolymarketCredentials> {
        Some(PolymarketCredentials {
            wallet_private_key: self.resolve_credential("POLYMARKET_PRIVATE_KEY")?,
            clob_api_key: self.resolve_credential("POLYMARKET_CLOB_API_KEY")?,
            clob_api_secret: self.resolve_credential("POLYMARKET_CLOB_API_SECRET")?,
            clob_passphrase: self.resolve_credential("POLYMARKET_CLOB_PASSPHRASE")?,
        })
    }

    #[must_use]
    pub fn telegram_credentials(&self) -> Option<TelegramCredentials> {
        Some(TelegramCredentials {
            bot_token: self.resolve_credential("TELEGRAM_BOT_TOKEN")?,
            chat_id: self.resolve_credential("TELEGRAM_CHAT_ID")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SecretsManager {
        SecretsManager::new(Some(SecretString::new("test-master-password".to_string())))
            .expect("static password is always present")
    }

    #[test]
    fn missing_master_password_errors() {
        std::env::remove_var("MASTER_PASSWORD");
        let result = SecretsManager::new(None);
        assert!(matches!(result, Err(SecretsError::MissingMasterPassword)));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let mgr = manager();
        let ciphertext = mgr.encrypt_secret("super-secret-value").unwrap();
        let plaintext = mgr.decrypt_secret(&ciphertext).unwrap();
        assert_eq!(plaintext, "super-secret-value");
    }

    #[test]
    fn wrong_password_fails_to_decrypt() {
        let mgr_a = manager();
        let mgr_b = SecretsManager::new(Some(SecretString::new("different-password".to_string())))
            .unwrap();
        let ciphertext = mgr_a.encrypt_secret("super-secret-value").unwrap();
        let result = mgr_b.decrypt_secret(&ciphertext);
        assert!(matches!(result, Err(SecretsError::DecryptionFailed)));
    }

    #[test]
    fn encryptions_of_the_same_plaintext_differ() {
        let mgr = manager();
        let a = mgr.encrypt_secret("same-value").unwrap();
        let b = mgr.encrypt_secret("same-value").unwrap();
        assert_ne!(a, b, "random nonce must vary each call");
    }

    #[test]
    fn resolve_credential_prefers_encrypted_variant() {
        let mgr = manager();
        let encrypted = mgr.encrypt_secret("from-encrypted").unwrap();

        std::env::set_var("ARB_TEST_SECRET", "from-plaintext");
        std::env::set_var("ARB_TEST_SECRET_ENCRYPTED", &encrypted);

        let resolved = mgr.resolve_credential("ARB_TEST_SECRET").unwrap();
        assert_eq!(resolved.expose_secret(), "from-encrypted");

        std::env::remove_var("ARB_TEST_SECRET");
        std::env::remove_var("ARB_TEST_SECRET_ENCRYPTED");
    }

    #[test]
    fn resolve_credential_falls_back_to_plaintext() {
        let mgr = manager();
        std::env::set_var("ARB_TEST_SECRET_PLAIN_ONLY", "from-plaintext");

        let resolved = mgr.resolve_credential("ARB_TEST_SECRET_PLAIN_ONLY").unwrap();
        assert_eq!(resolved.expose_secret(), "from-plaintext");

        std::env::remove_var("ARB_TEST_SECRET_PLAIN_ONLY");
    }
}
