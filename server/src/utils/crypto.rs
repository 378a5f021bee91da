//! Cryptographic utility functions

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Encrypted-value envelope prefix; bump the version when the format changes
const ENVELOPE_PREFIX: &str = "enc:v1";

/// Generate a cryptographically secure random key
pub fn generate_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Generate a random URL-safe secret of `byte_len` random bytes
pub fn generate_secret(byte_len: usize) -> String {
    URL_SAFE_NO_PAD.encode(generate_key(byte_len))
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Calculate SHA256 hash and return as hex string
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sign a payload body: base64(HMAC-SHA256(body, secret)).
///
/// This matches the signature WooCommerce puts in `X-WC-Webhook-Signature`.
pub fn sign_webhook_payload(body: &[u8], secret: &str) -> String {
    // `KeyInit` is in scope for the cipher below and also offers
    // `new_from_slice`, so name the `Mac` impl explicitly
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Verify a webhook delivery signature in constant time
pub fn verify_webhook_signature(body: &[u8], secret: &str, signature: &str) -> bool {
    constant_time_eq(&sign_webhook_payload(body, secret), signature)
}

/// Symmetric cipher for credentials at rest (ChaCha20-Poly1305).
///
/// Values are stored as `enc:v1:<nonce-b64>:<ciphertext-b64>` so the
/// format can evolve without a data migration.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Build from a base64-encoded 32-byte key
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let key = STANDARD
            .decode(key_b64.trim())
            .map_err(|_| anyhow::anyhow!("Encryption key is not valid base64"))?;
        if key.len() != 32 {
            bail!("Encryption key must be 32 bytes, got {}", key.len());
        }
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| anyhow::anyhow!("Invalid encryption key"))?;
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext value into the envelope format
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("Encryption failed"))?;

        Ok(format!(
            "{}:{}:{}",
            ENVELOPE_PREFIX,
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Decrypt an envelope back into plaintext.
    ///
    /// Fails on unknown envelope versions and on tampered ciphertext;
    /// never falls back to returning the stored value as-is.
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        let rest = envelope
            .strip_prefix(ENVELOPE_PREFIX)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| anyhow::anyhow!("Unrecognized encrypted value format"))?;

        let (nonce_b64, ct_b64) = rest
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Malformed encrypted value"))?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|_| anyhow::anyhow!("Malformed nonce"))?;
        if nonce_bytes.len() != 12 {
            bail!("Malformed nonce");
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ct_b64)
            .map_err(|_| anyhow::anyhow!("Malformed ciphertext"))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| anyhow::anyhow!("Decryption failed"))?;

        String::from_utf8(plaintext).map_err(|_| anyhow::anyhow!("Decrypted value is not UTF-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> CredentialCipher {
        let key = STANDARD.encode([7u8; 32]);
        CredentialCipher::from_base64_key(&key).unwrap()
    }

    #[test]
    fn test_generate_key_length() {
        assert_eq!(generate_key(16).len(), 16);
        assert_eq!(generate_key(32).len(), 32);
    }

    #[test]
    fn test_generate_secret_uniqueness() {
        let s1 = generate_secret(32);
        let s2 = generate_secret(32);
        assert_ne!(s1, s2);
        // 32 bytes -> 43 chars of unpadded base64
        assert_eq!(s1.len(), 43);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(!constant_time_eq("", "x"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_webhook_signature_roundtrip() {
        let body = br#"{"id":123,"name":"Widget"}"#;
        let sig = sign_webhook_payload(body, "secret123");
        assert!(verify_webhook_signature(body, "secret123", &sig));
        assert!(!verify_webhook_signature(body, "other-secret", &sig));
        assert!(!verify_webhook_signature(b"tampered", "secret123", &sig));
    }

    #[test]
    fn test_webhook_signature_known_value() {
        // HMAC-SHA256("", "") = b613679a0814d9ec772f95d778c35fc5ff1697c493715653c6c712144292c5ad
        let sig = sign_webhook_payload(b"", "");
        assert_eq!(sig, "thNnmggU2ex3L5XXeMNfxf8Wl8STcVZTxscSFEKSxa0=");
    }

    #[test]
    fn test_cipher_roundtrip() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("ck_live_abc123").unwrap();
        assert!(envelope.starts_with("enc:v1:"));
        assert_eq!(cipher.decrypt(&envelope).unwrap(), "ck_live_abc123");
    }

    #[test]
    fn test_cipher_unique_nonces() {
        let cipher = test_cipher();
        let e1 = cipher.encrypt("same").unwrap();
        let e2 = cipher.encrypt("same").unwrap();
        assert_ne!(e1, e2);
    }

    #[test]
    fn test_cipher_rejects_plaintext() {
        let cipher = test_cipher();
        assert!(cipher.decrypt("ck_live_abc123").is_err());
        assert!(cipher.decrypt("enc:v2:xx:yy").is_err());
        assert!(cipher.decrypt("enc:v1:notbase64!!:zz").is_err());
    }

    #[test]
    fn test_cipher_rejects_tampering() {
        let cipher = test_cipher();
        let envelope = cipher.encrypt("secret").unwrap();
        // Flip a character in the middle of the ciphertext segment; the
        // final base64 char carries unused trailing bits and may decode
        // to the same bytes.
        let (head, ct) = envelope.rsplit_once(':').unwrap();
        let mid = ct.len() / 2;
        let mut ct_bytes = ct.as_bytes().to_vec();
        ct_bytes[mid] = if ct_bytes[mid] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{}:{}", head, String::from_utf8(ct_bytes).unwrap());
        assert!(cipher.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_cipher_key_validation() {
        assert!(CredentialCipher::from_base64_key("not base64 at all !!").is_err());
        let short = STANDARD.encode([1u8; 16]);
        assert!(CredentialCipher::from_base64_key(&short).is_err());
    }
}
