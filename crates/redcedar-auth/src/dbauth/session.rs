//! dbAuth session cookie encryption.
//!
//! A session cookie value is `base64(ciphertext)|base64(iv)`. The ciphertext
//! is AES-256-CBC with PKCS#7 padding over `"<json>;<csrf token>"`, keyed
//! with the first 32 bytes of the session secret.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::error::DecodeError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// A decrypted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    /// The JSON session payload.
    pub data: String,
    /// The CSRF token bound to the session.
    pub csrf_token: String,
}

/// Encrypts a session payload into a cookie value.
#[must_use]
pub fn encrypt_session(data: &str, csrf_token: &str, key: &[u8; 32]) -> String {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let plaintext = format!("{data};{csrf_token}");
    let ciphertext = Aes256CbcEnc::new(&(*key).into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    format!("{}|{}", STANDARD.encode(ciphertext), STANDARD.encode(iv))
}

/// Decrypts a session cookie value.
pub fn decrypt_session(value: &str, key: &[u8; 32]) -> Result<SessionData, DecodeError> {
    let (ciphertext, iv) = value
        .split_once('|')
        .ok_or_else(|| DecodeError::malformed("missing IV separator"))?;

    let ciphertext = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| DecodeError::malformed("ciphertext is not base64"))?;
    let iv = STANDARD
        .decode(iv.trim())
        .map_err(|_| DecodeError::malformed("IV is not base64"))?;

    let plaintext = Aes256CbcDec::new_from_slices(key, &iv)
        .map_err(|_| DecodeError::malformed("IV must be 16 bytes"))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| DecodeError::Decryption)?;

    let plaintext = String::from_utf8(plaintext).map_err(|_| DecodeError::Decryption)?;

    let (data, csrf_token) = plaintext
        .rsplit_once(';')
        .map_or((plaintext.as_str(), ""), |(data, csrf)| (data, csrf));

    Ok(SessionData {
        data: data.to_string(),
        csrf_token: csrf_token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_then_decrypt() {
        let cookie = encrypt_session(r#"{"id":1;"}"#, "csrf-token", KEY);
        assert!(cookie.contains('|'));

        let session = decrypt_session(&cookie, KEY).unwrap();
        assert_eq!(session.data, r#"{"id":1;"}"#);
        assert_eq!(session.csrf_token, "csrf-token");
    }

    #[test]
    fn test_fresh_iv_per_session() {
        assert_ne!(
            encrypt_session("{}", "t", KEY),
            encrypt_session("{}", "t", KEY)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let cookie = encrypt_session(r#"{"id":1}"#, "csrf", KEY);
        let other = b"fedcba9876543210fedcba9876543210";

        // A wrong key almost always breaks the padding; if it happens to
        // produce valid padding the payload is garbage.
        match decrypt_session(&cookie, other) {
            Err(err) => assert_eq!(err, DecodeError::Decryption),
            Ok(session) => assert_ne!(session.data, r#"{"id":1}"#),
        }
    }

    #[test]
    fn test_malformed_values() {
        assert!(matches!(
            decrypt_session("some-bad-encrypted-cookie", KEY),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decrypt_session("!!!|???", KEY),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            decrypt_session("YWJj|YWJj", KEY),
            Err(DecodeError::Malformed { .. })
        ));
    }
}
