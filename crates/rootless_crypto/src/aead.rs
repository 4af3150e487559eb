//! XChaCha20-Poly1305 authenticated encryption.
//!
//! Key: 32 bytes. Nonce: 24 bytes, random, never reused under the same key
//! (the 192-bit nonce space makes birthday collisions negligible at any
//! realistic message volume). Tag: 16 bytes, appended by the cipher.
//!
//! Wire format: `nonce (24 bytes) || ciphertext+tag`.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Encrypt `plaintext` under `key`, prepending a fresh random 24-byte nonce.
/// `aad` is authenticated but not encrypted; pass `&[]` where no binding is
/// specified.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CryptoError::input("AEAD key must be 32 bytes"))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::auth("AEAD encryption failed"))?;

    let mut out = Vec::with_capacity(24 + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt wire-format bytes (`nonce || ciphertext+tag`). Any tampering —
/// of key, nonce, ciphertext, tag, or AAD — surfaces as the same
/// `Authentication` error, at the same call depth, regardless of which
/// byte was flipped (no differentiated error paths that could leak which
/// check failed).
pub fn decrypt(key: &[u8; 32], data: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if data.len() < 24 {
        return Err(CryptoError::auth("ciphertext shorter than nonce"));
    }
    let (nonce_bytes, ct) = data.split_at(24);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CryptoError::auth("AEAD key must be 32 bytes"))?;

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ct, aad })
        .map_err(|_| CryptoError::auth("AEAD decryption failed (tag mismatch)"))?;

    Ok(Zeroizing::new(plaintext))
}

/// Like `decrypt`, but returns `None` on failure instead of an error — for
/// call sites that want to try several keys without constructing an error
/// per attempt.
pub fn try_decrypt(key: &[u8; 32], data: &[u8], aad: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
    decrypt(key, data, aad).ok()
}

/// Encrypt a 32-byte key under another 32-byte wrapping key (key transport
/// for multi-recipient content and the export envelope).
pub fn wrap_key(wrap_key: &[u8; 32], key_to_wrap: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    encrypt(wrap_key, key_to_wrap, b"rootless-key-wrap-v2")
}

pub fn unwrap_key(wrap_key: &[u8; 32], wrapped: &[u8]) -> Result<[u8; 32], CryptoError> {
    let plaintext = decrypt(wrap_key, wrapped, b"rootless-key-wrap-v2")?;
    <[u8; 32]>::try_from(plaintext.as_slice())
        .map_err(|_| CryptoError::input("unwrapped key is not 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [7u8; 32];
        let ct = encrypt(&key, b"hello world", b"").unwrap();
        let pt = decrypt(&key, &ct, b"").unwrap();
        assert_eq!(&pt[..], b"hello world");
    }

    #[test]
    fn aad_must_match() {
        let key = [7u8; 32];
        let ct = encrypt(&key, b"hello", b"context-a").unwrap();
        assert!(decrypt(&key, &ct, b"context-b").is_err());
    }

    #[test]
    fn flipping_any_byte_breaks_decryption() {
        let key = [7u8; 32];
        let mut ct = encrypt(&key, b"hello world", b"").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(decrypt(&key, &ct, b"").is_err());

        let mut wrong_key = key;
        wrong_key[0] ^= 0x01;
        let ct2 = encrypt(&key, b"hello world", b"").unwrap();
        assert!(decrypt(&wrong_key, &ct2, b"").is_err());
    }

    #[test]
    fn try_decrypt_returns_none_on_failure() {
        let key = [7u8; 32];
        let wrong = [8u8; 32];
        let ct = encrypt(&key, b"hi", b"").unwrap();
        assert!(try_decrypt(&wrong, &ct, b"").is_none());
    }

    #[test]
    fn key_wrap_roundtrip() {
        let wrap = [1u8; 32];
        let content_key = [2u8; 32];
        let wrapped = wrap_key(&wrap, &content_key).unwrap();
        let unwrapped = unwrap_key(&wrap, &wrapped).unwrap();
        assert_eq!(unwrapped, content_key);
    }
}
