//! HKDF-SHA256 key derivation.
//!
//! Every KDF purpose in the protocol gets its own fixed `info` string here
//! — never overload an existing one for a new purpose; add a new constant
//! instead. These strings are part of the wire contract (spec §6): two
//! implementations that disagree on them cannot interoperate even if every
//! other byte matches.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Fixed `info` constants, one per KDF purpose named by the protocol.
pub mod info {
    pub const X3DH: &[u8] = b"x3dh-v1";
    pub const SESSION: &[u8] = b"rootless-session-v2";
    pub const CHAIN: &[u8] = b"rootless-chain-key-v2";
    pub const MESSAGE: &[u8] = b"rootless-message-key-v2";
    pub const ROOT: &[u8] = b"rootless-root-key-v2";
    pub const ENCRYPTION_KEY: &[u8] = b"rootless-encryption-key-v2";
    pub const SIGNING_KEY: &[u8] = b"rootless-signing-key-v2";
    pub const SEALED_BOX: &[u8] = b"rootless-sealed-box-v2";
    pub const MULTI_RECIPIENT_WRAP: &[u8] = b"rootless-multi-recipient-wrap-v2";
    pub const KEY_WRAP: &[u8] = b"rootless-key-wrap-v2";
}

/// Default salt when none is specified: 32 zero bytes.
pub const ZERO_SALT: [u8; 32] = [0u8; 32];

/// `HKDF(ikm, salt, info, len) -> len` bytes. `salt` defaults to
/// `ZERO_SALT` when `None`.
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let salt = salt.unwrap_or(&ZERO_SALT);
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::protocol(format!("HKDF expand failed: {e}")))
}

/// Derive `len` bytes of key material in one call.
pub fn derive(ikm: &[u8], salt: Option<&[u8]>, info: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut out = vec![0u8; len];
    hkdf_expand(ikm, salt, info, &mut out)?;
    Ok(out)
}

/// Derive a 32-byte key with the given `info`.
pub fn derive_32(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut out = [0u8; 32];
    hkdf_expand(ikm, salt, info, &mut out)?;
    Ok(out)
}

/// `KDF_RK`: derive a new root key and chain key from `root ‖ dh_output`
/// as a single IKM buffer, with the default zero salt — matching the
/// concatenation construction `x3dh_kdf` already uses, not a
/// salt/IKM split.
pub fn kdf_root_key(root: &[u8; 32], dh_output: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let mut ikm = Vec::with_capacity(64);
    ikm.extend_from_slice(root);
    ikm.extend_from_slice(dh_output);
    let new_root = derive_32(&ikm, None, info::ROOT)?;
    let chain = derive_32(&ikm, None, info::CHAIN)?;
    ikm.zeroize();
    Ok((new_root, chain))
}

/// `KDF_CK`: derive a per-message key and the next chain key from a chain
/// key (the symmetric ratchet step).
pub fn kdf_chain(chain: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let message_key = derive_32(chain, None, info::MESSAGE)?;
    let next_chain = derive_32(chain, None, info::CHAIN)?;
    Ok((message_key, next_chain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_info_strings_give_different_output() {
        let ikm = [1u8; 32];
        let a = derive_32(&ikm, None, info::CHAIN).unwrap();
        let b = derive_32(&ikm, None, info::MESSAGE).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn kdf_root_key_outputs_are_distinct() {
        let root = [2u8; 32];
        let dh = [3u8; 32];
        let (new_root, chain) = kdf_root_key(&root, &dh).unwrap();
        assert_ne!(new_root, chain);
    }

    #[test]
    fn kdf_chain_is_deterministic() {
        let chain = [9u8; 32];
        let (mk1, ck1) = kdf_chain(&chain).unwrap();
        let (mk2, ck2) = kdf_chain(&chain).unwrap();
        assert_eq!(mk1, mk2);
        assert_eq!(ck1, ck2);
    }
}
