//! Double Ratchet: DH ratchet step, symmetric chain KDF, skipped-key
//! cache, encrypt/decrypt, serialize/restore (spec §4.6).
//!
//! Kept close to the teacher's `ratchet.rs`, which already implements the
//! full DH-ratchet + symmetric-chain design including skipped-key
//! eviction bounded by a constant. Here the bound is a per-state field
//! (`max_skip`, default 1000) rather than a global constant, so different
//! conversations can carry different limits and the field travels with the
//! rest of the serialized state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::aead;
use crate::ct;
use crate::dh::EncryptionKeyPair;
use crate::error::CryptoError;
use crate::kdf;

/// Default skipped-message-key window (spec §3).
pub const DEFAULT_MAX_SKIP: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatchetHeader {
    #[serde(with = "crate::encoding::fixed_bytes")]
    pub dh_public: [u8; 32],
    pub n: u64,
    pub pn: u64,
}

/// The wire form of a ratchet-encrypted message: a header plus
/// `nonce‖ciphertext‖tag`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessage {
    pub header: RatchetHeader,
    #[serde(with = "crate::encoding::bytes")]
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkippedEntry {
    #[serde(with = "crate::encoding::fixed_bytes")]
    dh_public: [u8; 32],
    n: u64,
    #[serde(with = "crate::encoding::fixed_bytes")]
    message_key: [u8; 32],
}

/// The full, serializable state of one conversation's ratchet. Every
/// private half and message key in here is sensitive — never logged,
/// never echoed, zeroized on drop.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatchetState {
    #[serde(with = "crate::encoding::fixed_bytes")]
    dh_send_public: [u8; 32],
    #[serde(with = "crate::encoding::fixed_bytes")]
    dh_send_private: [u8; 32],
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::encoding::option_fixed_bytes")]
    dh_receive: Option<[u8; 32]>,
    #[serde(with = "crate::encoding::fixed_bytes")]
    root_key: [u8; 32],
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::encoding::option_fixed_bytes")]
    send_chain_key: Option<[u8; 32]>,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::encoding::option_fixed_bytes")]
    receive_chain_key: Option<[u8; 32]>,
    send_n: u64,
    receive_n: u64,
    previous_send_n: u64,
    skipped_keys: VecDeque<SkippedEntry>,
    max_skip: u64,
}

impl Drop for RatchetState {
    fn drop(&mut self) {
        self.dh_send_private.zeroize();
        self.root_key.zeroize();
        if let Some(key) = self.send_chain_key.as_mut() {
            key.zeroize();
        }
        if let Some(key) = self.receive_chain_key.as_mut() {
            key.zeroize();
        }
        for entry in self.skipped_keys.iter_mut() {
            entry.message_key.zeroize();
        }
    }
}

impl RatchetState {
    /// Initialize the sending side of a freshly completed X3DH handshake:
    /// generate a fresh `dhSend`, derive the first send chain against the
    /// peer's signed-prekey public key, and record it as `dhReceive`.
    pub fn init_initiator(
        x3dh_shared_secret: &[u8; 32],
        peer_signed_prekey_public: &[u8; 32],
        max_skip: u64,
    ) -> Result<Self, CryptoError> {
        let dh_send = EncryptionKeyPair::generate()?;
        let dh_out = dh_send.diffie_hellman(peer_signed_prekey_public);
        let (root_key, send_chain_key) = kdf::kdf_root_key(x3dh_shared_secret, dh_out.as_bytes())?;

        Ok(Self {
            dh_send_public: dh_send.public_bytes(),
            dh_send_private: *dh_send.secret_bytes(),
            dh_receive: Some(*peer_signed_prekey_public),
            root_key,
            send_chain_key: Some(send_chain_key),
            receive_chain_key: None,
            send_n: 0,
            receive_n: 0,
            previous_send_n: 0,
            skipped_keys: VecDeque::new(),
            max_skip,
        })
    }

    /// Initialize the receiving side: install the X3DH secret directly as
    /// the root key, with no receive chain yet — the first incoming
    /// message triggers the first DH ratchet step.
    pub fn init_responder(
        x3dh_shared_secret: &[u8; 32],
        our_signed_prekey_public: [u8; 32],
        our_signed_prekey_private: [u8; 32],
        max_skip: u64,
    ) -> Self {
        Self {
            dh_send_public: our_signed_prekey_public,
            dh_send_private: our_signed_prekey_private,
            dh_receive: None,
            root_key: *x3dh_shared_secret,
            send_chain_key: None,
            receive_chain_key: None,
            send_n: 0,
            receive_n: 0,
            previous_send_n: 0,
            skipped_keys: VecDeque::new(),
            max_skip,
        }
    }

    /// Encrypt a plaintext under the current send chain, advancing it.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<EncryptedMessage, CryptoError> {
        let chain = self
            .send_chain_key
            .ok_or_else(|| CryptoError::protocol("ratchet has no send chain yet"))?;
        let (mut message_key, next_chain) = kdf::kdf_chain(&chain)?;

        let header = RatchetHeader {
            dh_public: self.dh_send_public,
            n: self.send_n,
            pn: self.previous_send_n,
        };
        let ciphertext = aead::encrypt(&message_key, plaintext, b"")?;
        message_key.zeroize();

        self.send_chain_key = Some(next_chain);
        self.send_n += 1;

        Ok(EncryptedMessage { header, ciphertext })
    }

    /// Decrypt a message, performing a DH ratchet step and/or skipping
    /// message keys as needed.
    pub fn decrypt(&mut self, message: &EncryptedMessage) -> Result<zeroize::Zeroizing<Vec<u8>>, CryptoError> {
        let header = &message.header;

        if let Some(pos) = self
            .skipped_keys
            .iter()
            .position(|entry| ct::eq(&entry.dh_public, &header.dh_public) && entry.n == header.n)
        {
            let mut entry = self.skipped_keys.remove(pos).expect("pos came from this deque");
            let plaintext = aead::decrypt(&entry.message_key, &message.ciphertext, b"");
            entry.message_key.zeroize();
            return plaintext;
        }

        let dh_changed = match self.dh_receive {
            Some(current) => !ct::eq(&current, &header.dh_public),
            None => true,
        };

        if dh_changed {
            if let Some(current_dh) = self.dh_receive {
                self.skip_message_keys(current_dh, header.pn)?;
            }
            self.dh_ratchet_step(&header.dh_public)?;
        }

        self.skip_message_keys(header.dh_public, header.n)?;

        let chain = self
            .receive_chain_key
            .ok_or_else(|| CryptoError::protocol("ratchet has no receive chain yet"))?;
        let (mut message_key, next_chain) = kdf::kdf_chain(&chain)?;
        self.receive_chain_key = Some(next_chain);
        self.receive_n += 1;

        let plaintext = aead::decrypt(&message_key, &message.ciphertext, b"");
        message_key.zeroize();
        plaintext
    }

    fn dh_ratchet_step(&mut self, their_new_dh_public: &[u8; 32]) -> Result<(), CryptoError> {
        let current_dh_send = EncryptionKeyPair::from_scalar(&self.dh_send_private)?;
        let dh_out = current_dh_send.diffie_hellman(their_new_dh_public);
        let (new_root, receive_chain) = kdf::kdf_root_key(&self.root_key, dh_out.as_bytes())?;

        let fresh_dh_send = EncryptionKeyPair::generate()?;
        let dh_out2 = fresh_dh_send.diffie_hellman(their_new_dh_public);
        let (new_root2, send_chain) = kdf::kdf_root_key(&new_root, dh_out2.as_bytes())?;

        self.dh_send_private.zeroize();
        self.dh_send_public = fresh_dh_send.public_bytes();
        self.dh_send_private = *fresh_dh_send.secret_bytes();

        self.root_key.zeroize();
        self.root_key = new_root2;
        self.receive_chain_key = Some(receive_chain);
        self.send_chain_key = Some(send_chain);
        self.previous_send_n = self.send_n;
        self.send_n = 0;
        self.receive_n = 0;
        self.dh_receive = Some(*their_new_dh_public);
        Ok(())
    }

    /// Derive and stash every message key in the current receive chain
    /// from `receive_n` up to (excluding) `until`, bounded by `max_skip`.
    fn skip_message_keys(&mut self, dh_public: [u8; 32], until: u64) -> Result<(), CryptoError> {
        let Some(mut chain) = self.receive_chain_key else {
            return Ok(());
        };
        if until <= self.receive_n {
            self.receive_chain_key = Some(chain);
            return Ok(());
        }
        if until - self.receive_n > self.max_skip {
            self.receive_chain_key = Some(chain);
            return Err(CryptoError::protocol("too many skipped messages"));
        }

        while self.receive_n < until {
            let (message_key, next_chain) = kdf::kdf_chain(&chain)?;
            chain.zeroize();
            self.push_skipped(dh_public, self.receive_n, message_key);
            chain = next_chain;
            self.receive_n += 1;
        }
        self.receive_chain_key = Some(chain);
        Ok(())
    }

    fn push_skipped(&mut self, dh_public: [u8; 32], n: u64, message_key: [u8; 32]) {
        self.skipped_keys.push_back(SkippedEntry { dh_public, n, message_key });
        while self.skipped_keys.len() as u64 > self.max_skip {
            if let Some(mut evicted) = self.skipped_keys.pop_front() {
                evicted.message_key.zeroize();
            }
        }
    }

    pub fn max_skip(&self) -> u64 {
        self.max_skip
    }

    pub fn skipped_key_count(&self) -> usize {
        self.skipped_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dh::EncryptionKeyPair as Ek;

    fn established_pair() -> (RatchetState, RatchetState) {
        let shared_secret = [42u8; 32];
        let bob_spk = Ek::generate().unwrap();
        let alice = RatchetState::init_initiator(&shared_secret, &bob_spk.public_bytes(), DEFAULT_MAX_SKIP).unwrap();
        let bob = RatchetState::init_responder(
            &shared_secret,
            bob_spk.public_bytes(),
            *bob_spk.secret_bytes(),
            DEFAULT_MAX_SKIP,
        );
        (alice, bob)
    }

    #[test]
    fn full_ratchet_roundtrip() {
        let (mut alice, mut bob) = established_pair();

        let msg = alice.encrypt(b"hello bob").unwrap();
        let plaintext = bob.decrypt(&msg).unwrap();
        assert_eq!(&plaintext[..], b"hello bob");

        let reply = bob.encrypt(b"hi alice").unwrap();
        let plaintext = alice.decrypt(&reply).unwrap();
        assert_eq!(&plaintext[..], b"hi alice");

        let msg2 = alice.encrypt(b"second message").unwrap();
        let plaintext = bob.decrypt(&msg2).unwrap();
        assert_eq!(&plaintext[..], b"second message");
    }

    #[test]
    fn out_of_order_messages_within_window() {
        let (mut alice, mut bob) = established_pair();

        let m0 = alice.encrypt(b"m0").unwrap();
        let m1 = alice.encrypt(b"m1").unwrap();
        let m2 = alice.encrypt(b"m2").unwrap();
        let m3 = alice.encrypt(b"m3").unwrap();

        assert_eq!(&bob.decrypt(&m2).unwrap()[..], b"m2");
        assert_eq!(&bob.decrypt(&m0).unwrap()[..], b"m0");
        assert_eq!(&bob.decrypt(&m3).unwrap()[..], b"m3");
        assert_eq!(&bob.decrypt(&m1).unwrap()[..], b"m1");
    }

    #[test]
    fn replayed_message_key_is_gone_after_decrypt() {
        let (mut alice, mut bob) = established_pair();
        let msg = alice.encrypt(b"once").unwrap();
        bob.decrypt(&msg).unwrap();
        assert!(bob.decrypt(&msg).is_err());
    }

    #[test]
    fn too_many_skipped_messages_is_fatal() {
        let (mut alice, mut bob) = established_pair();
        let _first = alice.encrypt(b"first").unwrap();
        for _ in 0..(DEFAULT_MAX_SKIP + 1) {
            let _ = alice.encrypt(b"filler").unwrap();
        }
        let far_future = alice.encrypt(b"far future").unwrap();
        assert!(bob.decrypt(&far_future).is_err());
    }

    #[test]
    fn dh_ratchet_step_resets_counters() {
        let (mut alice, mut bob) = established_pair();
        let m0 = alice.encrypt(b"a0").unwrap();
        bob.decrypt(&m0).unwrap();

        let reply = bob.encrypt(b"b0").unwrap();
        assert_ne!(reply.header.dh_public, m0.header.dh_public);
        alice.decrypt(&reply).unwrap();

        let m1 = alice.encrypt(b"a1").unwrap();
        assert_eq!(m1.header.n, 0);
        assert_eq!(m1.header.pn, 1);
        bob.decrypt(&m1).unwrap();
    }
}
