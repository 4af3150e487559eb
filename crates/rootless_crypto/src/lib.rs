//! Cryptographic core of the RootlessNet protocol: identities, content
//! objects, the X3DH handshake and the Double Ratchet session that rides
//! on top of it.
//!
//! Every module here is self-contained around one concern — key material,
//! canonical encoding, content-addressing, the asymmetric handshake, the
//! per-message ratchet — and composed by `rootless_session` into full
//! conversations. Nothing in this crate talks to a network or a disk;
//! callers own transport and persistence.

pub mod aead;
pub mod canonical;
pub mod cid;
pub mod content;
pub mod ct;
pub mod dh;
pub mod did;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod identity;
pub mod kdf;
pub mod password_kdf;
pub mod random;
pub mod ratchet;
pub mod signing;
pub mod time;
pub mod x3dh;

pub use canonical::to_canonical_bytes;
pub use cid::Cid;
pub use content::{
    create_content, decrypt_content, read_text, verify_content, ContentIssue, ContentObject,
    CreateContentOptions, DidResolver, Payload, PayloadEncryptionKind, PayloadInput,
    RecipientEntry, RecipientKey,
};
pub use did::{Did, KeyKind};
pub use error::CryptoError;
pub use identity::{
    CreateIdentityOptions, DocumentIssue, ExportedIdentity, Identity, IdentityDocument,
    IdentityKind, KeyPurpose, KeySet, PublicKeyEntry,
};
pub use ratchet::{EncryptedMessage, RatchetHeader, RatchetState, DEFAULT_MAX_SKIP};
pub use x3dh::{BundledOneTimePrekey, OneTimePrekey, PrekeyBundle, PrekeySet, SignedPrekey, X3dhResult};
