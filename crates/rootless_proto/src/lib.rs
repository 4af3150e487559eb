//! rootless_proto — wire DTOs carrying `rootless_crypto` types over a
//! transport. No cryptographic logic of its own: it serializes and
//! deserializes what the crypto layer already produced and verified.
//!
//! # Modules
//! - `envelope` — `DirectMessage` and `SealedMessage`, the two message
//!   shapes a session manager emits.
//! - `handshake` — the X3DH transcript accompanying a conversation's first
//!   message.
//! - `prekey` — prekey-bundle publication and discovery requests.
//! - `codec` — plain JSON (de)serialization helpers.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod prekey;

pub use codec::{from_wire_bytes, to_wire_bytes};
pub use envelope::{DirectMessage, DirectMessageType, SealedMessage, SealedMessageType, WIRE_VERSION};
pub use error::ProtoError;
pub use handshake::HandshakeInit;
pub use prekey::{
    FetchBundleRequest, FetchBundleResponse, PublishBundleRequest, PublishBundleResponse,
    ReplenishOneTimePrekeysRequest, ReplenishOneTimePrekeysResponse,
};
