//! rootless_store — the persistence *port* spec.md names as an external
//! collaborator: "optional persistence for identities, prekey sets, ratchet
//! states" consumed from the host (spec.md §1/§6).
//!
//! This crate defines that port as a trait (`StateStore`) rather than a
//! concrete database binding. The teacher's `dl_store` wires SQLite + a
//! password-unlocked vault directly into its Tauri commands; that coupling
//! is a desktop-app concern, not a protocol-core one, so it is not carried
//! forward here. What *is* carried forward is the teacher's habit of
//! keeping crypto material at rest only ever as already-encrypted bytes —
//! `InMemoryStateStore` stores exactly what `rootless_crypto` already
//! produced (`ExportedIdentity`, serialized `RatchetState`), never a raw
//! private key the store itself has decrypted.
//!
//! spec.md §9 Q4 calls out that a correct implementation must persist the
//! prekey set across restarts rather than regenerating it per session —
//! `save_prekey_set`/`load_prekey_set` exist so a host can do exactly that.

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::InMemoryStateStore;

use async_trait::async_trait;
use rootless_crypto::did::Did;
use rootless_crypto::identity::ExportedIdentity;
use rootless_crypto::ratchet::RatchetState;
use rootless_crypto::x3dh::PrekeySet;

/// The persistence capability a host plugs into a `rootless_session`
/// conversation manager. Every method is keyed so a host can serve several
/// identities/conversations from one store; implementations that only ever
/// hold one identity may ignore the key.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_identity(&self, exported: &ExportedIdentity) -> Result<(), StoreError>;
    async fn load_identity(&self) -> Result<Option<ExportedIdentity>, StoreError>;

    async fn save_prekey_set(&self, did: &Did, prekeys: &PrekeySet) -> Result<(), StoreError>;
    async fn load_prekey_set(&self, did: &Did) -> Result<Option<PrekeySet>, StoreError>;

    async fn save_ratchet_state(&self, conversation_id: &str, state: &RatchetState) -> Result<(), StoreError>;
    async fn load_ratchet_state(&self, conversation_id: &str) -> Result<Option<RatchetState>, StoreError>;
    async fn delete_ratchet_state(&self, conversation_id: &str) -> Result<(), StoreError>;
    async fn list_conversation_ids(&self) -> Result<Vec<String>, StoreError>;
}
