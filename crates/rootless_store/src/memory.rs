//! In-memory reference implementation of `StateStore`, for tests and
//! simple embedders that don't need a database. Grounded on the teacher's
//! `dl_store::db::Store` shape (cheap to clone, `Arc` internally) minus
//! the SQLite/migration machinery spec.md scopes out of the core.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rootless_crypto::did::Did;
use rootless_crypto::identity::ExportedIdentity;
use rootless_crypto::ratchet::RatchetState;
use rootless_crypto::x3dh::PrekeySet;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::StateStore;

#[derive(Default)]
struct Inner {
    identity: Option<ExportedIdentity>,
    prekey_sets: HashMap<String, PrekeySet>,
    ratchet_states: HashMap<String, Vec<u8>>,
}

/// A `StateStore` backed by plain in-process maps. Cheap to clone — the
/// backing state lives behind an `Arc`, so every clone shares it.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save_identity(&self, exported: &ExportedIdentity) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.identity = Some(exported.clone());
        Ok(())
    }

    async fn load_identity(&self) -> Result<Option<ExportedIdentity>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.identity.clone())
    }

    async fn save_prekey_set(&self, did: &Did, prekeys: &PrekeySet) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.prekey_sets.insert(did.as_str().to_string(), prekeys.clone());
        Ok(())
    }

    async fn load_prekey_set(&self, did: &Did) -> Result<Option<PrekeySet>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.prekey_sets.get(did.as_str()).cloned())
    }

    async fn save_ratchet_state(&self, conversation_id: &str, state: &RatchetState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;
        let mut inner = self.inner.write().await;
        inner.ratchet_states.insert(conversation_id.to_string(), bytes);
        Ok(())
    }

    async fn load_ratchet_state(&self, conversation_id: &str) -> Result<Option<RatchetState>, StoreError> {
        let inner = self.inner.read().await;
        match inner.ratchet_states.get(conversation_id) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_ratchet_state(&self, conversation_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.ratchet_states.remove(conversation_id);
        Ok(())
    }

    async fn list_conversation_ids(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.ratchet_states.keys().cloned().collect())
    }
}
