//! Prekey-bundle publication and discovery requests/responses — the DTOs
//! a host uses to push a freshly generated bundle to a directory and fetch
//! a peer's before initiating X3DH. Grounded on the teacher's
//! `DeviceEnrollRequest`/`KeyUploadRequest`/`UserKeysResponse` shapes,
//! trimmed to what this protocol's `PrekeyBundle` already carries.

use chrono::{DateTime, Utc};
use rootless_crypto::did::Did;
use rootless_crypto::x3dh::{BundledOneTimePrekey, PrekeyBundle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBundleRequest {
    pub did: Did,
    pub bundle: PrekeyBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBundleResponse {
    pub did: Did,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchBundleRequest {
    pub did: Did,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchBundleResponse {
    pub did: Did,
    pub bundle: Option<PrekeyBundle>,
}

/// Top up a published bundle's one-time prekeys without rotating the
/// signed prekey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplenishOneTimePrekeysRequest {
    pub did: Did,
    pub one_time_prekeys: Vec<BundledOneTimePrekey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplenishOneTimePrekeysResponse {
    pub did: Did,
    pub total_available: usize,
}
