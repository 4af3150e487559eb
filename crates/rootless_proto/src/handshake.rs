//! The X3DH handshake transcript carried alongside (or just before) the
//! first message of a new conversation, so the responder can reconstruct
//! the shared secret the initiator already derived. Grounded on the
//! teacher's `session::InitMessage` — this generalizes its shape to the
//! full X3DH transcript (identity key, ephemeral key, signed- and
//! one-time-prekey ids) that `rootless_crypto::x3dh` actually produces.

use rootless_crypto::did::Did;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInit {
    pub conversation_id: String,
    pub initiator_did: Did,
    #[serde(with = "rootless_crypto::encoding::fixed_bytes")]
    pub initiator_identity_key: [u8; 32],
    #[serde(with = "rootless_crypto::encoding::fixed_bytes")]
    pub initiator_ephemeral_key: [u8; 32],
    pub used_signed_prekey_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_one_time_prekey_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let identity = rootless_crypto::identity::Identity::create(Default::default()).unwrap();
        let init = HandshakeInit {
            conversation_id: "conv-1".to_string(),
            initiator_did: identity.did.clone(),
            initiator_identity_key: [1u8; 32],
            initiator_ephemeral_key: [2u8; 32],
            used_signed_prekey_id: 7,
            used_one_time_prekey_id: Some(3),
        };
        let bytes = crate::codec::to_wire_bytes(&init).unwrap();
        let parsed: HandshakeInit = crate::codec::from_wire_bytes(&bytes).unwrap();
        assert_eq!(parsed.conversation_id, init.conversation_id);
        assert_eq!(parsed.used_one_time_prekey_id, Some(3));
    }
}
