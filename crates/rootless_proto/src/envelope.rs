//! Wire envelopes carried between session managers — what a transport
//! actually moves. Direct messages carry the sender's DID in the clear;
//! sealed messages strip it per spec.md's anonymity requirement.

use rootless_crypto::did::Did;
use rootless_crypto::ratchet::EncryptedMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const WIRE_VERSION: u32 = 2;

/// Distinguishes a direct message from any future wire-level message kind.
/// Only `direct` exists here — group messaging is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectMessageType {
    Direct,
}

/// A message exchanged within an established ratchet session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub version: u32,
    pub id: String,
    pub conversation_id: String,
    pub sender: Did,
    #[serde(rename = "type")]
    pub message_type: DirectMessageType,
    pub encrypted: EncryptedMessage,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl DirectMessage {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealedMessageType {
    Sealed,
}

/// A one-shot anonymous message: no session, no sender DID on the wire.
/// The recipient's own encryption key pair is the only thing that opens
/// it; identity of the sender (if any) lives inside the plaintext, not
/// the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMessage {
    pub version: u32,
    #[serde(rename = "type")]
    pub message_type: SealedMessageType,
    #[serde(with = "rootless_crypto::encoding::fixed_bytes")]
    pub ephemeral_public: [u8; 32],
    #[serde(with = "rootless_crypto::encoding::bytes")]
    pub ciphertext: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_message_round_trips_through_json() {
        let identity = rootless_crypto::identity::Identity::create(Default::default()).unwrap();
        let msg = DirectMessage {
            version: WIRE_VERSION,
            id: DirectMessage::new_id(),
            conversation_id: "conv-1".to_string(),
            sender: identity.did.clone(),
            message_type: DirectMessageType::Direct,
            encrypted: EncryptedMessage {
                header: rootless_crypto::ratchet::RatchetHeader { dh_public: [1u8; 32], n: 0, pn: 0 },
                ciphertext: vec![1, 2, 3],
            },
            timestamp: 1_700_000_000_000,
            reply_to: None,
            expires_at: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: DirectMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sender, identity.did);
        assert_eq!(parsed.id, msg.id);
        assert!(!json.contains("replyTo"));
    }

    #[test]
    fn sealed_message_carries_no_sender_field() {
        let sealed = SealedMessage {
            version: WIRE_VERSION,
            message_type: SealedMessageType::Sealed,
            ephemeral_public: [9u8; 32],
            ciphertext: vec![4, 5, 6],
        };
        let json = serde_json::to_value(&sealed).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        assert!(!keys.contains(&"sender"));
        assert!(!keys.contains(&"did"));
    }
}
