//! Wire protocol between clients and the relay.
//!
//! Every message is one kind byte followed by the payload:
//!
//! ```text
//! ┌──────────┬────────────────────────────┐
//! │ kind     │ payload                    │
//! │ 1 byte   │ everything after byte 0    │
//! └──────────┴────────────────────────────┘
//! ```
//!
//! There is no length prefix. The transport (WebSocket binary frames) must
//! deliver exactly one message per frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Full state of the session document, sent by the relay on connect.
    FullState = 0x01,
    /// Incremental update.
    Update = 0x02,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::FullState),
            0x02 => Ok(MessageKind::Update),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// Errors decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty frame")]
    EmptyFrame,

    /// Kind byte this version does not understand. Receivers drop these.
    #[error("Unknown message kind: 0x{0:02x}")]
    UnknownKind(u8),
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn full_state(payload: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::FullState,
            payload,
        }
    }

    pub fn update(payload: Vec<u8>) -> Self {
        Self {
            kind: MessageKind::Update,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(self.kind, &self.payload)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        decode(frame)
    }
}

/// Body of the relay's `POST /session` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
}

/// Prepends the kind byte to `payload`.
pub fn encode(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + payload.len());
    frame.push(kind as u8);
    frame.extend_from_slice(payload);
    frame
}

/// Splits a frame into its kind and payload.
pub fn decode(frame: &[u8]) -> Result<Message, ProtocolError> {
    let (&kind, payload) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
    Ok(Message {
        kind: MessageKind::try_from(kind)?,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_full_state() {
        let data = vec![1, 2, 3, 4, 5];
        let decoded = decode(&encode(MessageKind::FullState, &data)).unwrap();
        assert_eq!(decoded.kind, MessageKind::FullState);
        assert_eq!(decoded.payload, data);
    }

    #[test]
    fn test_round_trip_update() {
        let data = vec![10, 20, 30];
        let decoded = decode(&encode(MessageKind::Update, &data)).unwrap();
        assert_eq!(decoded, Message::update(data));
    }

    #[test]
    fn test_empty_payload() {
        let encoded = encode(MessageKind::FullState, &[]);
        assert_eq!(encoded, vec![0x01]);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.kind, MessageKind::FullState);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_first_byte_is_kind() {
        let encoded = Message::update(vec![99]).encode();
        assert_eq!(encoded, vec![0x02, 99]);
    }

    #[test]
    fn test_session_created_json() {
        let body = serde_json::to_string(&SessionCreated {
            session_id: "abc123".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"sessionId":"abc123"}"#);
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        assert_eq!(decode(&[]), Err(ProtocolError::EmptyFrame));
    }

    #[test]
    fn test_unknown_kind_is_reported() {
        assert_eq!(decode(&[0x7f, 1, 2]), Err(ProtocolError::UnknownKind(0x7f)));
        assert_eq!(
            ProtocolError::UnknownKind(0x7f).to_string(),
            "Unknown message kind: 0x7f"
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip_any_payload(payload in any::<Vec<u8>>()) {
            for kind in [MessageKind::FullState, MessageKind::Update] {
                let frame = encode(kind, &payload);
                prop_assert_eq!(frame.len(), payload.len() + 1);
                prop_assert_eq!(decode(&frame), Ok(Message { kind, payload: payload.clone() }));
            }
        }

        #[test]
        fn prop_unknown_kind_byte_is_rejected(kind in 0x03u8.., payload in any::<Vec<u8>>()) {
            let mut frame = vec![kind];
            frame.extend_from_slice(&payload);
            prop_assert_eq!(decode(&frame), Err(ProtocolError::UnknownKind(kind)));
        }
    }
}
