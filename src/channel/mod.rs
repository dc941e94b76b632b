//! Command channel: typed messages replicated from the controlling side
//! to the authoritative side
//!
//! A message carries a verb plus enough context for the authoritative side
//! to reconstruct intent without consulting controller-side state. The
//! transport is a single ordered stream per connection, so messages for a
//! given origin apply in send order; nothing is guaranteed across origins
//! or kinds.

pub mod registry;
pub mod sender;
pub mod transport;

pub use registry::{CommandListener, ListenerId, ListenerRegistry, SharedListener};
pub use sender::{CommandSender, DispatchObserver};
pub use transport::{loopback, DispatchPump, LoopbackTransport, Transport};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::BodyId;

/// Message kind, dispatched to per-kind listener lists.
///
/// New kinds extend this enum; the registry and pump are agnostic to the
/// set of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Move,
    InventoryChange,
    Craft,
}

/// One replicated command. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub kind: MessageKind,
    pub verb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<BodyId>,
    pub value: String,
    #[serde(default)]
    pub aux: AHashMap<String, String>,
}

impl CommandMessage {
    pub fn new(kind: MessageKind, verb: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            verb: verb.into(),
            origin: None,
            value: value.into(),
            aux: AHashMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: BodyId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_aux(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.aux.insert(key.into(), value.into());
        self
    }

    /// Serialize for the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from the wire.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip_preserves_intent() {
        let message = CommandMessage::new(MessageKind::Craft, "craft", "iron_pickaxe")
            .with_origin(BodyId::new("scout-1"))
            .with_aux("fuel", "coal");

        let decoded = CommandMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.aux.get("fuel").map(String::as_str), Some("coal"));
    }

    #[test]
    fn test_malformed_frame_is_a_protocol_error() {
        assert!(CommandMessage::decode(b"not json at all").is_err());
    }
}
