//! Wire envelopes for the duplex scene channel.
//!
//! The message set is closed: `hello`, `command`, and `patch` inbound,
//! `scene` outbound. Anything else decodes to [`ClientMessage::Unknown`]
//! so an unrecognized message never terminates a connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Patch;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello,
    Command { text: String },
    Patch { patch: Patch },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Scene { scene: Value },
}
