pub mod document;
pub mod protocol;

pub use document::{JsonMap, Patch, SceneDocument, clamp};
pub use protocol::{ClientMessage, ServerMessage};
