//! Client connection plumbing: wire messages and the per-game
//! connection registry.

pub mod messages;
pub mod registry;

pub use messages::{ClientMessage, ServerMessage};
pub use registry::{ChannelError, ConnectionRegistry, MessageChannel, Role};
