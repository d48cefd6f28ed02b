//! Client protocol and the hub that runs a world for connected sessions.
//!
//! Transport is left to the host: it hands inbound text frames to
//! [`Hub::handle_text`] and gives each session an [`Outbound`] sink for
//! replies. Everything runs on the caller's thread.

mod error;
mod hub;
mod message;
mod session;

pub use error::ProtocolError;
pub use hub::{Hub, HubConfig, TickReport};
pub use message::{
    BlockChange, BlockPos, ChunkMap, ClientMessage, EntityView, GameEvent, PlayerView,
    ServerMessage, SettingsView, WorldUpdates,
};
pub use session::{Disconnected, Outbound, Session};
