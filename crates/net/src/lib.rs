//! Waypoint Network Library
//!
//! TCP coordination for shared trip-planning rooms.
//!
//! # Architecture
//!
//! - **Server**: Accepts client connections and routes messages into rooms
//! - **Room**: One task per room; serializes membership, canvas, presence,
//!   scheduling, and arbitration for that room
//! - **Client**: Thin connection handle for callers
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! // Start the coordinator
//! let server = Server::start(DEFAULT_PORT, db, RoomConfig::default()).await?;
//!
//! // A client joins a room
//! let mut client = Client::connect(server.addr()).await?;
//! client.join("room-1", "alice").await?;
//!
//! // Process events
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ServerMessage::DrawApplied { event } => { /* handle */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{ClientMessage, RoomSnapshot, ServerMessage};
pub use registry::RoomRegistry;
pub use room::{Room, RoomCommand, RoomConfig, RoomHandle, SharedDb};
pub use server::{Server, DEFAULT_PORT};
