//! Signaling: the typed command/event protocol between clients and pods.
//!
//! - [`commands`] - inbound `PodCommand` parsing
//! - [`events`] - outbound `PodEvent` broadcasts and `Reply` messages
//! - [`dispatcher`] - runs commands against the controller, publishes events
//! - [`connection`] - per-connection pod tracking and disconnect cleanup

pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod events;

pub use commands::PodCommand;
pub use connection::ConnectionSession;
pub use dispatcher::SignalingDispatcher;
pub use events::{PodEvent, Reply, ServerMessage};
