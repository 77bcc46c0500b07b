//! Pod Service Library
//!
//! In-memory session manager for live group audio/video rooms ("pods"):
//!
//! - Pod lifecycle: create, join, leave, teardown when the last member leaves
//! - Roles: owner, hosts and members, with owner succession
//! - Access control: open pods and trusted pods with a join-request queue
//! - Co-host requests and approvals
//! - Per-member media state and host moderation (mute one, mute all)
//! - Real-time event fan-out to pod members over WebSocket
//!
//! # Architecture
//!
//! ```text
//! WebSocket connection (one task per socket)
//! └── ConnectionSession ── SignalingDispatcher ── EventBroadcaster
//!                                │
//!                          PodController
//!                          └── N PodShardActors, each owning a PodStore
//! ```
//!
//! All pod state for one pod lives on exactly one shard, so operations on a
//! pod are serialized while different pods proceed in parallel.
//!
//! # Modules
//!
//! - [`pods`] - Domain model and the pure state machine (`PodStore`)
//! - [`actors`] - Shard actors, routing controller and actor metrics
//! - [`signaling`] - Wire commands, events, dispatch and per-connection state
//! - [`broadcast`] - Event fan-out seam
//! - [`identity`] - Signed-challenge caller verification
//! - [`ws`] - WebSocket transport
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-safe messages
//! - [`observability`] - Prometheus metrics and health endpoints

pub mod actors;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod identity;
pub mod observability;
pub mod pods;
pub mod signaling;
pub mod ws;
