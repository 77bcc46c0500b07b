//! Actor model implementation for the pod service.
//!
//! ```text
//! PodController (cloneable handle, one per instance)
//! └── routes by pod ID hash to N PodShardActors
//!     └── PodShardActor (tokio task + bounded mailbox)
//!         └── owns PodStore for its pods
//! ```
//!
//! # Key Design Decisions
//!
//! - **Serialized per pod**: a pod lives on exactly one shard, so its
//!   operations never interleave
//! - **No I/O in shards**: replies carry snapshots; callers broadcast
//! - **CancellationToken propagation**: shards hold child tokens of the controller
//! - **Mailbox monitoring**: depth thresholds (Shard: 100/500, Connection: 50/200)
//!
//! # Modules
//!
//! - [`controller`] - `PodController` routing, ID allocation and limits
//! - [`shard`] - `PodShardActor` and its handle
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod controller;
pub mod messages;
pub mod metrics;
pub mod shard;

pub use controller::{
    ControllerLimits, PodController, PodIdSource, DEFAULT_MAX_PODS, DEFAULT_SHARD_COUNT,
    MAX_ID_ATTEMPTS,
};
pub use messages::{ControllerStatus, ShardMessage, ShardStatus};
pub use metrics::{
    ActorMetrics, ActorType, ControllerMetrics, ControllerMetricsSnapshot, MailboxMonitor,
};
pub use shard::{PodShardActor, PodShardHandle};
