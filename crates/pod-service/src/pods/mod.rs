//! Pod domain: records, storage, access predicates and lifecycle operations.
//!
//! ```text
//! PodStore (owned by exactly one shard)
//! ├── SessionRegistry   pod ID -> Pod
//! └── MembershipLedger  pod ID -> members / join requests / co-host requests
//! ```
//!
//! Nothing in this module performs I/O or holds locks; serialization of
//! operations on a pod is the shard actor's job.

pub mod access;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod registry;

pub use access::{is_host, is_member, is_owner, role_of, Role};
pub use ledger::{MembershipLedger, PodMembership, Removal};
pub use lifecycle::{
    AccessChange, Admission, Departure, JoinOutcome, LeaveOutcome, PodStore,
    DEFAULT_MAX_MEMBERS_PER_POD,
};
pub use model::{
    AccessType, Caller, CoHostRequest, JoinRequest, MediaChannel, MediaUpdate, Member, Pod,
    PodSnapshot, PodStats,
};
pub use registry::SessionRegistry;
