//! # Pod Test Utilities
//!
//! Shared test utilities for the pod service.
//!
//! ## Modules
//!
//! - `fixtures` - Deterministic wallets (Ed25519 keys from fixed seeds) and
//!   controller builders
//! - `recording` - `RecordingBroadcaster`, an in-memory event sink
//! - `harness` - A controller, dispatcher and recorder wired together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pod_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = TestHarness::new();
//!     let alice = TestWallet::new("alice", 1);
//!
//!     let reply = harness.dispatch(&alice.caller(), PodCommand::Create {
//!         content_reference: String::new(),
//!     }).await;
//!
//!     assert!(harness.recorder.envelopes().is_empty());
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod recording;

pub use fixtures::*;
pub use harness::*;
pub use recording::*;
