//! Deterministic test data.
//!
//! Wallet keys are derived from a one-byte seed, so the same seed always
//! yields the same public key and user ID across test runs.

use common::types::{ConnectionId, UserId};
use pod_service::actors::{ActorMetrics, ControllerLimits, ControllerMetrics, PodController};
use pod_service::identity::{derive_address, Ed25519ChallengeVerifier, SignedChallenge};
use pod_service::pods::Caller;
use ring::signature::{Ed25519KeyPair, KeyPair};

/// Challenge string used by test verifiers.
pub const TEST_CHALLENGE: &str = "pods-test-challenge";

/// A client wallet with a fixed Ed25519 key.
#[derive(Debug, Clone)]
pub struct TestWallet {
    /// Display name sent at connect time.
    pub name: String,
    seed: u8,
}

impl TestWallet {
    #[must_use]
    pub fn new(name: impl Into<String>, seed: u8) -> Self {
        Self {
            name: name.into(),
            seed,
        }
    }

    fn key_pair(&self) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed_unchecked(&[self.seed; 32]).expect("valid Ed25519 seed")
    }

    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key_pair().public_key().as_ref())
    }

    /// Sign an arbitrary challenge.
    #[must_use]
    pub fn sign(&self, challenge: &str) -> SignedChallenge {
        let key_pair = self.key_pair();
        SignedChallenge {
            public_key: hex::encode(key_pair.public_key().as_ref()),
            signature: hex::encode(key_pair.sign(challenge.as_bytes()).as_ref()),
        }
    }

    /// Credentials over [`TEST_CHALLENGE`].
    #[must_use]
    pub fn credentials(&self) -> SignedChallenge {
        self.sign(TEST_CHALLENGE)
    }

    /// The address a verifier derives for this wallet.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        derive_address(self.key_pair().public_key().as_ref())
    }

    /// A caller on a fresh connection.
    #[must_use]
    pub fn caller(&self) -> Caller {
        let mut caller = Caller::new(self.user_id(), ConnectionId::new());
        caller.display_name.clone_from(&self.name);
        caller
    }

    /// Query string for `GET /ws`.
    #[must_use]
    pub fn connect_query(&self) -> String {
        let credentials = self.credentials();
        format!(
            "publicKey={}&signature={}&displayName={}",
            credentials.public_key, credentials.signature, self.name
        )
    }
}

/// Alice, Bob, Carol and Dave with seeds 1 to 4.
#[must_use]
pub fn wallets() -> [TestWallet; 4] {
    [
        TestWallet::new("alice", 1),
        TestWallet::new("bob", 2),
        TestWallet::new("carol", 3),
        TestWallet::new("dave", 4),
    ]
}

/// Verifier for [`TEST_CHALLENGE`].
#[must_use]
pub fn test_verifier() -> Ed25519ChallengeVerifier {
    Ed25519ChallengeVerifier::new(TEST_CHALLENGE)
}

/// Small limits so capacity paths are reachable in tests.
#[must_use]
pub fn small_limits() -> ControllerLimits {
    ControllerLimits {
        shard_count: 2,
        max_pods: 4,
        max_members_per_pod: 3,
    }
}

/// A controller with fresh metrics.
#[must_use]
pub fn test_controller(limits: ControllerLimits) -> PodController {
    PodController::new(
        "pod-test".to_string(),
        limits,
        ActorMetrics::new(),
        ControllerMetrics::new(),
    )
}
