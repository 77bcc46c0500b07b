//! Caller identity verification.
//!
//! Clients prove control of a wallet key by signing a server-configured
//! challenge with Ed25519. The verified public key maps to a wallet-style
//! address (`0x` + last 20 bytes of SHA-256 of the key, hex), which becomes
//! the caller's [`UserId`].
//!
//! Verification happens once, at connection time, before any pod operation
//! can run.

use common::types::UserId;
use ring::digest::{digest, SHA256};
use ring::signature::{UnparsedPublicKey, ED25519};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Bytes of the key digest used for the address.
const ADDRESS_LEN: usize = 20;

/// Identity verification failures.
///
/// Messages are safe to log; they never include key or signature bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Missing public key or signature")]
    MissingCredentials,

    #[error("Public key is not {PUBLIC_KEY_LEN} hex-encoded bytes")]
    MalformedPublicKey,

    #[error("Signature is not {SIGNATURE_LEN} hex-encoded bytes")]
    MalformedSignature,

    #[error("Signature does not verify")]
    InvalidSignature,
}

/// Credentials presented by a connecting client (hex-encoded).
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedChallenge {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub signature: String,
}

impl fmt::Debug for SignedChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedChallenge")
            .field("public_key", &self.public_key)
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

/// Resolves presented credentials to a verified identity.
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the credentials are missing, malformed,
    /// or do not verify.
    fn verify(&self, credentials: &SignedChallenge) -> Result<UserId, IdentityError>;
}

/// Derive the wallet-style address for an Ed25519 public key.
#[must_use]
pub fn derive_address(public_key: &[u8]) -> UserId {
    let hash = digest(&SHA256, public_key);
    let bytes = hash.as_ref();
    let tail = bytes
        .get(bytes.len().saturating_sub(ADDRESS_LEN)..)
        .unwrap_or(bytes);
    UserId::new(format!("0x{}", hex::encode(tail)))
}

/// Decode a hex field of an exact length. Length is checked before decoding.
fn decode_exact(value: &str, len: usize) -> Option<Vec<u8>> {
    if value.len() != len * 2 {
        return None;
    }
    hex::decode(value).ok()
}

/// Verifies Ed25519 signatures over a fixed challenge.
pub struct Ed25519ChallengeVerifier {
    challenge: Vec<u8>,
}

impl fmt::Debug for Ed25519ChallengeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519ChallengeVerifier")
            .field("challenge_len", &self.challenge.len())
            .finish()
    }
}

impl Ed25519ChallengeVerifier {
    #[must_use]
    pub fn new(challenge: impl Into<Vec<u8>>) -> Self {
        Self {
            challenge: challenge.into(),
        }
    }
}

impl IdentityVerifier for Ed25519ChallengeVerifier {
    fn verify(&self, credentials: &SignedChallenge) -> Result<UserId, IdentityError> {
        if credentials.public_key.is_empty() || credentials.signature.is_empty() {
            return Err(IdentityError::MissingCredentials);
        }

        let public_key = decode_exact(credentials.public_key.trim(), PUBLIC_KEY_LEN)
            .ok_or(IdentityError::MalformedPublicKey)?;
        let signature = decode_exact(credentials.signature.trim(), SIGNATURE_LEN)
            .ok_or(IdentityError::MalformedSignature)?;

        UnparsedPublicKey::new(&ED25519, &public_key)
            .verify(&self.challenge, &signature)
            .map_err(|_| IdentityError::InvalidSignature)?;

        Ok(derive_address(&public_key))
    }
}
