//! Common data types for pod components.

use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Number of random bytes behind a pod ID (hex-encoded to 16 characters).
pub const POD_ID_BYTES: usize = 8;

/// Failure to draw randomness for a new identifier.
#[derive(Debug, Error)]
#[error("Failed to generate random bytes for identifier")]
pub struct IdGenerationError;

/// Unique identifier for a pod (live session).
///
/// Generated IDs are 16 lowercase hex characters and therefore URL-safe.
/// IDs received from clients are accepted verbatim; lookups of unknown IDs
/// simply miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodId(String);

impl PodId {
    /// Generate a fresh random pod ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError`] if the system RNG fails.
    pub fn generate(rng: &dyn SecureRandom) -> Result<Self, IdGenerationError> {
        let mut bytes = [0u8; POD_ID_BYTES];
        rng.fill(&mut bytes).map_err(|_| IdGenerationError)?;
        Ok(Self(hex::encode(bytes)))
    }

    /// View the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PodId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PodId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verified user identity (a wallet address).
///
/// Addresses are normalized to lowercase (including on deserialization) so
/// that checksummed and plain spellings of the same wallet compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID from a wallet address.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().to_ascii_lowercase())
    }

    /// View the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;

    #[test]
    fn test_pod_id_is_sixteen_lowercase_hex_chars() {
        let rng = SystemRandom::new();
        let id = PodId::generate(&rng).unwrap();

        assert_eq!(id.as_str().len(), 16);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_pod_ids_differ() {
        let rng = SystemRandom::new();
        let a = PodId::generate(&rng).unwrap();
        let b = PodId::generate(&rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_id_normalizes_case() {
        assert_eq!(UserId::new("0xAbCdEf"), UserId::new("0xabcdef"));
        assert_eq!(UserId::new("0xAbCdEf").as_str(), "0xabcdef");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&PodId::from("00ff00ff00ff00ff")).unwrap();
        assert_eq!(json, "\"00ff00ff00ff00ff\"");

        let user: UserId = serde_json::from_str("\"0xABC\"").unwrap();
        assert_eq!(user.as_str(), "0xabc");
    }
}
