//! Pod service error types.
//!
//! Error types map to signaling error codes for client responses.
//! Internal details are logged server-side but not exposed to clients.
//!
//! Note that most "this did nothing" situations (double approval, duplicate
//! join request, stale co-host request) are not errors at all: the
//! lifecycle operations report them as no-op outcomes.

use crate::identity::IdentityError;
use thiserror::Error;

/// Pod service error type.
///
/// Maps to signaling error codes:
/// - `InvalidCommand`: `BAD_REQUEST` (1)
/// - `Unauthenticated`: `UNAUTHORIZED` (2)
/// - `PermissionDenied`: `FORBIDDEN` (3)
/// - `PodNotFound`: `NOT_FOUND` (4)
/// - `Conflict`: `CONFLICT` (5)
/// - `Internal`: `INTERNAL_ERROR` (6)
/// - `CapacityExceeded`, `IdSpaceExhausted`, `Draining`: `CAPACITY_EXCEEDED` (7)
#[derive(Debug, Error)]
pub enum PodError {
    /// Inbound command could not be parsed.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Caller identity could not be verified.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(#[from] IdentityError),

    /// Caller lacks the role required for a privileged action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Referenced pod does not exist.
    #[error("Pod not found: {0}")]
    PodNotFound(String),

    /// Conflict with existing state (e.g., pod ID already registered).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Service or pod is at capacity.
    #[error("At capacity: {0}")]
    CapacityExceeded(String),

    /// Could not allocate a collision-free pod ID.
    #[error("Pod ID allocation exhausted after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },

    /// Service is shutting down.
    #[error("Service is draining")]
    Draining,

    /// Internal error (actor mailbox closed, RNG failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PodError {
    /// Returns the signaling error code for this error.
    pub fn error_code(&self) -> i32 {
        match self {
            PodError::InvalidCommand(_) => 1,   // BAD_REQUEST
            PodError::Unauthenticated(_) => 2,  // UNAUTHORIZED
            PodError::PermissionDenied(_) => 3, // FORBIDDEN
            PodError::PodNotFound(_) => 4,      // NOT_FOUND
            PodError::Conflict(_) => 5,         // CONFLICT
            PodError::Internal(_) => 6,         // INTERNAL_ERROR
            PodError::CapacityExceeded(_)
            | PodError::IdSpaceExhausted { .. }
            | PodError::Draining => 7, // CAPACITY_EXCEEDED
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            PodError::InvalidCommand(_) => "Malformed command".to_string(),
            PodError::Unauthenticated(_) => "Invalid or missing signature".to_string(),
            PodError::PodNotFound(_) => "Pod not found".to_string(),
            PodError::CapacityExceeded(msg)
            | PodError::PermissionDenied(msg)
            | PodError::Conflict(msg) => msg.clone(),
            PodError::IdSpaceExhausted { .. } => {
                "Could not create pod, please try again".to_string()
            }
            PodError::Draining => "Server is shutting down, please reconnect".to_string(),
            PodError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(PodError::InvalidCommand("eof".to_string()).error_code(), 1);
        assert_eq!(
            PodError::Unauthenticated(IdentityError::InvalidSignature).error_code(),
            2
        );
        assert_eq!(
            PodError::PermissionDenied("not host".to_string()).error_code(),
            3
        );
        assert_eq!(PodError::PodNotFound("abc".to_string()).error_code(), 4);
        assert_eq!(PodError::Conflict("dup".to_string()).error_code(), 5);
        assert_eq!(PodError::Internal("closed".to_string()).error_code(), 6);
        assert_eq!(
            PodError::CapacityExceeded("max 10".to_string()).error_code(),
            7
        );
        assert_eq!(PodError::IdSpaceExhausted { attempts: 5 }.error_code(), 7);
        assert_eq!(PodError::Draining.error_code(), 7);
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let internal = PodError::Internal("shard 3 mailbox closed".to_string());
        assert!(!internal.client_message().contains("shard"));
        assert_eq!(internal.client_message(), "An internal error occurred");

        let not_found = PodError::PodNotFound("0011223344556677".to_string());
        assert!(!not_found.client_message().contains("0011"));
    }

    #[test]
    fn test_identity_error_conversion() {
        let err: PodError = IdentityError::InvalidSignature.into();
        assert!(matches!(err, PodError::Unauthenticated(_)));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", PodError::IdSpaceExhausted { attempts: 8 }),
            "Pod ID allocation exhausted after 8 attempts"
        );
        assert_eq!(
            format!("{}", PodError::PermissionDenied("hosts only".to_string())),
            "Permission denied: hosts only"
        );
    }
}
