//! Error types for Coffer.
//!
//! Every rejection the engine produces carries exactly one taxonomy reason.
//! Rejections are terminal and synchronous: the engine never retries, and a
//! rejected request leaves the treasury and the budget ledger untouched.
//! Retry policy belongs to the transaction coordinator, not this crate.

use crate::action::{Action, Destination};
use crate::role::RoleId;
use thiserror::Error;

/// Result type alias for Coffer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Coffer operations.
///
/// The first group mirrors the authorization taxonomy: one variant per
/// rejection reason, with enough context to explain the decision to a
/// caller. The second group covers boundary concerns (parsing, snapshot
/// serialization) that never arise during a live authorization attempt.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Role Store Errors
    // =========================================================================
    /// Role (or one of its budget entries) is absent.
    #[error("role {0} not found")]
    NotFound(RoleId),

    /// A role with this id already exists in the treasury.
    #[error("role {0} already exists")]
    DuplicateId(RoleId),

    /// Role ids are a single byte; anything above 255 is unrepresentable.
    #[error("role id {0} out of range (must be 0..=255)")]
    IdOutOfRange(u32),

    /// Role 0 is reserved for the root signer and is seeded at creation.
    #[error("treasury already has a root role")]
    RootConflict,

    /// Root can never be removed, not even by itself.
    #[error("root role cannot be removed")]
    CannotRemoveRoot,

    /// Root can never be altered by a non-root actor, nor demoted by anyone.
    #[error("root role cannot be modified")]
    CannotModifyRoot,

    // =========================================================================
    // Delegation Errors
    // =========================================================================
    /// The acting role lacks `ManageRoles` (or `Universal`).
    #[error("role {0} lacks role-management privilege")]
    InsufficientPrivilege(RoleId),

    /// The attempted grant exceeds the actor's own effective actions.
    #[error("role {actor} cannot grant {grant}: exceeds its own authority")]
    PrivilegeEscalation { actor: RoleId, grant: Box<Action> },

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// The role holds no action covering the requested kind at all.
    #[error("role {role} holds no action covering {requested}")]
    PermissionDenied {
        role: RoleId,
        requested: &'static str,
    },

    /// A destination-scoped limit was asked to pay a different destination.
    #[error("destination {requested} does not match configured destination {configured}")]
    WrongDestination {
        requested: Destination,
        configured: Destination,
    },

    /// The request would push consumption past the configured limit.
    #[error("limit exceeded: consumed {consumed} + requested {requested} > limit {limit}")]
    LimitExceeded {
        consumed: u64,
        requested: u64,
        limit: u64,
    },

    /// The supplied timestamp precedes one the engine has already observed.
    ///
    /// The clock collaborator is assumed monotonic non-decreasing; a
    /// regression could wrongly hold a window open or force a spurious
    /// reset, so the request is rejected instead.
    #[error("clock regression: {now} precedes last observed {last}")]
    ClockRegression {
        now: chrono::DateTime<chrono::Utc>,
        last: chrono::DateTime<chrono::Utc>,
    },

    /// The claimed signer does not match the acting role's authority.
    #[error("signer does not match the authority of role {0}")]
    AuthorityMismatch(RoleId),

    // =========================================================================
    // Boundary Errors
    // =========================================================================
    /// Validation error (malformed permission string, bad seed length, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Snapshot format version mismatch.
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    /// Snapshot size exceeds the hard cap.
    #[error("snapshot size {size} bytes exceeds maximum {max} bytes")]
    SnapshotTooLarge { size: usize, max: usize },
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl Error {
    /// Get the machine-readable reason name (kebab-case).
    ///
    /// This is the canonical string representation for audit records and
    /// API surfaces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::DuplicateId(_) => "duplicate-id",
            Self::IdOutOfRange(_) => "id-out-of-range",
            Self::RootConflict => "root-conflict",
            Self::CannotRemoveRoot => "cannot-remove-root",
            Self::CannotModifyRoot => "cannot-modify-root",
            Self::InsufficientPrivilege(_) => "insufficient-privilege",
            Self::PrivilegeEscalation { .. } => "privilege-escalation",
            Self::PermissionDenied { .. } => "permission-denied",
            Self::WrongDestination { .. } => "wrong-destination",
            Self::LimitExceeded { .. } => "limit-exceeded",
            Self::ClockRegression { .. } => "clock-regression",
            Self::AuthorityMismatch(_) => "authority-mismatch",
            Self::Validation(_) => "validation",
            Self::SerializationError(_) => "serialization-error",
            Self::DeserializationError(_) => "deserialization-error",
            Self::UnsupportedVersion(_) => "unsupported-version",
            Self::SnapshotTooLarge { .. } => "snapshot-too-large",
        }
    }

    /// Whether this reason terminates an authorization attempt (as opposed
    /// to a boundary/parsing failure that never reached the engine).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_)
                | Self::SerializationError(_)
                | Self::DeserializationError(_)
                | Self::UnsupportedVersion(_)
                | Self::SnapshotTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names_are_kebab_case() {
        let errors = vec![
            Error::RootConflict,
            Error::CannotRemoveRoot,
            Error::CannotModifyRoot,
            Error::IdOutOfRange(300),
            Error::LimitExceeded {
                consumed: 60,
                requested: 60,
                limit: 100,
            },
            Error::Validation("x".into()),
            Error::UnsupportedVersion(9),
        ];

        for err in errors {
            let name = err.name();
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
                "reason name '{}' is not kebab-case",
                name
            );
            assert!(!name.starts_with('-') && !name.ends_with('-'));
        }
    }

    #[test]
    fn test_rejection_classification() {
        assert!(Error::CannotRemoveRoot.is_rejection());
        assert!(Error::LimitExceeded {
            consumed: 0,
            requested: 1,
            limit: 0
        }
        .is_rejection());
        assert!(!Error::Validation("bad string".into()).is_rejection());
        assert!(!Error::UnsupportedVersion(2).is_rejection());
    }
}
