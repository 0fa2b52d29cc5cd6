//! # Coffer
//!
//! Hierarchical, role-based authorization and spending-budget engine for a
//! shared treasury controlled by multiple independent signers.
//!
//! Signers ("roles") form a delegation hierarchy: a root, manager-tier
//! roles, worker-tier roles. For every requested action (value transfer,
//! program invocation, role management, staking) the engine decides
//! whether the acting role is permitted to perform it, and when the action
//! consumes a bounded resource, whether sufficient budget remains under
//! the applicable time window. Evaluation is atomic and deterministic;
//! nothing moves until the engine says so.
//!
//! ## Key Concepts
//!
//! - **Treasury**: the shared account and its full role/permission/budget
//!   state, an in-memory value with a version counter
//! - **Action**: one granted capability, a closed kind plus parameters
//! - **Delegation**: a role can only ever grant subsets of its own
//!   permissions; authority shrinks down the hierarchy, never expands
//! - **Window**: the recurring period after which a consumable action's
//!   usage resets
//!
//! ## Example
//!
//! ```rust,ignore
//! use coffer::{Action, Authority, Engine, Operation, Request, Role, RoleId,
//!              SignatureScheme, Treasury, TreasuryId};
//!
//! let root_key = Authority::new(root_key_bytes, SignatureScheme::Ed25519);
//! let treasury = Treasury::new(TreasuryId::from_seed(b"team-wallet")?, root_key);
//! let mut engine = Engine::new(treasury);
//!
//! // Root creates a worker with a daily spending cap.
//! engine.authorize(&Request::new(
//!     RoleId::ROOT,
//!     Operation::AddRole {
//!         role: RoleId::new(1)?,
//!         authority: worker_key,
//!         actions: vec!["currency_recurring:100:86400".parse()?],
//!     },
//!     now,
//! ))?;
//!
//! // The worker spends within its window.
//! let approval = engine.authorize(&Request::new(
//!     RoleId::new(1)?,
//!     Operation::Transfer { amount: 60, destination },
//!     now,
//! ))?;
//! // Hand `approval` to the transaction coordinator.
//! ```
//!
//! ## Scope
//!
//! Signing primitives, instruction encoding, and network submission live
//! in external collaborators. If submission fails after authorization
//! succeeded, consumed budget is not rolled back automatically; callers
//! must apply a compensating credit; the engine has no visibility into
//! submission outcome.

pub mod action;
pub mod audit;
pub mod budget;
pub mod clock;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod registry;
pub mod role;
pub mod treasury;
pub mod wire;

// Re-exports for convenience
pub use action::{Action, ActionKind, Destination, Mint, ProgramId, ID_LEN};
pub use audit::{AuditEvent, AuditEventType, AuditLogger, NoOpLogger, StdoutLogger};
pub use budget::{BudgetEntry, BudgetLedger};
pub use clock::{Clock, ManualClock, SystemClock};
pub use delegation::DelegationValidator;
pub use engine::{
    Approval, Consumption, Engine, EngineBuilder, Operation, Request, SharedEngine,
};
pub use error::{Error, Result};
pub use registry::{
    CuratedPrograms, StaticProgramList, StaticSubAccounts, SubAccountDirectory,
};
pub use role::{
    Authority, EqualityVerifier, Role, RoleId, SignatureScheme, SignerVerifier,
};
pub use treasury::{Treasury, TreasuryId, TREASURY_ID_FILL, TREASURY_ID_LEN};
pub use wire::{Snapshot, MAX_SNAPSHOT_SIZE, SNAPSHOT_VERSION};

/// Maximum number of roles one treasury can hold (ids are a single byte).
pub const MAX_ROLES: usize = 256;

/// The reserved root role id.
pub const ROOT_ROLE: RoleId = RoleId::ROOT;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_basic_treasury_flow() {
        let treasury = Treasury::new(
            TreasuryId::from_seed(b"smoke").unwrap(),
            Authority::new([0; 32], SignatureScheme::Ed25519),
        );
        let mut engine = Engine::new(treasury);
        let now = DateTime::from_timestamp(0, 0).unwrap();

        engine
            .authorize(&Request::new(
                ROOT_ROLE,
                Operation::AddRole {
                    role: RoleId::new(1).unwrap(),
                    authority: Authority::new([1; 32], SignatureScheme::Ed25519),
                    actions: vec!["currency_recurring:100:86400".parse().unwrap()],
                },
                now,
            ))
            .unwrap();

        let approval = engine
            .authorize(&Request::new(
                RoleId::new(1).unwrap(),
                Operation::Transfer {
                    amount: 60,
                    destination: Destination::from_bytes([7; ID_LEN]),
                },
                now,
            ))
            .unwrap();

        assert_eq!(approval.consumption.unwrap().window_total, 60);
    }
}
