//! The authorization engine: one state machine per treasury.
//!
//! Every request moves `Received → Validated → Authorized | Rejected`:
//!
//! 1. **Received**: a request names an acting role, an operation, and a
//!    timestamp.
//! 2. **Validated**: the role must exist and (if a signer is claimed)
//!    match its authority descriptor; management operations go through the
//!    [`DelegationValidator`]; everything else must be covered by the
//!    role's effective actions.
//! 3. **Authorized**: consumable operations additionally pass the budget
//!    ledger's atomic check-and-consume. The returned [`Approval`] token
//!    carries what the transaction coordinator needs to proceed.
//! 4. **Rejected**: terminal, with exactly one taxonomy reason and no
//!    state change whatsoever.
//!
//! Requests against one treasury are evaluated strictly one at a time:
//! the engine owns the treasury and ledger, and [`SharedEngine`] wraps it
//! in a whole-treasury lock. The delegation validator reads across roles
//! while the ledger mutates entries, so nothing finer-grained is safe.
//! Distinct treasuries are independent values and need no shared state.

use crate::action::{Action, ActionKind, Destination, Mint, ProgramId};
use crate::audit::{log_event, AuditEvent, AuditEventType};
use crate::budget::BudgetLedger;
use crate::clock::{Clock, SystemClock};
use crate::delegation::DelegationValidator;
use crate::error::{Error, Result};
use crate::registry::{CuratedPrograms, SubAccountDirectory};
use crate::role::{Authority, EqualityVerifier, Role, RoleId, SignerVerifier};
use crate::treasury::{Treasury, TreasuryId};
use crate::wire::{Snapshot, SNAPSHOT_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One requested operation, already parsed into closed types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Move currency to a destination account.
    Transfer {
        amount: u64,
        destination: Destination,
    },
    /// Move tokens of one mint to a destination account.
    TransferToken {
        mint: Mint,
        amount: u64,
        destination: Destination,
    },
    /// Stake an amount.
    Stake { amount: u64 },
    /// Invoke an external program, optionally moving value through it.
    Invoke { program: ProgramId, amount: u64 },
    /// Create a new role under the acting role.
    AddRole {
        role: RoleId,
        authority: Authority,
        actions: Vec<Action>,
    },
    /// Remove a role and purge its budget entries.
    RemoveRole { role: RoleId },
    /// Grant additional actions to an existing role.
    GrantActions { role: RoleId, actions: Vec<Action> },
    /// Revoke actions from an existing role.
    RevokeActions { role: RoleId, actions: Vec<Action> },
    /// Create an isolated sub-balance under the treasury.
    CreateSubAccount { account: Destination },
    /// Toggle an existing sub-balance.
    ToggleSubAccount { account: Destination },
}

impl Operation {
    /// Whether this operation mutates the role store.
    pub fn is_management(&self) -> bool {
        matches!(
            self,
            Self::AddRole { .. }
                | Self::RemoveRole { .. }
                | Self::GrantActions { .. }
                | Self::RevokeActions { .. }
        )
    }

    /// Short name for logs and audit records.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::TransferToken { .. } => "transfer_token",
            Self::Stake { .. } => "stake",
            Self::Invoke { .. } => "invoke",
            Self::AddRole { .. } => "add_role",
            Self::RemoveRole { .. } => "remove_role",
            Self::GrantActions { .. } => "grant_actions",
            Self::RevokeActions { .. } => "revoke_actions",
            Self::CreateSubAccount { .. } => "create_sub_account",
            Self::ToggleSubAccount { .. } => "toggle_sub_account",
        }
    }
}

/// One authorization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The acting role.
    pub actor: RoleId,
    pub operation: Operation,
    /// Timestamp supplied by the clock collaborator.
    pub at: DateTime<Utc>,
    /// Claimed signer, checked against the acting role's authority when
    /// present.
    pub signer: Option<Authority>,
}

impl Request {
    pub fn new(actor: RoleId, operation: Operation, at: DateTime<Utc>) -> Self {
        Self {
            actor,
            operation,
            at,
            signer: None,
        }
    }

    pub fn signed_by(mut self, signer: Authority) -> Self {
        self.signer = Some(signer);
        self
    }
}

/// Budget drawn by an authorized request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    /// The action instance that satisfied the request.
    pub action: Action,
    /// Amount consumed by this request.
    pub amount: u64,
    /// Total consumed in the instance's current window afterwards.
    pub window_total: u64,
}

/// Approval token handed to the transaction coordinator.
///
/// Carries the post-mutation treasury version for optimistic concurrency.
/// If external submission ultimately fails, budget consumed here is not
/// rolled back automatically; callers must compensate (see crate docs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub treasury: TreasuryId,
    pub version: u64,
    pub actor: RoleId,
    pub operation: Operation,
    pub consumption: Option<Consumption>,
    pub at: DateTime<Utc>,
}

/// Builder for [`Engine`]: wires in collaborators and restored state.
#[derive(Debug)]
pub struct EngineBuilder {
    treasury: Treasury,
    ledger: BudgetLedger,
    curated: Option<Arc<dyn CuratedPrograms>>,
    sub_accounts: Option<Arc<dyn SubAccountDirectory>>,
    verifier: Arc<dyn SignerVerifier>,
    clock: Arc<dyn Clock>,
    last_observed: Option<DateTime<Utc>>,
}

impl EngineBuilder {
    pub fn new(treasury: Treasury) -> Self {
        Self {
            treasury,
            ledger: BudgetLedger::new(),
            curated: None,
            sub_accounts: None,
            verifier: Arc::new(EqualityVerifier),
            clock: Arc::new(SystemClock),
            last_observed: None,
        }
    }

    /// Resume from a persisted snapshot.
    ///
    /// Fails with `UnsupportedVersion` on format mismatch.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion(snapshot.version));
        }
        log_event(AuditEvent::new(
            AuditEventType::SnapshotLoaded,
            snapshot.treasury.id(),
            None,
        ));
        Ok(Self {
            treasury: snapshot.treasury,
            ledger: snapshot.ledger,
            curated: None,
            sub_accounts: None,
            verifier: Arc::new(EqualityVerifier),
            clock: Arc::new(SystemClock),
            last_observed: snapshot.last_observed,
        })
    }

    /// Restore a previously captured budget ledger.
    pub fn ledger(mut self, ledger: BudgetLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// Configure the curated program allow-list.
    ///
    /// Without one, `ProgramCurated` checks fail closed.
    pub fn curated_programs(mut self, list: Arc<dyn CuratedPrograms>) -> Self {
        self.curated = Some(list);
        self
    }

    /// Configure the sub-account directory.
    ///
    /// Without one, `SubAccount`-gated operations fail closed.
    pub fn sub_accounts(mut self, directory: Arc<dyn SubAccountDirectory>) -> Self {
        self.sub_accounts = Some(directory);
        self
    }

    /// Replace the identity collaborator (default: byte equality).
    pub fn verifier(mut self, verifier: Arc<dyn SignerVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the clock collaborator (default: system time).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            treasury: self.treasury,
            ledger: self.ledger,
            curated: self.curated,
            sub_accounts: self.sub_accounts,
            verifier: self.verifier,
            clock: self.clock,
            last_observed: self.last_observed,
        }
    }
}

/// The authorization engine for one treasury.
///
/// Owns the treasury and its budget ledger; evaluation is synchronous and
/// all-or-nothing. There is no blocking I/O here: signing and submission
/// happen strictly after authorization, in the transaction coordinator.
#[derive(Debug)]
pub struct Engine {
    treasury: Treasury,
    ledger: BudgetLedger,
    curated: Option<Arc<dyn CuratedPrograms>>,
    sub_accounts: Option<Arc<dyn SubAccountDirectory>>,
    verifier: Arc<dyn SignerVerifier>,
    clock: Arc<dyn Clock>,
    last_observed: Option<DateTime<Utc>>,
}

impl Engine {
    /// Create an engine with default collaborators.
    pub fn new(treasury: Treasury) -> Self {
        EngineBuilder::new(treasury).build()
    }

    pub fn builder(treasury: Treasury) -> EngineBuilder {
        EngineBuilder::new(treasury)
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    /// Capture the full state for the persistence collaborator.
    ///
    /// The caller is expected to persist the snapshot transactionally with
    /// the externally submitted action; if persistence fails, the
    /// authorization is not yet effective.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            treasury: self.treasury.clone(),
            ledger: self.ledger.clone(),
            last_observed: self.last_observed,
        }
    }

    /// Evaluate a request stamped with the engine's own clock.
    pub fn authorize_now(&mut self, actor: RoleId, operation: Operation) -> Result<Approval> {
        let at = self.clock.now();
        self.authorize(&Request::new(actor, operation, at))
    }

    /// Evaluate one request to a terminal state.
    ///
    /// On success the side effect (budget consumption or role-store
    /// mutation) has been applied and the returned approval describes it.
    /// On rejection all state is byte-for-byte unchanged.
    pub fn authorize(&mut self, request: &Request) -> Result<Approval> {
        let result = self.evaluate(request);
        match &result {
            Ok(approval) => {
                debug!(
                    actor = %approval.actor,
                    operation = approval.operation.name(),
                    version = approval.version,
                    "request authorized"
                );
                log_event(
                    AuditEvent::new(
                        AuditEventType::Authorized,
                        self.treasury.id(),
                        Some(request.actor),
                    )
                    .with_details(request.operation.name()),
                );
            }
            Err(e) if e.is_rejection() => {
                warn!(
                    actor = %request.actor,
                    operation = request.operation.name(),
                    reason = e.name(),
                    "request rejected"
                );
                log_event(
                    AuditEvent::new(
                        AuditEventType::Rejected,
                        self.treasury.id(),
                        Some(request.actor),
                    )
                    .with_reason(e.name())
                    .with_details(request.operation.name()),
                );
            }
            Err(_) => {}
        }
        result
    }

    fn evaluate(&mut self, request: &Request) -> Result<Approval> {
        // Received → Validated.
        if let Some(last) = self.last_observed {
            if request.at < last {
                return Err(Error::ClockRegression {
                    now: request.at,
                    last,
                });
            }
        }

        let actor = self.treasury.role(request.actor)?.clone();

        if let Some(claimed) = &request.signer {
            if !self.verifier.matches(actor.authority(), claimed) {
                return Err(Error::AuthorityMismatch(request.actor));
            }
        }

        // Validated → Authorized | Rejected.
        let consumption = match &request.operation {
            Operation::Transfer {
                amount,
                destination,
            } => self.consume_family(
                &actor,
                Action::accepts_currency,
                ActionKind::CurrencyOnce,
                "currency",
                *amount,
                Some(destination),
                request.at,
            )?,
            Operation::TransferToken {
                mint,
                amount,
                destination,
            } => self.consume_family(
                &actor,
                |a: &Action| a.accepts_token(mint),
                ActionKind::TokenOnce,
                "token",
                *amount,
                Some(destination),
                request.at,
            )?,
            Operation::Stake { amount } => self.consume_stake(&actor, *amount, request.at)?,
            Operation::Invoke { program, amount } => {
                self.authorize_invoke(&actor, program, *amount, request.at)?
            }
            Operation::CreateSubAccount { account } => {
                self.authorize_sub_account(&actor, account, true)?;
                None
            }
            Operation::ToggleSubAccount { account } => {
                self.authorize_sub_account(&actor, account, false)?;
                None
            }
            management => {
                self.apply_management(&actor, management, request.at)?;
                None
            }
        };

        self.last_observed = Some(request.at);
        Ok(Approval {
            treasury: *self.treasury.id(),
            version: self.treasury.version(),
            actor: request.actor,
            operation: request.operation.clone(),
            consumption,
            at: request.at,
        })
    }

    /// Spend against one family of consumable kinds.
    ///
    /// Wildcard holders are authorized without a ledger step (their
    /// authority is unbounded). Otherwise every qualifying instance is
    /// tried independently; one success suffices, and if all fail the
    /// first rejection is reported. A role with no qualifying instance at
    /// all rejects with `PermissionDenied` before any ledger lookup.
    #[allow(clippy::too_many_arguments)]
    fn consume_family(
        &mut self,
        actor: &Role,
        qualifies: impl Fn(&Action) -> bool,
        wildcard_probe: ActionKind,
        family: &'static str,
        amount: u64,
        destination: Option<&Destination>,
        now: DateTime<Utc>,
    ) -> Result<Option<Consumption>> {
        if actor.wildcard_for(wildcard_probe).is_some() {
            return Ok(None);
        }

        let mut first_err: Option<Error> = None;
        for action in actor.instances(&qualifies) {
            match self
                .ledger
                .check_and_consume(actor.id(), action, amount, destination, now)
            {
                Ok(window_total) => {
                    return Ok(Some(Consumption {
                        action: action.clone(),
                        amount,
                        window_total,
                    }))
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err.unwrap_or(Error::PermissionDenied {
            role: actor.id(),
            requested: family,
        }))
    }

    fn consume_stake(
        &mut self,
        actor: &Role,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Consumption>> {
        // StakeAll is the staking wildcard: no amount bound, no ledger.
        if actor.instances(|a| matches!(a, Action::StakeAll)).next().is_some() {
            return Ok(None);
        }
        self.consume_family(
            actor,
            Action::accepts_stake,
            ActionKind::StakeOnce,
            "stake",
            amount,
            None,
            now,
        )
    }

    /// Program invocation: the non-consumable kinds authorize freely; a
    /// scoped grant draws the invocation amount from its isolated balance.
    fn authorize_invoke(
        &mut self,
        actor: &Role,
        program: &ProgramId,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<Consumption>> {
        // `holds` covers the wildcards too: Universal and
        // AllExceptManageRoles both satisfy ProgramAny.
        if actor.holds(ActionKind::ProgramAny) {
            return Ok(None);
        }
        if actor
            .instances(|a| matches!(a, Action::ProgramOne { program: p } if p == program))
            .next()
            .is_some()
        {
            return Ok(None);
        }
        // Curated membership fails closed when no list is configured.
        if actor.holds(ActionKind::ProgramCurated) {
            if let Some(curated) = &self.curated {
                if curated.contains(program) {
                    return Ok(None);
                }
            }
        }

        let mut first_err: Option<Error> = None;
        let scoped = |a: &Action| matches!(a, Action::ProgramScoped { program: p, .. } if p == program);
        for action in actor.instances(scoped) {
            match self
                .ledger
                .check_and_consume(actor.id(), action, amount, None, now)
            {
                Ok(window_total) => {
                    return Ok(Some(Consumption {
                        action: action.clone(),
                        amount,
                        window_total,
                    }))
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        Err(first_err.unwrap_or(Error::PermissionDenied {
            role: actor.id(),
            requested: "program",
        }))
    }

    fn authorize_sub_account(
        &self,
        actor: &Role,
        account: &Destination,
        create: bool,
    ) -> Result<()> {
        if !actor.holds(ActionKind::SubAccount) {
            return Err(Error::PermissionDenied {
                role: actor.id(),
                requested: "sub_account",
            });
        }
        let Some(directory) = &self.sub_accounts else {
            return Err(Error::Validation(
                "no sub-account directory configured".to_string(),
            ));
        };
        match (create, directory.exists(account)) {
            (true, true) => Err(Error::Validation(format!(
                "sub-account {account} already exists"
            ))),
            (false, false) => Err(Error::Validation(format!(
                "unknown sub-account {account}"
            ))),
            _ => Ok(()),
        }
    }

    fn apply_management(
        &mut self,
        actor: &Role,
        operation: &Operation,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let validator = DelegationValidator::new(&self.treasury, &self.ledger);
        match operation {
            Operation::AddRole {
                role,
                authority,
                actions,
            } => {
                validator.validate_add_role(actor, *role, actions, now)?;
                self.treasury
                    .insert_role(Role::new(*role, *authority, actor.id(), actions.clone()))?;
                log_event(
                    AuditEvent::new(
                        AuditEventType::RoleAdded,
                        self.treasury.id(),
                        Some(actor.id()),
                    )
                    .with_details(format!("role {role}")),
                );
            }
            Operation::RemoveRole { role } => {
                validator.validate_remove_role(actor, *role)?;
                self.treasury.remove_role(*role)?;
                self.ledger.purge_role(*role);
                log_event(
                    AuditEvent::new(
                        AuditEventType::RoleRemoved,
                        self.treasury.id(),
                        Some(actor.id()),
                    )
                    .with_details(format!("role {role}")),
                );
            }
            Operation::GrantActions { role, actions } => {
                validator.validate_grant(actor, *role, actions, now)?;
                self.treasury.mutate_actions(*role, actions, &[])?;
                log_event(
                    AuditEvent::new(
                        AuditEventType::ActionsGranted,
                        self.treasury.id(),
                        Some(actor.id()),
                    )
                    .with_details(format!("role {role}")),
                );
            }
            Operation::RevokeActions { role, actions } => {
                validator.validate_revoke(actor, *role)?;
                self.treasury.mutate_actions(*role, &[], actions)?;
                for action in actions {
                    self.ledger.purge_action(*role, action);
                }
                log_event(
                    AuditEvent::new(
                        AuditEventType::ActionsRevoked,
                        self.treasury.id(),
                        Some(actor.id()),
                    )
                    .with_details(format!("role {role}")),
                );
            }
            // Non-management operations never reach here.
            other => {
                return Err(Error::Validation(format!(
                    "operation '{}' is not a management operation",
                    other.name()
                )))
            }
        }
        Ok(())
    }
}

/// Thread-safe handle serializing all requests against one treasury.
///
/// The lock spans the whole authorization attempt: a check can never race
/// a consume, and the delegation validator can never observe a torn write.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn authorize(&self, request: &Request) -> Result<Approval> {
        self.lock().authorize(request)
    }

    pub fn authorize_now(&self, actor: RoleId, operation: Operation) -> Result<Approval> {
        self.lock().authorize_now(actor, operation)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Run a closure against the engine under the treasury lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        f(&self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Engine> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ID_LEN;
    use crate::role::SignatureScheme;

    const DAY: u64 = 86_400;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn authority(byte: u8) -> Authority {
        Authority::new([byte; 32], SignatureScheme::Ed25519)
    }

    fn destination(byte: u8) -> Destination {
        Destination::from_bytes([byte; ID_LEN])
    }

    fn engine_with_role(actions: Vec<Action>) -> Engine {
        let mut treasury = Treasury::new(
            TreasuryId::from_seed(b"engine-test").unwrap(),
            authority(0),
        );
        treasury
            .insert_role(Role::new(
                RoleId::from_u8(1),
                authority(1),
                RoleId::ROOT,
                actions,
            ))
            .unwrap();
        Engine::new(treasury)
    }

    #[test]
    fn test_permission_denied_before_ledger_lookup() {
        let mut engine = engine_with_role(vec![Action::StakeAll]);
        let request = Request::new(
            RoleId::from_u8(1),
            Operation::Transfer {
                amount: 1,
                destination: destination(9),
            },
            at(0),
        );
        assert!(matches!(
            engine.authorize(&request),
            Err(Error::PermissionDenied { .. })
        ));
        // The cheap fail path created no ledger entry.
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_unknown_role_rejects_not_found() {
        let mut engine = engine_with_role(vec![]);
        let request = Request::new(
            RoleId::from_u8(42),
            Operation::Stake { amount: 0 },
            at(0),
        );
        assert_eq!(
            engine.authorize(&request),
            Err(Error::NotFound(RoleId::from_u8(42)))
        );
    }

    #[test]
    fn test_signer_mismatch_rejects() {
        let mut engine = engine_with_role(vec![Action::StakeAll]);
        let request = Request::new(RoleId::from_u8(1), Operation::Stake { amount: 5 }, at(0))
            .signed_by(authority(99));
        assert_eq!(
            engine.authorize(&request),
            Err(Error::AuthorityMismatch(RoleId::from_u8(1)))
        );

        let ok = Request::new(RoleId::from_u8(1), Operation::Stake { amount: 5 }, at(0))
            .signed_by(authority(1));
        assert!(engine.authorize(&ok).is_ok());
    }

    #[test]
    fn test_transfer_consumes_and_reports() {
        let mut engine = engine_with_role(vec![Action::CurrencyRecurring {
            amount: 100,
            window_secs: DAY,
        }]);
        let approval = engine
            .authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Transfer {
                    amount: 60,
                    destination: destination(2),
                },
                at(0),
            ))
            .unwrap();
        let consumption = approval.consumption.unwrap();
        assert_eq!(consumption.amount, 60);
        assert_eq!(consumption.window_total, 60);
    }

    #[test]
    fn test_wildcard_spend_bypasses_ledger() {
        let mut engine = engine_with_role(vec![Action::AllExceptManageRoles]);
        let approval = engine
            .authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Transfer {
                    amount: 1_000_000,
                    destination: destination(2),
                },
                at(0),
            ))
            .unwrap();
        assert!(approval.consumption.is_none());
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_multiple_instances_checked_independently() {
        let d1 = destination(1);
        let d2 = destination(2);
        let mut engine = engine_with_role(vec![
            Action::CurrencyToDestination {
                destination: d1,
                amount: 10,
            },
            Action::CurrencyToDestination {
                destination: d2,
                amount: 50,
            },
        ]);
        // Satisfied by the second instance even though the first rejects.
        let approval = engine
            .authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Transfer {
                    amount: 30,
                    destination: d2,
                },
                at(0),
            ))
            .unwrap();
        assert_eq!(
            approval.consumption.unwrap().action,
            Action::CurrencyToDestination {
                destination: d2,
                amount: 50,
            }
        );
    }

    #[test]
    fn test_clock_regression_rejected_across_requests() {
        let mut engine = engine_with_role(vec![Action::StakeAll]);
        engine
            .authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Stake { amount: 1 },
                at(1_000),
            ))
            .unwrap();
        assert_eq!(
            engine.authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Stake { amount: 1 },
                at(999),
            )),
            Err(Error::ClockRegression {
                now: at(999),
                last: at(1_000),
            })
        );
    }

    #[test]
    fn test_version_in_approval_tracks_mutations() {
        let mut engine = engine_with_role(vec![]);
        let approval = engine
            .authorize(&Request::new(
                RoleId::ROOT,
                Operation::AddRole {
                    role: RoleId::from_u8(5),
                    authority: authority(5),
                    actions: vec![Action::StakeAll],
                },
                at(0),
            ))
            .unwrap();
        assert_eq!(approval.version, engine.treasury().version());
        assert!(engine.treasury().contains(RoleId::from_u8(5)));
        // Parent recorded as the acting role.
        assert_eq!(
            engine
                .treasury()
                .role(RoleId::from_u8(5))
                .unwrap()
                .parent(),
            Some(RoleId::ROOT)
        );
    }

    #[test]
    fn test_remove_role_purges_budget() {
        let action = Action::CurrencyOnce { amount: 10 };
        let mut engine = engine_with_role(vec![action.clone()]);
        engine
            .authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Transfer {
                    amount: 5,
                    destination: destination(3),
                },
                at(0),
            ))
            .unwrap();
        assert_eq!(engine.ledger().len(), 1);

        engine
            .authorize(&Request::new(
                RoleId::ROOT,
                Operation::RemoveRole {
                    role: RoleId::from_u8(1),
                },
                at(1),
            ))
            .unwrap();
        assert!(engine.ledger().is_empty());

        // Consumption attempts against the removed role reject NotFound.
        assert_eq!(
            engine.authorize(&Request::new(
                RoleId::from_u8(1),
                Operation::Transfer {
                    amount: 1,
                    destination: destination(3),
                },
                at(2),
            )),
            Err(Error::NotFound(RoleId::from_u8(1)))
        );
    }

    #[test]
    fn test_shared_engine_serializes_requests() {
        use std::thread;

        let engine = engine_with_role(vec![Action::CurrencyRecurring {
            amount: 100,
            window_secs: DAY,
        }]);
        let shared = SharedEngine::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.authorize(&Request::new(
                        RoleId::from_u8(1),
                        Operation::Transfer {
                            amount: 30,
                            destination: destination(1),
                        },
                        at(0),
                    ))
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();

        // 100 / 30: exactly three requests fit, no interleaving can admit
        // a fourth past a since-stale check.
        assert_eq!(successes, 3);
        let action = Action::CurrencyRecurring {
            amount: 100,
            window_secs: DAY,
        };
        shared.with_engine(|engine| {
            assert_eq!(
                engine.ledger().entry(RoleId::from_u8(1), &action).unwrap().consumed,
                90
            );
        });
    }
}
