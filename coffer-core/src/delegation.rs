//! Delegation rules: authority can only shrink down the hierarchy.
//!
//! Any role that adds/removes roles or grants actions must itself hold
//! `ManageRoles` (or `Universal`), and everything it grants must be
//! covered by its own effective actions, kind by kind, with granted
//! amounts bounded by the grantor's remaining budget for recurring kinds
//! and by its total limit for one-time kinds. Root is exempt from the
//! subset check; role 0 itself is untouchable by anyone else.
//!
//! The validator reads across multiple roles and the ledger, which is why
//! the whole treasury is serialized per request (see [`crate::engine`]);
//! a torn read here could admit a privilege-escalating grant.

use crate::action::{Action, ActionKind};
use crate::budget::BudgetLedger;
use crate::error::{Error, Result};
use crate::role::{Role, RoleId};
use crate::treasury::Treasury;
use chrono::{DateTime, Utc};

/// Read-only view over one treasury's state used to validate management
/// requests before they are applied.
#[derive(Debug)]
pub struct DelegationValidator<'a> {
    treasury: &'a Treasury,
    ledger: &'a BudgetLedger,
}

impl<'a> DelegationValidator<'a> {
    pub fn new(treasury: &'a Treasury, ledger: &'a BudgetLedger) -> Self {
        Self { treasury, ledger }
    }

    /// Validate creation of a new role with the given action set.
    pub fn validate_add_role(
        &self,
        actor: &Role,
        id: RoleId,
        actions: &[Action],
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_manager(actor)?;
        if id.is_root() {
            return Err(Error::RootConflict);
        }
        if self.treasury.contains(id) {
            return Err(Error::DuplicateId(id));
        }
        for grant in actions {
            self.ensure_within_authority(actor, grant, now)?;
        }
        Ok(())
    }

    /// Validate removal of a role.
    pub fn validate_remove_role(&self, actor: &Role, target: RoleId) -> Result<()> {
        self.ensure_manager(actor)?;
        if target.is_root() {
            return Err(Error::CannotRemoveRoot);
        }
        self.treasury.role(target)?;
        Ok(())
    }

    /// Validate granting additional actions to an existing role.
    pub fn validate_grant(
        &self,
        actor: &Role,
        target: RoleId,
        grants: &[Action],
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_manager(actor)?;
        self.ensure_may_touch(actor, target)?;
        self.treasury.role(target)?;
        for grant in grants {
            self.ensure_within_authority(actor, grant, now)?;
        }
        Ok(())
    }

    /// Validate revoking actions from an existing role.
    ///
    /// Revocation removes power and needs no subset check, only the
    /// management gate and root protection.
    pub fn validate_revoke(&self, actor: &Role, target: RoleId) -> Result<()> {
        self.ensure_manager(actor)?;
        self.ensure_may_touch(actor, target)?;
        self.treasury.role(target)?;
        Ok(())
    }

    fn ensure_manager(&self, actor: &Role) -> Result<()> {
        if actor.holds(ActionKind::ManageRoles) {
            Ok(())
        } else {
            Err(Error::InsufficientPrivilege(actor.id()))
        }
    }

    fn ensure_may_touch(&self, actor: &Role, target: RoleId) -> Result<()> {
        if target.is_root() && !actor.is_root() {
            return Err(Error::CannotModifyRoot);
        }
        Ok(())
    }

    /// The escalation check: some action the actor holds must cover the
    /// grant, and for recurring kinds the granted amount must also fit
    /// within the actor's remaining budget on the covering instance.
    fn ensure_within_authority(
        &self,
        actor: &Role,
        grant: &Action,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if actor.is_root() {
            return Ok(());
        }

        for own in actor.actions() {
            if !own.covers_grant(grant) {
                continue;
            }
            if own.is_wildcard() {
                return Ok(());
            }
            match own.window_secs() {
                // One-time kinds are bounded by the total limit, which
                // `covers_grant` already enforced.
                None => return Ok(()),
                Some(_) => {
                    let remaining = self
                        .ledger
                        .remaining(actor.id(), own, now)
                        .unwrap_or(u64::MAX);
                    if grant.limit().unwrap_or(0) <= remaining {
                        return Ok(());
                    }
                }
            }
        }

        Err(Error::PrivilegeEscalation {
            actor: actor.id(),
            grant: Box::new(grant.clone()),
        })
    }
}
