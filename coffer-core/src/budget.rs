//! The budget ledger: cumulative consumption against consumable actions.
//!
//! Each consumable [`Action`] instance a role holds gets one
//! [`BudgetEntry`], created on first consumption attempt and keyed by
//! `(role id, action instance)`. Recurring entries reset when their window
//! elapses; one-time entries never reset and are exhausted permanently at
//! their limit.
//!
//! [`BudgetLedger::check_and_consume`] is a single all-or-nothing step: the
//! candidate entry is staged off to the side and written back only when
//! every check passes, so a rejected request leaves the ledger
//! byte-for-byte unchanged, including window state and entry creation.

use crate::action::{Action, Destination};
use crate::error::{Error, Result};
use crate::role::RoleId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Consumption state for one consumable action instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetEntry {
    /// Amount consumed in the current window.
    pub consumed: u64,
    /// Start of the current window.
    pub window_start: DateTime<Utc>,
}

/// Flat row used for the ledger's serialized form.
///
/// Snapshots store rows rather than a map keyed by composite values, which
/// keeps the CBOR encoding simple and deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerRow {
    role: RoleId,
    action: Action,
    consumed: u64,
    window_start: DateTime<Utc>,
}

/// Tracks consumption for every consumable action across one treasury.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LedgerRow>", into = "Vec<LedgerRow>")]
pub struct BudgetLedger {
    entries: BTreeMap<(RoleId, Action), BudgetEntry>,
}

impl From<Vec<LedgerRow>> for BudgetLedger {
    fn from(rows: Vec<LedgerRow>) -> Self {
        let entries = rows
            .into_iter()
            .map(|row| {
                (
                    (row.role, row.action),
                    BudgetEntry {
                        consumed: row.consumed,
                        window_start: row.window_start,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl From<BudgetLedger> for Vec<LedgerRow> {
    fn from(ledger: BudgetLedger) -> Self {
        ledger
            .entries
            .into_iter()
            .map(|((role, action), entry)| LedgerRow {
                role,
                action,
                consumed: entry.consumed,
                window_start: entry.window_start,
            })
            .collect()
    }
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The tracked entry for one action instance, if it exists yet.
    pub fn entry(&self, role: RoleId, action: &Action) -> Option<&BudgetEntry> {
        self.entries.get(&(role, action.clone()))
    }

    /// Atomically check a consumption request and record it on success.
    ///
    /// Returns the total consumed in the current window after recording.
    /// A zero `amount` always succeeds (permission probing). Rejections
    /// leave the ledger untouched: no partial consumption, no premature
    /// window reset, no entry creation.
    pub fn check_and_consume(
        &mut self,
        role: RoleId,
        action: &Action,
        amount: u64,
        destination: Option<&Destination>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let Some(limit) = action.limit() else {
            // Non-consumable actions carry no budget; nothing to track.
            return Ok(0);
        };

        if let Some(configured) = action.destination() {
            match destination {
                Some(requested) if requested == configured => {}
                Some(requested) => {
                    return Err(Error::WrongDestination {
                        requested: *requested,
                        configured: *configured,
                    })
                }
                None => {
                    return Err(Error::Validation(
                        "destination-scoped limit requires a destination".to_string(),
                    ))
                }
            }
        }

        let key = (role, action.clone());
        let mut staged = self
            .entries
            .get(&key)
            .cloned()
            .unwrap_or(BudgetEntry {
                consumed: 0,
                window_start: now,
            });

        // window_start only ever moves forward; an earlier `now` means the
        // clock collaborator regressed.
        if now < staged.window_start {
            return Err(Error::ClockRegression {
                now,
                last: staged.window_start,
            });
        }

        if let Some(window_secs) = action.window_secs() {
            if now.signed_duration_since(staged.window_start)
                >= Duration::seconds(window_secs as i64)
            {
                staged.consumed = 0;
                staged.window_start = now;
            }
        }

        let next = match staged.consumed.checked_add(amount) {
            Some(next) if next <= limit => next,
            _ => {
                return Err(Error::LimitExceeded {
                    consumed: staged.consumed,
                    requested: amount,
                    limit,
                })
            }
        };

        staged.consumed = next;
        self.entries.insert(key, staged);
        Ok(next)
    }

    /// Remaining budget for one action instance at `now`, window-aware.
    ///
    /// Read-only view used by the delegation validator to bound grants.
    /// Returns `None` for non-consumable actions.
    pub fn remaining(&self, role: RoleId, action: &Action, now: DateTime<Utc>) -> Option<u64> {
        let limit = action.limit()?;
        let Some(entry) = self.entries.get(&(role, action.clone())) else {
            return Some(limit);
        };
        if let Some(window_secs) = action.window_secs() {
            if now.signed_duration_since(entry.window_start)
                >= Duration::seconds(window_secs as i64)
            {
                return Some(limit);
            }
        }
        Some(limit.saturating_sub(entry.consumed))
    }

    /// Purge every entry owned by a role. Called when the role is removed.
    pub fn purge_role(&mut self, role: RoleId) {
        self.entries.retain(|(owner, _), _| *owner != role);
    }

    /// Purge the entry for one revoked action instance.
    pub fn purge_action(&mut self, role: RoleId, action: &Action) {
        self.entries.remove(&(role, action.clone()));
    }
}
