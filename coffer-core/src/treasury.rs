//! The treasury aggregate: one shared account and its full role state.
//!
//! The treasury is an in-memory value during an authorization cycle. The
//! persistence collaborator loads and saves snapshots around it (see
//! [`crate::wire`]); the version counter gives that collaborator an
//! optimistic-concurrency handle, bumping on every mutation.

use crate::action::Action;
use crate::error::{Error, Result};
use crate::role::{Authority, Role, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed size of a treasury identifier in bytes.
pub const TREASURY_ID_LEN: usize = 32;

/// Reserved fill byte used to right-pad short seeds.
pub const TREASURY_ID_FILL: u8 = 0x00;

/// Stable identifier of one treasury.
///
/// Left-identifying: a seed shorter than [`TREASURY_ID_LEN`] is
/// right-padded with [`TREASURY_ID_FILL`]; a longer seed is rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TreasuryId([u8; TREASURY_ID_LEN]);

impl TreasuryId {
    /// Build an id from a seed of at most [`TREASURY_ID_LEN`] bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        if seed.len() > TREASURY_ID_LEN {
            return Err(Error::Validation(format!(
                "treasury seed is {} bytes, maximum is {}",
                seed.len(),
                TREASURY_ID_LEN
            )));
        }
        let mut bytes = [TREASURY_ID_FILL; TREASURY_ID_LEN];
        bytes[..seed.len()].copy_from_slice(seed);
        Ok(Self(bytes))
    }

    pub const fn from_bytes(bytes: [u8; TREASURY_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; TREASURY_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for TreasuryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One treasury: identifier, role map, and mutation counter.
///
/// Exactly one role has id 0 and is root; it is seeded at construction,
/// always holds `Universal`, and can never be removed or demoted. Roles
/// are immutable except through these operations; every mutation bumps
/// the version counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treasury {
    id: TreasuryId,
    roles: BTreeMap<RoleId, Role>,
    version: u64,
}

impl Treasury {
    /// Create a treasury with its root role holding `Universal`.
    pub fn new(id: TreasuryId, root_authority: Authority) -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(RoleId::ROOT, Role::root(root_authority));
        Self {
            id,
            roles,
            version: 0,
        }
    }

    pub fn id(&self) -> &TreasuryId {
        &self.id
    }

    /// Monotonically increasing mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn contains(&self, id: RoleId) -> bool {
        self.roles.contains_key(&id)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    /// Look up a role. Absent ids reject with `NotFound`.
    pub fn role(&self, id: RoleId) -> Result<&Role> {
        self.roles.get(&id).ok_or(Error::NotFound(id))
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Insert a new role.
    ///
    /// Fails with `RootConflict` for id 0 (root is seeded at construction)
    /// and `DuplicateId` for any id already present.
    pub fn insert_role(&mut self, role: Role) -> Result<()> {
        let id = role.id();
        if id.is_root() {
            return Err(Error::RootConflict);
        }
        if self.roles.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        self.roles.insert(id, role);
        self.bump();
        Ok(())
    }

    /// Remove a role, returning it. Root is never removable.
    ///
    /// The caller is responsible for purging the removed role's budget
    /// entries in the same atomic step (the engine does this).
    pub fn remove_role(&mut self, id: RoleId) -> Result<Role> {
        if id.is_root() {
            return Err(Error::CannotRemoveRoot);
        }
        let role = self.roles.remove(&id).ok_or(Error::NotFound(id))?;
        self.bump();
        Ok(role)
    }

    /// Add and remove actions on an existing role.
    ///
    /// Removing `Universal` from root would demote it and is rejected with
    /// `CannotModifyRoot` regardless of who asks.
    pub fn mutate_actions(
        &mut self,
        id: RoleId,
        add: &[Action],
        remove: &[Action],
    ) -> Result<()> {
        if id.is_root() && remove.contains(&Action::Universal) {
            return Err(Error::CannotModifyRoot);
        }
        let role = self.roles.get_mut(&id).ok_or(Error::NotFound(id))?;
        for action in add {
            role.grant(action.clone());
        }
        for action in remove {
            role.revoke(action);
        }
        self.bump();
        Ok(())
    }
}
