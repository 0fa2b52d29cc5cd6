//! Roles: the signers attached to one treasury.
//!
//! A [`Role`] pairs a single-byte id with an [`Authority`] descriptor and
//! an ordered set of granted [`Action`]s. Role 0 is always the root signer:
//! it holds [`Action::Universal`] and can never be removed or demoted.
//!
//! The engine never inspects key bytes cryptographically. Signature
//! verification happens in a collaborator; here an authority is only ever
//! compared for equality, via [`SignerVerifier`].

use crate::action::{Action, ActionKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a role within one treasury. Single byte, unique,
/// immutable after creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RoleId(u8);

impl RoleId {
    /// The root role id. Reserved; seeded when the treasury is created.
    pub const ROOT: RoleId = RoleId(0);

    /// Validated construction from an untrusted integer.
    ///
    /// Returns `IdOutOfRange` for values above 255.
    pub fn new(id: u32) -> Result<Self> {
        u8::try_from(id)
            .map(RoleId)
            .map_err(|_| Error::IdOutOfRange(id))
    }

    /// Construct from a known-good byte.
    pub const fn from_u8(id: u8) -> Self {
        RoleId(id)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag identifying the signature scheme an authority key belongs to.
///
/// Opaque to this engine: no verification happens here, the tag exists so
/// that equality checks cannot conflate keys across schemes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
}

/// A role's authority descriptor: verification key bytes plus scheme tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Authority {
    key: [u8; 32],
    scheme: SignatureScheme,
}

impl Authority {
    pub const fn new(key: [u8; 32], scheme: SignatureScheme) -> Self {
        Self { key, scheme }
    }

    pub const fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub const fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Short hex fingerprint for logs and audit records.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.key[..8])
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.scheme, self.fingerprint())
    }
}

/// Identity collaborator: decides whether a claimed signer matches a
/// role's authority descriptor.
///
/// The engine only ever needs this ownership check; cryptographic
/// verification of the signature itself lives outside the crate.
pub trait SignerVerifier: Send + Sync + fmt::Debug {
    fn matches(&self, expected: &Authority, claimed: &Authority) -> bool;
}

/// Default verifier: byte-for-byte equality of key and scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqualityVerifier;

impl SignerVerifier for EqualityVerifier {
    fn matches(&self, expected: &Authority, claimed: &Authority) -> bool {
        expected == claimed
    }
}

/// One signer within a treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    authority: Authority,
    /// The role that created this one. Absent only for root.
    parent: Option<RoleId>,
    actions: Vec<Action>,
}

impl Role {
    /// Create a non-root role.
    pub fn new(
        id: RoleId,
        authority: Authority,
        parent: RoleId,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id,
            authority,
            parent: Some(parent),
            actions,
        }
    }

    /// Create the root role: id 0, no parent, `Universal`.
    pub fn root(authority: Authority) -> Self {
        Self {
            id: RoleId::ROOT,
            authority,
            parent: None,
            actions: vec![Action::Universal],
        }
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn parent(&self) -> Option<RoleId> {
        self.parent
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    /// Effective-permission check for a kind: true if any granted action is
    /// of this kind or is a wildcard covering it.
    pub fn holds(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.covers_kind(kind))
    }

    /// Whether a wildcard action covers this kind (no budget applies).
    pub fn wildcard_for(&self, kind: ActionKind) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.is_wildcard() && a.covers_kind(kind))
    }

    /// All granted instances matching a predicate, in grant order.
    ///
    /// A role may hold several instances of one kind with different
    /// parameters; each is checked independently by the engine.
    pub fn instances<'a>(
        &'a self,
        pred: impl Fn(&Action) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Action> {
        self.actions.iter().filter(move |&a| pred(a))
    }

    /// Grant an action. Duplicate grants are collapsed.
    pub(crate) fn grant(&mut self, action: Action) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    /// Revoke an action. Returns whether it was present.
    pub(crate) fn revoke(&mut self, action: &Action) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| a != action);
        self.actions.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(byte: u8) -> Authority {
        Authority::new([byte; 32], SignatureScheme::Ed25519)
    }

    #[test]
    fn test_role_id_range() {
        assert_eq!(RoleId::new(0).unwrap(), RoleId::ROOT);
        assert_eq!(RoleId::new(255).unwrap().value(), 255);
        assert_eq!(RoleId::new(256), Err(Error::IdOutOfRange(256)));
        assert_eq!(RoleId::new(70_000), Err(Error::IdOutOfRange(70_000)));
    }

    #[test]
    fn test_root_holds_everything() {
        let root = Role::root(authority(1));
        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert!(root.holds(ActionKind::ManageRoles));
        assert!(root.holds(ActionKind::CurrencyRecurring));
        assert!(root.holds(ActionKind::SubAccount));
    }

    #[test]
    fn test_holds_is_union_of_grants() {
        let role = Role::new(
            RoleId::from_u8(3),
            authority(2),
            RoleId::ROOT,
            vec![
                Action::CurrencyOnce { amount: 10 },
                Action::ProgramAny,
            ],
        );
        assert!(role.holds(ActionKind::CurrencyOnce));
        assert!(role.holds(ActionKind::ProgramAny));
        assert!(!role.holds(ActionKind::ManageRoles));
        assert!(!role.holds(ActionKind::TokenOnce));
    }

    #[test]
    fn test_all_except_manage_roles_wildcard() {
        let role = Role::new(
            RoleId::from_u8(4),
            authority(3),
            RoleId::ROOT,
            vec![Action::AllExceptManageRoles],
        );
        assert!(role.holds(ActionKind::CurrencyRecurring));
        assert!(role.holds(ActionKind::StakeAll));
        assert!(!role.holds(ActionKind::ManageRoles));
        assert!(role.wildcard_for(ActionKind::StakeOnce).is_some());
        assert!(role.wildcard_for(ActionKind::ManageRoles).is_none());
    }

    #[test]
    fn test_grant_revoke() {
        let mut role = Role::new(RoleId::from_u8(5), authority(4), RoleId::ROOT, vec![]);
        role.grant(Action::StakeAll);
        role.grant(Action::StakeAll); // collapsed
        assert_eq!(role.actions().len(), 1);
        assert!(role.revoke(&Action::StakeAll));
        assert!(!role.revoke(&Action::StakeAll));
        assert!(role.actions().is_empty());
    }

    #[test]
    fn test_equality_verifier() {
        let verifier = EqualityVerifier;
        let a = authority(9);
        let same = authority(9);
        let other = authority(10);
        let other_scheme = Authority::new([9; 32], SignatureScheme::Secp256k1);
        assert!(verifier.matches(&a, &same));
        assert!(!verifier.matches(&a, &other));
        assert!(!verifier.matches(&a, &other_scheme));
    }
}
