//! Externally configured registries the engine reads, never writes.
//!
//! The curated program allow-list backs `ProgramCurated` checks; the
//! sub-account directory backs `SubAccount`-gated operations. Both are
//! collaborator traits: the data lives outside the engine, and the engine
//! fails closed when no implementation is configured.

use crate::action::{Destination, ProgramId};
use std::collections::BTreeSet;
use std::fmt;

/// Treasury-level curated allow-list of invocable programs.
pub trait CuratedPrograms: Send + Sync + fmt::Debug {
    fn contains(&self, program: &ProgramId) -> bool;
}

/// A fixed in-memory allow-list.
#[derive(Debug, Default, Clone)]
pub struct StaticProgramList {
    programs: BTreeSet<ProgramId>,
}

impl StaticProgramList {
    pub fn new(programs: impl IntoIterator<Item = ProgramId>) -> Self {
        Self {
            programs: programs.into_iter().collect(),
        }
    }
}

impl CuratedPrograms for StaticProgramList {
    fn contains(&self, program: &ProgramId) -> bool {
        self.programs.contains(program)
    }
}

/// Directory of isolated sub-balances configured under the treasury.
pub trait SubAccountDirectory: Send + Sync + fmt::Debug {
    fn exists(&self, account: &Destination) -> bool;
}

/// A fixed in-memory sub-account directory.
#[derive(Debug, Default, Clone)]
pub struct StaticSubAccounts {
    accounts: BTreeSet<Destination>,
}

impl StaticSubAccounts {
    pub fn new(accounts: impl IntoIterator<Item = Destination>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
        }
    }
}

impl SubAccountDirectory for StaticSubAccounts {
    fn exists(&self, account: &Destination) -> bool {
        self.accounts.contains(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ID_LEN;

    #[test]
    fn test_static_program_list() {
        let p1 = ProgramId::from_bytes([1; ID_LEN]);
        let p2 = ProgramId::from_bytes([2; ID_LEN]);
        let list = StaticProgramList::new([p1]);
        assert!(list.contains(&p1));
        assert!(!list.contains(&p2));
    }

    #[test]
    fn test_static_sub_accounts() {
        let a = Destination::from_bytes([3; ID_LEN]);
        let directory = StaticSubAccounts::new([a]);
        assert!(directory.exists(&a));
        assert!(!directory.exists(&Destination::from_bytes([4; ID_LEN])));
    }
}
