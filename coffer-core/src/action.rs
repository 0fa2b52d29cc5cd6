//! The action model: the closed set of capabilities a role can hold.
//!
//! An [`Action`] is one granted capability, a kind plus its parameters.
//! A role's effective permission for a request is the union of its granted
//! actions; [`Action::Universal`] and [`Action::AllExceptManageRoles`] act
//! as wildcards. Crucially, delegation can only shrink authority: a role
//! may grant another role an action only if one of its own actions
//! [covers](Action::covers_grant) it.
//!
//! Permission strings from configuration surfaces (`kind:param:param`) are
//! parsed here, at the boundary, into the closed enum; loosely-typed
//! permission data never reaches the engine.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of program, destination, and mint identifiers.
pub const ID_LEN: usize = 32;

macro_rules! id32 {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name([u8; ID_LEN]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let bytes = hex::decode(s)
                    .map_err(|e| Error::Validation(format!("invalid hex id '{s}': {e}")))?;
                let bytes: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
                    Error::Validation(format!("id must be {ID_LEN} bytes of hex, got '{s}'"))
                })?;
                Ok(Self(bytes))
            }
        }
    };
}

id32! {
    /// Identifier of an external program a role may invoke.
    ProgramId
}
id32! {
    /// Identifier of a payout destination account.
    Destination
}
id32! {
    /// Identifier of a fungible-token mint.
    Mint
}

/// A single granted capability: kind plus kind-specific parameters.
///
/// The set is closed: unknown kinds are rejected at the parse boundary,
/// never smuggled through as opaque data.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Grants every other kind implicitly. Reserved for root.
    Universal,
    /// May add/remove roles and their actions, subject to delegation rules.
    ManageRoles,
    /// Union of every non-management kind.
    AllExceptManageRoles,
    /// May invoke any external program.
    ProgramAny,
    /// May invoke only the named program.
    ProgramOne { program: ProgramId },
    /// May invoke any program on the treasury-level curated allow-list.
    ProgramCurated,
    /// May invoke the named program, spending only from an isolated balance.
    ProgramScoped {
        program: ProgramId,
        isolated_balance: u64,
    },
    /// One-time, non-recurring currency spend cap.
    CurrencyOnce { amount: u64 },
    /// Currency spend cap that resets every `window_secs`.
    CurrencyRecurring { amount: u64, window_secs: u64 },
    /// One-time currency cap restricted to one destination.
    CurrencyToDestination {
        destination: Destination,
        amount: u64,
    },
    /// Recurring currency cap restricted to one destination.
    CurrencyRecurringToDestination {
        destination: Destination,
        amount: u64,
        window_secs: u64,
    },
    /// One-time token spend cap for one mint.
    TokenOnce { mint: Mint, amount: u64 },
    /// Recurring token spend cap for one mint.
    TokenRecurring {
        mint: Mint,
        amount: u64,
        window_secs: u64,
    },
    /// One-time token cap for one mint, restricted to one destination.
    TokenToDestination {
        mint: Mint,
        destination: Destination,
        amount: u64,
    },
    /// Recurring token cap for one mint, restricted to one destination.
    TokenRecurringToDestination {
        mint: Mint,
        destination: Destination,
        amount: u64,
        window_secs: u64,
    },
    /// One-time staking cap.
    StakeOnce { amount: u64 },
    /// Recurring staking cap.
    StakeRecurring { amount: u64, window_secs: u64 },
    /// May stake without an amount bound.
    StakeAll,
    /// May create/toggle isolated sub-balances under the treasury.
    SubAccount,
}

/// Fieldless discriminant of [`Action`], for cheap permission checks and
/// rejection messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Universal,
    ManageRoles,
    AllExceptManageRoles,
    ProgramAny,
    ProgramOne,
    ProgramCurated,
    ProgramScoped,
    CurrencyOnce,
    CurrencyRecurring,
    CurrencyToDestination,
    CurrencyRecurringToDestination,
    TokenOnce,
    TokenRecurring,
    TokenToDestination,
    TokenRecurringToDestination,
    StakeOnce,
    StakeRecurring,
    StakeAll,
    SubAccount,
}

impl ActionKind {
    /// Machine-readable kind name, identical to the permission-string form.
    pub fn name(self) -> &'static str {
        match self {
            Self::Universal => "universal",
            Self::ManageRoles => "manage_roles",
            Self::AllExceptManageRoles => "all_except_manage_roles",
            Self::ProgramAny => "program_any",
            Self::ProgramOne => "program_one",
            Self::ProgramCurated => "program_curated",
            Self::ProgramScoped => "program_scoped",
            Self::CurrencyOnce => "currency_once",
            Self::CurrencyRecurring => "currency_recurring",
            Self::CurrencyToDestination => "currency_to_destination",
            Self::CurrencyRecurringToDestination => "currency_recurring_to_destination",
            Self::TokenOnce => "token_once",
            Self::TokenRecurring => "token_recurring",
            Self::TokenToDestination => "token_to_destination",
            Self::TokenRecurringToDestination => "token_recurring_to_destination",
            Self::StakeOnce => "stake_once",
            Self::StakeRecurring => "stake_recurring",
            Self::StakeAll => "stake_all",
            Self::SubAccount => "sub_account",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Action {
    /// The kind discriminant of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Universal => ActionKind::Universal,
            Self::ManageRoles => ActionKind::ManageRoles,
            Self::AllExceptManageRoles => ActionKind::AllExceptManageRoles,
            Self::ProgramAny => ActionKind::ProgramAny,
            Self::ProgramOne { .. } => ActionKind::ProgramOne,
            Self::ProgramCurated => ActionKind::ProgramCurated,
            Self::ProgramScoped { .. } => ActionKind::ProgramScoped,
            Self::CurrencyOnce { .. } => ActionKind::CurrencyOnce,
            Self::CurrencyRecurring { .. } => ActionKind::CurrencyRecurring,
            Self::CurrencyToDestination { .. } => ActionKind::CurrencyToDestination,
            Self::CurrencyRecurringToDestination { .. } => {
                ActionKind::CurrencyRecurringToDestination
            }
            Self::TokenOnce { .. } => ActionKind::TokenOnce,
            Self::TokenRecurring { .. } => ActionKind::TokenRecurring,
            Self::TokenToDestination { .. } => ActionKind::TokenToDestination,
            Self::TokenRecurringToDestination { .. } => ActionKind::TokenRecurringToDestination,
            Self::StakeOnce { .. } => ActionKind::StakeOnce,
            Self::StakeRecurring { .. } => ActionKind::StakeRecurring,
            Self::StakeAll => ActionKind::StakeAll,
            Self::SubAccount => ActionKind::SubAccount,
        }
    }

    /// Whether this action is one of the two wildcard kinds.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Universal | Self::AllExceptManageRoles)
    }

    /// Wildcard covering relation over kinds.
    ///
    /// `Universal` satisfies any kind check; `AllExceptManageRoles`
    /// satisfies any kind except the management kinds it explicitly
    /// excludes.
    pub fn covers_kind(&self, kind: ActionKind) -> bool {
        match self {
            Self::Universal => true,
            Self::AllExceptManageRoles => {
                !matches!(kind, ActionKind::ManageRoles | ActionKind::Universal)
            }
            other => other.kind() == kind,
        }
    }

    /// The spend cap this action carries, if it consumes budget.
    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::ProgramScoped {
                isolated_balance, ..
            } => Some(*isolated_balance),
            Self::CurrencyOnce { amount }
            | Self::CurrencyRecurring { amount, .. }
            | Self::CurrencyToDestination { amount, .. }
            | Self::CurrencyRecurringToDestination { amount, .. }
            | Self::TokenOnce { amount, .. }
            | Self::TokenRecurring { amount, .. }
            | Self::TokenToDestination { amount, .. }
            | Self::TokenRecurringToDestination { amount, .. }
            | Self::StakeOnce { amount }
            | Self::StakeRecurring { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// The recurring window in seconds, if this action ever resets.
    ///
    /// One-time kinds return `None`: their window is infinite and they are
    /// exhausted permanently once consumed.
    pub fn window_secs(&self) -> Option<u64> {
        match self {
            Self::CurrencyRecurring { window_secs, .. }
            | Self::CurrencyRecurringToDestination { window_secs, .. }
            | Self::TokenRecurring { window_secs, .. }
            | Self::TokenRecurringToDestination { window_secs, .. }
            | Self::StakeRecurring { window_secs, .. } => Some(*window_secs),
            _ => None,
        }
    }

    /// The destination this action is scoped to, if any.
    pub fn destination(&self) -> Option<&Destination> {
        match self {
            Self::CurrencyToDestination { destination, .. }
            | Self::CurrencyRecurringToDestination { destination, .. }
            | Self::TokenToDestination { destination, .. }
            | Self::TokenRecurringToDestination { destination, .. } => Some(destination),
            _ => None,
        }
    }

    /// Whether this action draws down a tracked budget when exercised.
    pub fn is_consumable(&self) -> bool {
        self.limit().is_some()
    }

    /// Whether this action applies to a plain currency transfer.
    pub fn accepts_currency(&self) -> bool {
        matches!(
            self,
            Self::CurrencyOnce { .. }
                | Self::CurrencyRecurring { .. }
                | Self::CurrencyToDestination { .. }
                | Self::CurrencyRecurringToDestination { .. }
        )
    }

    /// Whether this action applies to a transfer of the given mint.
    pub fn accepts_token(&self, mint: &Mint) -> bool {
        match self {
            Self::TokenOnce { mint: m, .. }
            | Self::TokenRecurring { mint: m, .. }
            | Self::TokenToDestination { mint: m, .. }
            | Self::TokenRecurringToDestination { mint: m, .. } => m == mint,
            _ => false,
        }
    }

    /// Whether this action applies to a bounded staking operation.
    pub fn accepts_stake(&self) -> bool {
        matches!(self, Self::StakeOnce { .. } | Self::StakeRecurring { .. })
    }

    /// Structural delegation check: may a holder of `self` grant `grant`?
    ///
    /// Authority can only shrink. Amounts must not grow, recurring windows
    /// must not shorten (a shorter window at the same amount is a higher
    /// spend rate), and scopes (program, destination, mint) must match
    /// exactly. This is the structural half of the escalation check; the
    /// delegation validator additionally bounds granted amounts by the
    /// grantor's *remaining* budget.
    pub fn covers_grant(&self, grant: &Action) -> bool {
        use Action::*;
        match self {
            Universal => true,
            AllExceptManageRoles => !matches!(grant, ManageRoles | Universal),
            ManageRoles => matches!(grant, ManageRoles),
            ProgramAny => matches!(grant, ProgramAny | ProgramOne { .. } | ProgramCurated),
            ProgramOne { program } => {
                matches!(grant, ProgramOne { program: g } if g == program)
            }
            ProgramCurated => matches!(grant, ProgramCurated),
            ProgramScoped {
                program,
                isolated_balance,
            } => matches!(
                grant,
                ProgramScoped { program: g, isolated_balance: b }
                    if g == program && b <= isolated_balance
            ),
            CurrencyOnce { amount } => {
                matches!(grant, CurrencyOnce { amount: a } if a <= amount)
            }
            CurrencyRecurring {
                amount,
                window_secs,
            } => matches!(
                grant,
                CurrencyRecurring { amount: a, window_secs: w }
                    if a <= amount && w >= window_secs
            ),
            CurrencyToDestination {
                destination,
                amount,
            } => matches!(
                grant,
                CurrencyToDestination { destination: d, amount: a }
                    if d == destination && a <= amount
            ),
            CurrencyRecurringToDestination {
                destination,
                amount,
                window_secs,
            } => matches!(
                grant,
                CurrencyRecurringToDestination { destination: d, amount: a, window_secs: w }
                    if d == destination && a <= amount && w >= window_secs
            ),
            TokenOnce { mint, amount } => matches!(
                grant,
                TokenOnce { mint: m, amount: a } if m == mint && a <= amount
            ),
            TokenRecurring {
                mint,
                amount,
                window_secs,
            } => matches!(
                grant,
                TokenRecurring { mint: m, amount: a, window_secs: w }
                    if m == mint && a <= amount && w >= window_secs
            ),
            TokenToDestination {
                mint,
                destination,
                amount,
            } => matches!(
                grant,
                TokenToDestination { mint: m, destination: d, amount: a }
                    if m == mint && d == destination && a <= amount
            ),
            TokenRecurringToDestination {
                mint,
                destination,
                amount,
                window_secs,
            } => matches!(
                grant,
                TokenRecurringToDestination { mint: m, destination: d, amount: a, window_secs: w }
                    if m == mint && d == destination && a <= amount && w >= window_secs
            ),
            StakeOnce { amount } => {
                matches!(grant, StakeOnce { amount: a } if a <= amount)
            }
            StakeRecurring {
                amount,
                window_secs,
            } => matches!(
                grant,
                StakeRecurring { amount: a, window_secs: w }
                    if a <= amount && w >= window_secs
            ),
            StakeAll => matches!(
                grant,
                StakeAll | StakeOnce { .. } | StakeRecurring { .. }
            ),
            SubAccount => matches!(grant, SubAccount),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Action::*;
        match self {
            Universal | ManageRoles | AllExceptManageRoles | ProgramAny | ProgramCurated
            | StakeAll | SubAccount => write!(f, "{}", self.kind()),
            ProgramOne { program } => write!(f, "program_one:{program}"),
            ProgramScoped {
                program,
                isolated_balance,
            } => write!(f, "program_scoped:{program}:{isolated_balance}"),
            CurrencyOnce { amount } => write!(f, "currency_once:{amount}"),
            CurrencyRecurring {
                amount,
                window_secs,
            } => write!(f, "currency_recurring:{amount}:{window_secs}"),
            CurrencyToDestination {
                destination,
                amount,
            } => write!(f, "currency_to_destination:{destination}:{amount}"),
            CurrencyRecurringToDestination {
                destination,
                amount,
                window_secs,
            } => write!(
                f,
                "currency_recurring_to_destination:{destination}:{amount}:{window_secs}"
            ),
            TokenOnce { mint, amount } => write!(f, "token_once:{mint}:{amount}"),
            TokenRecurring {
                mint,
                amount,
                window_secs,
            } => write!(f, "token_recurring:{mint}:{amount}:{window_secs}"),
            TokenToDestination {
                mint,
                destination,
                amount,
            } => write!(f, "token_to_destination:{mint}:{destination}:{amount}"),
            TokenRecurringToDestination {
                mint,
                destination,
                amount,
                window_secs,
            } => write!(
                f,
                "token_recurring_to_destination:{mint}:{destination}:{amount}:{window_secs}"
            ),
            StakeOnce { amount } => write!(f, "stake_once:{amount}"),
            StakeRecurring {
                amount,
                window_secs,
            } => write!(f, "stake_recurring:{amount}:{window_secs}"),
        }
    }
}

fn parse_amount(s: &str) -> Result<u64> {
    s.parse::<u64>()
        .map_err(|_| Error::Validation(format!("invalid amount '{s}'")))
}

fn parse_window(s: &str) -> Result<u64> {
    let window = s
        .parse::<u64>()
        .map_err(|_| Error::Validation(format!("invalid window '{s}'")))?;
    if window == 0 {
        return Err(Error::Validation("window must be non-zero".to_string()));
    }
    if window > i64::MAX as u64 {
        return Err(Error::Validation(format!("window '{s}' too large")));
    }
    Ok(window)
}

impl FromStr for Action {
    type Err = Error;

    /// Parse the `kind:param:param` permission-string surface.
    ///
    /// Arity and parameter shapes are validated exhaustively; unknown kinds
    /// are rejected rather than carried as opaque data.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let arity_err = || Error::Validation(format!("wrong parameter count for '{s}'"));

        let action = match parts.as_slice() {
            ["universal"] => Action::Universal,
            ["manage_roles"] => Action::ManageRoles,
            ["all_except_manage_roles"] => Action::AllExceptManageRoles,
            ["program_any"] => Action::ProgramAny,
            ["program_curated"] => Action::ProgramCurated,
            ["stake_all"] => Action::StakeAll,
            ["sub_account"] => Action::SubAccount,
            ["program_one", program] => Action::ProgramOne {
                program: program.parse()?,
            },
            ["program_scoped", program, balance] => Action::ProgramScoped {
                program: program.parse()?,
                isolated_balance: parse_amount(balance)?,
            },
            ["currency_once", amount] => Action::CurrencyOnce {
                amount: parse_amount(amount)?,
            },
            ["currency_recurring", amount, window] => Action::CurrencyRecurring {
                amount: parse_amount(amount)?,
                window_secs: parse_window(window)?,
            },
            ["currency_to_destination", destination, amount] => Action::CurrencyToDestination {
                destination: destination.parse()?,
                amount: parse_amount(amount)?,
            },
            ["currency_recurring_to_destination", destination, amount, window] => {
                Action::CurrencyRecurringToDestination {
                    destination: destination.parse()?,
                    amount: parse_amount(amount)?,
                    window_secs: parse_window(window)?,
                }
            }
            ["token_once", mint, amount] => Action::TokenOnce {
                mint: mint.parse()?,
                amount: parse_amount(amount)?,
            },
            ["token_recurring", mint, amount, window] => Action::TokenRecurring {
                mint: mint.parse()?,
                amount: parse_amount(amount)?,
                window_secs: parse_window(window)?,
            },
            ["token_to_destination", mint, destination, amount] => Action::TokenToDestination {
                mint: mint.parse()?,
                destination: destination.parse()?,
                amount: parse_amount(amount)?,
            },
            ["token_recurring_to_destination", mint, destination, amount, window] => {
                Action::TokenRecurringToDestination {
                    mint: mint.parse()?,
                    destination: destination.parse()?,
                    amount: parse_amount(amount)?,
                    window_secs: parse_window(window)?,
                }
            }
            ["stake_once", amount] => Action::StakeOnce {
                amount: parse_amount(amount)?,
            },
            ["stake_recurring", amount, window] => Action::StakeRecurring {
                amount: parse_amount(amount)?,
                window_secs: parse_window(window)?,
            },
            [kind, ..]
                if matches!(
                    *kind,
                    "universal"
                        | "manage_roles"
                        | "all_except_manage_roles"
                        | "program_any"
                        | "program_curated"
                        | "stake_all"
                        | "sub_account"
                        | "program_one"
                        | "program_scoped"
                        | "currency_once"
                        | "currency_recurring"
                        | "currency_to_destination"
                        | "currency_recurring_to_destination"
                        | "token_once"
                        | "token_recurring"
                        | "token_to_destination"
                        | "token_recurring_to_destination"
                        | "stake_once"
                        | "stake_recurring"
                ) =>
            {
                return Err(arity_err())
            }
            [kind, ..] => {
                return Err(Error::Validation(format!("unknown action kind '{kind}'")))
            }
            [] => return Err(Error::Validation("empty permission string".to_string())),
        };

        Ok(action)
    }
}
