//! Cross-cutting invariants: consumption never exceeds limits, versions
//! only grow, removal cascades, snapshots preserve everything.

use chrono::{DateTime, Utc};
use coffer::*;

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
    let mut treasury =
        Treasury::new(TreasuryId::from_seed(b"invariants").unwrap(), authority(0));
    treasury
        .insert_role(Role::new(
            RoleId::new(1).unwrap(),
            authority(1),
            ROOT_ROLE,
            actions,
        ))
        .unwrap();
    Engine::new(treasury)
}

#[test]
fn test_consumed_never_exceeds_limit() {
    let cap = Action::CurrencyRecurring {
        amount: 100,
        window_secs: DAY,
    };
    let mut engine = engine_with_role(vec![cap.clone()]);
    let r1 = RoleId::new(1).unwrap();
    let dest = destination(2);

    // A mixed sequence of amounts across several window boundaries; at
    // every observation point consumed <= limit must hold.
    let attempts: [(i64, u64); 10] = [
        (0, 40),
        (10, 40),
        (20, 40),
        (30, 20),
        (DAY as i64, 99),
        (DAY as i64 + 5, 2),
        (DAY as i64 + 6, 1),
        (2 * DAY as i64, 100),
        (2 * DAY as i64 + 1, 1),
        (3 * DAY as i64, 0),
    ];

    for (secs, amount) in attempts {
        let _ = engine.authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount,
                destination: dest,
            },
            at(secs),
        ));
        if let Some(entry) = engine.ledger().entry(r1, &cap) {
            assert!(
                entry.consumed <= 100,
                "consumed {} exceeded limit at t={}",
                entry.consumed,
                secs
            );
        }
    }
}

#[test]
fn test_version_strictly_increases_on_mutations() {
    let mut engine = engine_with_role(vec![]);
    let mut last = engine.treasury().version();

    let mutations = [
        Operation::AddRole {
            role: RoleId::new(2).unwrap(),
            authority: authority(2),
            actions: vec![Action::StakeAll],
        },
        Operation::GrantActions {
            role: RoleId::new(2).unwrap(),
            actions: vec![Action::ProgramAny],
        },
        Operation::RevokeActions {
            role: RoleId::new(2).unwrap(),
            actions: vec![Action::StakeAll],
        },
        Operation::RemoveRole {
            role: RoleId::new(2).unwrap(),
        },
    ];

    for (i, operation) in mutations.into_iter().enumerate() {
        engine
            .authorize(&Request::new(ROOT_ROLE, operation, at(i as i64)))
            .unwrap();
        let version = engine.treasury().version();
        assert!(version > last, "mutation {i} did not bump the version");
        last = version;
    }
}

#[test]
fn test_rejected_requests_change_nothing() {
    let mut engine = engine_with_role(vec![Action::CurrencyRecurring {
        amount: 100,
        window_secs: DAY,
    }]);
    let r1 = RoleId::new(1).unwrap();
    engine
        .authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 90,
                destination: destination(1),
            },
            at(0),
        ))
        .unwrap();

    let snapshot_before = engine.snapshot();

    // A batch of doomed requests of every flavor.
    let doomed = [
        Request::new(
            r1,
            Operation::Transfer {
                amount: 50,
                destination: destination(1),
            },
            at(10),
        ),
        Request::new(
            r1,
            Operation::AddRole {
                role: RoleId::new(9).unwrap(),
                authority: authority(9),
                actions: vec![],
            },
            at(10),
        ),
        Request::new(RoleId::new(200).unwrap(), Operation::Stake { amount: 1 }, at(10)),
        Request::new(
            r1,
            Operation::RemoveRole { role: ROOT_ROLE },
            at(10),
        ),
    ];
    for request in &doomed {
        assert!(engine.authorize(request).is_err());
    }

    // Byte-for-byte unchanged state.
    assert_eq!(
        wire::encode(&engine.snapshot()).unwrap(),
        wire::encode(&snapshot_before).unwrap()
    );
}

#[test]
fn test_removed_role_entries_are_purged() {
    let mut engine = engine_with_role(vec![
        Action::CurrencyOnce { amount: 10 },
        Action::StakeRecurring {
            amount: 10,
            window_secs: DAY,
        },
    ]);
    let r1 = RoleId::new(1).unwrap();

    engine
        .authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 5,
                destination: destination(1),
            },
            at(0),
        ))
        .unwrap();
    engine
        .authorize(&Request::new(r1, Operation::Stake { amount: 5 }, at(1)))
        .unwrap();
    assert_eq!(engine.ledger().len(), 2);

    engine
        .authorize(&Request::new(
            ROOT_ROLE,
            Operation::RemoveRole { role: r1 },
            at(2),
        ))
        .unwrap();
    assert!(engine.ledger().is_empty());
    assert_eq!(
        engine.authorize(&Request::new(r1, Operation::Stake { amount: 1 }, at(3))),
        Err(Error::NotFound(r1))
    );
}

#[test]
fn test_revoked_action_entry_is_purged() {
    let cap = Action::CurrencyRecurring {
        amount: 100,
        window_secs: DAY,
    };
    let mut engine = engine_with_role(vec![cap.clone()]);
    let r1 = RoleId::new(1).unwrap();

    engine
        .authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 60,
                destination: destination(1),
            },
            at(0),
        ))
        .unwrap();

    engine
        .authorize(&Request::new(
            ROOT_ROLE,
            Operation::RevokeActions {
                role: r1,
                actions: vec![cap.clone()],
            },
            at(1),
        ))
        .unwrap();
    assert!(engine.ledger().entry(r1, &cap).is_none());

    // Without the action, the spend is a permission failure.
    assert!(matches!(
        engine.authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 1,
                destination: destination(1),
            },
            at(2),
        )),
        Err(Error::PermissionDenied { .. })
    ));
}

#[test]
fn test_snapshot_preserves_budget_state() {
    let cap = Action::CurrencyRecurring {
        amount: 100,
        window_secs: DAY,
    };
    let mut engine = engine_with_role(vec![cap.clone()]);
    let r1 = RoleId::new(1).unwrap();

    engine
        .authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 70,
                destination: destination(1),
            },
            at(0),
        ))
        .unwrap();

    // Persist, reload, and keep going: the window and consumption carry
    // over exactly.
    let bytes = wire::encode(&engine.snapshot()).unwrap();
    let restored = wire::decode(&bytes).unwrap();
    let mut engine = EngineBuilder::from_snapshot(restored).unwrap().build();

    assert_eq!(
        engine.authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 40,
                destination: destination(1),
            },
            at(10),
        )),
        Err(Error::LimitExceeded {
            consumed: 70,
            requested: 40,
            limit: 100,
        })
    );
    engine
        .authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 30,
                destination: destination(1),
            },
            at(10),
        ))
        .unwrap();

    // The regression guard also survives the round trip.
    assert!(matches!(
        engine.authorize(&Request::new(
            r1,
            Operation::Transfer {
                amount: 1,
                destination: destination(1),
            },
            at(5),
        )),
        Err(Error::ClockRegression { .. })
    ));
}
