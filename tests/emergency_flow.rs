//! Integration tests for emergency overrides.
//!
//! Freeze, unfreeze, direct withdrawal, proposal pause, the cooldown between
//! executions, and how each interacts with pending spending proposals.

use coffer::emergency::{ActionStatus, EmergencyActionKind};
use coffer::events::{EventKind, EventQuery};
use coffer::proposals::ProposalRequest;
use coffer::vault::VaultParams;
use coffer::{Principal, Transfer, Treasury, TreasuryError};

const T0: u64 = 1_700_000_000;
const COOLDOWN: u64 = 3_600;

fn p(name: &str) -> Principal {
    Principal::from(name)
}

fn treasury() -> Treasury {
    let mut treasury = Treasury::new(
        VaultParams {
            signers: [p("A"), p("B"), p("C")].into(),
            threshold: 2,
            emergency_signers: [p("A"), p("B"), p("E")].into(),
            emergency_threshold: 2,
            categories: ["Ops".to_string()].into(),
        },
        COOLDOWN,
    )
    .unwrap();
    treasury.deposit(&p("donor"), 10_000, T0).unwrap();
    treasury
}

fn signed_proposal(t: &mut Treasury, amount: u64) -> coffer::ProposalId {
    let id = t
        .open_proposal(
            ProposalRequest {
                creator: p("A"),
                category: "Ops".to_string(),
                description: "payment".to_string(),
                transfers: vec![Transfer::new("vendor", amount)],
                requested_time_lock: None,
                requested_threshold: None,
            },
            T0,
        )
        .unwrap();
    t.sign_proposal(id, &p("A"), T0).unwrap();
    t.sign_proposal(id, &p("B"), T0).unwrap();
    id
}

fn run_action(t: &mut Treasury, kind: EmergencyActionKind, now: u64) -> coffer::ActionId {
    let id = t
        .create_emergency_action(kind, &p("A"), "incident response", now)
        .unwrap();
    t.sign_emergency_action(id, &p("A"), now).unwrap();
    t.sign_emergency_action(id, &p("B"), now).unwrap();
    t.execute_emergency_action(id, &p("A"), now).unwrap();
    id
}

#[test]
fn test_freeze_blocks_every_pending_proposal() {
    let mut t = treasury();
    let first = signed_proposal(&mut t, 100);
    let second = signed_proposal(&mut t, 200);
    assert!(t.can_execute(first, T0));

    run_action(&mut t, EmergencyActionKind::Freeze, T0);
    assert!(t.vault().is_frozen());

    for id in [first, second] {
        assert!(!t.can_execute(id, T0));
        assert!(matches!(
            t.execute_proposal(id, &p("A"), T0),
            Err(TreasuryError::TreasuryFrozen)
        ));
    }
    // Opening is blocked too
    assert!(matches!(
        t.open_proposal(
            ProposalRequest::from_parallel(p("A"), "Ops", "x", vec![p("v")], vec![1]).unwrap(),
            T0
        ),
        Err(TreasuryError::TreasuryFrozen)
    ));
    assert_eq!(t.vault().balance(), 10_000);
}

#[test]
fn test_unfreeze_after_cooldown_restores_execution() {
    let mut t = treasury();
    let id = signed_proposal(&mut t, 100);
    run_action(&mut t, EmergencyActionKind::Freeze, T0);

    let unfreeze = t
        .create_emergency_action(EmergencyActionKind::Unfreeze, &p("B"), "all clear", T0 + 10)
        .unwrap();
    t.sign_emergency_action(unfreeze, &p("B"), T0 + 10).unwrap();
    t.sign_emergency_action(unfreeze, &p("E"), T0 + 10).unwrap();
    assert!(t.can_execute_emergency_action(unfreeze));

    let err = t
        .execute_emergency_action(unfreeze, &p("B"), T0 + 10)
        .unwrap_err();
    assert_eq!(err, TreasuryError::CooldownActive { remaining: COOLDOWN - 10 });
    assert!(t.vault().is_frozen());

    t.execute_emergency_action(unfreeze, &p("B"), T0 + COOLDOWN).unwrap();
    assert!(!t.vault().is_frozen());
    t.execute_proposal(id, &p("A"), T0 + COOLDOWN).unwrap();
    assert_eq!(t.vault().balance(), 9_900);
}

#[test]
fn test_unfreeze_when_not_frozen_rejected() {
    let mut t = treasury();
    let id = t
        .create_emergency_action(EmergencyActionKind::Unfreeze, &p("A"), "mistake", T0)
        .unwrap();
    t.sign_emergency_action(id, &p("A"), T0).unwrap();
    t.sign_emergency_action(id, &p("B"), T0).unwrap();
    assert!(matches!(
        t.execute_emergency_action(id, &p("A"), T0),
        Err(TreasuryError::InvalidInput(_))
    ));
    // A failed execution does not start the cooldown
    assert_eq!(t.emergency().last_emergency_time(), None);
    assert_eq!(t.emergency().get(id).unwrap().status, ActionStatus::Pending);
}

#[test]
fn test_withdrawal_bypasses_freeze_but_not_balance() {
    let mut t = treasury();
    run_action(&mut t, EmergencyActionKind::Freeze, T0);

    let too_much = t
        .create_emergency_action(
            EmergencyActionKind::Withdrawal {
                recipient: p("cold_storage"),
                amount: 20_000,
            },
            &p("A"),
            "evacuate funds",
            T0 + COOLDOWN,
        )
        .unwrap();
    t.sign_emergency_action(too_much, &p("A"), T0 + COOLDOWN).unwrap();
    t.sign_emergency_action(too_much, &p("E"), T0 + COOLDOWN).unwrap();
    assert!(matches!(
        t.execute_emergency_action(too_much, &p("A"), T0 + COOLDOWN),
        Err(TreasuryError::InsufficientBalance { .. })
    ));
    t.cancel_emergency_action(too_much, &p("A"), T0 + COOLDOWN).unwrap();

    run_action(
        &mut t,
        EmergencyActionKind::Withdrawal {
            recipient: p("cold_storage"),
            amount: 7_500,
        },
        T0 + COOLDOWN,
    );
    assert_eq!(t.vault().balance(), 2_500);
    // Emergency withdrawals are not category spend
    assert_eq!(t.vault().total_spent(), 0);

    let withdrawals = t.query_events(&EventQuery {
        kind: Some(EventKind::EmergencyWithdrawal),
        ..EventQuery::default()
    });
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount, Some(7_500));
}

#[test]
fn test_pause_proposals_toggles() {
    let mut t = treasury();
    let id = signed_proposal(&mut t, 100);

    run_action(&mut t, EmergencyActionKind::PauseProposals, T0);
    assert!(t.proposals().is_paused());
    assert!(!t.can_execute(id, T0));
    assert!(matches!(
        t.execute_proposal(id, &p("A"), T0),
        Err(TreasuryError::ProposalsPaused)
    ));

    run_action(&mut t, EmergencyActionKind::PauseProposals, T0 + COOLDOWN);
    assert!(!t.proposals().is_paused());
    t.execute_proposal(id, &p("A"), T0 + COOLDOWN).unwrap();
}

#[test]
fn test_cooldown_spacing_between_executions() {
    let mut t = treasury();
    run_action(&mut t, EmergencyActionKind::PauseProposals, T0);

    let next = t
        .create_emergency_action(EmergencyActionKind::PauseProposals, &p("A"), "resume", T0)
        .unwrap();
    t.sign_emergency_action(next, &p("A"), T0).unwrap();
    t.sign_emergency_action(next, &p("B"), T0).unwrap();

    assert_eq!(t.emergency().cooldown_remaining(T0 + 1), COOLDOWN - 1);
    assert!(matches!(
        t.execute_emergency_action(next, &p("A"), T0 + COOLDOWN - 1),
        Err(TreasuryError::CooldownActive { remaining: 1 })
    ));
    t.execute_emergency_action(next, &p("A"), T0 + COOLDOWN).unwrap();

    let times: Vec<u64> = t
        .emergency()
        .actions()
        .iter()
        .filter_map(|a| a.executed_at)
        .collect();
    assert_eq!(times, vec![T0, T0 + COOLDOWN]);
}

#[test]
fn test_emergency_authorization() {
    let mut t = treasury();
    // C is a standard signer but not an emergency signer
    assert!(matches!(
        t.create_emergency_action(EmergencyActionKind::Freeze, &p("C"), "why not", T0),
        Err(TreasuryError::NotAuthorized { .. })
    ));
    assert!(t
        .create_emergency_action(EmergencyActionKind::Freeze, &p("A"), "   ", T0)
        .is_err());

    let id = t
        .create_emergency_action(EmergencyActionKind::Freeze, &p("A"), "breach", T0)
        .unwrap();
    assert!(matches!(
        t.sign_emergency_action(id, &p("C"), T0),
        Err(TreasuryError::NotAuthorized { .. })
    ));
    t.sign_emergency_action(id, &p("A"), T0).unwrap();
    assert!(matches!(
        t.sign_emergency_action(id, &p("A"), T0),
        Err(TreasuryError::AlreadySigned(_))
    ));
    assert!(matches!(
        t.execute_emergency_action(id, &p("A"), T0),
        Err(TreasuryError::InsufficientSignatures { have: 1, need: 2 })
    ));

    // Signed, so only the creator can cancel
    assert!(t.cancel_emergency_action(id, &p("B"), T0).is_err());
    t.cancel_emergency_action(id, &p("A"), T0).unwrap();
    assert!(matches!(
        t.execute_emergency_action(id, &p("A"), T0),
        Err(TreasuryError::AlreadyCancelled)
    ));
}

#[test]
fn test_emergency_pause_blocks_create_and_execute() {
    let mut t = treasury();
    let id = t
        .create_emergency_action(EmergencyActionKind::Freeze, &p("A"), "breach", T0)
        .unwrap();
    t.sign_emergency_action(id, &p("A"), T0).unwrap();
    t.sign_emergency_action(id, &p("B"), T0).unwrap();

    assert!(t.toggle_emergency_pause(&p("E"), T0).unwrap());
    assert!(!t.can_execute_emergency_action(id));
    assert!(matches!(
        t.execute_emergency_action(id, &p("A"), T0),
        Err(TreasuryError::EmergencyPaused)
    ));
    assert!(matches!(
        t.create_emergency_action(EmergencyActionKind::Freeze, &p("A"), "again", T0),
        Err(TreasuryError::EmergencyPaused)
    ));
    assert!(t.toggle_emergency_pause(&p("C"), T0).is_err());

    assert!(!t.toggle_emergency_pause(&p("E"), T0).unwrap());
    t.execute_emergency_action(id, &p("A"), T0).unwrap();
}

#[test]
fn test_emergency_governance() {
    let mut t = treasury();
    t.add_emergency_signer(&p("F"), &p("E"), T0).unwrap();
    t.set_emergency_threshold(3, &p("A"), T0).unwrap();
    assert_eq!(t.vault().emergency_threshold(), 3);
    assert!(t.set_emergency_threshold(5, &p("A"), T0).is_err());
    assert!(t.add_emergency_signer(&p("G"), &p("C"), T0).is_err());

    t.set_emergency_threshold(2, &p("A"), T0).unwrap();
    t.remove_emergency_signer(&p("F"), &p("B"), T0).unwrap();
    assert!(!t.vault().is_emergency_signer(&p("F")));
}

#[test]
fn test_unknown_action() {
    let mut t = treasury();
    let missing = coffer::ActionId(42);
    assert!(matches!(
        t.sign_emergency_action(missing, &p("A"), T0),
        Err(TreasuryError::ActionNotFound(_))
    ));
    assert!(!t.can_execute_emergency_action(missing));
}
