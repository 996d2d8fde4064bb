use nos_ledger::{
    events::MemorySink, AccountId, Ledger, LedgerError, LedgerEvent, Memo, MemoryStore,
    TokenMetadata, MAX_SUPPLY,
};

const ADMIN: AccountId = AccountId::from_bytes([0x0a; 32]);
const X: AccountId = AccountId::from_bytes([0x11; 32]);
const Y: AccountId = AccountId::from_bytes([0x22; 32]);
const Z: AccountId = AccountId::from_bytes([0x33; 32]);
const D: AccountId = AccountId::from_bytes([0x44; 32]);

fn ledger() -> Ledger<MemoryStore, MemorySink> {
    Ledger::deploy(
        MemoryStore::new(),
        MemorySink::new(),
        TokenMetadata::default(),
        &ADMIN,
    )
    .unwrap()
}

fn assert_conserved(ledger: &Ledger<MemoryStore, MemorySink>) {
    let report = ledger.audit();
    assert!(report.is_consistent(), "{report:?}");
    assert_eq!(
        u128::from(ledger.total_supply()),
        report.balance_sum + report.stake_sum
    );
}

#[test]
fn scenario_a_mint_then_transfer() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 1_000).unwrap();
    assert_eq!(l.balance(&X), 1_000);
    assert_eq!(l.total_supply(), 1_000);

    l.transfer(&X, &Y, 200).unwrap();
    assert_eq!(l.balance(&X), 800);
    assert_eq!(l.balance(&Y), 200);
    assert_eq!(l.total_supply(), 1_000);
    assert_conserved(&l);
}

#[test]
fn scenario_b_delegated_spend() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 1_000).unwrap();
    l.approve(&X, &Y, 300).unwrap();
    l.transfer_from(&Y, &X, &Z, 200).unwrap();

    assert_eq!(l.allowance(&X, &Y), 100);
    assert_eq!(l.balance(&Z), 200);
    assert_eq!(l.balance(&X), 800);
    assert_eq!(l.balance(&Y), 0);
    assert_conserved(&l);
}

#[test]
fn scenario_c_delegation_outlives_unstake() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 500).unwrap();

    l.stake(&X, 200).unwrap();
    assert_eq!(l.balance(&X), 300);
    assert_eq!(l.staked_balance(&X), 200);
    assert_eq!(l.total_supply(), 500);

    l.delegate_stake(&X, &D, 150).unwrap();
    l.unstake(&X, 150).unwrap();
    assert_eq!(l.staked_balance(&X), 50);
    assert_eq!(l.balance(&X), 450);
    assert_eq!(l.delegated_stake(&X, &D), 150);
    assert_conserved(&l);
}

#[test]
fn scenario_d_mint_over_cap_changes_nothing() {
    let mut l = ledger();
    l.update_mint_cap(&ADMIN, 1_000).unwrap();
    l.mint(&ADMIN, &X, 900).unwrap();
    let before = l.store().clone();

    assert_eq!(l.mint(&ADMIN, &X, 101), Err(LedgerError::MaxSupplyReached));
    assert_eq!(l.total_supply(), 900);
    assert_eq!(l.balance(&X), 900);
    assert_eq!(l.store(), &before);

    // exactly at the cap is fine
    l.mint(&ADMIN, &Y, 100).unwrap();
    assert_eq!(l.total_supply(), 1_000);
}

#[test]
fn scenario_e_pause_blocks_users_not_admin() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 1_000).unwrap();
    l.set_paused(&ADMIN, true).unwrap();

    assert_eq!(l.transfer(&X, &Y, 1), Err(LedgerError::Paused));
    assert_eq!(l.stake(&X, 1), Err(LedgerError::Paused));
    assert_eq!(l.approve(&X, &Y, 1), Err(LedgerError::Paused));

    l.mint(&ADMIN, &X, 10).unwrap();
    assert_eq!(l.balance(&X), 1_010);

    l.set_paused(&ADMIN, false).unwrap();
    l.transfer(&X, &Y, 1).unwrap();
}

#[test]
fn approve_overwrites_while_increase_adds() {
    let mut l = ledger();
    l.approve(&X, &Y, 100).unwrap();
    l.approve(&X, &Y, 30).unwrap();
    assert_eq!(l.allowance(&X, &Y), 30);

    l.approve(&X, &Y, 100).unwrap();
    assert_eq!(l.increase_allowance(&X, &Y, 30), Ok(130));
    assert_eq!(l.allowance(&X, &Y), 130);
}

#[test]
fn second_live_delegation_is_refused() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 500).unwrap();
    l.stake(&X, 200).unwrap();
    l.delegate_stake(&X, &D, 50).unwrap();
    assert_eq!(
        l.delegate_stake(&X, &D, 50),
        Err(LedgerError::AlreadyDelegated)
    );

    assert_eq!(l.revoke_delegation(&X, &D), Ok(50));
    assert_eq!(l.delegated_stake(&X, &D), 0);
    l.delegate_stake(&X, &D, 50).unwrap();
}

#[test]
fn mint_cap_only_shrinks() {
    let mut l = ledger();
    assert_eq!(
        l.update_mint_cap(&ADMIN, MAX_SUPPLY + 1),
        Err(LedgerError::MaxSupplyReached)
    );
    assert_eq!(l.update_mint_cap(&ADMIN, 5_000), Ok(5_000));
    assert_eq!(
        l.update_mint_cap(&ADMIN, 5_001),
        Err(LedgerError::NotAuthorized)
    );
    assert_eq!(l.update_mint_cap(&X, 1_000), Err(LedgerError::NotAuthorized));
    assert_eq!(l.mint_cap(), 5_000);
}

#[test]
fn reads_are_idempotent() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 77).unwrap();
    l.approve(&X, &Y, 5).unwrap();
    let first = l.snapshot();
    let second = l.snapshot();
    assert_eq!(first, second);
    assert_eq!(l.balance(&X), l.balance(&X));
    assert_eq!(l.allowance(&X, &Y), l.allowance(&X, &Y));
}

#[test]
fn admin_handover_moves_every_privilege() {
    let mut l = ledger();
    l.transfer_admin(&ADMIN, &X).unwrap();
    assert_eq!(l.admin(), Some(X));
    assert_eq!(l.mint(&ADMIN, &Y, 1), Err(LedgerError::NotAuthorized));
    assert_eq!(l.set_paused(&ADMIN, true), Err(LedgerError::NotAuthorized));
    l.mint(&X, &Y, 1).unwrap();
    assert_eq!(
        l.transfer_admin(&X, &AccountId::NULL),
        Err(LedgerError::ZeroAddress)
    );
}

#[test]
fn memo_transfer_notifies_without_extra_state() {
    let mut l = ledger();
    l.mint(&ADMIN, &X, 100).unwrap();
    let memo = Memo::new(b"invoice 42".to_vec()).unwrap();
    l.transfer_with_memo(&X, &Y, 40, memo.clone()).unwrap();

    assert_eq!(l.balance(&Y), 40);
    let events: Vec<&LedgerEvent> = l.sink().events().collect();
    let n = events.len();
    assert_eq!(events[n - 1], &LedgerEvent::Memo { memo });
    assert_eq!(
        events[n - 2],
        &LedgerEvent::Transfer {
            from: X,
            to: Y,
            amount: 40
        }
    );
}

#[test]
fn burn_shrinks_supply_and_frees_cap_room() {
    let mut l = ledger();
    l.update_mint_cap(&ADMIN, 1_000).unwrap();
    l.mint(&ADMIN, &X, 1_000).unwrap();
    l.burn(&X, 400).unwrap();
    assert_eq!(l.total_supply(), 600);
    l.mint(&ADMIN, &X, 400).unwrap();
    assert_eq!(l.total_supply(), 1_000);
    assert_eq!(l.burn(&Y, 1), Err(LedgerError::InsufficientBalance));
    assert_conserved(&l);
}

#[test]
fn null_account_never_receives_value() {
    let mut l = ledger();
    let null = AccountId::NULL;
    assert_eq!(l.mint(&ADMIN, &null, 1), Err(LedgerError::ZeroAddress));
    l.mint(&ADMIN, &X, 10).unwrap();
    assert_eq!(l.transfer(&X, &null, 1), Err(LedgerError::ZeroAddress));
    assert_eq!(l.approve(&X, &null, 1), Err(LedgerError::ZeroAddress));
    l.stake(&X, 5).unwrap();
    assert_eq!(l.delegate_stake(&X, &null, 1), Err(LedgerError::ZeroAddress));
    assert!(l.audit().is_consistent());
}
