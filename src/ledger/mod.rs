//! The NOS ledger state machine.
//!
//! [`Ledger`] owns the host store and event sink. Every public operation runs
//! through [`Ledger::execute`]: preconditions are checked and writes are
//! staged on a [`Transaction`]; only a call that returns `Ok` has its writes
//! applied and its events handed to the sink. A rejected call leaves the store
//! byte-for-byte unchanged.

use tracing::{debug, info};

use crate::account::AccountId;
use crate::config::TokenMetadata;
use crate::events::{EventRecord, EventSink, LedgerEvent};
use crate::store::{AllowanceKey, DelegationKey, StateStore, StorageKey, Transaction};

mod access;
mod allowance;
mod audit;
mod balance;
mod delegation;
mod query;
mod snapshot;
mod stake;
mod supply;

pub use audit::{AuditReport, Violation};
pub use snapshot::{AllowanceEntry, DelegationEntry, LedgerSnapshot};

pub type Amount = u64;

pub const DECIMALS: u8 = 6;
/// 100,000,000 whole units at 6 decimal places.
pub const MAX_SUPPLY: Amount = 100_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("caller is not authorized")]
    NotAuthorized,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient staked balance")]
    InsufficientStake,
    #[error("insufficient allowance")]
    InsufficientAllowance,
    #[error("mint cap or maximum supply reached")]
    MaxSupplyReached,
    #[error("ledger is paused")]
    Paused,
    #[error("null account is not a valid destination")]
    ZeroAddress,
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("no delegation to this delegatee")]
    InvalidDelegate,
    #[error("stake already delegated to this delegatee")]
    AlreadyDelegated,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotAuthorized => "NOT_AUTHORIZED",
            LedgerError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            LedgerError::InsufficientStake => "INSUFFICIENT_STAKE",
            LedgerError::InsufficientAllowance => "INSUFFICIENT_ALLOWANCE",
            LedgerError::MaxSupplyReached => "MAX_SUPPLY_REACHED",
            LedgerError::Paused => "PAUSED",
            LedgerError::ZeroAddress => "ZERO_ADDRESS",
            LedgerError::ZeroAmount => "ZERO_AMOUNT",
            LedgerError::InvalidDelegate => "INVALID_DELEGATE",
            LedgerError::AlreadyDelegated => "ALREADY_DELEGATED",
        }
    }

    /// Stable numeric code for hosts that report integers.
    pub fn numeric_code(&self) -> u32 {
        match self {
            LedgerError::NotAuthorized => 100,
            LedgerError::InsufficientBalance => 101,
            LedgerError::InsufficientStake => 102,
            LedgerError::InsufficientAllowance => 103,
            LedgerError::MaxSupplyReached => 104,
            LedgerError::Paused => 105,
            LedgerError::ZeroAddress => 106,
            LedgerError::ZeroAmount => 107,
            LedgerError::InvalidDelegate => 108,
            LedgerError::AlreadyDelegated => 109,
        }
    }
}

pub struct Ledger<S, E> {
    store: S,
    sink: E,
    metadata: TokenMetadata,
}

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Writes the genesis state: `deployer` is admin, unpaused, no supply and
    /// the mint cap at [`MAX_SUPPLY`]. Refuses a store that already holds a
    /// deployed ledger.
    pub fn deploy(
        store: S,
        sink: E,
        metadata: TokenMetadata,
        deployer: &AccountId,
    ) -> Result<Self, LedgerError> {
        if deployer.is_null() {
            return Err(LedgerError::ZeroAddress);
        }
        let mut ledger = Self::open(store, sink, metadata);
        if ledger.is_deployed() {
            return Err(LedgerError::NotAuthorized);
        }
        let mut genesis = Transaction::new(&ledger.store);
        genesis.set_account(&StorageKey::Admin, deployer);
        genesis.set_flag(&StorageKey::Paused, false);
        genesis.set_amount(&StorageKey::TotalSupply, 0);
        genesis.set_amount(&StorageKey::MintCap, MAX_SUPPLY);
        genesis.set_amount(&StorageKey::Sequence, 0);
        let writes = genesis.into_writes();
        writes.apply_to(&mut ledger.store);
        info!(admin = %deployer, symbol = %ledger.metadata.symbol, "ledger deployed");
        Ok(ledger)
    }

    /// Wraps a store that already holds (or will never hold) a deployed
    /// ledger. Nothing is written.
    pub fn open(store: S, sink: E, metadata: TokenMetadata) -> Self {
        Self {
            store,
            sink,
            metadata,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.view().contains(&StorageKey::Admin)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    pub fn into_parts(self) -> (S, E) {
        (self.store, self.sink)
    }

    pub(crate) fn view(&self) -> Transaction<'_, S> {
        Transaction::new(&self.store)
    }

    /// Runs `f` as one all-or-nothing call. A store without an admin has not
    /// been deployed and accepts no calls.
    pub(crate) fn execute<T>(
        &mut self,
        name: &'static str,
        f: impl FnOnce(&mut Op<'_, S>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let (value, sequence, writes, events) = {
            let mut op = Op::new(Transaction::new(&self.store));
            let outcome = match op.admin() {
                Some(_) => f(&mut op),
                None => Err(LedgerError::NotAuthorized),
            };
            let value = match outcome {
                Ok(value) => value,
                Err(err) => {
                    debug!(op = name, code = err.code(), "operation rejected");
                    return Err(err);
                }
            };
            let sequence = op.state.amount(&StorageKey::Sequence).saturating_add(1);
            op.state.set_amount(&StorageKey::Sequence, sequence);
            let (writes, events) = op.finish();
            (value, sequence, writes, events)
        };
        let staged = writes.len();
        writes.apply_to(&mut self.store);
        for event in events {
            self.sink.append(&EventRecord { sequence, event });
        }
        debug!(op = name, sequence, writes = staged, "operation committed");
        Ok(value)
    }
}

/// Staged state of one call plus the events it will emit on commit.
pub(crate) struct Op<'a, S: StateStore> {
    pub(crate) state: Transaction<'a, S>,
    events: Vec<LedgerEvent>,
}

impl<'a, S: StateStore> Op<'a, S> {
    fn new(state: Transaction<'a, S>) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    fn finish(self) -> (crate::store::WriteSet, Vec<LedgerEvent>) {
        (self.state.into_writes(), self.events)
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub(crate) fn admin(&self) -> Option<AccountId> {
        self.state.account(&StorageKey::Admin)
    }

    pub(crate) fn ensure_admin(&self, caller: &AccountId) -> Result<(), LedgerError> {
        match self.admin() {
            Some(admin) if admin == *caller => Ok(()),
            _ => Err(LedgerError::NotAuthorized),
        }
    }

    /// Gate for every user-facing mutation. Admin-only operations skip it.
    pub(crate) fn ensure_not_paused(&self) -> Result<(), LedgerError> {
        if self.state.flag(&StorageKey::Paused) {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    pub(crate) fn balance(&self, account: &AccountId) -> Amount {
        self.state.amount(&StorageKey::Balance(*account))
    }

    pub(crate) fn set_balance(&mut self, account: &AccountId, amount: Amount) {
        self.state.set_amount(&StorageKey::Balance(*account), amount);
    }

    pub(crate) fn staked(&self, account: &AccountId) -> Amount {
        self.state.amount(&StorageKey::Stake(*account))
    }

    pub(crate) fn set_staked(&mut self, account: &AccountId, amount: Amount) {
        self.state.set_amount(&StorageKey::Stake(*account), amount);
    }

    pub(crate) fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state.amount(&allowance_key(owner, spender))
    }

    pub(crate) fn set_allowance(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.state.set_amount(&allowance_key(owner, spender), amount);
    }

    pub(crate) fn delegation(&self, delegator: &AccountId, delegatee: &AccountId) -> Option<Amount> {
        self.state
            .get(&delegation_key(delegator, delegatee))
            .map(|v| crate::store::decode_amount(&v))
    }

    pub(crate) fn total_supply(&self) -> Amount {
        self.state.amount(&StorageKey::TotalSupply)
    }

    pub(crate) fn set_total_supply(&mut self, amount: Amount) {
        self.state.set_amount(&StorageKey::TotalSupply, amount);
    }

    pub(crate) fn mint_cap(&self) -> Amount {
        self.state.amount(&StorageKey::MintCap)
    }
}

pub(crate) fn allowance_key(owner: &AccountId, spender: &AccountId) -> StorageKey {
    StorageKey::Allowance(AllowanceKey {
        owner: *owner,
        spender: *spender,
    })
}

pub(crate) fn delegation_key(delegator: &AccountId, delegatee: &AccountId) -> StorageKey {
    StorageKey::Delegation(DelegationKey {
        delegator: *delegator,
        delegatee: *delegatee,
    })
}

pub(crate) fn ensure_not_null(account: &AccountId) -> Result<(), LedgerError> {
    if account.is_null() {
        return Err(LedgerError::ZeroAddress);
    }
    Ok(())
}

pub(crate) fn ensure_positive(amount: Amount) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::events::MemorySink;
    use crate::store::MemoryStore;

    pub(crate) const ADMIN: AccountId = AccountId::from_bytes([0xad; 32]);
    pub(crate) const ALICE: AccountId = AccountId::from_bytes([0xa1; 32]);
    pub(crate) const BOB: AccountId = AccountId::from_bytes([0xb0; 32]);
    pub(crate) const CAROL: AccountId = AccountId::from_bytes([0xc0; 32]);

    pub(crate) type TestLedger = Ledger<MemoryStore, MemorySink>;

    pub(crate) fn deployed() -> TestLedger {
        Ledger::deploy(
            MemoryStore::new(),
            MemorySink::new(),
            TokenMetadata::default(),
            &ADMIN,
        )
        .unwrap()
    }

    /// Deployed ledger where `account` holds `amount`.
    pub(crate) fn funded(account: &AccountId, amount: Amount) -> TestLedger {
        let mut ledger = deployed();
        ledger.mint(&ADMIN, account, amount).unwrap();
        ledger.sink_mut().clear();
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::events::MemorySink;
    use crate::store::MemoryStore;

    #[test]
    fn genesis_state_matches_deployment() {
        let ledger = deployed();
        assert!(ledger.is_deployed());
        assert_eq!(ledger.admin(), Some(ADMIN));
        assert!(!ledger.is_paused());
        assert_eq!(ledger.total_supply(), 0);
        assert_eq!(ledger.mint_cap(), MAX_SUPPLY);
        assert_eq!(ledger.sequence(), 0);
        assert!(ledger.sink().records().is_empty());
    }

    #[test]
    fn deploy_refuses_null_deployer_and_redeploy() {
        let err = Ledger::deploy(
            MemoryStore::new(),
            MemorySink::new(),
            TokenMetadata::default(),
            &AccountId::NULL,
        )
        .err();
        assert_eq!(err, Some(LedgerError::ZeroAddress));

        let (store, sink) = deployed().into_parts();
        let err = Ledger::deploy(store, sink, TokenMetadata::default(), &ALICE).err();
        assert_eq!(err, Some(LedgerError::NotAuthorized));
    }

    #[test]
    fn undeployed_store_accepts_no_calls() {
        let mut ledger = Ledger::open(
            MemoryStore::new(),
            MemorySink::new(),
            TokenMetadata::default(),
        );
        assert_eq!(
            ledger.approve(&ALICE, &BOB, 10),
            Err(LedgerError::NotAuthorized)
        );
        assert_eq!(
            ledger.increase_allowance(&ALICE, &BOB, 10),
            Err(LedgerError::NotAuthorized)
        );
        assert_eq!(ledger.mint(&ALICE, &BOB, 10), Err(LedgerError::NotAuthorized));
        assert!(ledger.store().is_empty());
        assert!(ledger.sink().records().is_empty());

        let (store, sink) = ledger.into_parts();
        let ledger = Ledger::deploy(store, sink, TokenMetadata::default(), &ADMIN).unwrap();
        assert_eq!(ledger.allowance(&ALICE, &BOB), 0);
        assert_eq!(ledger.sequence(), 0);
    }

    #[test]
    fn rejected_call_leaves_store_untouched() {
        let mut ledger = funded(&ALICE, 100);
        let before = ledger.store().clone();
        let err = ledger.transfer(&ALICE, &BOB, 101).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance);
        assert_eq!(ledger.store(), &before);
        assert!(ledger.sink().records().is_empty());
    }

    #[test]
    fn committed_calls_advance_sequence_and_stamp_events() {
        let mut ledger = funded(&ALICE, 100);
        let seq = ledger.sequence();
        ledger.transfer(&ALICE, &BOB, 10).unwrap();
        assert_eq!(ledger.sequence(), seq + 1);
        let record = ledger.sink().records().last().unwrap();
        assert_eq!(record.sequence, seq + 1);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(LedgerError::NotAuthorized.code(), "NOT_AUTHORIZED");
        assert_eq!(LedgerError::AlreadyDelegated.code(), "ALREADY_DELEGATED");
        assert_eq!(LedgerError::NotAuthorized.numeric_code(), 100);
        assert_eq!(LedgerError::AlreadyDelegated.numeric_code(), 109);
    }
}
