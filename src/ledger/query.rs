use super::{allowance_key, delegation_key, Amount, Ledger, DECIMALS};
use crate::account::AccountId;
use crate::config::TokenMetadata;
use crate::events::EventSink;
use crate::store::{decode_amount, StateStore, StorageKey};

/// Side-effect-free reads. Absent entries read as zero.
impl<S: StateStore, E: EventSink> Ledger<S, E> {
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.view().amount(&StorageKey::Balance(*account))
    }

    pub fn staked_balance(&self, account: &AccountId) -> Amount {
        self.view().amount(&StorageKey::Stake(*account))
    }

    pub fn delegated_stake(&self, delegator: &AccountId, delegatee: &AccountId) -> Amount {
        self.view()
            .get(&delegation_key(delegator, delegatee))
            .map(|v| decode_amount(&v))
            .unwrap_or(0)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.view().amount(&allowance_key(owner, spender))
    }

    pub fn total_supply(&self) -> Amount {
        self.view().amount(&StorageKey::TotalSupply)
    }

    pub fn mint_cap(&self) -> Amount {
        self.view().amount(&StorageKey::MintCap)
    }

    /// `None` only before deployment.
    pub fn admin(&self) -> Option<AccountId> {
        self.view().account(&StorageKey::Admin)
    }

    pub fn is_paused(&self) -> bool {
        self.view().flag(&StorageKey::Paused)
    }

    /// Number of committed mutating calls since deployment.
    pub fn sequence(&self) -> u64 {
        self.view().amount(&StorageKey::Sequence)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        DECIMALS
    }

    pub fn token_uri(&self) -> Option<&str> {
        self.metadata.token_uri.as_deref()
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::testing::*;
    use crate::ledger::DECIMALS;

    #[test]
    fn unknown_accounts_read_zero() {
        let ledger = deployed();
        assert_eq!(ledger.balance(&CAROL), 0);
        assert_eq!(ledger.staked_balance(&CAROL), 0);
        assert_eq!(ledger.allowance(&CAROL, &BOB), 0);
        assert_eq!(ledger.delegated_stake(&CAROL, &BOB), 0);
    }

    #[test]
    fn reads_are_repeatable() {
        let mut ledger = funded(&ALICE, 90);
        ledger.stake(&ALICE, 30).unwrap();
        let first = (
            ledger.balance(&ALICE),
            ledger.staked_balance(&ALICE),
            ledger.total_supply(),
            ledger.sequence(),
        );
        let second = (
            ledger.balance(&ALICE),
            ledger.staked_balance(&ALICE),
            ledger.total_supply(),
            ledger.sequence(),
        );
        assert_eq!(first, second);
        assert_eq!(first, (60, 30, 90, 2));
    }

    #[test]
    fn static_metadata() {
        let ledger = deployed();
        assert_eq!(ledger.symbol(), "NOS");
        assert_eq!(ledger.name(), "BlockNet NOS");
        assert_eq!(ledger.decimals(), DECIMALS);
        assert_eq!(ledger.decimals(), 6);
        assert_eq!(ledger.token_uri(), None);
    }
}
