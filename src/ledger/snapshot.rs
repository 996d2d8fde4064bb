use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Amount, Ledger, DECIMALS};
use crate::account::AccountId;
use crate::config::TokenMetadata;
use crate::events::EventSink;
use crate::store::{
    decode_amount, StateStore, StorageKey, KEY_ALLOWANCE_PREFIX, KEY_BALANCE_PREFIX,
    KEY_DELEGATION_PREFIX, KEY_STAKE_PREFIX,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllowanceEntry {
    pub owner: AccountId,
    pub spender: AccountId,
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelegationEntry {
    pub delegator: AccountId,
    pub delegatee: AccountId,
    pub amount: Amount,
}

/// Point-in-time copy of the whole ledger. Zero-valued entries are omitted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub sequence: u64,
    pub metadata: TokenMetadata,
    pub decimals: u8,
    pub admin: Option<AccountId>,
    pub paused: bool,
    pub total_supply: Amount,
    pub mint_cap: Amount,
    pub balances: BTreeMap<AccountId, Amount>,
    pub staked: BTreeMap<AccountId, Amount>,
    pub allowances: Vec<AllowanceEntry>,
    pub delegations: Vec<DelegationEntry>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut balances = BTreeMap::new();
        let mut staked = BTreeMap::new();
        let mut allowances = Vec::new();
        let mut delegations = Vec::new();
        for (key, amount) in self.amount_entries() {
            match key {
                StorageKey::Balance(account) if amount > 0 => {
                    balances.insert(account, amount);
                }
                StorageKey::Stake(account) if amount > 0 => {
                    staked.insert(account, amount);
                }
                StorageKey::Allowance(k) if amount > 0 => allowances.push(AllowanceEntry {
                    owner: k.owner,
                    spender: k.spender,
                    amount,
                }),
                StorageKey::Delegation(k) => delegations.push(DelegationEntry {
                    delegator: k.delegator,
                    delegatee: k.delegatee,
                    amount,
                }),
                _ => {}
            }
        }
        LedgerSnapshot {
            sequence: self.sequence(),
            metadata: self.metadata.clone(),
            decimals: DECIMALS,
            admin: self.admin(),
            paused: self.is_paused(),
            total_supply: self.total_supply(),
            mint_cap: self.mint_cap(),
            balances,
            staked,
            allowances,
            delegations,
            state_root: self.state_root(),
        }
    }

    /// SHA-256 merkle root over the canonical ledger contents.
    ///
    /// Map entries holding zero are skipped (they read the same as absent) and
    /// the sequence counter is left out, so two ledgers with equal contents
    /// share a root regardless of history.
    pub fn state_root(&self) -> [u8; 32] {
        let mut leaves: Vec<[u8; 32]> = Vec::new();
        for (raw_key, value) in self.store.scan_prefix(&[]) {
            let Some(key) = StorageKey::decode(&raw_key) else {
                continue;
            };
            let keep = match key {
                StorageKey::Sequence => false,
                StorageKey::Balance(_) | StorageKey::Stake(_) | StorageKey::Allowance(_) => {
                    decode_amount(&value) > 0
                }
                _ => true,
            };
            if !keep {
                continue;
            }
            let mut hasher = Sha256::new();
            hasher.update(b"entry");
            hasher.update((raw_key.len() as u32).to_le_bytes());
            hasher.update(&raw_key);
            hasher.update(&value);
            leaves.push(hasher.finalize().into());
        }
        build_merkle(leaves)
    }

    /// Every amount-valued map entry, decoded, in key order.
    pub(super) fn amount_entries(&self) -> Vec<(StorageKey, Amount)> {
        [
            KEY_BALANCE_PREFIX,
            KEY_ALLOWANCE_PREFIX,
            KEY_STAKE_PREFIX,
            KEY_DELEGATION_PREFIX,
        ]
        .iter()
        .flat_map(|prefix| self.store.scan_prefix(&[*prefix]))
        .filter_map(|(k, v)| Some((StorageKey::decode(&k)?, decode_amount(&v))))
        .collect()
    }
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"nos-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::testing::*;

    #[test]
    fn root_is_deterministic() {
        let ledger = funded(&ALICE, 1_000);
        assert_eq!(ledger.state_root(), ledger.state_root());
    }

    #[test]
    fn root_tracks_contents_not_history() {
        let mut a = funded(&ALICE, 100);
        let b = funded(&ALICE, 100);
        a.approve(&ALICE, &BOB, 5).unwrap();
        assert_ne!(a.state_root(), b.state_root());
        // zeroed allowance reads as absent
        a.approve(&ALICE, &BOB, 0).unwrap();
        assert_eq!(a.state_root(), b.state_root());
        assert_ne!(a.sequence(), b.sequence());
    }

    #[test]
    fn snapshot_lists_live_entries() {
        let mut ledger = funded(&ALICE, 500);
        ledger.transfer(&ALICE, &BOB, 500).unwrap();
        ledger.stake(&BOB, 200).unwrap();
        ledger.approve(&BOB, &CAROL, 10).unwrap();
        ledger.delegate_stake(&BOB, &CAROL, 150).unwrap();

        let snap = ledger.snapshot();
        assert_eq!(snap.total_supply, 500);
        // ALICE's zeroed balance is omitted
        assert_eq!(snap.balances.len(), 1);
        assert_eq!(snap.balances[&BOB], 300);
        assert_eq!(snap.staked[&BOB], 200);
        assert_eq!(snap.allowances.len(), 1);
        assert_eq!(snap.delegations[0].amount, 150);
        assert_eq!(snap.admin, Some(ADMIN));
        assert_eq!(snap.state_root, ledger.state_root());

        let json = serde_json::to_string(&snap).unwrap();
        let back: crate::ledger::LedgerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
