use serde::Serialize;

use super::{Amount, Ledger, MAX_SUPPLY};
use crate::account::AccountId;
use crate::events::EventSink;
use crate::store::{StateStore, StorageKey};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// `total_supply != Σ balances + Σ staked`.
    SupplyMismatch { recorded: Amount, held: u128 },
    SupplyAboveCap { supply: Amount, cap: Amount },
    CapAboveMaximum { cap: Amount },
    /// The null account holds value or rights.
    NullAccountEntry { entry: &'static str, amount: Amount },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AuditReport {
    pub total_supply: Amount,
    pub balance_sum: u128,
    pub stake_sum: u128,
    pub mint_cap: Amount,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Recomputes the conservation and cap invariants from raw state.
    pub fn audit(&self) -> AuditReport {
        let mut balance_sum: u128 = 0;
        let mut stake_sum: u128 = 0;
        let mut violations = Vec::new();
        let null = AccountId::NULL;

        for (key, amount) in self.amount_entries() {
            let null_entry = match key {
                StorageKey::Balance(account) => {
                    balance_sum += u128::from(amount);
                    (account == null).then_some("balance")
                }
                StorageKey::Stake(account) => {
                    stake_sum += u128::from(amount);
                    (account == null).then_some("stake")
                }
                StorageKey::Allowance(k) => (k.spender == null).then_some("allowance"),
                StorageKey::Delegation(k) => (k.delegatee == null).then_some("delegation"),
                _ => None,
            };
            if let Some(entry) = null_entry {
                if amount > 0 {
                    violations.push(Violation::NullAccountEntry { entry, amount });
                }
            }
        }

        let total_supply = self.total_supply();
        let mint_cap = self.mint_cap();
        let held = balance_sum + stake_sum;
        if u128::from(total_supply) != held {
            violations.push(Violation::SupplyMismatch {
                recorded: total_supply,
                held,
            });
        }
        if total_supply > mint_cap {
            violations.push(Violation::SupplyAboveCap {
                supply: total_supply,
                cap: mint_cap,
            });
        }
        if mint_cap > MAX_SUPPLY {
            violations.push(Violation::CapAboveMaximum { cap: mint_cap });
        }
        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), "ledger audit found violations");
        }

        AuditReport {
            total_supply,
            balance_sum,
            stake_sum,
            mint_cap,
            violations,
        }
    }
}
