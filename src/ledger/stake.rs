use super::{ensure_positive, Amount, Ledger, LedgerError};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent};
use crate::store::StateStore;

// Staking reclassifies balance; total supply never moves.
impl<S: StateStore, E: EventSink> Ledger<S, E> {
    pub fn stake(&mut self, caller: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.execute("stake", |op| {
            op.ensure_not_paused()?;
            ensure_positive(amount)?;
            let balance = op.balance(caller);
            if balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            let staked = op.staked(caller);
            op.set_balance(caller, balance - amount);
            op.set_staked(caller, staked.saturating_add(amount));
            op.emit(LedgerEvent::Staked {
                account: *caller,
                amount,
            });
            Ok(())
        })
    }

    /// Returns staked units to the spendable balance. Outstanding delegations
    /// are not consulted.
    pub fn unstake(&mut self, caller: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.execute("unstake", |op| {
            op.ensure_not_paused()?;
            ensure_positive(amount)?;
            let staked = op.staked(caller);
            if staked < amount {
                return Err(LedgerError::InsufficientStake);
            }
            let balance = op.balance(caller);
            op.set_staked(caller, staked - amount);
            op.set_balance(caller, balance.saturating_add(amount));
            op.emit(LedgerEvent::Unstaked {
                account: *caller,
                amount,
            });
            Ok(())
        })
    }
}
