use super::{delegation_key, ensure_not_null, ensure_positive, Amount, Ledger, LedgerError};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent};
use crate::store::StateStore;

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Grants `amount` of vote weight to `delegatee`.
    ///
    /// The stake check happens once, here. The grant is not escrowed: a later
    /// `unstake` may take the staked balance below the delegated amount and
    /// the grant stays as recorded until revoked.
    pub fn delegate_stake(
        &mut self,
        caller: &AccountId,
        delegatee: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.execute("delegate_stake", |op| {
            op.ensure_not_paused()?;
            ensure_not_null(delegatee)?;
            ensure_positive(amount)?;
            if op.staked(caller) < amount {
                return Err(LedgerError::InsufficientStake);
            }
            if op.delegation(caller, delegatee).is_some() {
                return Err(LedgerError::AlreadyDelegated);
            }
            op.state
                .set_amount(&delegation_key(caller, delegatee), amount);
            op.emit(LedgerEvent::Delegated {
                delegator: *caller,
                delegatee: *delegatee,
                amount,
            });
            Ok(())
        })
    }

    /// Deletes the caller's grant to `delegatee` and returns its amount.
    pub fn revoke_delegation(
        &mut self,
        caller: &AccountId,
        delegatee: &AccountId,
    ) -> Result<Amount, LedgerError> {
        self.execute("revoke_delegation", |op| {
            op.ensure_not_paused()?;
            let amount = op
                .delegation(caller, delegatee)
                .ok_or(LedgerError::InvalidDelegate)?;
            op.state.remove(&delegation_key(caller, delegatee));
            op.emit(LedgerEvent::DelegationRevoked {
                delegator: *caller,
                delegatee: *delegatee,
                amount,
            });
            Ok(amount)
        })
    }
}
