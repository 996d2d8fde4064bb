use super::{
    balance::move_balance, ensure_not_null, ensure_positive, Amount, Ledger, LedgerError, Op,
};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent};
use crate::store::StateStore;

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Sets the caller's allowance for `spender` to exactly `amount`.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.execute("approve", |op| {
            op.ensure_not_paused()?;
            ensure_not_null(spender)?;
            write_allowance(op, caller, spender, amount);
            Ok(())
        })
    }

    /// Raises the allowance by `added` (saturating) and returns the new value.
    pub fn increase_allowance(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        added: Amount,
    ) -> Result<Amount, LedgerError> {
        self.execute("increase_allowance", |op| {
            op.ensure_not_paused()?;
            ensure_not_null(spender)?;
            ensure_positive(added)?;
            let allowance = op.allowance(caller, spender).saturating_add(added);
            write_allowance(op, caller, spender, allowance);
            Ok(allowance)
        })
    }

    pub fn decrease_allowance(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        subtracted: Amount,
    ) -> Result<Amount, LedgerError> {
        self.execute("decrease_allowance", |op| {
            op.ensure_not_paused()?;
            ensure_not_null(spender)?;
            ensure_positive(subtracted)?;
            let current = op.allowance(caller, spender);
            if current < subtracted {
                return Err(LedgerError::InsufficientAllowance);
            }
            let allowance = current - subtracted;
            write_allowance(op, caller, spender, allowance);
            Ok(allowance)
        })
    }

    /// Moves `amount` from `owner` to `recipient` on the caller's allowance.
    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.execute("transfer_from", |op| {
            op.ensure_not_paused()?;
            ensure_not_null(owner)?;
            ensure_not_null(recipient)?;
            ensure_positive(amount)?;
            let allowance = op.allowance(owner, caller);
            if allowance < amount {
                return Err(LedgerError::InsufficientAllowance);
            }
            if op.balance(owner) < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            write_allowance(op, owner, caller, allowance - amount);
            move_balance(op, owner, recipient, amount)
        })
    }
}

fn write_allowance<S: StateStore>(
    op: &mut Op<'_, S>,
    owner: &AccountId,
    spender: &AccountId,
    amount: Amount,
) {
    op.set_allowance(owner, spender, amount);
    op.emit(LedgerEvent::Approval {
        owner: *owner,
        spender: *spender,
        amount,
    });
}
