use super::{ensure_not_null, ensure_positive, Amount, Ledger, LedgerError, Op};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent, Memo};
use crate::store::StateStore;

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Permanently removes `amount` of the caller's balance from circulation.
    pub fn burn(&mut self, caller: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.execute("burn", |op| {
            op.ensure_not_paused()?;
            ensure_positive(amount)?;
            let balance = op.balance(caller);
            if balance < amount {
                return Err(LedgerError::InsufficientBalance);
            }
            let supply = op.total_supply();
            op.set_balance(caller, balance - amount);
            op.set_total_supply(supply.saturating_sub(amount));
            op.emit(LedgerEvent::Burned {
                from: *caller,
                amount,
            });
            Ok(())
        })
    }

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.execute("transfer", |op| {
            op.ensure_not_paused()?;
            move_balance(op, caller, recipient, amount)
        })
    }

    /// [`Ledger::transfer`] followed by a `Memo` notification. The memo never
    /// touches state.
    pub fn transfer_with_memo(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
        memo: Memo,
    ) -> Result<(), LedgerError> {
        self.execute("transfer_with_memo", |op| {
            op.ensure_not_paused()?;
            move_balance(op, caller, recipient, amount)?;
            op.emit(LedgerEvent::Memo { memo });
            Ok(())
        })
    }
}

/// Debits `from` and credits `to`. Shared by transfer and transfer-from.
pub(super) fn move_balance<S: StateStore>(
    op: &mut Op<'_, S>,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
) -> Result<(), LedgerError> {
    ensure_not_null(to)?;
    ensure_positive(amount)?;
    let from_balance = op.balance(from);
    if from_balance < amount {
        return Err(LedgerError::InsufficientBalance);
    }
    op.set_balance(from, from_balance - amount);
    // re-read so a self-transfer nets to zero
    let to_balance = op.balance(to);
    op.set_balance(to, to_balance.saturating_add(amount));
    op.emit(LedgerEvent::Transfer {
        from: *from,
        to: *to,
        amount,
    });
    Ok(())
}
