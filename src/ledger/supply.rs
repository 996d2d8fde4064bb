use tracing::info;

use super::{ensure_not_null, ensure_positive, Amount, Ledger, LedgerError, MAX_SUPPLY};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent};
use crate::store::{StateStore, StorageKey};

impl<S: StateStore, E: EventSink> Ledger<S, E> {
    /// Lowers the mint cap. The cap can never be raised.
    ///
    /// Exceeding [`MAX_SUPPLY`] or dropping below the current supply reports
    /// `MaxSupplyReached`; an attempt to raise the cap reports `NotAuthorized`.
    pub fn update_mint_cap(
        &mut self,
        caller: &AccountId,
        new_cap: Amount,
    ) -> Result<Amount, LedgerError> {
        self.execute("update_mint_cap", |op| {
            op.ensure_admin(caller)?;
            if new_cap > MAX_SUPPLY {
                return Err(LedgerError::MaxSupplyReached);
            }
            let previous = op.mint_cap();
            if new_cap > previous {
                return Err(LedgerError::NotAuthorized);
            }
            if new_cap < op.total_supply() {
                return Err(LedgerError::MaxSupplyReached);
            }
            op.state.set_amount(&StorageKey::MintCap, new_cap);
            op.emit(LedgerEvent::MintCapUpdated {
                previous,
                cap: new_cap,
            });
            Ok(new_cap)
        })?;
        info!(cap = new_cap, "mint cap lowered");
        Ok(new_cap)
    }

    /// Issues `amount` new units to `recipient` and returns `amount`.
    pub fn mint(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.execute("mint", |op| {
            op.ensure_admin(caller)?;
            ensure_not_null(recipient)?;
            ensure_positive(amount)?;
            let cap = op.mint_cap();
            let supply = op
                .total_supply()
                .checked_add(amount)
                .filter(|supply| *supply <= cap)
                .ok_or(LedgerError::MaxSupplyReached)?;

            let balance = op.balance(recipient);
            op.set_balance(recipient, balance.saturating_add(amount));
            op.set_total_supply(supply);
            op.emit(LedgerEvent::Minted {
                to: *recipient,
                amount,
            });
            Ok(amount)
        })?;
        info!(to = %recipient, amount, "minted");
        Ok(amount)
    }
}
