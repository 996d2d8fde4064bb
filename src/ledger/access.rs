use tracing::info;

use super::{ensure_not_null, Ledger, LedgerError};
use crate::account::AccountId;
use crate::events::{EventSink, LedgerEvent};
use crate::store::{StateStore, StorageKey};

// Admin operations never consult the pause flag.
impl<S: StateStore, E: EventSink> Ledger<S, E> {
    pub fn transfer_admin(
        &mut self,
        caller: &AccountId,
        new_admin: &AccountId,
    ) -> Result<(), LedgerError> {
        self.execute("transfer_admin", |op| {
            op.ensure_admin(caller)?;
            ensure_not_null(new_admin)?;
            let previous = op.admin().unwrap_or(AccountId::NULL);
            op.state.set_account(&StorageKey::Admin, new_admin);
            op.emit(LedgerEvent::AdminTransferred {
                previous,
                admin: *new_admin,
            });
            Ok(())
        })?;
        info!(admin = %new_admin, "admin transferred");
        Ok(())
    }

    /// Sets the emergency pause flag and returns it.
    pub fn set_paused(&mut self, caller: &AccountId, paused: bool) -> Result<bool, LedgerError> {
        self.execute("set_paused", |op| {
            op.ensure_admin(caller)?;
            op.state.set_flag(&StorageKey::Paused, paused);
            op.emit(LedgerEvent::PauseChanged { paused });
            Ok(paused)
        })?;
        info!(paused, "pause status changed");
        Ok(paused)
    }
}
