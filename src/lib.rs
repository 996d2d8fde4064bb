//! Accounting engine for the BlockNet NOS unit.
//!
//! The crate keeps the complete state-transition logic of a fungible unit of
//! value:
//!
//! * [`ledger`]: the [`Ledger`] state object and every public operation
//!   (admin and pause gate, supply, balances, allowances, staking and vote
//!   delegation) plus the side-effect-free query surface.
//! * [`store`]: the narrow key/value port the ledger persists through, with an
//!   in-memory and a JSON file backed implementation and the staged
//!   [`store::Transaction`] overlay that makes every call all-or-nothing.
//! * [`events`]: fire-and-forget notifications for off-chain observers.
//! * [`account`]: 32-byte account identifiers and the reserved null account.
//! * [`config`]: token metadata and host configuration.
//! * [`shared`]: a lock-guarded handle for multi-threaded hosts.
//!
//! Value is only ever created by admin minting and only ever destroyed by
//! burning: `total_supply == Σ balances + Σ staked balances` holds after every
//! committed call.

pub mod account;
pub mod config;
pub mod events;
pub mod ledger;
pub mod shared;
pub mod store;

pub use account::AccountId;
pub use config::{LedgerConfig, TokenMetadata};
pub use events::{EventRecord, EventSink, LedgerEvent, Memo};
pub use ledger::{Amount, Ledger, LedgerError, DECIMALS, MAX_SUPPLY};
pub use shared::SharedLedger;
pub use store::{MemoryStore, StateStore};
