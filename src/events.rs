//! Fire-and-forget notifications for off-chain observers.
//!
//! Events are handed to the [`EventSink`] only after a call's writes have been
//! applied. A sink cannot fail the call: `append` returns nothing, and sinks
//! that do I/O log and swallow their own errors.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::account::AccountId;
use crate::ledger::Amount;

pub const MAX_MEMO_LEN: usize = 34;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    AdminTransferred {
        previous: AccountId,
        admin: AccountId,
    },
    PauseChanged {
        paused: bool,
    },
    MintCapUpdated {
        previous: Amount,
        cap: Amount,
    },
    Minted {
        to: AccountId,
        amount: Amount,
    },
    Burned {
        from: AccountId,
        amount: Amount,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Memo {
        memo: Memo,
    },
    Approval {
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    },
    Staked {
        account: AccountId,
        amount: Amount,
    },
    Unstaked {
        account: AccountId,
        amount: Amount,
    },
    Delegated {
        delegator: AccountId,
        delegatee: AccountId,
        amount: Amount,
    },
    DelegationRevoked {
        delegator: AccountId,
        delegatee: AccountId,
        amount: Amount,
    },
}

/// An event stamped with the sequence number of the call that produced it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

pub trait EventSink {
    fn append(&mut self, record: &EventRecord);
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn append(&mut self, record: &EventRecord) {
        (**self).append(record)
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn append(&mut self, record: &EventRecord) {
        (**self).append(record)
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn append(&mut self, record: &EventRecord) {
        self.0.append(record);
        self.1.append(record);
    }
}

/// Keeps every record in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Vec<EventRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn events(&self) -> impl Iterator<Item = &LedgerEvent> {
        self.records.iter().map(|r| &r.event)
    }

    pub fn last(&self) -> Option<&LedgerEvent> {
        self.records.last().map(|r| &r.event)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Hands over every buffered record, oldest first.
    pub fn drain(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.records)
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, record: &EventRecord) {
        self.records.push(record.clone());
    }
}

/// Emits each record as a structured `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn append(&mut self, record: &EventRecord) {
        tracing::info!(sequence = record.sequence, event = ?record.event, "ledger event");
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn append(&mut self, record: &EventRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, sequence = record.sequence, "event encode failed, dropped");
                return;
            }
        };
        line.push(b'\n');
        if let Err(err) = self.file.write_all(&line) {
            tracing::warn!(
                %err,
                path = %self.path.display(),
                sequence = record.sequence,
                "event append failed, dropped"
            );
        }
    }
}

//==================== memo ====================//

/// Free-form memo attached to a transfer, at most [`MAX_MEMO_LEN`] bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Memo(Vec<u8>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("memo is {0} bytes, limit is {max}", max = MAX_MEMO_LEN)]
pub struct MemoTooLong(pub usize);

impl Memo {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, MemoTooLong> {
        let bytes = bytes.into();
        if bytes.len() > MAX_MEMO_LEN {
            return Err(MemoTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Memo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) => write!(f, "Memo({text:?})"),
            Err(_) => write!(f, "Memo(0x{})", hex::encode(&self.0)),
        }
    }
}

impl Serialize for Memo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Memo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        Memo::new(bytes).map_err(D::Error::custom)
    }
}
