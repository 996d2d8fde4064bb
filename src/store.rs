//! Key/value port the ledger persists through.
//!
//! The host supplies a [`StateStore`] (get/set/delete by key). Every ledger
//! call runs against a [`Transaction`] overlay: reads fall through to the
//! store, writes are staged, and the staged [`WriteSet`] is applied in one go
//! only if the call succeeds.
//!
//! Storage layout (one prefix byte, fixed-width payload):
//!
//! - `admin` - `[0x01]` -> account (32 bytes)
//! - `paused` - `[0x02]` -> u8
//! - `total_supply` - `[0x03]` -> u64 LE
//! - `mint_cap` - `[0x04]` -> u64 LE
//! - `sequence` - `[0x05]` -> u64 LE
//! - `balance:{account}` - `[0x10 | account]` -> u64 LE
//! - `allowance:{owner}:{spender}` - `[0x20 | owner | spender]` -> u64 LE
//! - `stake:{account}` - `[0x30 | account]` -> u64 LE
//! - `delegation:{delegator}:{delegatee}` - `[0x40 | delegator | delegatee]` -> u64 LE

use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::account::{AccountId, ACCOUNT_ID_LEN};
use crate::ledger::Amount;

const KEY_ADMIN: u8 = 0x01;
const KEY_PAUSED: u8 = 0x02;
const KEY_TOTAL_SUPPLY: u8 = 0x03;
const KEY_MINT_CAP: u8 = 0x04;
const KEY_SEQUENCE: u8 = 0x05;
pub const KEY_BALANCE_PREFIX: u8 = 0x10;
pub const KEY_ALLOWANCE_PREFIX: u8 = 0x20;
pub const KEY_STAKE_PREFIX: u8 = 0x30;
pub const KEY_DELEGATION_PREFIX: u8 = 0x40;

const STORE_FORMAT_VERSION: u8 = 1;

/// Host-supplied persistent key/value store.
pub trait StateStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: &[u8], value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
    /// Every entry whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// (owner, spender) pair addressing an allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllowanceKey {
    pub owner: AccountId,
    pub spender: AccountId,
}

/// (delegator, delegatee) pair addressing a delegation grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DelegationKey {
    pub delegator: AccountId,
    pub delegatee: AccountId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKey {
    Admin,
    Paused,
    TotalSupply,
    MintCap,
    Sequence,
    Balance(AccountId),
    Allowance(AllowanceKey),
    Stake(AccountId),
    Delegation(DelegationKey),
}

impl StorageKey {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            StorageKey::Admin => vec![KEY_ADMIN],
            StorageKey::Paused => vec![KEY_PAUSED],
            StorageKey::TotalSupply => vec![KEY_TOTAL_SUPPLY],
            StorageKey::MintCap => vec![KEY_MINT_CAP],
            StorageKey::Sequence => vec![KEY_SEQUENCE],
            StorageKey::Balance(account) => prefixed(KEY_BALANCE_PREFIX, &[account]),
            StorageKey::Allowance(key) => {
                prefixed(KEY_ALLOWANCE_PREFIX, &[&key.owner, &key.spender])
            }
            StorageKey::Stake(account) => prefixed(KEY_STAKE_PREFIX, &[account]),
            StorageKey::Delegation(key) => {
                prefixed(KEY_DELEGATION_PREFIX, &[&key.delegator, &key.delegatee])
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&tag, rest) = bytes.split_first()?;
        let one = |rest: &[u8]| AccountId::from_slice(rest);
        let two = |rest: &[u8]| {
            if rest.len() != 2 * ACCOUNT_ID_LEN {
                return None;
            }
            let (a, b) = rest.split_at(ACCOUNT_ID_LEN);
            Some((AccountId::from_slice(a)?, AccountId::from_slice(b)?))
        };
        let key = match tag {
            KEY_ADMIN if rest.is_empty() => StorageKey::Admin,
            KEY_PAUSED if rest.is_empty() => StorageKey::Paused,
            KEY_TOTAL_SUPPLY if rest.is_empty() => StorageKey::TotalSupply,
            KEY_MINT_CAP if rest.is_empty() => StorageKey::MintCap,
            KEY_SEQUENCE if rest.is_empty() => StorageKey::Sequence,
            KEY_BALANCE_PREFIX => StorageKey::Balance(one(rest)?),
            KEY_STAKE_PREFIX => StorageKey::Stake(one(rest)?),
            KEY_ALLOWANCE_PREFIX => {
                let (owner, spender) = two(rest)?;
                StorageKey::Allowance(AllowanceKey { owner, spender })
            }
            KEY_DELEGATION_PREFIX => {
                let (delegator, delegatee) = two(rest)?;
                StorageKey::Delegation(DelegationKey {
                    delegator,
                    delegatee,
                })
            }
            _ => return None,
        };
        Some(key)
    }
}

fn prefixed(tag: u8, accounts: &[&AccountId]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + accounts.len() * ACCOUNT_ID_LEN);
    key.push(tag);
    for account in accounts {
        key.extend_from_slice(account.as_bytes());
    }
    key
}

pub fn encode_amount(amount: Amount) -> Vec<u8> {
    amount.to_le_bytes().to_vec()
}

/// Malformed or absent values read as zero, like an untouched entry.
pub fn decode_amount(bytes: &[u8]) -> Amount {
    match <[u8; 8]>::try_from(bytes) {
        Ok(raw) => Amount::from_le_bytes(raw),
        Err(_) => 0,
    }
}

//==================== in-memory store ====================//

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        let persisted = PersistedStore {
            version: STORE_FORMAT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (hex::encode(k), hex::encode(v)))
                .collect(),
        };
        Ok(serde_json::to_vec_pretty(&persisted)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let persisted: PersistedStore = serde_json::from_slice(bytes)?;
        if persisted.version != STORE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(persisted.version));
        }
        let mut entries = BTreeMap::new();
        for (k, v) in persisted.entries {
            let key = hex::decode(&k).map_err(|_| StoreError::MalformedEntry(k.clone()))?;
            if StorageKey::decode(&key).is_none() {
                return Err(StoreError::MalformedEntry(k));
            }
            let value = hex::decode(&v).map_err(|_| StoreError::MalformedEntry(k))?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedStore {
    version: u8,
    entries: BTreeMap<String, String>, // hex key -> hex value
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported state format version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed state entry {0}")]
    MalformedEntry(String),
}

//==================== file-backed store ====================//

/// [`MemoryStore`] persisted as a JSON document (hex key -> hex value).
///
/// Writes land in memory; [`FileStore::persist`] replaces the file atomically.
/// An exclusive lock on the `<path>.lock` sidecar is held from `open` until
/// the store is dropped, so two hosts on the same file run one after the
/// other instead of overwriting each other's calls.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    // released on drop
    _lock: File,
}

impl FileStore {
    /// Locks and opens `path`, starting empty when the file does not exist
    /// yet. Blocks while another handle holds the lock.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let lock = acquire_lock(&path)?;
        let inner = match fs::read(&path) {
            Ok(bytes) => MemoryStore::from_json(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            inner,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path(&self.path)
    }

    pub fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let bytes = self.inner.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).map_err(io_err)?;
        f.write_all(&bytes).map_err(io_err)?;
        f.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), entries = self.inner.len(), "state persisted");
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_lock(path: &Path) -> Result<File, StoreError> {
    let lock_path = lock_path(path);
    let io_err = |source: std::io::Error| StoreError::Io {
        path: lock_path.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(io_err)?;
    if file.try_lock_exclusive().is_err() {
        tracing::info!(path = %lock_path.display(), "state file busy, waiting for lock");
        file.lock_exclusive().map_err(io_err)?;
    }
    Ok(file)
}

impl StateStore for FileStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.inner.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.inner.scan_prefix(prefix)
    }
}

//==================== staged transaction ====================//

/// Read-through overlay over a [`StateStore`].
///
/// Nothing reaches the underlying store until [`Transaction::into_writes`]
/// is applied, so a call that fails half-way leaves no trace.
pub struct Transaction<'a, S: StateStore + ?Sized> {
    base: &'a S,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: StateStore + ?Sized> Transaction<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &StorageKey) -> Option<Vec<u8>> {
        let raw = key.encode();
        match self.writes.get(&raw) {
            Some(staged) => staged.clone(),
            None => self.base.get(&raw),
        }
    }

    pub fn put(&mut self, key: &StorageKey, value: Vec<u8>) {
        self.writes.insert(key.encode(), Some(value));
    }

    pub fn remove(&mut self, key: &StorageKey) {
        self.writes.insert(key.encode(), None);
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        self.get(key).is_some()
    }

    pub fn amount(&self, key: &StorageKey) -> Amount {
        self.get(key).map(|v| decode_amount(&v)).unwrap_or(0)
    }

    pub fn set_amount(&mut self, key: &StorageKey, amount: Amount) {
        self.put(key, encode_amount(amount));
    }

    pub fn flag(&self, key: &StorageKey) -> bool {
        matches!(self.get(key).as_deref(), Some([1]))
    }

    pub fn set_flag(&mut self, key: &StorageKey, flag: bool) {
        self.put(key, vec![u8::from(flag)]);
    }

    pub fn account(&self, key: &StorageKey) -> Option<AccountId> {
        self.get(key).and_then(|v| AccountId::from_slice(&v))
    }

    pub fn set_account(&mut self, key: &StorageKey, account: &AccountId) {
        self.put(key, account.as_bytes().to_vec());
    }

    pub fn into_writes(self) -> WriteSet {
        WriteSet(self.writes)
    }
}

/// Staged writes of a successful call; `None` marks a deletion.
#[derive(Debug, Default)]
pub struct WriteSet(BTreeMap<Vec<u8>, Option<Vec<u8>>>);

impl WriteSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply_to<S: StateStore + ?Sized>(self, store: &mut S) {
        for (key, value) in self.0 {
            match value {
                Some(value) => store.set(&key, value),
                None => store.delete(&key),
            }
        }
    }
}
