//! In-memory storage shared by the services.
//!
//! [`MemoryStore`] owns the data. Each request works through its own
//! [`StoreSession`], which is the request's transaction backend: `begin`
//! locks the store for the rest of the transaction and snapshots it,
//! `rollback` restores the snapshot, and `commit` keeps the changes. Access
//! outside a transaction locks the store only for the duration of one
//! operation.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use apigate_core::{ServiceError, TransactionBackend, UserType};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Whether a session may still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The session authenticates calls.
    Active,
    /// The session was logged out or expired.
    Passive,
}

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Account identifier.
    pub userid: u64,
    /// Login name, unique.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Privilege level.
    pub user_type: UserType,
    /// Salted password digest.
    pub password: PasswordHash,
    /// Whether failures include debug details for this user.
    pub debug_mode: bool,
    /// Whether the account may log in.
    pub enabled: bool,
    /// Idle seconds after which sessions expire; `0` disables expiry.
    pub autologout: u64,
    /// Consecutive failed logins.
    pub attempt_failed: u32,
    /// Time of the last failed login, in Unix seconds.
    pub attempt_clock: u64,
    /// Address of the last failed login.
    pub attempt_ip: String,
}

/// A login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Owning account.
    pub userid: u64,
    /// Time of last use, in Unix seconds.
    pub lastaccess: u64,
    /// Session state.
    pub status: SessionStatus,
}

/// A monitored host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    /// Host identifier.
    #[serde(serialize_with = "crate::store::id_as_string")]
    pub hostid: u64,
    /// Technical name, unique.
    pub host: String,
    /// Visible name.
    pub name: String,
    /// `0` when monitored, `1` when not.
    pub status: u8,
}

/// Everything the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    /// Accounts by id.
    pub users: BTreeMap<u64, UserRecord>,
    /// Sessions by session id.
    pub sessions: HashMap<String, SessionRecord>,
    /// Hosts by id.
    pub hosts: BTreeMap<u64, HostRecord>,
    next_userid: u64,
    next_hostid: u64,
}

impl StoreState {
    /// Allocates the next account id.
    pub fn allocate_userid(&mut self) -> u64 {
        self.next_userid += 1;
        self.next_userid
    }

    /// Allocates the next host id.
    pub fn allocate_hostid(&mut self) -> u64 {
        self.next_hostid += 1;
        self.next_hostid
    }

    /// Finds an account by login name.
    #[must_use]
    pub fn user_by_name(&self, username: &str) -> Option<&UserRecord> {
        self.users.values().find(|user| user.username == username)
    }

    /// Finds a host by technical name.
    #[must_use]
    pub fn host_by_name(&self, host: &str) -> Option<&HostRecord> {
        self.hosts.values().find(|record| record.host == host)
    }
}

/// A salted SHA-256 password digest.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: String,
    digest: String,
}

impl PasswordHash {
    /// Hashes `password` with a fresh random salt.
    #[must_use]
    pub fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = Self::digest(&salt, password);
        Self { salt, digest }
    }

    /// Returns `true` when `password` produced this digest.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        Self::digest(&self.salt, password) == self.digest
    }

    fn digest(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("PasswordHash(..)")
    }
}

/// Creates a random 32 character session identifier.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn id_as_string<S: serde::Serializer>(
    id: &u64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

/// Shared handle on the stored data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for one request.
    #[must_use]
    pub fn session(&self) -> StoreSession {
        StoreSession {
            state: Arc::clone(&self.state),
            transaction: RefCell::new(None),
        }
    }

    /// Runs `operation` against the data under the store lock.
    pub fn with_state<R>(&self, operation: impl FnOnce(&mut StoreState) -> R) -> R {
        operation(&mut *self.state.lock())
    }
}

struct OpenTransaction {
    guard: ArcMutexGuard<RawMutex, StoreState>,
    snapshot: StoreState,
}

/// One request's view of a [`MemoryStore`].
pub struct StoreSession {
    state: Arc<Mutex<StoreState>>,
    transaction: RefCell<Option<OpenTransaction>>,
}

impl StoreSession {
    /// Runs `operation` against the data.
    ///
    /// Inside a transaction this uses the lock the transaction holds;
    /// otherwise the store is locked for the duration of `operation`.
    /// `operation` must not call back into the session.
    pub fn with_state<R>(&self, operation: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut transaction = self.transaction.borrow_mut();
        match transaction.as_mut() {
            Some(open) => operation(&mut *open.guard),
            None => operation(&mut *self.state.lock()),
        }
    }

    /// Returns `true` while a transaction holds the store.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.borrow().is_some()
    }

    fn take_transaction(&self) -> Result<OpenTransaction, ServiceError> {
        self.transaction
            .borrow_mut()
            .take()
            .ok_or_else(|| ServiceError::internal("store session has no open transaction"))
    }
}

impl TransactionBackend for StoreSession {
    fn begin(&self) -> Result<(), ServiceError> {
        let mut transaction = self.transaction.borrow_mut();
        if transaction.is_some() {
            return Err(ServiceError::internal(
                "store session already has an open transaction",
            ));
        }
        let guard = self.state.lock_arc();
        let snapshot = StoreState::clone(&*guard);
        *transaction = Some(OpenTransaction { guard, snapshot });
        Ok(())
    }

    fn commit(&self) -> Result<(), ServiceError> {
        self.take_transaction().map(drop)
    }

    fn rollback(&self) -> Result<(), ServiceError> {
        let OpenTransaction {
            mut guard,
            snapshot,
        } = self.take_transaction()?;
        *guard = snapshot;
        Ok(())
    }
}

impl fmt::Debug for StoreSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoreSession")
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}
