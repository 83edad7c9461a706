use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Mutex;

use crate::error::CommError;

/// Trait for per-subscriber nonce counter backends.
///
/// Counters are strictly increasing and never deleted: storage is bounded by
/// the number of subscribers, not the number of authorizations.
/// Implementations must be thread-safe (`Send + Sync`).
pub trait NonceStore: Send + Sync {
    /// Last consumed nonce for `subscriber`; zero when none has been consumed.
    fn last_consumed(&self, subscriber: Address) -> U256;

    /// Atomically advance `subscriber`'s counter from `prev` to `nonce`.
    /// Returns `false` when the stored value no longer equals `prev` (a
    /// racing submission won) or the backend rejects the write. Exactly one
    /// of two racing advances for the same nonce succeeds.
    fn try_advance(&self, subscriber: Address, prev: U256, nonce: U256) -> bool;

    /// Roll a committed advance back (the relation write failed after the
    /// nonce was consumed). Compare-and-swap from `nonce` back to `prev`;
    /// returns `false` if the counter had already moved on.
    fn release(&self, subscriber: Address, nonce: U256, prev: U256) -> bool;
}

/// In-memory nonce store backed by DashMap. Fast but lost on restart.
pub struct InMemoryNonceStore {
    counters: DashMap<Address, U256>,
}

impl InMemoryNonceStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn last_consumed(&self, subscriber: Address) -> U256 {
        self.counters
            .get(&subscriber)
            .map(|entry| *entry)
            .unwrap_or(U256::ZERO)
    }

    fn try_advance(&self, subscriber: Address, prev: U256, nonce: U256) -> bool {
        // DashMap's entry API provides atomicity within a single process.
        use dashmap::mapref::entry::Entry;
        match self.counters.entry(subscriber) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() == prev {
                    occupied.insert(nonce);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                if prev.is_zero() {
                    vacant.insert(nonce);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn release(&self, subscriber: Address, nonce: U256, prev: U256) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.counters.entry(subscriber) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() != nonce {
                    return false;
                }
                if prev.is_zero() {
                    occupied.remove();
                } else {
                    occupied.insert(prev);
                }
                true
            }
            Entry::Vacant(_) => false,
        }
    }
}

/// Persistent nonce store backed by SQLite. Survives restarts.
pub struct SqliteNonceStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteNonceStore {
    /// Open (or create) a SQLite nonce database at the given path.
    pub fn open(path: &str) -> Result<Self, CommError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| CommError::StoreError(format!("open nonce db: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS subscriber_nonces (
                subscriber BLOB PRIMARY KEY,
                last_nonce BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            PRAGMA journal_mode=WAL;",
        )
        .map_err(|e| CommError::StoreError(format!("init nonce db: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => {
                tracing::error!("nonce store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Helper to get the current unix timestamp safely.
/// On clock error, returns u64::MAX so that expiry checks fail closed: every
/// authorization reads as expired rather than accepted late.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_else(|_| {
            tracing::error!("system clock before UNIX epoch, failing closed");
            u64::MAX
        })
}

impl NonceStore for SqliteNonceStore {
    fn last_consumed(&self, subscriber: Address) -> U256 {
        let conn = self.lock();
        let bytes: Result<Vec<u8>, _> = conn.query_row(
            "SELECT last_nonce FROM subscriber_nonces WHERE subscriber = ?1",
            [subscriber.as_slice()],
            |row| row.get(0),
        );
        match bytes {
            Ok(raw) => U256::from_be_slice(&raw),
            Err(rusqlite::Error::QueryReturnedNoRows) => U256::ZERO,
            Err(e) => {
                // Fail-secure: a database fault reads as an exhausted counter,
                // so every proposed nonce rejects as reused.
                tracing::error!(error = %e, "nonce lookup failed, failing closed");
                U256::MAX
            }
        }
    }

    fn try_advance(&self, subscriber: Address, prev: U256, nonce: U256) -> bool {
        let conn = self.lock();
        let now = unix_now() as i64;
        let result = if prev.is_zero() {
            // No row yet: the PRIMARY KEY constraint makes the insert a
            // compare-and-swap, atomic at the database level.
            conn.execute(
                "INSERT INTO subscriber_nonces (subscriber, last_nonce, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    subscriber.as_slice(),
                    nonce.to_be_bytes::<32>().as_slice(),
                    now
                ],
            )
        } else {
            conn.execute(
                "UPDATE subscriber_nonces SET last_nonce = ?2, updated_at = ?3
                 WHERE subscriber = ?1 AND last_nonce = ?4",
                rusqlite::params![
                    subscriber.as_slice(),
                    nonce.to_be_bytes::<32>().as_slice(),
                    now,
                    prev.to_be_bytes::<32>().as_slice()
                ],
            )
        };
        match result {
            Ok(rows) => rows == 1,
            Err(e) => {
                tracing::warn!(error = %e, "nonce advance failed");
                false
            }
        }
    }

    fn release(&self, subscriber: Address, nonce: U256, prev: U256) -> bool {
        let conn = self.lock();
        let result = if prev.is_zero() {
            conn.execute(
                "DELETE FROM subscriber_nonces WHERE subscriber = ?1 AND last_nonce = ?2",
                rusqlite::params![subscriber.as_slice(), nonce.to_be_bytes::<32>().as_slice()],
            )
        } else {
            conn.execute(
                "UPDATE subscriber_nonces SET last_nonce = ?2
                 WHERE subscriber = ?1 AND last_nonce = ?3",
                rusqlite::params![
                    subscriber.as_slice(),
                    prev.to_be_bytes::<32>().as_slice(),
                    nonce.to_be_bytes::<32>().as_slice()
                ],
            )
        };
        match result {
            Ok(rows) => rows == 1,
            Err(e) => {
                tracing::error!(error = %e, "nonce release failed, counter stays consumed");
                false
            }
        }
    }
}
