use alloy::primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::CommError;

/// State of one (channel, subscriber) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

/// Which transition an authorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

impl Action {
    pub fn target_state(self) -> SubscriptionState {
        match self {
            Action::Subscribe => SubscriptionState::Subscribed,
            Action::Unsubscribe => SubscriptionState::Unsubscribed,
        }
    }
}

/// Trait for subscription relation backends. Only the engine's commit step
/// writes here; reads may fail (and abort the call) but a failed write after
/// the nonce committed triggers a nonce rollback in the engine.
pub trait SubscriptionStore: Send + Sync {
    fn state(&self, channel: Address, subscriber: Address) -> Result<SubscriptionState, CommError>;

    fn set_state(
        &self,
        channel: Address,
        subscriber: Address,
        state: SubscriptionState,
    ) -> Result<(), CommError>;
}

/// In-memory relation backed by DashMap. Presence in the set means
/// subscribed.
pub struct InMemorySubscriptionStore {
    relations: DashMap<(Address, Address), ()>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            relations: DashMap::new(),
        }
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn state(&self, channel: Address, subscriber: Address) -> Result<SubscriptionState, CommError> {
        if self.relations.contains_key(&(channel, subscriber)) {
            Ok(SubscriptionState::Subscribed)
        } else {
            Ok(SubscriptionState::Unsubscribed)
        }
    }

    fn set_state(
        &self,
        channel: Address,
        subscriber: Address,
        state: SubscriptionState,
    ) -> Result<(), CommError> {
        match state {
            SubscriptionState::Subscribed => {
                self.relations.insert((channel, subscriber), ());
            }
            SubscriptionState::Unsubscribed => {
                self.relations.remove(&(channel, subscriber));
            }
        }
        Ok(())
    }
}

/// Persistent relation backed by SQLite.
pub struct SqliteSubscriptionStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteSubscriptionStore {
    /// Open (or create) a SQLite subscription database at the given path.
    pub fn open(path: &str) -> Result<Self, CommError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| CommError::StoreError(format!("open subscription db: {e}")))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                channel BLOB NOT NULL,
                subscriber BLOB NOT NULL,
                PRIMARY KEY (channel, subscriber)
            );
            PRAGMA journal_mode=WAL;",
        )
        .map_err(|e| CommError::StoreError(format!("init subscription db: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => {
                tracing::error!("subscription store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl SubscriptionStore for SqliteSubscriptionStore {
    fn state(&self, channel: Address, subscriber: Address) -> Result<SubscriptionState, CommError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE channel = ?1 AND subscriber = ?2",
                rusqlite::params![channel.as_slice(), subscriber.as_slice()],
                |row| row.get(0),
            )
            .map_err(|e| CommError::StoreError(format!("subscription lookup: {e}")))?;
        if count > 0 {
            Ok(SubscriptionState::Subscribed)
        } else {
            Ok(SubscriptionState::Unsubscribed)
        }
    }

    fn set_state(
        &self,
        channel: Address,
        subscriber: Address,
        state: SubscriptionState,
    ) -> Result<(), CommError> {
        let conn = self.lock();
        let result = match state {
            SubscriptionState::Subscribed => conn.execute(
                "INSERT OR IGNORE INTO subscriptions (channel, subscriber) VALUES (?1, ?2)",
                rusqlite::params![channel.as_slice(), subscriber.as_slice()],
            ),
            SubscriptionState::Unsubscribed => conn.execute(
                "DELETE FROM subscriptions WHERE channel = ?1 AND subscriber = ?2",
                rusqlite::params![channel.as_slice(), subscriber.as_slice()],
            ),
        };
        result
            .map(|_| ())
            .map_err(|e| CommError::StoreError(format!("subscription write: {e}")))
    }
}
