//! Expiry and nonce enforcement for relayed authorizations.
//!
//! Nonces are strictly sequential per subscriber: the only valid nonce is
//! `last_consumed + 1`, with counters starting at zero (so the first valid
//! nonce is 1). Callers compute the next valid nonce by reading the counter.
//!
//! The guard is two-phase. [`ReplayGuard::check`] is read-only and hands
//! back a [`NonceClaim`]; [`ReplayGuard::commit`] is a compare-and-swap, so
//! of two racing submissions bearing the same nonce exactly one commits and
//! the other deterministically fails as reused.

use std::sync::Arc;

use alloy::primitives::{Address, U256};

use crate::error::CommError;
use crate::nonce_store::{unix_now, NonceStore};

/// Proof that an (expiry, nonce) pair passed the read-only checks. Carries
/// the counter value the commit-time compare-and-swap must still observe.
#[derive(Debug, Clone, Copy)]
pub struct NonceClaim {
    subscriber: Address,
    prev: U256,
    nonce: U256,
}

/// Per-subscriber replay protection over a pluggable [`NonceStore`].
pub struct ReplayGuard {
    store: Arc<dyn NonceStore>,
}

impl ReplayGuard {
    pub fn new(store: Arc<dyn NonceStore>) -> Self {
        Self { store }
    }

    /// Validate expiry and nonce without mutating anything.
    ///
    /// Expiry is strict: `expiry <= now` rejects. A nonce at or below the
    /// last consumed one is a replay; a nonce skipping ahead is out of order.
    pub fn check(
        &self,
        subscriber: Address,
        nonce: U256,
        expiry: U256,
    ) -> Result<NonceClaim, CommError> {
        let now = unix_now();
        if expiry <= U256::from(now) {
            return Err(CommError::AuthorizationExpired { expiry, now });
        }

        let prev = self.store.last_consumed(subscriber);
        if nonce <= prev {
            return Err(CommError::NonceReused {
                subscriber,
                nonce,
                last: prev,
            });
        }
        // prev < nonce <= U256::MAX, so prev + 1 cannot overflow.
        let expected = prev + U256::from(1u64);
        if nonce != expected {
            return Err(CommError::NonceOutOfOrder {
                subscriber,
                nonce,
                expected,
            });
        }

        Ok(NonceClaim {
            subscriber,
            prev,
            nonce,
        })
    }

    /// Consume the claimed nonce. Fails as [`CommError::NonceReused`] when a
    /// racing submission consumed it between check and commit.
    pub fn commit(&self, claim: &NonceClaim) -> Result<(), CommError> {
        if self
            .store
            .try_advance(claim.subscriber, claim.prev, claim.nonce)
        {
            Ok(())
        } else {
            Err(CommError::NonceReused {
                subscriber: claim.subscriber,
                nonce: claim.nonce,
                last: self.store.last_consumed(claim.subscriber),
            })
        }
    }

    /// Roll a committed claim back after a downstream write failed, so the
    /// subscriber can resubmit the same signed authorization.
    pub fn release(&self, claim: &NonceClaim) {
        if !self
            .store
            .release(claim.subscriber, claim.nonce, claim.prev)
        {
            tracing::error!(
                subscriber = %claim.subscriber,
                nonce = %claim.nonce,
                "nonce rollback lost a race, counter stays advanced"
            );
        }
    }

    /// Last consumed nonce for `subscriber`, for clients computing the next
    /// valid one.
    pub fn last_consumed(&self, subscriber: Address) -> U256 {
        self.store.last_consumed(subscriber)
    }
}
