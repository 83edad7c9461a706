//! The engine tying hashing, verification, replay protection and the
//! subscription state machine together.

use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::authorization::SubscriptionAuthorization;
use crate::channels::ChannelRegistry;
use crate::constants::DomainConfig;
use crate::eip712;
use crate::error::CommError;
use crate::events::{EventSink, NullEventSink};
use crate::nonce_store::{InMemoryNonceStore, NonceStore};
use crate::replay::ReplayGuard;
use crate::subscriptions::{Action, InMemorySubscriptionStore, SubscriptionState, SubscriptionStore};
use crate::verify::{self, AccountInspector};

/// Applies relayed, signature-authorized subscribe/unsubscribe calls.
///
/// Each call is all-or-nothing: nothing persists unless the signature
/// verifies, the nonce and expiry pass, and the channel is active. A
/// per-subscriber lock serializes the whole authorize-verify-commit
/// sequence, and the nonce commit is a compare-and-swap, so two racing
/// submissions of one authorization admit exactly one.
pub struct SubscriptionEngine<C, A> {
    domain: DomainConfig,
    channels: C,
    accounts: A,
    replay: ReplayGuard,
    subscriptions: Arc<dyn SubscriptionStore>,
    events: Arc<dyn EventSink>,
    subscriber_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl<C, A> SubscriptionEngine<C, A> {
    /// Engine with in-memory stores and no event sink.
    pub fn new(domain: DomainConfig, channels: C, accounts: A) -> Self {
        Self {
            domain,
            channels,
            accounts,
            replay: ReplayGuard::new(Arc::new(InMemoryNonceStore::new())),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            events: Arc::new(NullEventSink),
            subscriber_locks: DashMap::new(),
        }
    }

    /// Set a custom nonce store (e.g. [`crate::SqliteNonceStore`] for
    /// persistence).
    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.replay = ReplayGuard::new(store);
        self
    }

    /// Set a custom subscription store.
    pub fn with_subscription_store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.subscriptions = store;
        self
    }

    /// Set the sink notified on every committed transition.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The signing domain, for off-chain signers reconstructing it.
    pub fn domain(&self) -> &DomainConfig {
        &self.domain
    }

    /// Digest a subscriber must sign to authorize `action` for `auth`'s
    /// fields.
    pub fn digest(&self, action: Action, auth: &SubscriptionAuthorization) -> B256 {
        eip712::authorization_digest(action, auth, &self.domain)
    }

    /// Last consumed nonce for `subscriber`; the next valid one is this
    /// plus one.
    pub fn last_consumed_nonce(&self, subscriber: Address) -> U256 {
        self.replay.last_consumed(subscriber)
    }

    /// Current state of the (channel, subscriber) relation.
    pub fn subscription_state(
        &self,
        channel: Address,
        subscriber: Address,
    ) -> Result<SubscriptionState, CommError> {
        self.subscriptions.state(channel, subscriber)
    }

    /// Get or create the per-subscriber lock.
    fn subscriber_lock(&self, subscriber: Address) -> Arc<Mutex<()>> {
        self.subscriber_locks
            .entry(subscriber)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl<C, A> SubscriptionEngine<C, A>
where
    C: ChannelRegistry,
    A: AccountInspector,
{
    /// Apply a signed subscribe authorization on the signer's behalf.
    pub async fn subscribe_by_sig(
        &self,
        auth: &SubscriptionAuthorization,
    ) -> Result<(), CommError> {
        self.authorize(Action::Subscribe, auth).await
    }

    /// Apply a signed unsubscribe authorization on the signer's behalf.
    pub async fn unsubscribe_by_sig(
        &self,
        auth: &SubscriptionAuthorization,
    ) -> Result<(), CommError> {
        self.authorize(Action::Unsubscribe, auth).await
    }

    async fn authorize(
        &self,
        action: Action,
        auth: &SubscriptionAuthorization,
    ) -> Result<(), CommError> {
        let result = self.apply(action, auth).await;
        if let Err(e) = &result {
            tracing::warn!(
                channel = %auth.channel,
                subscriber = %auth.subscriber,
                nonce = %auth.nonce,
                error = %e,
                "authorization rejected"
            );
        }
        result
    }

    async fn apply(
        &self,
        action: Action,
        auth: &SubscriptionAuthorization,
    ) -> Result<(), CommError> {
        let lock = self.subscriber_lock(auth.subscriber);
        let _guard = lock.lock().await;

        let digest = eip712::authorization_digest(action, auth, &self.domain);

        // Verification runs before any nonce state moves: a contract
        // account's delegated verifier observes the nonce unconsumed, and
        // the per-subscriber lock keeps it from committing a second call
        // with the same nonce underneath us.
        let kind =
            verify::verify_authorization(&self.accounts, auth.subscriber, digest, &auth.signature)
                .await?;

        let claim = self.replay.check(auth.subscriber, auth.nonce, auth.expiry)?;

        if !self.channels.channel_exists(auth.channel).await? {
            return Err(CommError::ChannelNotFound(auth.channel));
        }
        if !self.channels.is_active_channel(auth.channel).await? {
            return Err(CommError::ChannelInactive(auth.channel));
        }

        let target = action.target_state();
        let current = self.subscriptions.state(auth.channel, auth.subscriber)?;

        // Commit point. Nonce consumption and relation update form one
        // atomic unit: a failed relation write rolls the counter back.
        self.replay.commit(&claim)?;

        if current == target {
            tracing::info!(
                channel = %auth.channel,
                subscriber = %auth.subscriber,
                nonce = %auth.nonce,
                "already in target state, nonce consumed without transition"
            );
            return Ok(());
        }

        if let Err(e) = self
            .subscriptions
            .set_state(auth.channel, auth.subscriber, target)
        {
            self.replay.release(&claim);
            return Err(e);
        }

        self.events
            .on_subscription_changed(auth.channel, auth.subscriber, target);
        tracing::info!(
            channel = %auth.channel,
            subscriber = %auth.subscriber,
            nonce = %auth.nonce,
            signer_kind = ?kind,
            new_state = ?target,
            "subscription transition committed"
        );
        Ok(())
    }
}
