use alloy::primitives::Address;

use crate::subscriptions::SubscriptionState;

/// Notification sink for committed transitions. Fired exactly once per
/// actual state change, after the nonce and relation have both committed,
/// and never for idempotent no-op calls.
pub trait EventSink: Send + Sync {
    fn on_subscription_changed(
        &self,
        channel: Address,
        subscriber: Address,
        new_state: SubscriptionState,
    );
}

/// Default sink that drops notifications.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn on_subscription_changed(
        &self,
        _channel: Address,
        _subscriber: Address,
        _new_state: SubscriptionState,
    ) {
    }
}
