use std::future::Future;

use alloy::primitives::Address;
use dashmap::DashMap;

use crate::error::CommError;

/// Channel-registry collaborator. Channel lifecycle lives outside the
/// engine; this is the only surface the engine consumes from it.
pub trait ChannelRegistry: Send + Sync {
    fn channel_exists(
        &self,
        channel: Address,
    ) -> impl Future<Output = Result<bool, CommError>> + Send;

    fn is_active_channel(
        &self,
        channel: Address,
    ) -> impl Future<Output = Result<bool, CommError>> + Send;
}

/// In-memory channel registry for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryChannelRegistry {
    // channel -> active flag
    channels: DashMap<Address, bool>,
}

impl InMemoryChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn add_channel(&self, channel: Address) {
        self.channels.insert(channel, true);
    }

    pub fn deactivate(&self, channel: Address) {
        self.channels.insert(channel, false);
    }
}

impl ChannelRegistry for InMemoryChannelRegistry {
    async fn channel_exists(&self, channel: Address) -> Result<bool, CommError> {
        Ok(self.channels.contains_key(&channel))
    }

    async fn is_active_channel(&self, channel: Address) -> Result<bool, CommError> {
        Ok(self.channels.get(&channel).map(|e| *e).unwrap_or(false))
    }
}
