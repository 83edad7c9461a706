//! Provider-backed collaborators for live-chain deployments.

use alloy::primitives::{Address, Bytes, FixedBytes, B256};
use alloy::providers::Provider;

use crate::channels::ChannelRegistry;
use crate::error::CommError;
use crate::verify::AccountInspector;
use crate::{ICommCore, IERC1271};

/// Classifies accounts by eth_getCode and dispatches delegated verification
/// as an ERC-1271 `isValidSignature` call.
pub struct RpcAccountInspector<P> {
    provider: P,
}

impl<P> RpcAccountInspector<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider> AccountInspector for RpcAccountInspector<P> {
    async fn has_code(&self, account: Address) -> Result<bool, CommError> {
        let code = self
            .provider
            .get_code_at(account)
            .await
            .map_err(|e| CommError::ChainError(format!("getCode failed: {e}")))?;
        Ok(!code.is_empty())
    }

    async fn is_valid_signature(
        &self,
        account: Address,
        digest: B256,
        signature: &[u8],
    ) -> Result<FixedBytes<4>, CommError> {
        let contract = IERC1271::new(account, &self.provider);
        contract
            .isValidSignature(digest, Bytes::copy_from_slice(signature))
            .call()
            .await
            .map_err(|e| CommError::ChainError(format!("isValidSignature failed: {e}")))
    }
}

/// Channel lookups against the core contract.
pub struct RpcChannelRegistry<P> {
    provider: P,
    core: Address,
}

impl<P> RpcChannelRegistry<P> {
    pub fn new(provider: P, core: Address) -> Self {
        Self { provider, core }
    }
}

impl<P: Provider> ChannelRegistry for RpcChannelRegistry<P> {
    async fn channel_exists(&self, channel: Address) -> Result<bool, CommError> {
        let contract = ICommCore::new(self.core, &self.provider);
        contract
            .channelExists(channel)
            .call()
            .await
            .map_err(|e| CommError::ChainError(format!("channelExists failed: {e}")))
    }

    async fn is_active_channel(&self, channel: Address) -> Result<bool, CommError> {
        let contract = ICommCore::new(self.core, &self.provider);
        contract
            .isActiveChannel(channel)
            .call()
            .await
            .map_err(|e| CommError::ChainError(format!("isActiveChannel failed: {e}")))
    }
}
