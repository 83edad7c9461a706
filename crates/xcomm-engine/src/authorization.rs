use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::CommError;

/// One relayed authorization as submitted by a caller.
///
/// Constructed per call and never persisted verbatim; only its digest and the
/// resulting state change survive the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAuthorization {
    pub channel: Address,
    pub subscriber: Address,
    pub nonce: U256,
    pub expiry: U256,
    /// 65-byte r ‖ s ‖ v for key-holder signers; opaque bytes forwarded
    /// verbatim to a contract account's delegated verification entry point.
    pub signature: Bytes,
}

impl SubscriptionAuthorization {
    /// Signature as a 0x-prefixed hex string.
    pub fn signature_hex(&self) -> String {
        format!("0x{}", alloy::hex::encode(&self.signature))
    }

    /// Replace the signature from a 0x-prefixed (or bare) hex string.
    pub fn set_signature_hex(&mut self, hex: &str) -> Result<(), CommError> {
        let raw = alloy::hex::decode(hex.strip_prefix("0x").unwrap_or(hex))
            .map_err(|e| CommError::MalformedSignature(format!("invalid hex signature: {e}")))?;
        self.signature = raw.into();
        Ok(())
    }
}
