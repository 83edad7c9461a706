use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Errors returned by subscription-engine operations.
///
/// Every variant is terminal for the call: the engine never retries
/// internally and never mutates state on a failure path.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature mismatch: recovered {recovered}, claimed {claimed}")]
    SignatureMismatch { claimed: Address, recovered: Address },

    #[error("verifier call failed: {0}")]
    VerifierCallFailed(String),

    #[error("authorization expired: expiry {expiry}, now {now}")]
    AuthorizationExpired { expiry: U256, now: u64 },

    #[error("nonce {nonce} already consumed for {subscriber} (last consumed {last})")]
    NonceReused {
        subscriber: Address,
        nonce: U256,
        last: U256,
    },

    #[error("nonce {nonce} out of order for {subscriber} (expected {expected})")]
    NonceOutOfOrder {
        subscriber: Address,
        nonce: U256,
        expected: U256,
    },

    #[error("channel not found: {0}")]
    ChannelNotFound(Address),

    #[error("channel inactive: {0}")]
    ChannelInactive(Address),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("store error: {0}")]
    StoreError(String),
}
