//! Signature-authorized channel subscriptions.
//!
//! Lets a subscriber (key-holder account or contract account) authorize a
//! channel subscribe/unsubscribe off-chain with an EIP-712 signed message,
//! which a relayer later submits on the signer's behalf. The engine hashes
//! the message under a fixed domain, verifies the signature (ECDSA recovery
//! for key holders, ERC-1271 delegated verification for contract accounts),
//! enforces per-subscriber sequential nonces and expiry, and applies the
//! transition all-or-nothing.
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use alloy::signers::SignerSync;
//! use alloy::primitives::{Address, U256};
//! use xcomm::{
//!     Action, DomainConfig, InMemoryAccountRegistry, InMemoryChannelRegistry,
//!     SubscriptionAuthorization, SubscriptionEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = PrivateKeySigner::random();
//! let channel: Address = "0xCHANNEL".parse().unwrap();
//!
//! let channels = InMemoryChannelRegistry::new();
//! channels.add_channel(channel);
//!
//! let domain = DomainConfig::new(1, "0xCONTRACT".parse().unwrap());
//! let engine = SubscriptionEngine::new(domain, channels, InMemoryAccountRegistry::new());
//!
//! let mut auth = SubscriptionAuthorization {
//!     channel,
//!     subscriber: signer.address(),
//!     nonce: U256::from(1u64),
//!     expiry: U256::from(u64::MAX),
//!     signature: Default::default(),
//! };
//! let digest = engine.digest(Action::Subscribe, &auth);
//! auth.signature = signer.sign_hash_sync(&digest).unwrap().as_bytes().to_vec().into();
//!
//! engine.subscribe_by_sig(&auth).await.unwrap();
//! # }
//! ```

pub mod authorization;
pub mod channels;
pub mod constants;
pub mod eip712;
pub mod engine;
pub mod error;
pub mod events;
pub mod nonce_store;
pub mod replay;
pub mod subscriptions;
pub mod verify;

// Provider-backed collaborators (eth_getCode, ERC-1271, core-contract lookups)
pub mod chain;

use alloy::sol;

// EIP-712 structs for subscription authorizations. The sol! macro derives
// SolStruct which provides eip712_signing_hash(). Subscribe and Unsubscribe
// carry the same fields but distinct typehashes, so a signature over one can
// never authorize the other.
sol! {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Subscribe {
        address channel;
        address subscriber;
        uint256 nonce;
        uint256 expiry;
    }
}

sol! {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Unsubscribe {
        address channel;
        address subscriber;
        uint256 nonce;
        uint256 expiry;
    }
}

// ERC-1271 delegated verification entry point of a contract account.
sol! {
    #[sol(rpc)]
    interface IERC1271 {
        function isValidSignature(bytes32 digest, bytes signature) external view returns (bytes4);
    }
}

// Channel registry surface of the core contract.
sol! {
    #[sol(rpc)]
    interface ICommCore {
        function channelExists(address channel) external view returns (bool);
        function isActiveChannel(address channel) external view returns (bool);
    }
}

// Re-exports
pub use authorization::SubscriptionAuthorization;
pub use channels::{ChannelRegistry, InMemoryChannelRegistry};
pub use constants::{DomainConfig, DOMAIN_NAME, ERC1271_MAGIC_VALUE};
pub use engine::SubscriptionEngine;
pub use error::CommError;
pub use events::{EventSink, NullEventSink};
pub use nonce_store::{InMemoryNonceStore, NonceStore, SqliteNonceStore};
pub use replay::ReplayGuard;
pub use subscriptions::{
    Action, InMemorySubscriptionStore, SqliteSubscriptionStore, SubscriptionState,
    SubscriptionStore,
};
pub use verify::{AccountInspector, DelegatedVerifier, InMemoryAccountRegistry, SignerKind};
