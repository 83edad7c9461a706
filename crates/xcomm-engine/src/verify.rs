//! Polymorphic signature verification over the two signer kinds.
//!
//! A subscriber is classified once per call as a [`SignerKind::KeyHolder`]
//! (no code at the address, ECDSA recover-and-compare) or a
//! [`SignerKind::ContractAccount`] (code present, delegated ERC-1271 call).
//!
//! # Trust boundary
//!
//! Classification by "has code" is itself a trust decision: an address with
//! no code at signing time that later gains code (or loses it, in an
//! account-abstraction setting) changes which verification path runs for its
//! signatures. This is an intentional, documented risk boundary of the
//! scheme, not something the engine papers over.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, FixedBytes, B256};
use dashmap::DashMap;

use crate::constants::ERC1271_MAGIC_VALUE;
use crate::error::CommError;

/// How a subscriber's signature is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// Externally-owned account; verified by ECDSA public-key recovery.
    KeyHolder,
    /// Account with code; verified by its own delegated verification logic.
    ContractAccount,
}

/// Account-side collaborator: code inspection and delegated verification
/// dispatch. On chain this is eth_getCode plus an ERC-1271 call; tests
/// register verifiers in memory.
pub trait AccountInspector: Send + Sync {
    /// Whether `account` has executable code at call time.
    fn has_code(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<bool, CommError>> + Send;

    /// Invoke `account`'s delegated verification entry point with the digest
    /// and the signature payload, returning the 4-byte result.
    fn is_valid_signature(
        &self,
        account: Address,
        digest: B256,
        signature: &[u8],
    ) -> impl Future<Output = Result<FixedBytes<4>, CommError>> + Send;
}

/// Classify a subscriber. Performed exactly once per call, before any
/// signature interpretation.
pub async fn classify<A: AccountInspector>(
    accounts: &A,
    subscriber: Address,
) -> Result<SignerKind, CommError> {
    if accounts.has_code(subscriber).await? {
        Ok(SignerKind::ContractAccount)
    } else {
        Ok(SignerKind::KeyHolder)
    }
}

/// Verify a contract account's signature via its delegated entry point.
///
/// Accepts iff the call succeeds and returns the ERC-1271 magic value. Any
/// revert, transport failure or mismatched return value is a rejection
/// ([`CommError::VerifierCallFailed`]), never a flow-aborting execution
/// error. The payload is forwarded verbatim; the account is fully
/// responsible for its own validation logic.
pub async fn verify_contract_account<A: AccountInspector>(
    accounts: &A,
    account: Address,
    digest: B256,
    signature: &[u8],
) -> Result<(), CommError> {
    let magic = match accounts.is_valid_signature(account, digest, signature).await {
        Ok(magic) => magic,
        Err(e) => {
            return Err(CommError::VerifierCallFailed(format!(
                "delegated verification call failed: {e}"
            )))
        }
    };

    if magic != ERC1271_MAGIC_VALUE {
        return Err(CommError::VerifierCallFailed(format!(
            "delegated verification returned {magic}, expected {ERC1271_MAGIC_VALUE}"
        )));
    }

    Ok(())
}

/// Classify the subscriber and verify the signature through the matching
/// path. Returns the kind that was used, for logging.
pub async fn verify_authorization<A: AccountInspector>(
    accounts: &A,
    subscriber: Address,
    digest: B256,
    signature: &[u8],
) -> Result<SignerKind, CommError> {
    let kind = classify(accounts, subscriber).await?;
    match kind {
        SignerKind::KeyHolder => crate::eip712::verify_key_holder(digest, subscriber, signature)?,
        SignerKind::ContractAccount => {
            verify_contract_account(accounts, subscriber, digest, signature).await?
        }
    }
    Ok(kind)
}

/// Self-defined acceptance logic of one contract account (single-key,
/// threshold, or any custom scheme).
pub trait DelegatedVerifier: Send + Sync {
    fn is_valid_signature(
        &self,
        digest: B256,
        signature: &[u8],
    ) -> Result<FixedBytes<4>, CommError>;
}

/// In-memory account registry. An address counts as a contract account iff a
/// verifier is registered for it; everything else is a key holder. Intended
/// for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryAccountRegistry {
    verifiers: DashMap<Address, Arc<dyn DelegatedVerifier>>,
}

impl InMemoryAccountRegistry {
    pub fn new() -> Self {
        Self {
            verifiers: DashMap::new(),
        }
    }

    /// Register `account` as a contract account with the given verifier.
    pub fn register(&self, account: Address, verifier: Arc<dyn DelegatedVerifier>) {
        self.verifiers.insert(account, verifier);
    }
}

impl AccountInspector for InMemoryAccountRegistry {
    async fn has_code(&self, account: Address) -> Result<bool, CommError> {
        Ok(self.verifiers.contains_key(&account))
    }

    async fn is_valid_signature(
        &self,
        account: Address,
        digest: B256,
        signature: &[u8],
    ) -> Result<FixedBytes<4>, CommError> {
        let verifier = self
            .verifiers
            .get(&account)
            .ok_or_else(|| CommError::VerifierCallFailed(format!("no code at {account}")))?;
        verifier.is_valid_signature(digest, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;
    impl DelegatedVerifier for AcceptAll {
        fn is_valid_signature(
            &self,
            _digest: B256,
            _signature: &[u8],
        ) -> Result<FixedBytes<4>, CommError> {
            Ok(ERC1271_MAGIC_VALUE)
        }
    }

    struct WrongMagic;
    impl DelegatedVerifier for WrongMagic {
        fn is_valid_signature(
            &self,
            _digest: B256,
            _signature: &[u8],
        ) -> Result<FixedBytes<4>, CommError> {
            Ok(FixedBytes::ZERO)
        }
    }

    struct Reverts;
    impl DelegatedVerifier for Reverts {
        fn is_valid_signature(
            &self,
            _digest: B256,
            _signature: &[u8],
        ) -> Result<FixedBytes<4>, CommError> {
            Err(CommError::ChainError("execution reverted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_classify_by_registered_code() {
        let registry = InMemoryAccountRegistry::new();
        let contract = Address::repeat_byte(0x01);
        registry.register(contract, Arc::new(AcceptAll));

        assert_eq!(
            classify(&registry, contract).await.unwrap(),
            SignerKind::ContractAccount
        );
        assert_eq!(
            classify(&registry, Address::repeat_byte(0x02)).await.unwrap(),
            SignerKind::KeyHolder
        );
    }

    #[tokio::test]
    async fn test_contract_account_accepts_on_magic() {
        let registry = InMemoryAccountRegistry::new();
        let contract = Address::repeat_byte(0x01);
        registry.register(contract, Arc::new(AcceptAll));

        verify_contract_account(&registry, contract, B256::repeat_byte(0x11), b"anything")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_contract_account_rejects_wrong_magic() {
        let registry = InMemoryAccountRegistry::new();
        let contract = Address::repeat_byte(0x01);
        registry.register(contract, Arc::new(WrongMagic));

        let err = verify_contract_account(&registry, contract, B256::repeat_byte(0x11), b"sig")
            .await
            .unwrap_err();
        assert!(matches!(err, CommError::VerifierCallFailed(_)));
    }

    #[tokio::test]
    async fn test_contract_account_revert_is_rejection() {
        let registry = InMemoryAccountRegistry::new();
        let contract = Address::repeat_byte(0x01);
        registry.register(contract, Arc::new(Reverts));

        let err = verify_contract_account(&registry, contract, B256::repeat_byte(0x11), b"sig")
            .await
            .unwrap_err();
        assert!(matches!(err, CommError::VerifierCallFailed(_)));
    }
}
