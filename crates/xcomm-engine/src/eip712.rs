//! EIP-712 typed-data hashing and key-holder signature verification.
//!
//! Provides functions for:
//! - Building the signing domain ([`signing_domain`])
//! - Computing authorization digests ([`subscribe_digest`], [`unsubscribe_digest`], [`authorization_digest`])
//! - Verifying key-holder signatures with strict v and EIP-2 low-s enforcement ([`verify_key_holder`])
//! - Encoding signatures to hex ([`encode_signature_hex`])

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::SolStruct;

use crate::authorization::SubscriptionAuthorization;
use crate::constants::DomainConfig;
use crate::error::CommError;
use crate::subscriptions::Action;
use crate::{Subscribe, Unsubscribe};

/// Build the EIP-712 domain for one engine deployment.
///
/// The version slot is left empty: the domain typehash covers exactly
/// name, chainId and verifyingContract.
pub fn signing_domain(config: &DomainConfig) -> alloy::sol_types::Eip712Domain {
    alloy::sol_types::Eip712Domain {
        name: Some(std::borrow::Cow::Owned(config.name.clone())),
        version: None,
        chain_id: Some(U256::from(config.chain_id)),
        verifying_contract: Some(config.verifying_contract),
        salt: None,
    }
}

/// Digest a subscriber signs to authorize subscribing to `channel`.
pub fn subscribe_digest(
    channel: Address,
    subscriber: Address,
    nonce: U256,
    expiry: U256,
    config: &DomainConfig,
) -> B256 {
    Subscribe {
        channel,
        subscriber,
        nonce,
        expiry,
    }
    .eip712_signing_hash(&signing_domain(config))
}

/// Digest a subscriber signs to authorize unsubscribing from `channel`.
pub fn unsubscribe_digest(
    channel: Address,
    subscriber: Address,
    nonce: U256,
    expiry: U256,
    config: &DomainConfig,
) -> B256 {
    Unsubscribe {
        channel,
        subscriber,
        nonce,
        expiry,
    }
    .eip712_signing_hash(&signing_domain(config))
}

/// Digest for a submitted authorization under the given action.
pub fn authorization_digest(
    action: Action,
    auth: &SubscriptionAuthorization,
    config: &DomainConfig,
) -> B256 {
    match action {
        Action::Subscribe => {
            subscribe_digest(auth.channel, auth.subscriber, auth.nonce, auth.expiry, config)
        }
        Action::Unsubscribe => {
            unsubscribe_digest(auth.channel, auth.subscriber, auth.nonce, auth.expiry, config)
        }
    }
}

/// secp256k1 curve order N / 2; signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Verify a key-holder (externally-owned account) signature over `digest`.
///
/// The payload must be exactly 65 bytes of r ‖ s ‖ v with v in {27, 28};
/// other v values are rejected, never coerced. High-s signatures are rejected
/// (EIP-2 malleability). Accepts iff the recovered address equals the claimed
/// subscriber.
pub fn verify_key_holder(
    digest: B256,
    subscriber: Address,
    signature_bytes: &[u8],
) -> Result<(), CommError> {
    if signature_bytes.len() != 65 {
        return Err(CommError::MalformedSignature(format!(
            "key-holder signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    // Strict v check: alloy's Signature::from_raw also accepts 0/1 parity
    // bytes, which the wire format does not allow.
    let v = signature_bytes[64];
    if v != 27 && v != 28 {
        return Err(CommError::MalformedSignature(format!(
            "v must be 27 or 28, got {v}"
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| CommError::MalformedSignature(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(CommError::MalformedSignature(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let recovered = sig
        .recover_address_from_prehash(&digest)
        .map_err(|e| CommError::MalformedSignature(format!("recovery failed: {e}")))?;

    if recovered != subscriber {
        return Err(CommError::SignatureMismatch {
            claimed: subscriber,
            recovered,
        });
    }

    Ok(())
}

/// Encode a Signature to a hex string with 0x prefix (65 bytes -> 0x + 130 hex).
/// Uses Electrum notation: v = 27 or 28 in the last byte.
pub fn encode_signature_hex(sig: &Signature) -> String {
    let bytes = sig.as_bytes();
    format!("0x{}", alloy::hex::encode(bytes))
}
