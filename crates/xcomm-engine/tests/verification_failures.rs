use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use xcomm::{eip712, CommError, DomainConfig};

fn domain() -> DomainConfig {
    DomainConfig::new(31337, Address::repeat_byte(0xaa))
}

/// Helper: sign a subscribe digest and return (fields, signature bytes).
fn make_signed_subscribe(
    signer: &PrivateKeySigner,
) -> (Address, Address, U256, U256, Vec<u8>) {
    let channel = Address::repeat_byte(0xcc);
    let subscriber = signer.address();
    let nonce = U256::from(1u64);
    let expiry = U256::from(u64::MAX);

    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &domain());
    let sig = signer.sign_hash_sync(&digest).unwrap();
    (channel, subscriber, nonce, expiry, sig.as_bytes().to_vec())
}

// -- Signature failure tests --

#[test]
fn test_verify_wrong_claimed_subscriber() {
    let signer_a = PrivateKeySigner::random();
    let signer_b = PrivateKeySigner::random();

    let (channel, _, nonce, expiry, sig) = make_signed_subscribe(&signer_a);

    // Claim the authorization is from signer_b: the digest the engine
    // derives names signer_b, so recovery lands elsewhere.
    let digest = eip712::subscribe_digest(channel, signer_b.address(), nonce, expiry, &domain());
    let err = eip712::verify_key_holder(digest, signer_b.address(), &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_verify_tampered_channel() {
    let signer = PrivateKeySigner::random();
    let (_, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let digest = eip712::subscribe_digest(
        Address::repeat_byte(0xcd),
        subscriber,
        nonce,
        expiry,
        &domain(),
    );
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_verify_tampered_nonce() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, _, expiry, sig) = make_signed_subscribe(&signer);

    let digest =
        eip712::subscribe_digest(channel, subscriber, U256::from(2u64), expiry, &domain());
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_verify_tampered_expiry() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let digest = eip712::subscribe_digest(
        channel,
        subscriber,
        nonce,
        expiry - U256::from(1u64),
        &domain(),
    );
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_verify_mutated_signature_byte() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, mut sig) = make_signed_subscribe(&signer);

    sig[10] ^= 0x01;
    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &domain());
    // A flipped byte either breaks recovery outright or recovers a
    // different address; both must reject.
    assert!(eip712::verify_key_holder(digest, subscriber, &sig).is_err());
}

#[test]
fn test_verify_truncated_signature() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &domain());
    let err = eip712::verify_key_holder(digest, subscriber, &sig[..64]).unwrap_err();
    assert!(matches!(err, CommError::MalformedSignature(_)));
}

#[test]
fn test_verify_v_outside_electrum_range() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, mut sig) = make_signed_subscribe(&signer);

    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &domain());
    for v in [0u8, 1, 26, 29] {
        sig[64] = v;
        let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
        assert!(matches!(err, CommError::MalformedSignature(_)));
    }
}

// -- Cross-context rejection tests --

#[test]
fn test_subscribe_signature_rejected_for_unsubscribe() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let digest = eip712::unsubscribe_digest(channel, subscriber, nonce, expiry, &domain());
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_signature_rejected_under_other_chain() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let foreign = DomainConfig::new(1, Address::repeat_byte(0xaa));
    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &foreign);
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}

#[test]
fn test_signature_rejected_under_other_contract() {
    let signer = PrivateKeySigner::random();
    let (channel, subscriber, nonce, expiry, sig) = make_signed_subscribe(&signer);

    let foreign = DomainConfig::new(31337, Address::repeat_byte(0xbb));
    let digest = eip712::subscribe_digest(channel, subscriber, nonce, expiry, &foreign);
    let err = eip712::verify_key_holder(digest, subscriber, &sig).unwrap_err();
    assert!(matches!(err, CommError::SignatureMismatch { .. }));
}
