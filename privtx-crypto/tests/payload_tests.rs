//! Multi-recipient payload encryption.
//!
//! Covers fan-out to many recipients, recipient extension by a
//! non-originating party, raw transactions, and sender self-decryption.

use pretty_assertions::assert_eq;
use privtx_crypto::{
    BoxProvider, CryptoError, EncodedPayload, KeyPair, PayloadEngine, PublicKey, RawTransaction,
    SalsaBoxProvider,
};

fn pair() -> KeyPair {
    SalsaBoxProvider.generate_key_pair().unwrap()
}

fn pairs(n: usize) -> Vec<KeyPair> {
    (0..n).map(|_| pair()).collect()
}

fn publics(pairs: &[KeyPair]) -> Vec<PublicKey> {
    pairs.iter().map(|p| p.public).collect()
}

#[test]
fn single_recipient_reads_foo_and_outsider_cannot() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let r1 = pair();
    let r2 = pair();

    let payload = engine
        .encrypt_payload(b"foo", &sender.private, &[r1.public])
        .unwrap();

    assert_eq!(engine.unencrypt_transaction(&payload, &r1.private).unwrap(), b"foo");
    let err = engine
        .unencrypt_transaction(&payload, &r2.private)
        .unwrap_err();
    assert!(matches!(err, CryptoError::Decryption));
}

#[test]
fn every_recipient_reads_identical_message() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let recipients = pairs(5);
    let message = b"the same bytes for everyone".to_vec();

    let payload = engine
        .encrypt_payload(&message, &sender.private, &publics(&recipients))
        .unwrap();

    assert_eq!(payload.recipient_boxes.len(), 5);
    assert_eq!(payload.recipient_list, publics(&recipients));
    for r in &recipients {
        assert_eq!(engine.unencrypt_transaction(&payload, &r.private).unwrap(), message);
    }
}

#[test]
fn empty_recipient_set_is_rejected() {
    let engine = PayloadEngine::new();
    let sender = pair();

    let err = engine
        .encrypt_payload(b"m", &sender.private, &[])
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidRecipient(_)));
}

#[test]
fn sender_can_decrypt_its_own_payload() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let r = pair();

    let payload = engine
        .encrypt_payload(b"self", &sender.private, &[r.public])
        .unwrap();

    assert_eq!(payload.sender_public_key, sender.public);
    assert_eq!(engine.unencrypt_transaction(&payload, &sender.private).unwrap(), b"self");
}

#[test]
fn sender_listed_as_recipient_decrypts_through_its_box() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let r = pair();

    let payload = engine
        .encrypt_payload(b"both", &sender.private, &[sender.public, r.public])
        .unwrap();

    assert_eq!(engine.unencrypt_transaction(&payload, &sender.private).unwrap(), b"both");
    assert_eq!(engine.unencrypt_transaction(&payload, &r.private).unwrap(), b"both");
}

#[test]
fn recipient_extends_payload_for_new_party() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let a = pair();
    let b = pair();

    let mut payload = engine
        .encrypt_payload(b"extend me", &sender.private, &[a.public])
        .unwrap();
    let a_box_before = payload.recipient_boxes[&a.public].clone();

    let new_box = engine
        .create_new_recipient_box(&payload, &a.private, &b.public)
        .unwrap();
    assert_eq!(new_box.sealed_by, a.public);
    assert!(payload.add_recipient_box(b.public, new_box));

    assert_eq!(payload.recipient_boxes[&a.public], a_box_before);
    assert_eq!(payload.recipient_list, vec![a.public, b.public]);
    assert_eq!(engine.unencrypt_transaction(&payload, &a.private).unwrap(), b"extend me");
    assert_eq!(engine.unencrypt_transaction(&payload, &b.private).unwrap(), b"extend me");
    assert_eq!(
        engine.unencrypt_transaction(&payload, &sender.private).unwrap(),
        b"extend me"
    );
}

#[test]
fn sender_extends_payload_for_new_party() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let a = pair();
    let b = pair();

    let mut payload = engine
        .encrypt_payload(b"m", &sender.private, &[a.public])
        .unwrap();
    engine
        .add_recipient(&mut payload, &sender.private, &b.public)
        .unwrap();

    assert_eq!(payload.recipient_boxes[&b.public].sealed_by, sender.public);
    assert_eq!(engine.unencrypt_transaction(&payload, &b.private).unwrap(), b"m");
}

#[test]
fn outsider_cannot_create_recipient_box() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let a = pair();
    let outsider = pair();

    let payload = engine
        .encrypt_payload(b"m", &sender.private, &[a.public])
        .unwrap();

    let err = engine
        .create_new_recipient_box(&payload, &outsider.private, &outsider.public)
        .unwrap_err();
    assert!(matches!(err, CryptoError::Decryption));
}

#[test]
fn adding_existing_recipient_leaves_box_untouched() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let a = pair();

    let mut payload = engine
        .encrypt_payload(b"m", &sender.private, &[a.public])
        .unwrap();
    let before = payload.clone();

    engine
        .add_recipient(&mut payload, &sender.private, &a.public)
        .unwrap();
    assert_eq!(payload, before);

    let fresh = engine
        .create_new_recipient_box(&payload, &sender.private, &a.public)
        .unwrap();
    assert!(!payload.add_recipient_box(a.public, fresh));
    assert_eq!(payload, before);
}

#[test]
fn reordering_recipient_list_does_not_invalidate_boxes() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let recipients = pairs(3);

    let mut payload = engine
        .encrypt_payload(b"order", &sender.private, &publics(&recipients))
        .unwrap();
    payload.recipient_list.reverse();

    let decoded = EncodedPayload::decode(&payload.encode().unwrap()).unwrap();
    for r in &recipients {
        assert_eq!(engine.unencrypt_transaction(&decoded, &r.private).unwrap(), b"order");
    }
}

#[test]
fn raw_transaction_matches_direct_encryption() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let recipients = pairs(3);
    let message = b"bulk body encrypted once".to_vec();

    let raw = engine.encrypt_raw_payload(&message, &sender.private).unwrap();
    assert_eq!(raw.from, sender.public);

    let from_raw = engine
        .encrypt_raw_for_recipients(&raw, &sender.private, &publics(&recipients))
        .unwrap();
    let direct = engine
        .encrypt_payload(&message, &sender.private, &publics(&recipients))
        .unwrap();

    assert_eq!(from_raw.cipher_text, raw.encrypted_payload);
    assert_eq!(from_raw.nonce, raw.nonce);
    for r in &recipients {
        assert_eq!(
            engine.unencrypt_transaction(&from_raw, &r.private).unwrap(),
            engine.unencrypt_transaction(&direct, &r.private).unwrap()
        );
    }
    assert_eq!(
        engine.unencrypt_transaction(&from_raw, &sender.private).unwrap(),
        message
    );
}

#[test]
fn raw_transaction_requires_recipients() {
    let engine = PayloadEngine::new();
    let sender = pair();

    let raw = engine.encrypt_raw_payload(b"m", &sender.private).unwrap();
    let err = engine
        .encrypt_raw_for_recipients(&raw, &sender.private, &[])
        .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidRecipient(_)));
}

#[test]
fn raw_transaction_json_uses_transport_field_names() {
    let engine = PayloadEngine::new();
    let sender = pair();

    let raw = engine.encrypt_raw_payload(b"m", &sender.private).unwrap();
    let value = serde_json::to_value(&raw).unwrap();
    for field in ["encryptedPayload", "encryptedKey", "nonce", "from"] {
        assert!(value.get(field).is_some(), "missing {field}");
    }

    let back: RawTransaction = serde_json::from_value(value).unwrap();
    assert_eq!(back, raw);
}

#[test]
fn encoded_payload_survives_transport() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let r = pair();

    let payload = engine
        .encrypt_payload(b"over the wire", &sender.private, &[r.public])
        .unwrap();
    let decoded = EncodedPayload::decode(&payload.encode().unwrap()).unwrap();

    assert_eq!(decoded, payload);
    assert_eq!(
        engine.unencrypt_transaction(&decoded, &r.private).unwrap(),
        b"over the wire"
    );
}

#[test]
fn empty_message_roundtrips() {
    let engine = PayloadEngine::new();
    let sender = pair();
    let r = pair();

    let payload = engine.encrypt_payload(b"", &sender.private, &[r.public]).unwrap();
    assert!(engine.unencrypt_transaction(&payload, &r.private).unwrap().is_empty());
}

// Property-based tests
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn fan_out_always_agrees(
            message in proptest::collection::vec(any::<u8>(), 0..2048),
            n in 1usize..6,
        ) {
            let engine = PayloadEngine::new();
            let sender = pair();
            let recipients = pairs(n);

            let payload = engine
                .encrypt_payload(&message, &sender.private, &publics(&recipients))
                .unwrap();
            for r in &recipients {
                prop_assert_eq!(engine.unencrypt_transaction(&payload, &r.private).unwrap(), message.clone());
            }
        }

        #[test]
        fn raw_then_recipients_always_agrees(
            message in proptest::collection::vec(any::<u8>(), 0..1024),
        ) {
            let engine = PayloadEngine::new();
            let sender = pair();
            let r = pair();

            let raw = engine.encrypt_raw_payload(&message, &sender.private).unwrap();
            let payload = engine
                .encrypt_raw_for_recipients(&raw, &sender.private, &[r.public])
                .unwrap();
            prop_assert_eq!(engine.unencrypt_transaction(&payload, &r.private).unwrap(), message);
        }
    }
}
