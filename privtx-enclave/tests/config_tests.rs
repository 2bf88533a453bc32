use pretty_assertions::assert_eq;
use privtx_crypto::{KdfOptions, KdfVariant, PublicKey};
use privtx_enclave::{EnclaveConfig, EnclaveError};

#[test]
fn empty_json_gives_defaults() {
    let config = EnclaveConfig::from_json("{}").unwrap();
    assert_eq!(config, EnclaveConfig::default());
    assert_eq!(config.kdf, KdfOptions::default());
}

#[test]
fn default_kdf_matches_production_settings() {
    let kdf = EnclaveConfig::default().kdf;
    assert_eq!(kdf.variant, KdfVariant::Id);
    assert_eq!(kdf.memory, 1_048_576);
    assert_eq!(kdf.iterations, 10);
    assert_eq!(kdf.parallelism, 4);
}

#[test]
fn full_config_parses() {
    let forwarding = PublicKey::from_bytes([7u8; 32]);
    let json = format!(
        r#"{{
            "kdf": {{ "variant": "i", "memory": 2048, "iterations": 3, "parallelism": 2 }},
            "max_concurrent_unlocks": 4,
            "kdf_memory_budget_kib": 8192,
            "forwarding_keys": ["{}"]
        }}"#,
        forwarding.to_base64()
    );

    let config = EnclaveConfig::from_json(&json).unwrap();

    assert_eq!(config.kdf, KdfOptions::new(KdfVariant::I, 2048, 3, 2));
    assert_eq!(config.max_concurrent_unlocks, 4);
    assert_eq!(config.kdf_memory_budget_kib, 8192);
    assert_eq!(config.forwarding_keys, vec![forwarding]);
}

#[test]
fn unknown_kdf_variant_rejected() {
    let err = EnclaveConfig::from_json(
        r#"{ "kdf": { "variant": "bcrypt", "memory": 64, "iterations": 1, "parallelism": 1 } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, EnclaveError::Config(_)));
}

#[test]
fn zero_workers_rejected() {
    let err = EnclaveConfig::from_json(r#"{ "max_concurrent_unlocks": 0 }"#).unwrap_err();
    assert!(matches!(err, EnclaveError::Config(_)));
}

#[test]
fn budget_below_default_memory_rejected() {
    let err = EnclaveConfig::from_json(r#"{ "kdf_memory_budget_kib": 1024 }"#).unwrap_err();
    assert!(matches!(err, EnclaveError::Config(msg) if msg.contains("exceeds")));
}

#[test]
fn malformed_forwarding_key_rejected() {
    let err = EnclaveConfig::from_json(r#"{ "forwarding_keys": ["c2hvcnQ="] }"#).unwrap_err();
    assert!(matches!(err, EnclaveError::Config(_)));
}

#[test]
fn zero_forwarding_key_rejected() {
    let zero = PublicKey::from_bytes([0u8; 32]).to_base64();
    let err = EnclaveConfig::from_json(&format!(r#"{{ "forwarding_keys": ["{zero}"] }}"#))
        .unwrap_err();
    assert!(matches!(err, EnclaveError::Config(_)));
}
