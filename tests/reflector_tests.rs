//! End-to-end tests for the reflection engine.
//!
//! These drive a full pass against the in-memory source and sink mocks, the
//! same way the job runs in production minus the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use secret_reflector::config::{GsmEncoding, Mapping, SourceType};
use secret_reflector::constants::{DEFAULT_LABEL_VALUE, LABEL_KEY};
use secret_reflector::provider::gsm::MockSecretManager;
use secret_reflector::provider::vault::{EngineVersion, MockVault};
use secret_reflector::sink::{DestinationSecret, MemorySecretStore, SecretSink};
use secret_reflector::{ReflectError, Reflector};

fn all_engine_versions() -> [EngineVersion; 2] {
    [EngineVersion::kv_v1(), EngineVersion::kv_v2()]
}

fn vault_with_mount(engine: &EngineVersion) -> MockVault {
    MockVault::new(HashMap::from([("secrets".to_string(), engine.clone())]))
}

fn vault_mapping(path: &str, secret_name: &str, engine: &EngineVersion) -> Mapping {
    Mapping {
        source_type: SourceType::Vault,
        path: path.to_string(),
        secret_name: secret_name.to_string(),
        secret_type: "Opaque".to_string(),
        vault_engine_version: Some(engine.clone()),
        gsm_encoding: GsmEncoding::Raw,
        gsm_secret_key: None,
        additional_labels: BTreeMap::new(),
    }
}

fn gsm_mapping(path: &str, secret_name: &str, encoding: GsmEncoding) -> Mapping {
    Mapping {
        source_type: SourceType::Gsm,
        path: path.to_string(),
        secret_name: secret_name.to_string(),
        secret_type: "Opaque".to_string(),
        vault_engine_version: None,
        gsm_encoding: encoding,
        gsm_secret_key: None,
        additional_labels: BTreeMap::new(),
    }
}

fn reflector(
    vault: MockVault,
    gsm: MockSecretManager,
    label: &str,
) -> (Reflector, Arc<MemorySecretStore>) {
    let store = Arc::new(MemorySecretStore::new());
    let engine = Reflector::new(
        Arc::new(vault),
        Arc::new(gsm),
        Arc::clone(&store) as Arc<dyn SecretSink>,
        label,
    );
    (engine, store)
}

#[tokio::test]
async fn reflects_vault_secret_for_both_engine_versions() {
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo", json!({"foo": "bar", "bar": "baz"}));

        let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
        reflector
            .reflect(
                &CancellationToken::new(),
                &[vault_mapping("secrets/data/foo", "foo", &engine)],
            )
            .await
            .expect("reflect should succeed");

        let secret = store.get("foo").expect("secret should be there");
        assert_eq!(
            secret.labels,
            BTreeMap::from([(LABEL_KEY.to_string(), DEFAULT_LABEL_VALUE.to_string())]),
            "engine {engine}"
        );
        assert_eq!(secret.data["foo"], b"bar", "engine {engine}");
        assert_eq!(secret.data["bar"], b"baz", "engine {engine}");
    }
}

#[tokio::test]
async fn both_engine_versions_normalize_to_identical_contents() {
    let mut per_engine = Vec::new();
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo", json!({"foo": "bar", "bar": "baz"}));

        let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
        reflector
            .reflect(
                &CancellationToken::new(),
                &[vault_mapping("secrets/data/foo", "foo", &engine)],
            )
            .await
            .expect("reflect should succeed");

        per_engine.push(store.get("foo").expect("secret should be there").data);
    }

    assert_eq!(per_engine[0], per_engine[1]);
}

#[tokio::test]
async fn additional_labels_are_merged() {
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo", json!({"foo": "bar"}));

        let mut mapping = vault_mapping("secrets/data/foo", "foo", &engine);
        mapping.additional_labels = BTreeMap::from([("secret".to_string(), "foo".to_string())]);

        let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
        reflector
            .reflect(&CancellationToken::new(), &[mapping])
            .await
            .expect("reflect should succeed");

        let secret = store.get("foo").expect("secret should be there");
        assert_eq!(
            secret.labels,
            BTreeMap::from([
                (LABEL_KEY.to_string(), DEFAULT_LABEL_VALUE.to_string()),
                ("secret".to_string(), "foo".to_string()),
            ])
        );
    }
}

#[tokio::test]
async fn ownership_label_cannot_be_overridden() {
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo", json!({"foo": "bar"}));

        let mut mapping = vault_mapping("secrets/data/foo", "foo", &engine);
        mapping.additional_labels =
            BTreeMap::from([(LABEL_KEY.to_string(), "wrong-value".to_string())]);

        let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
        reflector
            .reflect(&CancellationToken::new(), &[mapping])
            .await
            .expect("reflect should succeed");

        let secret = store.get("foo").expect("secret should be there");
        assert_eq!(secret.labels[LABEL_KEY], DEFAULT_LABEL_VALUE);
    }
}

#[tokio::test]
async fn gsm_raw_payload_lands_under_configured_key() {
    let gsm = MockSecretManager::new(HashMap::from([(
        "projects/foo/secrets/bar/versions/latest".to_string(),
        b"foo_bar_latest".to_vec(),
    )]));

    let mut mapping = gsm_mapping(
        "projects/foo/secrets/bar/versions/latest",
        "foo",
        GsmEncoding::Raw,
    );
    mapping.gsm_secret_key = Some("foo-key".to_string());

    let (reflector, store) = reflector(MockVault::default(), gsm, DEFAULT_LABEL_VALUE);
    reflector
        .reflect(&CancellationToken::new(), &[mapping])
        .await
        .expect("reflect should succeed");

    let secret = store.get("foo").expect("secret should be there");
    assert_eq!(
        secret.labels,
        BTreeMap::from([(LABEL_KEY.to_string(), DEFAULT_LABEL_VALUE.to_string())])
    );
    assert_eq!(secret.data["foo-key"], b"foo_bar_latest");
}

#[tokio::test]
async fn gsm_json_objects_stay_json() {
    let gsm = MockSecretManager::new(HashMap::from([(
        "projects/foo/secrets/bar/versions/latest".to_string(),
        br#"{"key1": {"int": 1, "string": "hello"}, "key2": {"float": 3.14, "bool": true}}"#
            .to_vec(),
    )]));

    let mapping = gsm_mapping(
        "projects/foo/secrets/bar/versions/latest",
        "foo",
        GsmEncoding::Json,
    );

    let (reflector, store) = reflector(MockVault::default(), gsm, DEFAULT_LABEL_VALUE);
    reflector
        .reflect(&CancellationToken::new(), &[mapping])
        .await
        .expect("reflect should succeed");

    let secret = store.get("foo").expect("secret should be there");

    let key1: serde_json::Value =
        serde_json::from_slice(&secret.data["key1"]).expect("key1 should be JSON");
    assert_eq!(key1, json!({"int": 1, "string": "hello"}));

    let key2: serde_json::Value =
        serde_json::from_slice(&secret.data["key2"]).expect("key2 should be JSON");
    assert_eq!(key2, json!({"float": 3.14, "bool": true}));
}

#[tokio::test]
async fn gsm_json_strings_are_unwrapped() {
    let gsm = MockSecretManager::new(HashMap::from([(
        "projects/foo/secrets/bar/versions/latest".to_string(),
        br#"{"key1": 1, "key2": "val2\nval3"}"#.to_vec(),
    )]));

    let mapping = gsm_mapping(
        "projects/foo/secrets/bar/versions/latest",
        "foo",
        GsmEncoding::Json,
    );

    let (reflector, store) = reflector(MockVault::default(), gsm, DEFAULT_LABEL_VALUE);
    reflector
        .reflect(&CancellationToken::new(), &[mapping])
        .await
        .expect("reflect should succeed");

    let secret = store.get("foo").expect("secret should be there");
    assert_eq!(secret.data["key1"], b"1");
    assert_eq!(secret.data["key2"], b"val2\nval3");
}

#[tokio::test]
async fn default_label_never_reconciles() {
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo1", json!({"foo": "bar"}));
        vault.write("secrets/data/foo2", json!({"foo": "bar"}));

        let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
        let cancel = CancellationToken::new();

        reflector
            .reflect(
                &cancel,
                &[
                    vault_mapping("secrets/data/foo1", "foo1", &engine),
                    vault_mapping("secrets/data/foo2", "foo2", &engine),
                ],
            )
            .await
            .expect("first reflect should succeed");

        assert!(store.get("foo1").is_some());
        assert!(store.get("foo2").is_some());

        // foo2 dropped from the mappings, but the default label means no
        // pruning may happen
        reflector
            .reflect(&cancel, &[vault_mapping("secrets/data/foo1", "foo1", &engine)])
            .await
            .expect("second reflect should succeed");

        assert!(store.get("foo1").is_some());
        assert!(
            store.get("foo2").is_some(),
            "foo2 should survive under the default label"
        );
    }
}

#[tokio::test]
async fn non_default_label_prunes_untouched_secrets() {
    for engine in all_engine_versions() {
        let vault = vault_with_mount(&engine);
        vault.write("secrets/data/foo1", json!({"foo": "bar"}));
        vault.write("secrets/data/foo2", json!({"foo": "bar"}));

        let (reflector, store) = reflector(vault, MockSecretManager::default(), "test");

        // a secret owned by a different label value must never be pruned
        store.insert(DestinationSecret {
            name: "other-reflect".to_string(),
            labels: BTreeMap::from([(LABEL_KEY.to_string(), "other".to_string())]),
            secret_type: "Opaque".to_string(),
            data: BTreeMap::from([("something".to_string(), b"else".to_vec())]),
        });

        let cancel = CancellationToken::new();
        reflector
            .reflect(
                &cancel,
                &[
                    vault_mapping("secrets/data/foo1", "foo1", &engine),
                    vault_mapping("secrets/data/foo2", "foo2", &engine),
                ],
            )
            .await
            .expect("first reflect should succeed");

        let foo1 = store.get("foo1").expect("foo1 should be there");
        assert_eq!(foo1.labels[LABEL_KEY], "test");
        assert!(store.get("foo2").is_some());

        reflector
            .reflect(&cancel, &[vault_mapping("secrets/data/foo1", "foo1", &engine)])
            .await
            .expect("second reflect should succeed");

        assert!(store.get("foo1").is_some(), "foo1 is still mapped");
        assert!(store.get("foo2").is_none(), "foo2 should have been pruned");
        assert!(
            store.get("other-reflect").is_some(),
            "foreign-label secret must be left alone"
        );
    }
}

#[tokio::test]
async fn unknown_engine_version_fails_without_writing() {
    let vault = vault_with_mount(&EngineVersion::kv_v2());
    vault.write("secrets/data/foo", json!({"foo": "bar"}));

    let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
    let err = reflector
        .reflect(
            &CancellationToken::new(),
            &[vault_mapping(
                "secrets/data/foo",
                "foo",
                &EngineVersion::from("unsupported"),
            )],
        )
        .await
        .expect_err("unknown engine version must fail the pass");

    assert!(matches!(err, ReflectError::UnsupportedEngineVersion { .. }));
    assert!(store.get("foo").is_none());
}

#[tokio::test]
async fn missing_vault_secret_aborts_the_pass() {
    let engine = EngineVersion::kv_v2();
    let vault = vault_with_mount(&engine);

    let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);
    let err = reflector
        .reflect(
            &CancellationToken::new(),
            &[vault_mapping("secrets/data/absent", "foo", &engine)],
        )
        .await
        .expect_err("missing secret must fail the pass");

    assert!(matches!(
        err,
        ReflectError::SourceNotFound { ref path } if path == "secrets/data/absent"
    ));
    assert!(store.names().is_empty());
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let engine = EngineVersion::kv_v2();
    let vault = vault_with_mount(&engine);
    vault.write("secrets/data/foo", json!({"foo": "bar", "bar": "baz"}));

    let (reflector, store) = reflector(vault, MockSecretManager::default(), "test");
    let mappings = [vault_mapping("secrets/data/foo", "foo", &engine)];
    let cancel = CancellationToken::new();

    reflector
        .reflect(&cancel, &mappings)
        .await
        .expect("first reflect should succeed");
    let first = store.get("foo").expect("secret should be there");
    let first_names = store.names();

    // second run hits the update path and must converge on the same state
    reflector
        .reflect(&cancel, &mappings)
        .await
        .expect("second reflect should succeed");
    let second = store.get("foo").expect("secret should still be there");

    assert_eq!(first, second);
    assert_eq!(first_names, store.names());
}

#[tokio::test]
async fn cancelled_pass_returns_without_writing() {
    let engine = EngineVersion::kv_v1();
    let vault = vault_with_mount(&engine);
    vault.write("secrets/data/foo", json!({"foo": "bar"}));

    let (reflector, store) = reflector(vault, MockSecretManager::default(), DEFAULT_LABEL_VALUE);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = reflector
        .reflect(&cancel, &[vault_mapping("secrets/data/foo", "foo", &engine)])
        .await
        .expect_err("cancelled pass must fail");

    assert!(matches!(err, ReflectError::Cancelled));
    assert!(store.names().is_empty());
}
