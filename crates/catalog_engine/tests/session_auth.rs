mod support;

use std::fs;
use std::sync::Once;

use catalog_engine::{
    run_harvest, AuthError, Credentials, HarvestError, SessionBlob, SessionStore, StoredCookie,
};
use pretty_assertions::assert_eq;
use support::{product_rows, test_config, FakeDriver, NullSink};
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(harvest_logging::initialize_for_tests);
}

fn credentials() -> Credentials {
    Credentials {
        identifier: "buyer@example.com".to_string(),
        secret: "hunter2".to_string(),
    }
}

fn blob_with_token(token: &str) -> SessionBlob {
    SessionBlob {
        origin: "https://shop.example.com".to_string(),
        captured_utc: "2026-01-01T00:00:00+00:00".to_string(),
        cookies: vec![StoredCookie {
            name: "sid".to_string(),
            value: token.to_string(),
            domain: "shop.example.com".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
        }],
        local_storage: Vec::new(),
    }
}

fn store_session(config: &catalog_engine::HarvestConfig, blob: &SessionBlob) {
    let content = serde_json::to_string(blob).unwrap();
    fs::write(&config.session_path, content).unwrap();
}

#[tokio::test]
async fn valid_stored_session_skips_the_authenticator() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);
    driver.state().valid_token = Some("tok-stored".to_string());
    store_session(&config, &blob_with_token("tok-stored"));

    let summary = run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap();

    assert!(summary.session_reused);
    assert_eq!(driver.state().login_attempts, 0);
}

#[tokio::test]
async fn stale_stored_session_falls_back_to_exactly_one_login() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);
    store_session(&config, &blob_with_token("tok-expired"));

    let summary = run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap();

    assert!(!summary.session_reused);
    assert_eq!(driver.state().login_attempts, 1);
    // The fresh session replaced the stale one on disk.
    let stored = fs::read_to_string(&config.session_path).unwrap();
    assert!(stored.contains("tok-fresh"));
}

#[tokio::test]
async fn absent_session_file_logs_in_and_persists_a_session() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);

    let summary = run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap();

    assert!(!summary.session_reused);
    assert_eq!(driver.state().login_attempts, 1);
    assert!(config.session_path.exists());
}

#[tokio::test]
async fn session_from_another_origin_is_discarded_without_probing() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);
    let mut foreign = blob_with_token("tok-foreign");
    foreign.origin = "https://other.example.net".to_string();
    store_session(&config, &foreign);

    run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap();

    let state = driver.state();
    assert_eq!(state.login_attempts, 1);
    assert!(!state.events.contains(&"apply-session".to_string()));
}

#[tokio::test]
async fn malformed_session_file_is_treated_as_absent() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    fs::write(&config.session_path, "{ not json").unwrap();
    let store = SessionStore::new(
        config.session_path.clone(),
        config.auth.authenticated_marker.clone(),
        config.probe_timeout,
    );

    assert!(store.load().is_none());
}

#[tokio::test]
async fn rejected_credentials_fail_without_touching_prior_output() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    fs::write(&config.output_path, "prior snapshot").unwrap();
    let driver = FakeDriver::fresh(product_rows(10), 20);
    driver.state().accepted = None;

    let err = run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap_err();

    match err {
        HarvestError::Auth(AuthError::Rejected(reason)) => {
            assert!(reason.contains("Invalid"), "reason: {reason}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(&config.output_path).unwrap(),
        "prior snapshot"
    );
}

#[tokio::test]
async fn login_that_never_resolves_times_out() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);
    {
        let mut state = driver.state();
        state.accepted = None;
        state.silent_login_failure = true;
    }

    let err = run_harvest(&driver, &config, &credentials(), &NullSink)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Auth(AuthError::Timeout)));
}

#[tokio::test]
async fn missing_credentials_are_fatal_before_any_submission() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let driver = FakeDriver::fresh(product_rows(10), 20);

    let empty = Credentials {
        identifier: String::new(),
        secret: String::new(),
    };
    let err = run_harvest(&driver, &config, &empty, &NullSink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarvestError::Auth(AuthError::MissingCredentials)
    ));
    assert_eq!(driver.state().login_attempts, 0);
}

#[tokio::test]
async fn session_save_overwrites_atomically() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    let store = SessionStore::new(
        path.clone(),
        "#account-menu".to_string(),
        std::time::Duration::from_millis(50),
    );

    store.save(&blob_with_token("first")).unwrap();
    store.save(&blob_with_token("second")).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.cookies[0].value, "second");
    // Only the session file itself remains; no temp leftovers.
    let entries = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}
