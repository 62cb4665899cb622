//! Construction, initialization and shutdown of a retriever.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Event, Recorder, Scripts, manual, scripted};
use config_relay::{
    ConfigurationError, Listener, MandatoryStorePolicy, RelayError, Retriever, RetrieverState,
    StoreSpec,
};
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn scripts() -> Scripts {
    Scripts::default()
}

#[rstest]
#[tokio::test]
async fn create_publishes_version_one(scripts: Scripts) {
    scripts.get("a").set(json!({"a": "v", "b": 1}));
    scripts.get("b").set(json!({"a": "v2", "c": 2}));
    let retriever = Retriever::builder(manual([scripted("a"), scripted("b")]))
        .stores(scripts.registry())
        .build()
        .await
        .expect("retriever");

    assert_eq!(retriever.state(), RetrieverState::Idle);
    let snapshot = retriever.snapshot().expect("snapshot");
    assert_eq!(snapshot.version(), 1);
    assert_eq!(**snapshot.value(), json!({"a": "v2", "b": 1, "c": 2}));
    assert_eq!(*retriever.get().await.expect("get"), **snapshot.value());
    assert_eq!(retriever.cycle_count(), 1);
    assert!(retriever.initial_failures().is_empty());
    retriever.close().await;
}

#[rstest]
#[tokio::test]
async fn all_stores_failing_fails_initialization(scripts: Scripts) {
    scripts.get("a").fail("down");
    scripts.get("b").fail("also down");
    let err = Retriever::builder(manual([scripted("a"), scripted("b")]))
        .stores(scripts.registry())
        .build()
        .await
        .expect_err("no store succeeded");

    let failures = err.initialization_failures().expect("initialization error");
    assert_eq!(failures.len(), 2);
    assert_eq!(
        failures.iter().map(|f| f.index()).collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert_eq!(scripts.get("a").closes(), 1, "stores are closed after a failed start");
}

#[rstest]
#[case(MandatoryStorePolicy::Tolerate, true)]
#[case(MandatoryStorePolicy::FailInitialization, false)]
#[tokio::test]
async fn mandatory_policy_decides_partial_start(
    scripts: Scripts,
    #[case] policy: MandatoryStorePolicy,
    #[case] starts: bool,
) {
    scripts.get("ok").set(json!({"ok": true}));
    scripts.get("broken").fail("down");
    let result = Retriever::builder(
        manual([scripted("ok"), scripted("broken")]).with_mandatory_store_policy(policy),
    )
    .stores(scripts.registry())
    .build()
    .await;

    assert_eq!(result.is_ok(), starts);
    if let Ok(retriever) = result {
        assert_eq!(retriever.initial_failures().len(), 1);
        assert_eq!(*retriever.get().await.expect("get"), json!({"ok": true}));
        retriever.close().await;
    }
}

#[rstest]
#[tokio::test]
async fn optional_failures_never_block_strict_start(scripts: Scripts) {
    scripts.get("ok").set(json!({"ok": true}));
    scripts.get("maybe").fail("down");
    let retriever = Retriever::builder(
        manual([scripted("ok"), scripted("maybe").with_optional(true)])
            .with_mandatory_store_policy(MandatoryStorePolicy::FailInitialization),
    )
    .stores(scripts.registry())
    .build()
    .await
    .expect("optional failure tolerated");
    assert!(retriever.initial_failures().iter().all(|f| f.is_optional()));
    retriever.close().await;
}

#[rstest]
#[tokio::test]
async fn builder_listeners_hear_initial_failures(scripts: Scripts) {
    scripts.get("ok").set(json!({"ok": true}));
    scripts.get("broken").fail("down");
    let recorder = Recorder::default();
    let retriever = Retriever::builder(manual([scripted("broken"), scripted("ok")]))
        .stores(scripts.registry())
        .listen(recorder.clone())
        .build()
        .await
        .expect("retriever");

    assert_eq!(recorder.events(), vec![Event::Error(0)]);
    let failure = recorder.failures().remove(0);
    assert_eq!(failure.store_type(), "scripted");
    assert!(failure.error().to_string().contains("down"));
    retriever.close().await;
}

#[rstest]
#[case(StoreSpec::new("nonexistent"))]
#[case(StoreSpec::new("json").with_format("nonexistent"))]
#[case(StoreSpec::new("file"))]
#[tokio::test]
async fn configuration_errors_are_raised_eagerly(#[case] spec: StoreSpec) {
    let err = Retriever::create(manual([spec]))
        .await
        .expect_err("misconfigured");
    assert!(
        matches!(&*err, RelayError::Configuration(_)),
        "unexpected error {err}"
    );
}

#[test]
fn spawning_needs_a_runtime() {
    let err = Retriever::builder(manual([StoreSpec::new("json")]))
        .spawn()
        .expect_err("no runtime");
    assert!(matches!(
        &*err,
        RelayError::Configuration(ConfigurationError::MissingRuntime)
    ));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn spawn_returns_before_the_first_cycle(scripts: Scripts) {
    scripts
        .get("slow")
        .set(json!({"ready": true}))
        .delay(Duration::from_millis(200));
    let retriever = Retriever::builder(manual([scripted("slow")]))
        .stores(scripts.registry())
        .spawn()
        .expect("spawned");

    assert_eq!(retriever.state(), RetrieverState::Initializing);
    assert!(retriever.get_cached().is_none());
    assert_eq!(*retriever.get().await.expect("get"), json!({"ready": true}));
    assert!(retriever.get_cached().is_some());
    retriever.close().await;
}

#[rstest]
#[tokio::test]
async fn spawned_initialization_failure_surfaces_through_get(scripts: Scripts) {
    scripts.get("a").fail("down");
    let retriever = Retriever::builder(manual([scripted("a")]))
        .stores(scripts.registry())
        .spawn()
        .expect("spawned");
    let err = retriever.get().await.expect_err("initialization failed");
    assert!(err.initialization_failures().is_some());
    assert_eq!(retriever.state(), RetrieverState::Closed);
    assert!(retriever.get_cached().is_none());
}

#[rstest]
#[tokio::test]
async fn closed_retriever_rejects_calls(scripts: Scripts) {
    scripts.get("a").set(json!({"a": 1}));
    let recorder = Recorder::default();
    let retriever = Retriever::builder(manual([scripted("a")]))
        .stores(scripts.registry())
        .build()
        .await
        .expect("retriever");
    let _subscription = retriever.listen(recorder.clone()).expect("listen");

    retriever.close().await;
    retriever.close().await;

    assert_eq!(retriever.state(), RetrieverState::Closed);
    assert_eq!(recorder.ends(), 1);
    assert_eq!(recorder.events(), vec![Event::End]);
    assert!(matches!(
        &*retriever.get().await.expect_err("closed"),
        RelayError::Closed
    ));
    assert!(matches!(
        &*retriever.refresh().await.expect_err("closed"),
        RelayError::Closed
    ));
    assert!(retriever.listen(Listener::new()).is_err());
    assert!(
        retriever
            .register_processor("custom", |_: &[u8], _: &config_relay::Document| {
                Ok::<_, config_relay::DecodeError>(json!({}))
            })
            .is_err()
    );
    assert_eq!(
        retriever.get_cached().as_deref(),
        Some(&json!({"a": 1})),
        "the last snapshot stays readable"
    );
    assert_eq!(scripts.get("a").closes(), 1);
}

#[rstest]
#[tokio::test]
async fn concurrent_closes_end_listeners_once(scripts: Scripts) {
    scripts.get("a").set(json!({"a": 1}));
    let recorder = Recorder::default();
    let retriever = Retriever::builder(manual([scripted("a")]))
        .stores(scripts.registry())
        .listen(recorder.clone())
        .build()
        .await
        .expect("retriever");

    let other = retriever.clone();
    tokio::join!(retriever.close(), other.close());
    assert_eq!(recorder.ends(), 1);
    assert!(other.is_closed());
}

#[rstest]
#[tokio::test]
async fn dropping_every_handle_closes(scripts: Scripts) {
    scripts.get("a").set(json!({"a": 1}));
    let ended = Arc::new(tokio::sync::Notify::new());
    let signal = Arc::clone(&ended);
    let retriever = Retriever::builder(manual([scripted("a")]))
        .stores(scripts.registry())
        .listen(Listener::new().on_end(move || signal.notify_one()))
        .build()
        .await
        .expect("retriever");

    drop(retriever);
    tokio::time::timeout(Duration::from_secs(5), ended.notified())
        .await
        .expect("on_end after the last handle dropped");
    assert_eq!(scripts.get("a").closes(), 1);
}
