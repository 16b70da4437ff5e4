//! Correlated request/response across host and plugin bridges

mod common;

use anyhow::anyhow;
use common::{count, counter, Scene};
use lodestar_bridge::{BridgeConfig, BridgeError, Channel, Endpoint, Target};
use lodestar_protocol::{GetCamera, GetGridType, GetGridWidth, GridType};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn test_plugin_request_answered_by_host() {
    let scene = Scene::new(&["dice"]);
    scene.host.answer::<GetGridType, _>(|()| GridType::Square);

    let started = Instant::now();
    let grid = scene.plugin(0).request::<GetGridType>(&()).await.unwrap();
    assert_eq!(grid, GridType::Square);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(scene.plugin(0).pending_count(), 0);
}

#[tokio::test]
async fn test_wire_format_of_answered_request() {
    let scene = Scene::new(&["dice"]);
    scene.host.answer::<GetGridType, _>(|()| GridType::HexVertical);

    let raw = scene.plugin(0).request_raw("GET_GRID_TYPE", json!(null)).await.unwrap();
    assert_eq!(raw, json!("HEX_VERTICAL"));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_request_times_out_after_configured_window() {
    let scene = Scene::new(&["dice"]);

    let started = Instant::now();
    let err = scene.plugin(0).request::<GetGridType>(&()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("GET_GRID_TYPE"));
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(502));
    assert_eq!(scene.plugin(0).pending_count(), 0);
    assert_eq!(scene.plugin(0).listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_is_honored() {
    let config = BridgeConfig::default().with_request_timeout(Duration::from_millis(120));
    let scene = Scene::with_config(&["dice"], config);

    let started = Instant::now();
    let err = scene.plugin(0).request::<GetCamera>(&()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout { timeout_ms: 120, .. }));
    assert!(started.elapsed() < Duration::from_millis(122));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_never_cross_resolved() {
    let scene = Scene::new(&["dice"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    scene.host.handle::<GetGridType, _, _>(move |()| {
        let call = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(GridType::HexVertical)
            } else {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(GridType::Square)
            }
        }
    });

    let plugin = scene.plugin(0);
    let (first, second) = tokio::join!(
        plugin.request::<GetGridType>(&()),
        plugin.request::<GetGridType>(&()),
    );
    assert_eq!(first.unwrap(), GridType::HexVertical);
    assert_eq!(second.unwrap(), GridType::Square);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_late_response_is_ignored() {
    let scene = Scene::new(&["dice"]);
    scene.host.handle::<GetGridWidth, _, _>(|()| async {
        tokio::time::sleep(Duration::from_millis(600)).await;
        Ok(30)
    });

    let plugin = scene.plugin(0);
    let err = plugin.request::<GetGridWidth>(&()).await.unwrap_err();
    assert!(err.is_timeout());

    let delivered_before = scene.hub.delivered_to(&Endpoint::Plugin("dice".into()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        scene.hub.delivered_to(&Endpoint::Plugin("dice".into())),
        delivered_before + 1
    );
    assert_eq!(plugin.pending_count(), 0);
    assert_eq!(plugin.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_handler_looks_like_timeout() {
    let scene = Scene::new(&["dice"]);
    scene
        .host
        .handle::<GetCamera, _, _>(|()| async { Err(anyhow!("scene not loaded")) });

    let err = scene.plugin(0).request::<GetCamera>(&()).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_fails_requests_in_flight() {
    let scene = Scene::new(&["dice"]);
    let plugin = scene.plugin(0).clone();

    let in_flight = tokio::spawn({
        let plugin = plugin.clone();
        async move { plugin.request::<GetGridType>(&()).await }
    });
    while plugin.pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    plugin.destroy();
    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, BridgeError::Destroyed(ref command) if command == "GET_GRID_TYPE"));
    assert_eq!(plugin.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_future_cleans_up() {
    let scene = Scene::new(&["dice"]);
    let answered = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&answered);
    scene.host.handle::<GetGridType, _, _>(move |()| {
        let a = Arc::clone(&a);
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            a.fetch_add(1, Ordering::SeqCst);
            Ok(GridType::Square)
        }
    });

    let plugin = scene.plugin(0);
    let gave_up = tokio::time::timeout(
        Duration::from_millis(10),
        plugin.request::<GetGridType>(&()),
    )
    .await;
    assert!(gave_up.is_err());
    assert_eq!(plugin.pending_count(), 0);
    assert_eq!(plugin.listener_count(), 0);

    // The answer still arrives and finds nobody waiting
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(count(&answered), 1);
    assert_eq!(plugin.pending_count(), 0);
    assert_eq!(plugin.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_request_task_cleans_up() {
    let scene = Scene::new(&["dice"]);
    let plugin = scene.plugin(0).clone();

    let in_flight = tokio::spawn({
        let plugin = plugin.clone();
        async move { plugin.request::<GetGridType>(&()).await }
    });
    while plugin.pending_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(plugin.listener_count(), 1);

    in_flight.abort();
    assert!(in_flight.await.unwrap_err().is_cancelled());
    assert_eq!(plugin.pending_count(), 0);
    assert_eq!(plugin.listener_count(), 0);
}

#[tokio::test]
async fn test_host_request_fans_out_original_event() {
    let scene = Scene::new(&["dice", "fog"]);
    scene.host.answer::<GetGridType, _>(|()| GridType::Isometric);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for plugin in &scene.plugins {
        let sink = Arc::clone(&seen);
        plugin.on("GET_GRID_TYPE", move |envelope| sink.lock().push(envelope.clone()));
    }

    let grid = scene.host.request::<GetGridType>(&()).await.unwrap();
    assert_eq!(grid, GridType::Isometric);

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|envelope| envelope.correlation_id.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_host_request_is_not_fanned_out() {
    let scene = Scene::new(&["dice"]);
    let (fanned_out, listener) = counter();
    scene.plugin(0).on("GET_GRID_TYPE", listener);

    let err = scene.host.request::<GetGridType>(&()).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(count(&fanned_out), 0);
}

#[tokio::test]
async fn test_malformed_inbound_is_discarded() {
    let scene = Scene::new(&["dice"]);
    let (hits, listener) = counter();
    scene.host.on("PING", listener);

    let rogue = scene.hub.plugin_channel("dice");
    for noise in [
        json!({ "type": "webpackOk" }),
        json!({ "event": 7, "payload": {} }),
        json!("PING"),
        json!(null),
    ] {
        rogue.send(noise, &Target::Parent).unwrap();
    }
    assert_eq!(count(&hits), 0);

    rogue.send(json!({ "event": "PING" }), &Target::Parent).unwrap();
    assert_eq!(count(&hits), 1);
}
