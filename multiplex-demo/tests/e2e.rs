//! End-to-end scenarios from SPEC_FULL.md §8, driven against the real demo
//! services rather than the unit-level fakes in `multiplex-core`'s own test
//! modules.
//!
//! Every service worker runs on its own OS thread (see
//! `multiplex_core::service`'s module docs), so the usual
//! `tracing::subscriber::with_default` (thread-local) scoping can't see
//! their log lines. Instead this file installs one process-global
//! `DebugLayer` exactly once via `std::sync::Once` and has every test poll
//! it for the substring it expects, which also means tests here must not
//! assert on exact ring-buffer contents — other tests' log lines may be
//! interleaved.

use std::sync::{Arc, Once};
use std::time::Duration;

use multiplex_core::diag::DebugLayer;
use multiplex_core::{ExecParams, Service, ServiceController};
use multiplex_demo::services::{Echo, Hash, Random, Shutdown};
use tracing_subscriber::prelude::*;

static INIT: Once = Once::new();

fn debug_layer() -> Arc<DebugLayer> {
    static LAYER: std::sync::OnceLock<Arc<DebugLayer>> = std::sync::OnceLock::new();
    let layer = LAYER.get_or_init(|| Arc::new(DebugLayer::new(256)));
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(layer.clone())
            .try_init();
    });
    layer.clone()
}

/// Polls `all_messages()` until `predicate` matches one of them or the
/// timeout elapses, returning whether it matched.
async fn wait_for(layer: &DebugLayer, timeout: Duration, predicate: impl Fn(&str) -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if layer.all_messages().iter().any(|m| predicate(m)) {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        monoio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[monoio::test]
async fn echo_logs_received_message_with_worker_id() {
    let layer = debug_layer();
    let echo = Echo::new();
    echo.core().set_worker(1).await;

    let mut params = ExecParams::new();
    params.set("message", Arc::new("Hello, World!".to_string()));
    echo.exec("greet".to_string(), Some(params)).await;

    assert!(
        wait_for(&layer, Duration::from_secs(1), |m| {
            m.contains("Echo#") && m.contains("Message received: Hello, World!")
        })
        .await
    );
}

#[monoio::test]
async fn controller_dispatch_routes_to_registered_echo() {
    let layer = debug_layer();
    let controller = ServiceController::new();

    let echo = Echo::new();
    echo.core().set_router(controller.router());
    echo.core().set_worker(1).await;
    assert!(controller.register(echo.clone()));

    let mut params = ExecParams::new();
    params.set("message", Arc::new("via controller".to_string()));
    controller.dispatch("Echo", "", Some(params)).await;

    assert!(
        wait_for(&layer, Duration::from_secs(1), |m| {
            m.contains("Message received: via controller")
        })
        .await
    );
}

#[monoio::test]
async fn hash_of_random_logs_a_64_character_hex_digest() {
    let layer = debug_layer();
    let controller = ServiceController::new();

    let random = Random::new();
    random.core().set_router(controller.router());
    random.core().set_worker(1).await;
    assert!(controller.register(random.clone()));

    let hash = Hash::new();
    hash.core().set_router(controller.router());
    hash.core().set_worker(1).await;
    assert!(controller.register(hash.clone()));

    controller.dispatch("Hash", "sha256_random", None).await;

    assert!(
        wait_for(&layer, Duration::from_secs(1), |m| {
            m.contains("Hash#") && m.contains("Value hashed: ") && {
                let digest = m.rsplit("Value hashed: ").next().unwrap_or("");
                digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
            }
        })
        .await
    );
}

#[monoio::test]
async fn shutdown_service_cascades_exit_and_unblocks_background_run() {
    let _layer = debug_layer();
    let controller = ServiceController::new();

    let shutdown = Shutdown::new(Duration::from_millis(20));
    shutdown.core().set_router(controller.router());
    shutdown.core().set_worker(1).await;
    assert!(controller.register(shutdown.clone()));

    shutdown.exec("trigger".to_string(), None).await;

    // `run(true)` blocks until the controller's own worker exits, which the
    // Shutdown service cascades to by dispatching "exit" to the controller
    // (empty target id) after its delay. A generous timeout bounds the test
    // without depending on exact scheduling.
    let ran = monoio::time::timeout(Duration::from_secs(2), controller.run(true))
        .await
        .is_ok();
    assert!(ran, "controller.run(true) did not unblock after Shutdown's cascade");
}
