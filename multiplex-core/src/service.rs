//! Service lifecycle: bounded inbox, worker-pool resize protocol, per-worker
//! processing loop. Ported from `multiplex.ServiceCore`
//! (`original_source/multiplex/core.go`).
//!
//! Concurrency model: each worker runs on its own OS thread with its own
//! `monoio` runtime, mirroring the teacher's `Runtimes::execute`
//! (`monolake/src/runtimes/runtimes.rs`) — one thread, one runtime, per
//! worker — rather than cooperatively multiplexing workers onto one
//! thread. The shared inbox is an `async-channel` bounded MPMC queue, which
//! (unlike the teacher's `futures_channel::mpsc`) supports an arbitrary
//! number of concurrent consumers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::lock::Mutex as AsyncMutex;
use tracing::{error, info};

use crate::controller::Router;
use crate::message::{ExecParams, ServiceMessage};
use crate::state::HookState;
use crate::sync::Uint64Cell;

/// Inbox capacity. Compile-time constant per spec §4.E.
pub const MAIN_CHAN_CAPACITY: usize = 256;
/// Exit-notification channel capacity, background mode only.
pub const EXTRA_CHAN_CAPACITY: usize = 16;

/// User-supplied callback invoked for every message a worker dequeues,
/// including `"exit"`. Returning `HookState::handled()` suppresses the
/// framework's default handling of that message (including the sentinel
/// check) — this is how [`crate::controller::ServiceController`]
/// distinguishes a routed `"exit"` from one addressed to itself.
#[async_trait]
pub trait ProcessHook: Send + Sync {
    async fn handle(&self, worker_id: u64, msg: ServiceMessage) -> (ServiceMessage, HookState);
}

/// Object-safe surface a [`crate::controller::ServiceController`] needs to
/// hold a registry of heterogeneous services and route to them by id.
#[async_trait]
pub trait Service: Send + Sync {
    fn service_id(&self) -> &str;
    fn router(&self) -> Option<Arc<Router>>;
    async fn exec(&self, command: String, params: Option<ExecParams>);
}

struct ServiceCoreInner {
    service_id: String,
    inbox_tx: async_channel::Sender<ServiceMessage>,
    inbox_rx: async_channel::Receiver<ServiceMessage>,
    exit_tx: async_channel::Sender<()>,
    exit_rx: async_channel::Receiver<()>,
    live_workers: Uint64Cell,
    target_workers: AtomicU64,
    worker_id: Uint64Cell,
    resize_lock: AsyncMutex<()>,
    router: Mutex<Option<Arc<Router>>>,
    hook: Mutex<Option<Arc<dyn ProcessHook>>>,
    background: AtomicBool,
}

/// Shared core of a service: inbox, worker pool, resize protocol, router
/// attachment. Concrete services (see `multiplex-demo`) embed a
/// `ServiceCore` and implement [`Service`] by delegating to it.
#[derive(Clone)]
pub struct ServiceCore {
    inner: Arc<ServiceCoreInner>,
}

impl ServiceCore {
    pub fn new(service_id: impl Into<String>, hook: Option<Arc<dyn ProcessHook>>) -> Self {
        let (inbox_tx, inbox_rx) = async_channel::bounded(MAIN_CHAN_CAPACITY);
        let (exit_tx, exit_rx) = async_channel::bounded(EXTRA_CHAN_CAPACITY);
        Self {
            inner: Arc::new(ServiceCoreInner {
                service_id: service_id.into(),
                inbox_tx,
                inbox_rx,
                exit_tx,
                exit_rx,
                live_workers: Uint64Cell::new(0),
                target_workers: AtomicU64::new(0),
                worker_id: Uint64Cell::new(0),
                resize_lock: AsyncMutex::new(()),
                router: Mutex::new(None),
                hook: Mutex::new(hook),
                background: AtomicBool::new(false),
            }),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.inner.service_id
    }

    /// Attaches (or replaces) the process hook. Concrete services that need
    /// their hook to hold a handle back to their own `ServiceCore`
    /// construct the core with `hook: None` first, build the hook with a
    /// clone of the core, then call this before the first `set_worker`.
    pub fn set_hook(&self, hook: Arc<dyn ProcessHook>) {
        *self.inner.hook.lock().unwrap() = Some(hook);
    }

    pub fn router(&self) -> Option<Arc<Router>> {
        self.inner.router.lock().unwrap().clone()
    }

    /// Attaches the controller's router. Calling this more than once, or
    /// after the first `dispatch`, is protocol misuse (spec §7.4) — left
    /// undiagnosed, matching the source behaviour.
    pub fn set_router(&self, router: Arc<Router>) {
        *self.inner.router.lock().unwrap() = Some(router);
    }

    /// Current *target* worker count (not necessarily the live count yet).
    pub fn worker_count(&self) -> u64 {
        self.inner.target_workers.load(Ordering::SeqCst)
    }

    pub fn live_worker_count(&self) -> u64 {
        self.inner.live_workers.value()
    }

    pub(crate) fn set_background(&self, background: bool) {
        self.inner.background.store(background, Ordering::SeqCst);
    }

    /// Blocks until a worker publishes one exit token (background mode).
    pub(crate) async fn wait_for_exit(&self) {
        let _ = self.inner.exit_rx.recv().await;
    }

    /// Enqueues `{command, params}`; blocks if the inbox is full; returns
    /// once accepted.
    pub async fn exec(&self, command: impl Into<String>, params: Option<ExecParams>) {
        let msg = ServiceMessage {
            command: command.into(),
            params,
            extra: None,
        };
        if self.inner.inbox_tx.send(msg).await.is_err() {
            error!(service_id = %self.service_id(), "exec on a service whose inbox is closed");
        }
    }

    /// Sends a fully-formed message directly into this core's inbox. Used
    /// by [`crate::controller::Router`] to enqueue a routed message (which
    /// carries `extra`) without going through [`ServiceCore::exec`]'s
    /// `extra: None` shorthand.
    pub(crate) async fn enqueue(&self, msg: ServiceMessage) {
        if self.inner.inbox_tx.send(msg).await.is_err() {
            error!(service_id = %self.service_id(), "enqueue on a service whose inbox is closed");
        }
    }

    /// Routes `{command, params}` to `target_id` via the attached router.
    /// An empty `target_id` addresses the controller itself.
    pub async fn dispatch(
        &self,
        target_id: impl Into<String>,
        command: impl Into<String>,
        params: Option<ExecParams>,
    ) {
        match self.router() {
            Some(router) => router.forward(target_id, command, params).await,
            None => error!(
                service_id = %self.service_id(),
                "dispatch called with no router attached"
            ),
        }
    }

    /// Resize request. See module docs and spec §4.E for the full protocol:
    /// aborts silently if the live count hasn't caught up to the previously
    /// recorded target (spec §9 Open Question 2, preserved verbatim).
    pub async fn set_worker(&self, n: u64) {
        let _guard = self.inner.resize_lock.lock().await;
        let live = self.inner.live_workers.value();
        let prev_target = self.inner.target_workers.load(Ordering::SeqCst);
        if live != prev_target {
            return;
        }
        if n > live {
            for _ in 0..(n - live) {
                // Pre-increment: worker identifiers are 1-based, matching
                // spec §8 scenario 1's "Echo#1" for the first spawned worker.
                self.inner.worker_id.add(1);
                let worker_id = self.inner.worker_id.value();
                spawn_worker(self.inner.clone(), worker_id);
            }
            self.inner.target_workers.store(n, Ordering::SeqCst);
        } else if n < live {
            for _ in 0..(live - n) {
                let _ = self.inner.inbox_tx.send(ServiceMessage::exit()).await;
            }
            self.inner.target_workers.store(n, Ordering::SeqCst);
        }
    }
}

fn spawn_worker(inner: Arc<ServiceCoreInner>, worker_id: u64) {
    let service_id = inner.service_id.clone();
    std::thread::Builder::new()
        .name(format!("{service_id}-{worker_id}"))
        .spawn(move || {
            let mut runtime = monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
                .enable_timer()
                .build()
                .expect("failed to build worker runtime");
            runtime.block_on(worker_loop(inner, worker_id));
        })
        .expect("failed to spawn worker thread");
}

/// Decrements `live_workers` on drop unless [`LiveWorkerGuard::defuse`] was
/// called first. Keeps the live-worker count accurate even if a hook panics
/// mid-loop: the panic unwinds through `worker_loop`'s async state machine,
/// dropping this guard, so `set_worker`'s `live != prev_target` check
/// (which would otherwise latch forever on a permanently over-counted
/// `live_workers`) still converges once the dead worker is replaced.
struct LiveWorkerGuard {
    inner: Arc<ServiceCoreInner>,
    defused: bool,
}

impl LiveWorkerGuard {
    fn defuse(&mut self) {
        self.defused = true;
    }
}

impl Drop for LiveWorkerGuard {
    fn drop(&mut self) {
        if !self.defused {
            self.inner.live_workers.sub(1);
        }
    }
}

async fn worker_loop(inner: Arc<ServiceCoreInner>, worker_id: u64) {
    let service_id = inner.service_id.clone();
    inner.live_workers.add(1);
    let mut live_guard = LiveWorkerGuard {
        inner: inner.clone(),
        defused: false,
    };
    info!(service_id = %service_id, worker_id, "{service_id}#{worker_id}: Process started.");

    let inbox_rx = inner.inbox_rx.clone();
    let hook = inner.hook.lock().unwrap().clone();
    loop {
        let msg = match inbox_rx.recv().await {
            Ok(msg) => msg,
            Err(_) => break,
        };

        let (msg, hook_state) = match &hook {
            Some(hook) => hook.handle(worker_id, msg).await,
            None => (msg, HookState::unhandled()),
        };
        if hook_state.handled {
            continue;
        }
        if msg.is_exit() {
            break;
        }
    }

    live_guard.defuse();
    inner.live_workers.sub(1);
    info!(service_id = %service_id, worker_id, "{service_id}#{worker_id}: Process exited.");
    if inner.background.load(Ordering::SeqCst) {
        let _ = inner.exit_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[monoio::test]
    async fn worker_count_converges_after_set_worker() {
        let core = ServiceCore::new("Test", None);
        core.set_worker(4).await;
        monoio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(core.worker_count(), 4);
        assert_eq!(core.live_worker_count(), 4);
    }

    #[monoio::test]
    async fn resize_down_drains_to_target() {
        let core = ServiceCore::new("Test", None);
        core.set_worker(3).await;
        monoio::time::sleep(Duration::from_millis(50)).await;
        core.set_worker(1).await;
        monoio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(core.worker_count(), 1);
        assert_eq!(core.live_worker_count(), 1);
    }

    #[monoio::test]
    async fn set_worker_aborts_silently_while_resize_in_flight() {
        // Calling set_worker again before the live count has caught up to
        // the previous target is a documented no-op (spec §9 Open Q2).
        let core = ServiceCore::new("Test", None);
        core.set_worker(2).await;
        // live hasn't caught up yet in general, but scheduling makes this
        // racy to assert deterministically without a hook; we only assert
        // that calling set_worker with a stale live-count snapshot does not
        // panic and that the target eventually converges once quiescent.
        monoio::time::sleep(Duration::from_millis(50)).await;
        core.set_worker(2).await; // live == prev target == 2 now: no-op
        assert_eq!(core.worker_count(), 2);
    }

    struct PanicHook;

    #[async_trait]
    impl ProcessHook for PanicHook {
        async fn handle(&self, _worker_id: u64, _msg: ServiceMessage) -> (ServiceMessage, HookState) {
            panic!("hook exploded");
        }
    }

    #[monoio::test]
    async fn live_worker_count_recovers_after_a_panicking_hook() {
        // A hook panic kills only its own worker thread (Open Question 1,
        // preserved uncaught). Without LiveWorkerGuard, live_workers would
        // stay permanently over-counted and set_worker would latch forever
        // on live != prev_target.
        let core = ServiceCore::new("Test", Some(Arc::new(PanicHook)));
        core.set_worker(1).await;
        monoio::time::sleep(Duration::from_millis(50)).await;

        core.exec("go", None).await;
        monoio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(core.live_worker_count(), 0);

        core.set_worker(1).await;
        monoio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(core.live_worker_count(), 1);
    }
}
