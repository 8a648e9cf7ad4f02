//! Registry of services by identifier plus the routing hook that forwards
//! between them. Ported from `multiplex.ServiceController`/`ServiceRouter`
//! (`original_source/multiplex/controller.go`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::warn;

use crate::message::{ExecParams, RouteExtra, ServiceMessage, EXIT};
use crate::service::{ProcessHook, Service, ServiceCore};
use crate::state::HookState;

struct ControllerState {
    services: Mutex<HashMap<String, Arc<dyn Service>>>,
}

/// The controller's own processing hook: exits fall through to the
/// default sentinel handling when unrouted, everything else is looked up
/// by `extra.service_id` and forwarded to that service's `exec`.
///
/// Hardening note (documented deviation, see SPEC_FULL.md §4.F): the
/// original unconditionally type-asserts `msg.Extra` when the command
/// isn't `"exit"`, which panics on a `nil` extra. This hook instead treats
/// "no extra, not exit" as handled-no-op rather than propagating a panic
/// out of the worker thread.
struct ControllerHook {
    state: Arc<ControllerState>,
}

#[async_trait]
impl ProcessHook for ControllerHook {
    async fn handle(&self, _worker_id: u64, msg: ServiceMessage) -> (ServiceMessage, HookState) {
        match &msg.extra {
            None if msg.command == EXIT => (msg, HookState::unhandled()),
            None => (msg, HookState::handled()),
            Some(extra) => {
                let target = self
                    .state
                    .services
                    .lock()
                    .unwrap()
                    .get(&extra.service_id)
                    .cloned();
                match target {
                    Some(svc) => {
                        svc.exec(msg.command, msg.params).await;
                    }
                    None => {
                        warn!(service_id = %extra.service_id, "dispatch target not registered");
                    }
                }
                (ServiceMessage::new(""), HookState::handled())
            }
        }
    }
}

/// The controller's forwarding interface, consumed by peer services via
/// `ServiceCore::dispatch`. Constructs `{command, params, extra}` and
/// enqueues to the controller's own inbox — dispatch is therefore a
/// two-hop operation: caller -> controller -> target.
pub struct Router {
    core: ServiceCore,
}

impl Router {
    pub async fn forward(
        &self,
        service_id: impl Into<String>,
        command: impl Into<String>,
        params: Option<ExecParams>,
    ) {
        let service_id = service_id.into();
        let extra = if service_id.is_empty() {
            None
        } else {
            Some(RouteExtra { service_id })
        };
        let msg = ServiceMessage {
            command: command.into(),
            params,
            extra,
        };
        self.core.enqueue(msg).await;
    }
}

/// A service-core reusing the same machinery with one worker and the
/// controller-specific hook above, plus a registry of peer services.
pub struct ServiceController {
    core: ServiceCore,
    state: Arc<ControllerState>,
    router: Arc<Router>,
}

impl ServiceController {
    pub fn new() -> Self {
        let state = Arc::new(ControllerState {
            services: Mutex::new(HashMap::new()),
        });
        let hook = Arc::new(ControllerHook {
            state: state.clone(),
        });
        let core = ServiceCore::new("Controller", Some(hook));
        let router = Arc::new(Router { core: core.clone() });
        Self {
            core,
            state,
            router,
        }
    }

    pub fn service_id(&self) -> &str {
        self.core.service_id()
    }

    /// The router peer services attach via `ServiceCore::set_router`
    /// before calling [`ServiceController::register`].
    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    /// Rejects (returns `false`, logs a warning) when the service's
    /// attached router is not this controller's own router.
    pub fn register(&self, service: Arc<dyn Service>) -> bool {
        match service.router() {
            Some(r) if Arc::ptr_eq(&r, &self.router) => {
                self.state
                    .services
                    .lock()
                    .unwrap()
                    .insert(service.service_id().to_string(), service);
                true
            }
            _ => {
                warn!(
                    service_id = %service.service_id(),
                    "rejected registration: router does not match this controller"
                );
                false
            }
        }
    }

    /// Idempotent: removing an identifier that isn't registered is a no-op.
    pub fn unregister(&self, service_id: &str) {
        self.state.services.lock().unwrap().remove(service_id);
    }

    /// Directly enqueues `{command, params}` on the controller's own
    /// inbox, bypassing routing. Used to send it `"exit"`.
    pub async fn exec(&self, command: impl Into<String>, params: Option<ExecParams>) {
        self.core.exec(command, params).await;
    }

    /// Forwards `{command, params}` to `target_id` using the controller's
    /// own router, the same two-hop operation peer services reach through
    /// `ServiceCore::dispatch`.
    pub async fn dispatch(
        &self,
        target_id: impl Into<String>,
        command: impl Into<String>,
        params: Option<ExecParams>,
    ) {
        self.router.forward(target_id, command, params).await;
    }

    /// Starts the controller's single worker. In background mode, blocks
    /// until that worker exits.
    pub async fn run(&self, background: bool) {
        self.core.set_worker(1).await;
        if background {
            self.core.set_background(true);
            self.core.wait_for_exit().await;
            self.core.set_background(false);
        }
    }
}

impl Default for ServiceController {
    fn default() -> Self {
        Self::new()
    }
}
