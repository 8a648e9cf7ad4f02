//! Demo services exercising every end-to-end scenario in SPEC_FULL.md §8 /
//! §14: Echo, Random, Hash (hash-of-a-random-value via the reply slot),
//! and Shutdown (cascades an `"exit"` to the controller).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use multiplex_core::{
    ExecParams, HookState, ProcessHook, Router, Service, ServiceCore, ServiceMessage, EXIT,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::info;

fn message_of(params: &Option<ExecParams>) -> Option<String> {
    params
        .as_ref()?
        .get_as::<String>("message")
        .map(|s| (*s).clone())
}

/// Logs every received message's `"message"` param at Info, in the exact
/// `"<id>#<worker>: Message received: <text>"` shape spec §8 scenario 1
/// asserts against.
struct EchoHook;

#[async_trait]
impl ProcessHook for EchoHook {
    async fn handle(
        &self,
        worker_id: u64,
        msg: ServiceMessage,
    ) -> (ServiceMessage, HookState) {
        if let Some(text) = message_of(&msg.params) {
            info!("Echo#{worker_id}: Message received: {text}");
        }
        (msg, HookState::unhandled())
    }
}

pub struct Echo {
    core: ServiceCore,
}

impl Echo {
    pub fn new() -> Arc<Self> {
        let core = ServiceCore::new("Echo", None);
        core.set_hook(Arc::new(EchoHook));
        Arc::new(Self { core })
    }

    pub fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[async_trait]
impl Service for Echo {
    fn service_id(&self) -> &str {
        self.core.service_id()
    }
    fn router(&self) -> Option<Arc<Router>> {
        self.core.router()
    }
    async fn exec(&self, command: String, params: Option<ExecParams>) {
        self.core.exec(command, params).await;
    }
}

/// Generates a random hex value on every message, fulfills the sender's
/// reply slot if present, and logs `"Value randomed: <value>"`.
struct RandomHook;

#[async_trait]
impl ProcessHook for RandomHook {
    async fn handle(
        &self,
        worker_id: u64,
        mut msg: ServiceMessage,
    ) -> (ServiceMessage, HookState) {
        let value: u64 = rand::thread_rng().gen();
        let hex_value = format!("{value:016x}");
        info!("Random#{worker_id}: Value randomed: {hex_value}");
        msg.return_value(Arc::new(hex_value));
        (msg, HookState::unhandled())
    }
}

pub struct Random {
    core: ServiceCore,
}

impl Random {
    pub fn new() -> Arc<Self> {
        let core = ServiceCore::new("Random", None);
        core.set_hook(Arc::new(RandomHook));
        Arc::new(Self { core })
    }

    pub fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[async_trait]
impl Service for Random {
    fn service_id(&self) -> &str {
        self.core.service_id()
    }
    fn router(&self) -> Option<Arc<Router>> {
        self.core.router()
    }
    async fn exec(&self, command: String, params: Option<ExecParams>) {
        self.core.exec(command, params).await;
    }
}

/// On `"sha256_random"`, dispatches to Random with a fresh reply slot,
/// waits for the random value, SHA-256-hashes it, and logs
/// `"Value hashed: <hex digest>"`.
struct HashHook {
    core: ServiceCore,
}

#[async_trait]
impl ProcessHook for HashHook {
    async fn handle(
        &self,
        worker_id: u64,
        msg: ServiceMessage,
    ) -> (ServiceMessage, HookState) {
        if msg.command == "sha256_random" {
            let mut params = ExecParams::new();
            let waiter = params.expect_return();
            self.core
                .dispatch("Random", "generate", Some(params))
                .await;
            if let Some(value) = waiter.wait_for_return().await {
                if let Ok(random_value) = value.downcast::<String>() {
                    let mut hasher = Sha256::new();
                    hasher.update(random_value.as_bytes());
                    let digest = hex::encode(hasher.finalize());
                    info!("Hash#{worker_id}: Value hashed: {digest}");
                }
            }
        }
        (msg, HookState::unhandled())
    }
}

pub struct Hash {
    core: ServiceCore,
}

impl Hash {
    pub fn new() -> Arc<Self> {
        let core = ServiceCore::new("Hash", None);
        core.set_hook(Arc::new(HashHook { core: core.clone() }));
        Arc::new(Self { core })
    }

    pub fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[async_trait]
impl Service for Hash {
    fn service_id(&self) -> &str {
        self.core.service_id()
    }
    fn router(&self) -> Option<Arc<Router>> {
        self.core.router()
    }
    async fn exec(&self, command: String, params: Option<ExecParams>) {
        self.core.exec(command, params).await;
    }
}

/// On any message, sleeps briefly then dispatches `"exit"` to the
/// controller (empty target id addresses the controller itself).
struct ShutdownHook {
    core: ServiceCore,
    delay: Duration,
}

#[async_trait]
impl ProcessHook for ShutdownHook {
    async fn handle(
        &self,
        worker_id: u64,
        msg: ServiceMessage,
    ) -> (ServiceMessage, HookState) {
        if !msg.is_exit() {
            info!("Shutdown#{worker_id}: shutting down in {:?}", self.delay);
            monoio::time::sleep(self.delay).await;
            self.core.dispatch("", EXIT, None).await;
        }
        (msg, HookState::unhandled())
    }
}

pub struct Shutdown {
    core: ServiceCore,
}

impl Shutdown {
    pub fn new(delay: Duration) -> Arc<Self> {
        let core = ServiceCore::new("Shutdown", None);
        core.set_hook(Arc::new(ShutdownHook {
            core: core.clone(),
            delay,
        }));
        Arc::new(Self { core })
    }

    pub fn core(&self) -> &ServiceCore {
        &self.core
    }
}

#[async_trait]
impl Service for Shutdown {
    fn service_id(&self) -> &str {
        self.core.service_id()
    }
    fn router(&self) -> Option<Arc<Router>> {
        self.core.router()
    }
    async fn exec(&self, command: String, params: Option<ExecParams>) {
        self.core.exec(command, params).await;
    }
}
