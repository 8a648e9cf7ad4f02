//! Message envelope, parameter map, and the one-shot reply slot.
//!
//! Ported from `multiplex.ServiceMessage`/`ExecParams`/`ReturnParams`, with
//! the reply slot redesigned per spec Design Note 1: instead of a
//! dynamically-typed map entry under a reserved `"return"` key, the reply
//! is an explicit field carrying a typed `Reply`/`ReplyWaiter` pair built on
//! `futures_channel::oneshot` + `futures_util`'s `Shared`.
//!
//! Not ported: `ExpectReturnCustomSignal`, `ReturnSignal`, `ReturnResult`.
//! The Go source lets a caller supply its own `*sync.WaitGroup` so more
//! than one waiter can be pre-registered via `signal.Add(n)`, then exposes
//! the raw signal/result fields for manual polling. `ReplyWaiter` already
//! supports an arbitrary number of independent waiters (it wraps a
//! `Shared` future, freely `Clone`), so the custom-signal parameter has no
//! remaining job once every waiter can just clone its own handle; exposing
//! the inner `oneshot`/`Shared` plumbing as public "signal"/"result"
//! getters would also leak implementation detail the `wait`/
//! `wait_for_return` pair already covers. See DESIGN.md.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use futures_channel::oneshot;
use futures_util::future::{FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;

/// Command string reserved by the framework. A worker that dequeues a
/// message whose `command` is `EXIT` (and whose hook does not intercept
/// it) terminates its processing loop.
pub const EXIT: &str = "exit";

pub type ReplyValue = Arc<dyn Any + Send + Sync>;

type WaiterFuture = Pin<Box<dyn Future<Output = Option<ReplyValue>> + Send>>;

/// Producer side of a one-shot reply. Created by [`ExecParams::expect_return`]
/// and handed to whichever service ends up processing the message; exactly
/// one call to [`Reply::return_value`] has any effect, every subsequent call
/// is a silent no-op (spec §7.4: double-`Return` is unspecified; this
/// implementation chooses the safe no-op over undefined behaviour).
pub struct Reply {
    tx: Option<oneshot::Sender<ReplyValue>>,
}

impl Reply {
    fn pair() -> (Self, ReplyWaiter) {
        let (tx, rx) = oneshot::channel::<ReplyValue>();
        let fut: WaiterFuture = Box::pin(async move { rx.await.ok() });
        (Self { tx: Some(tx) }, ReplyWaiter { rx: fut.shared() })
    }

    /// Store `v` and release any waiters. No-op if already consumed.
    pub fn return_value(&mut self, v: ReplyValue) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(v);
        }
    }
}

/// Consumer side of a one-shot reply. `Clone`-able: any number of
/// independent waiters may each `.wait()`/`.wait_for_return()`, all
/// observing the same produced value (spec §3: "zero or more consumers
/// call Wait/WaitForReturn").
#[derive(Clone)]
pub struct ReplyWaiter {
    rx: Shared<WaiterFuture>,
}

impl ReplyWaiter {
    /// Blocks (awaits) until the producer calls `return_value`, discarding
    /// the value.
    pub async fn wait(&self) {
        let _ = self.rx.clone().await;
    }

    /// Blocks (awaits) until the producer calls `return_value`, then
    /// returns it.
    pub async fn wait_for_return(&self) -> Option<ReplyValue> {
        self.rx.clone().await
    }
}

/// String-keyed, dynamically-typed parameter map carrying an optional
/// one-shot reply slot.
#[derive(Default)]
pub struct ExecParams {
    values: HashMap<String, ReplyValue>,
    reply: Option<Reply>,
    /// A clone of the waiter handed out by `expect_return`, retained so
    /// `wait`/`wait_for_return` mirror spec §4.C on `ExecParams` itself
    /// (not just on the `ReplyWaiter` returned to the caller) even after
    /// this value has been moved into a sent message.
    waiter: Option<ReplyWaiter>,
}

impl ExecParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ReplyValue> {
        self.values.get(key).cloned()
    }

    pub fn get_default(&self, key: &str, default: ReplyValue) -> ReplyValue {
        self.values.get(key).cloned().unwrap_or(default)
    }

    /// Typed convenience accessor over [`ExecParams::get`].
    pub fn get_as<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).and_then(|v| v.downcast::<T>().ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: ReplyValue) {
        self.values.insert(key.into(), value);
    }

    pub fn delete(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Installs a fresh reply handle and returns the waiter immediately,
    /// before `self` is moved anywhere (e.g. into a channel send).
    pub fn expect_return(&mut self) -> ReplyWaiter {
        let (reply, waiter) = Reply::pair();
        self.reply = Some(reply);
        self.waiter = Some(waiter.clone());
        waiter
    }

    /// Stores `v` into the reply slot and releases it once. No-op if no
    /// handle is present.
    pub fn return_value(&mut self, v: ReplyValue) {
        if let Some(reply) = self.reply.as_mut() {
            reply.return_value(v);
        }
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Blocks until the reply is released, discarding the value. A no-op
    /// that returns immediately if no reply handle was ever installed.
    pub async fn wait(&self) {
        if let Some(waiter) = &self.waiter {
            waiter.wait().await;
        }
    }

    /// Blocks until the reply is released, then returns it. `None`
    /// immediately if no reply handle was ever installed.
    pub async fn wait_for_return(&self) -> Option<ReplyValue> {
        match &self.waiter {
            Some(waiter) => waiter.wait_for_return().await,
            None => None,
        }
    }
}

/// Routing payload attached when a message is forwarded through the
/// controller. Mirrors `multiplex.ControllerExtra`.
#[derive(Debug, Clone)]
pub struct RouteExtra {
    pub service_id: String,
}

/// Message envelope. Cheap to construct; no validation is performed on
/// `command` besides the `EXIT` sentinel reservation.
#[derive(Default)]
pub struct ServiceMessage {
    pub command: String,
    pub params: Option<ExecParams>,
    pub extra: Option<RouteExtra>,
}

impl ServiceMessage {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: None,
            extra: None,
        }
    }

    pub fn with_params(command: impl Into<String>, params: ExecParams) -> Self {
        Self {
            command: command.into(),
            params: Some(params),
            extra: None,
        }
    }

    pub fn exit() -> Self {
        Self::new(EXIT)
    }

    pub fn is_exit(&self) -> bool {
        self.command == EXIT
    }

    /// Installs a reply slot, auto-creating `params` if absent, per spec
    /// §4.C's last paragraph.
    pub fn expect_return(&mut self) -> ReplyWaiter {
        self.params.get_or_insert_with(ExecParams::new).expect_return()
    }

    pub fn return_value(&mut self, v: ReplyValue) {
        if let Some(params) = self.params.as_mut() {
            params.return_value(v);
        }
    }

    /// Mirrors [`ExecParams::wait`]; a no-op if `params` is absent.
    pub async fn wait(&self) {
        if let Some(params) = &self.params {
            params.wait().await;
        }
    }

    /// Mirrors [`ExecParams::wait_for_return`]; `None` if `params` is absent.
    pub async fn wait_for_return(&self) -> Option<ReplyValue> {
        match &self.params {
            Some(params) => params.wait_for_return().await,
            None => None,
        }
    }
}
