//! Worker/process state. Ported from `multiplex.ProcessState`/`HookState`.

/// State of a worker's processing loop.
///
/// `Retry` is reserved for future use (spec §7, last paragraph): the
/// framework never produces it and must accept it as input without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Init,
    Exit,
    Success,
    Error,
    Retry,
}

/// Result of a [`crate::service::ProcessHook`] invocation.
///
/// `handled = true` suppresses the framework's default handling of the
/// dequeued message, including its own `"exit"` sentinel check — this is
/// how the controller distinguishes a routed `"exit"` from one addressed
/// to itself (see `controller::controller_hook`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookState {
    pub handled: bool,
}

impl HookState {
    pub fn handled() -> Self {
        Self { handled: true }
    }

    pub fn unhandled() -> Self {
        Self { handled: false }
    }
}
