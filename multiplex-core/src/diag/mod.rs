//! Diagnostic collaborators: atomic gauge/counter and the progress/timer
//! helpers built on top of them, plus the ring-buffer debug log capture
//! used by tests.

pub mod counter;
pub mod debug_layer;
pub mod gauge;
pub mod progress;
pub mod timer;

pub use counter::Counter;
pub use debug_layer::DebugLayer;
pub use gauge::Gauge;
pub use progress::Progress;
pub use timer::Timer;
