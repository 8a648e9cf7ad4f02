/// A type alias for `anyhow::Error`, representing any error type.
///
/// This type is used throughout the crate to represent errors that can be of any type,
/// leveraging the flexibility of the `anyhow` crate for error handling.
pub type AnyError = anyhow::Error;

/// A type alias for `Result<T, E>` where `E` defaults to [`AnyError`](AnyError).
pub type AnyResult<T, E = AnyError> = std::result::Result<T, E>;

#[macro_export]
macro_rules! bail_into {
    ($msg:literal $(,)?) => {
        return Err(::anyhow::anyhow!($msg).into())
    };
    ($err:expr $(,)?) => {
        return Err(::anyhow::anyhow!($err).into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err(::anyhow::anyhow!($fmt, $($arg)*).into())
    };
}

/// Invalid-argument failures for [`crate::diag::progress::Progress`].
///
/// The original implementation panics on non-positive arguments; this crate
/// fails fast via `Result` instead, which is the idiomatic equivalent for a
/// library's public constructors/setters.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("progress total must be positive, got {0}")]
    NonPositiveTotal(i64),
    #[error("progress delta must be positive, got {0}")]
    NonPositiveDelta(f64),
}
