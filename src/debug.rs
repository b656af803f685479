//! Parse tracing. Active only in debug builds and when `PARSEMO_LOG` is set
//! in the environment, so the hot loops carry no cost in release builds.

use once_cell::sync::Lazy;

static LOG_ENABLED: Lazy<bool> =
    Lazy::new(|| std::env::var("PARSEMO_LOG").is_ok());

#[doc(hidden)]
pub fn enabled() -> bool {
    *LOG_ENABLED
}

/// Log a trace line.
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! log {
    ($($args:tt)*) => {
        if $crate::debug::enabled() {
            eprintln!($($args)*)
        }
    };
}

/// Log a trace line. No-op in release builds.
#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! log {
    ($($args:tt)*) => {{}};
}

