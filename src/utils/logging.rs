//! Logging setup and module-gated logging macros.
//!
//! Modules opt into the macros by declaring a flag next to their imports:
//! ```ignore
//! use crate::{log_info, log_warn};
//!
//! const ENABLE_LOGS: bool = true;
//!
//! log_info!("timer started");
//! ```

use env_logger::Env;

/// Environment variable that turns on per-tick logging in the controller.
pub const DEBUG_ENV: &str = "FOCUSDESK_DEBUG";

/// Installs `env_logger` as the `log` backend. `RUST_LOG` wins over the
/// `info` default. Calling it twice is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Info log gated on the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn log gated on the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error log gated on the calling module's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
