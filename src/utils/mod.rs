pub mod guard;

pub use guard::{GuardError, ProcessGuard};

// Макрос условного логирования: аргументы не форматируются, если DEBUG выключен
#[macro_export]
macro_rules! debug_if_enabled {
    ($($arg:tt)*) => {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}
