use thiserror::Error;

use crate::utils::guard::GuardError;
use crate::rules::RulesError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Ошибка сокета {path}: {message}")]
    Socket { path: String, message: String },

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl AppError {
    pub fn socket(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        AppError::Socket {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! app_error {
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::AppError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::AppError::Internal(format!($($arg)*))
    };
}
