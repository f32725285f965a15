use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matcher::{normalize_class, normalize_title};

/// Информация об окне в том виде, в каком её прислал источник фокуса
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowInfo {
    pub class: String,
    pub title: String,
}

impl WindowInfo {
    pub fn new(class: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: title.into(),
        }
    }

    /// Нормализованная идентичность окна для сопоставления с правилами
    pub fn identity(&self) -> WindowIdentity {
        WindowIdentity::from_raw(&self.class, &self.title)
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.title, self.class)
    }
}

/// Нормализованная пара (класс, заголовок).
///
/// Создаётся только через [`WindowIdentity::from_raw`], поэтому поля всегда
/// уже прошли нормализацию.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowIdentity {
    class: String,
    title: String,
}

impl WindowIdentity {
    pub fn from_raw(class: &str, title: &str) -> Self {
        Self {
            class: normalize_class(class),
            title: normalize_title(title),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl fmt::Display for WindowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class, self.title)
    }
}

/// Результат ожидания в канале событий
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Сменилось активное окно
    Window(WindowInfo),
    /// Пробуждение без окна: только проверка файла правил
    Wake,
    /// Завершение работы
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_normalized() {
        let window = WindowInfo::new("Google-chrome", "Inbox - Gmail");
        let identity = window.identity();

        assert_eq!(identity.class(), "google-chrome");
        assert_eq!(identity.title(), "inbox-gmail");
        assert_eq!(identity.to_string(), "google-chrome|inbox-gmail");
    }

    #[test]
    fn test_identity_normalization_is_idempotent() {
        let once = WindowIdentity::from_raw("  ++Foo Bar++ ", "My Document.txt");
        let twice = WindowIdentity::from_raw(once.class(), once.title());

        assert_eq!(once, twice);
    }
}
