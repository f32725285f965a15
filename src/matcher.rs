//! Сопоставление активного окна с правилами.
//!
//! Здесь нет состояния: на вход приходит упорядоченный список правил и уже
//! нормализованная идентичность окна, на выходе плоский список директив.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::events::WindowIdentity;
use crate::rules::Rule;

static CLASS_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9]+").expect("static class separator regex is valid")
});

// \W юникодный: буквы кириллицы и прочих алфавитов остаются в заголовке
static TITLE_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\W_]+").expect("static title separator regex is valid"));

/// Класс окна: всё, кроме ASCII букв и цифр, схлопывается в `-`
pub fn normalize_class(raw: &str) -> String {
    collapse(&CLASS_SEPARATORS, raw)
}

/// Заголовок окна: разделители слов и `_` схлопываются в `-`
pub fn normalize_title(raw: &str) -> String {
    collapse(&TITLE_SEPARATORS, raw)
}

fn collapse(separators: &Regex, raw: &str) -> String {
    separators
        .replace_all(raw, "-")
        .trim_matches('-')
        .to_lowercase()
}

/// Собрать директивы всех подходящих правил в порядке их объявления.
///
/// Дубликаты не удаляются: конфликты разрешает сам бэкенд, применяя
/// директивы по порядку.
pub fn lookup_bindings(rules: &[Rule], identity: &WindowIdentity) -> Vec<String> {
    let mut bindings = Vec::new();

    for rule in rules {
        if rule.matches(identity) {
            tracing::debug!(
                "\tСовпало правило {}|{}",
                rule.class_pattern(),
                rule.title_pattern()
            );
            bindings.extend(rule.bindings().iter().cloned());
        }
    }

    bindings
}
