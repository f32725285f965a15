//! Rule model and the hot-reloadable rule store.
//!
//! A rule file is a sequence of `[class|title]` headers, each followed by the
//! binding directives that apply while a matching window is focused. Rules
//! keep their declaration order: when several match, later rules are applied
//! after earlier ones and win conflicts in the backend.

mod parser;
mod store;

pub use self::parser::parse_rules;
pub use self::store::RuleStore;

use glob::{MatchOptions, Pattern};
use std::path::PathBuf;
use thiserror::Error;

use crate::events::WindowIdentity;

/// Шаблон по умолчанию для заголовка, если в секции указан только класс
pub const ANY_TITLE: &str = "*";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("{}: не удалось прочитать файл правил: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Ошибка разбора с номером строки (с единицы)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("строка {line}: {kind}")]
pub struct FormatError {
    pub line: usize,
    pub kind: FormatErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    #[error("директива `{0}` стоит до первого заголовка [...]")]
    BindingOutsideRule(String),

    #[error("в заголовке `{0}` больше двух шаблонов")]
    TooManyPatterns(String),

    #[error("неверный шаблон `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Glob-шаблон вместе с исходным текстом из файла
#[derive(Debug, Clone)]
struct RulePattern {
    source: String,
    compiled: Pattern,
}

impl RulePattern {
    fn compile(source: &str) -> Result<Self, FormatErrorKind> {
        // `**` у glob означает рекурсию по каталогам; для окон это просто `*`
        let mut collapsed = String::with_capacity(source.len());
        for ch in source.chars() {
            if ch == '*' && collapsed.ends_with('*') {
                continue;
            }
            collapsed.push(ch);
        }

        let escaped = escape_unclosed_brackets(&collapsed);
        let compiled = Pattern::new(&escaped).map_err(|e| FormatErrorKind::InvalidPattern {
            pattern: source.to_string(),
            reason: e.msg.to_string(),
        })?;

        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    fn matches(&self, value: &str) -> bool {
        self.compiled.matches_with(value, MATCH_OPTIONS)
    }
}

/// `[` без парной `]` совпадает буквально, как в shell: переписываем его в `[[]`.
///
/// Первый символ класса (после `!`) может быть `]`, поэтому закрывающая скобка
/// ищется начиная со второго символа.
fn escape_unclosed_brackets(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut escaped = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '[' {
            escaped.push(chars[i]);
            i += 1;
            continue;
        }

        let body = if chars.get(i + 1) == Some(&'!') { i + 3 } else { i + 2 };
        let close = chars
            .get(body..)
            .and_then(|rest| rest.iter().position(|&c| c == ']'));

        match close {
            Some(offset) => {
                let end = body + offset;
                escaped.extend(&chars[i..=end]);
                i = end + 1;
            }
            None => {
                escaped.push_str("[[]");
                i += 1;
            }
        }
    }

    escaped
}

/// Одно правило: пара шаблонов и упорядоченный список директив
#[derive(Debug, Clone)]
pub struct Rule {
    class: RulePattern,
    title: RulePattern,
    bindings: Vec<String>,
}

impl Rule {
    pub(crate) fn new(class_pattern: &str, title_pattern: &str) -> Result<Self, FormatErrorKind> {
        Ok(Self {
            class: RulePattern::compile(class_pattern)?,
            title: RulePattern::compile(title_pattern)?,
            bindings: Vec::new(),
        })
    }

    pub fn class_pattern(&self) -> &str {
        &self.class.source
    }

    pub fn title_pattern(&self) -> &str {
        &self.title.source
    }

    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    pub(crate) fn push_binding(&mut self, directive: impl Into<String>) {
        self.bindings.push(directive.into());
    }

    pub fn matches(&self, identity: &WindowIdentity) -> bool {
        self.class.matches(identity.class()) && self.title.matches(identity.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(class: &str, title: &str) -> WindowIdentity {
        WindowIdentity::from_raw(class, title)
    }

    #[test]
    fn test_rule_glob_semantics() {
        let rule = Rule::new("fire?ox", "[a-c]*").unwrap();

        assert!(rule.matches(&identity("firefox", "bookmarks")));
        assert!(rule.matches(&identity("fireFox", "Cats")));
        assert!(!rule.matches(&identity("firefox", "downloads")));
        assert!(!rule.matches(&identity("firef0ox", "bookmarks")));
    }

    #[test]
    fn test_rule_negated_class() {
        let rule = Rule::new("[!k]*", ANY_TITLE).unwrap();

        assert!(rule.matches(&identity("firefox", "x")));
        assert!(!rule.matches(&identity("kitty", "x")));
    }

    #[test]
    fn test_rule_is_case_sensitive() {
        // Идентичность всегда в нижнем регистре, поэтому шаблон с заглавными не совпадёт
        let rule = Rule::new("Firefox", ANY_TITLE).unwrap();
        assert!(!rule.matches(&identity("Firefox", "x")));
    }

    #[test]
    fn test_double_star_is_plain_wildcard() {
        let rule = Rule::new("term**", "**vim**").unwrap();

        assert_eq!(rule.class_pattern(), "term**");
        assert!(rule.matches(&identity("terminator", "nvim - main.rs")));
    }

    #[test]
    fn test_unclosed_bracket_matches_literally() {
        let pattern = RulePattern::compile("*[draft*").unwrap();
        assert!(pattern.matches("notes [draft 2"));
        assert!(!pattern.matches("notes draft"));

        // Нормализованный заголовок не содержит `[`, так что правило просто не срабатывает
        let rule = Rule::new("app", "*[draft*").unwrap();
        assert_eq!(rule.title_pattern(), "*[draft*");
        assert!(!rule.matches(&identity("app", "notes [draft")));
    }

    #[test]
    fn test_closed_classes_survive_escaping() {
        assert_eq!(escape_unclosed_brackets("[abc"), "[[]abc");
        assert_eq!(escape_unclosed_brackets("[!]"), "[[]!]");
        assert_eq!(escape_unclosed_brackets("[]]x["), "[]]x[[]");
        assert_eq!(escape_unclosed_brackets("a[!b]c[d"), "a[!b]c[[]d");
        assert_eq!(escape_unclosed_brackets("[[]"), "[[]");
    }
}
