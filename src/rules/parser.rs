use super::{FormatError, FormatErrorKind, Rule, ANY_TITLE};

/// Разобрать текст файла правил.
///
/// Каждая строка обрезается по краям. Пустые строки и строки, начинающиеся
/// с `#`, пропускаются. `[класс]` или `[класс|заголовок]` открывает новое
/// правило, все остальные строки добавляются в его список директив.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>, FormatError> {
    let mut rules: Vec<Rule> = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let at_line = |kind| FormatError { line: line_no, kind };

        if let Some(header) = section_header(line) {
            let rule = parse_header(header).map_err(at_line)?;
            rules.push(rule);
            continue;
        }

        match rules.last_mut() {
            Some(rule) => rule.push_binding(line),
            None => {
                return Err(at_line(FormatErrorKind::BindingOutsideRule(line.to_string())));
            }
        }
    }

    Ok(rules)
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}

fn parse_header(header: &str) -> Result<Rule, FormatErrorKind> {
    let mut patterns = header.split('|');
    let class = patterns.next().unwrap_or_default();
    let title = patterns.next().unwrap_or(ANY_TITLE);

    if patterns.next().is_some() {
        return Err(FormatErrorKind::TooManyPatterns(format!("[{header}]")));
    }

    Rule::new(class, title)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# правила для браузера
[firefox|*]
control.t = C-t

  [firefox|youtube*]
  k = right
# комментарий внутри секции
  j = left

[kitty]
";

    #[test]
    fn test_parse_sample() {
        let rules = parse_rules(SAMPLE).unwrap();
        assert_eq!(rules.len(), 3);

        assert_eq!(rules[0].class_pattern(), "firefox");
        assert_eq!(rules[0].title_pattern(), "*");
        assert_eq!(rules[0].bindings(), ["control.t = C-t"]);

        assert_eq!(rules[1].title_pattern(), "youtube*");
        assert_eq!(rules[1].bindings(), ["k = right", "j = left"]);

        assert_eq!(rules[2].class_pattern(), "kitty");
        assert_eq!(rules[2].title_pattern(), ANY_TITLE);
        assert!(rules[2].bindings().is_empty());
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse_rules("").unwrap().is_empty());
        assert!(parse_rules("\n# only comments\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_binding_before_header_is_rejected() {
        let err = parse_rules("\n\na = b\n[x]\n").unwrap_err();

        assert_eq!(err.line, 3);
        assert_eq!(err.kind, FormatErrorKind::BindingOutsideRule("a = b".to_string()));
    }

    #[test]
    fn test_three_patterns_are_rejected() {
        let err = parse_rules("[a]\nx\n[a|b|c]\n").unwrap_err();

        assert_eq!(err.line, 3);
        assert!(matches!(err.kind, FormatErrorKind::TooManyPatterns(_)));
    }

    #[test]
    fn test_unclosed_bracket_in_header_is_literal() {
        let rules = parse_rules("[ok]\n[app|*[draft*]\nx\n").unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].class_pattern(), "app");
        assert_eq!(rules[1].title_pattern(), "*[draft*");
        assert_eq!(rules[1].bindings(), ["x"]);
    }

    #[test]
    fn test_empty_title_pattern_is_kept() {
        let rules = parse_rules("[term|]\nx\n").unwrap();
        assert_eq!(rules[0].title_pattern(), "");
    }
}
