//! Wire format of the monitor socket.
//!
//! One connection carries one message: UTF-8 text `class|title`, at most
//! [`MAX_MESSAGE_LEN`] bytes. Nothing is written back.

use crate::events::WindowInfo;

pub const MAX_MESSAGE_LEN: usize = 128;
pub const FIELD_SEPARATOR: char = '|';

/// Разобрать сообщение. Пустые поля отбрасываются; сообщение корректно,
/// только если осталось ровно два поля.
pub fn parse_message(bytes: &[u8]) -> Option<WindowInfo> {
    let text = String::from_utf8_lossy(bytes);
    let fields: Vec<&str> = text
        .trim()
        .split(FIELD_SEPARATOR)
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect();

    match fields.as_slice() {
        [class, title] => Some(WindowInfo::new(*class, *title)),
        _ => None,
    }
}

/// Закодировать окно, обрезав по границе символа до [`MAX_MESSAGE_LEN`]
pub fn encode_message(window: &WindowInfo) -> Vec<u8> {
    let text = format!("{}{}{}", window.class, FIELD_SEPARATOR, window.title);

    let mut end = text.len().min(MAX_MESSAGE_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    text.as_bytes()[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_fields() {
        let window = parse_message(b"chrome|Inbox - Gmail").unwrap();
        assert_eq!(window, WindowInfo::new("chrome", "Inbox - Gmail"));
    }

    #[test]
    fn test_parse_trims_and_skips_empty_fields() {
        let window = parse_message(b"  |kitty | | vim  \n").unwrap();
        assert_eq!(window, WindowInfo::new("kitty", "vim"));
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert_eq!(parse_message(b"onlyonefield"), None);
        assert_eq!(parse_message(b"a|b|c"), None);
        assert_eq!(parse_message(b""), None);
        assert_eq!(parse_message(b"||"), None);
    }

    #[test]
    fn test_parse_invalid_utf8_is_lossy() {
        let window = parse_message(b"term|\xff\xfeshell").unwrap();
        assert_eq!(window.class, "term");
        assert!(window.title.ends_with("shell"));
    }

    #[test]
    fn test_encode_truncates_on_char_boundary() {
        let window = WindowInfo::new("browser", "ж".repeat(100));
        let bytes = encode_message(&window);

        assert!(bytes.len() <= MAX_MESSAGE_LEN);
        assert!(std::str::from_utf8(&bytes).is_ok());
        assert!(bytes.starts_with(b"browser|"));
    }
}
