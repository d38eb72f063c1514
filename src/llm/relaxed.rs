use serde_json::Value;

/// Parse JSON5 text (comments, single quotes, bare keys, trailing commas,
/// hex and signed numbers) into a JSON value.
///
/// Raw line breaks inside string literals are escaped first; models emit
/// them often and JSON5 rejects them.
pub fn from_relaxed_str(text: &str) -> Result<Value, json5::Error> {
    json5::from_str(&escape_raw_line_breaks(text))
}

/// Escape bare `\n` and `\r` inside string literals.
///
/// Escape sequences are copied as is, so a backslash line continuation
/// survives. Comments are copied untouched.
pub fn escape_raw_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => match c {
                '\\' => {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => {
                    if c == q {
                        quote = None;
                    }
                    out.push(c);
                }
            },
            None => {
                out.push(c);
                match c {
                    '"' | '\'' => quote = Some(c),
                    '/' if chars.peek() == Some(&'/') => {
                        for next in chars.by_ref() {
                            out.push(next);
                            if next == '\n' {
                                break;
                            }
                        }
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        let mut prev = '\0';
                        if let Some(star) = chars.next() {
                            out.push(star);
                        }
                        for next in chars.by_ref() {
                            out.push(next);
                            if prev == '*' && next == '/' {
                                break;
                            }
                            prev = next;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trailing_commas() {
        let value = from_relaxed_str(r#"{"a": [1, 2,], "b": {"c": 3,},}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2], "b": {"c": 3}}));
    }

    #[test]
    fn test_single_quotes_and_bare_keys() {
        let value = from_relaxed_str(r#"{title: 'He said "hi"', 'it\'s': true}"#).unwrap();
        assert_eq!(value, json!({"title": "He said \"hi\"", "it's": true}));
    }

    #[test]
    fn test_comments_are_dropped() {
        let text = "{\n  // don't keep this\n  \"a\": 1, /* inline 'x' */ \"b\": 2\n}";
        assert_eq!(from_relaxed_str(text).unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_json5_numbers() {
        let value = from_relaxed_str("{a: .5, b: +8, c: 0x1F, d: 3.}").unwrap();
        assert_eq!(value["a"], 0.5);
        assert_eq!(value["b"], 8);
        assert_eq!(value["c"], 31);
        assert_eq!(value["d"], 3.0);
    }

    #[test]
    fn test_raw_newlines_inside_strings() {
        let value = from_relaxed_str("{\"body\": \"line one\nline two\"}").unwrap();
        assert_eq!(value["body"], "line one\nline two");
    }

    #[test]
    fn test_line_continuation_is_kept() {
        let value = from_relaxed_str("{\"body\": \"first \\\nsecond\"}").unwrap();
        assert_eq!(value["body"], "first second");
    }

    #[test]
    fn test_comma_inside_string_is_kept() {
        let value = from_relaxed_str(r#"{"a": "x,}"}"#).unwrap();
        assert_eq!(value["a"], "x,}");
    }

    #[test]
    fn test_prose_is_still_rejected() {
        assert!(from_relaxed_str(r#"result: {"a": 1}"#).is_err());
    }
}
