// Lenient parser for JSON-like CSV cells
//
// Embedded columns (genres, cast, crew, ...) are Python literal dumps:
// single-quoted strings, None/True/False. Strict JSON is tried first, then a
// normalized rewrite. Only lists and maps are accepted; everything else is None.

use serde_json::Value;

/// Parse a cell into a list or map. Never fails: bad input yields None.
pub fn parse_cell(raw: Option<&str>) -> Option<Value> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => structured(value),
        Err(_) => {
            let normalized = normalize_literal(text)?;
            serde_json::from_str::<Value>(&normalized).ok().and_then(structured)
        }
    }
}

fn structured(value: Value) -> Option<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => Some(value),
        _ => None,
    }
}

/// Rewrite Python literal syntax as JSON text.
/// Returns None when a string literal is left unterminated.
pub fn normalize_literal(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let literal = read_string_literal(&mut chars, c)?;
                // serde_json escapes quotes, backslashes and control chars for us
                out.push_str(&serde_json::to_string(&literal).ok()?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(c),
        }
    }

    Some(out)
}

fn read_string_literal(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> Option<String> {
    let mut literal = String::new();

    loop {
        let c = chars.next()?;
        if c == quote {
            return Some(literal);
        }
        if c != '\\' {
            literal.push(c);
            continue;
        }

        let escaped = chars.next()?;
        match escaped {
            'n' => literal.push('\n'),
            't' => literal.push('\t'),
            'r' => literal.push('\r'),
            '\\' | '\'' | '"' => literal.push(escaped),
            'x' => literal.push(read_hex_escape(chars, 2)?),
            'u' => literal.push(read_hex_escape(chars, 4)?),
            other => {
                literal.push('\\');
                literal.push(other);
            }
        }
    }
}

fn read_hex_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, digits: usize) -> Option<char> {
    let hex: String = (0..digits).filter_map(|_| chars.next()).collect();
    if hex.len() != digits {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}

/// Coerce numeric text ("18", "18.0") to an integer, truncating like a float cast.
pub fn coerce_i64(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    trimmed.parse::<f64>().ok().and_then(float_to_i64)
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

/// Integer field of an embedded record. Accepts numbers and numeric text.
pub fn field_i64(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_i64)),
        Value::String(s) => coerce_i64(s),
        _ => None,
    }
}

/// Non-empty string field of an embedded record.
pub fn field_str<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// Object entries of a list cell.
pub fn list_items(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter(|item| item.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_json_list() {
        let value = parse_cell(Some(r#"[{"id":18,"name":"Drama"},{"id":35,"name":"Comedy"}]"#)).unwrap();
        assert_eq!(value, json!([{"id": 18, "name": "Drama"}, {"id": 35, "name": "Comedy"}]));
    }

    #[test]
    fn test_python_literal_list() {
        let raw = "[{'cast_id': 14, 'character': \"Woody's friend\", 'gender': 2, 'profile_path': None, 'adult': False}]";
        let value = parse_cell(Some(raw)).unwrap();
        let item = &value[0];
        assert_eq!(item["character"], "Woody's friend");
        assert!(item["profile_path"].is_null());
        assert_eq!(item["adult"], false);
    }

    #[test]
    fn test_single_quoted_map() {
        let raw = "{'id': 10194, 'name': 'Toy Story Collection', 'poster_path': '/7G9915LfUQ2lVfwMEEhDsn3kT4B.jpg'}";
        let value = parse_cell(Some(raw)).unwrap();
        assert_eq!(field_i64(&value, "id"), Some(10194));
        assert_eq!(field_str(&value, "name"), Some("Toy Story Collection"));
    }

    #[test]
    fn test_escaped_quote_inside_single_quotes() {
        let value = parse_cell(Some(r"[{'name': 'l\'amour'}]")).unwrap();
        assert_eq!(value[0]["name"], "l'amour");
    }

    #[test]
    fn test_missing_and_blank_cells() {
        assert!(parse_cell(None).is_none());
        assert!(parse_cell(Some("")).is_none());
        assert!(parse_cell(Some("   ")).is_none());
    }

    #[test]
    fn test_bare_scalars_rejected() {
        for raw in ["42", "3.5", "\"Drama\"", "'Drama'", "true", "None", "null"] {
            assert!(parse_cell(Some(raw)).is_none(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_malformed_text_returns_none() {
        let samples = [
            "[{'id': 18, 'name': 'Drama'",
            "{'id': 18, 'name': 'Dra",
            "not json at all",
            "[{'id': nan}]",
            "{{}}",
            "'",
            "\"",
            "[{'name': 'bad \\x4'}]",
            "- Written by Ørnås",
        ];
        for raw in samples {
            assert!(parse_cell(Some(raw)).is_none(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_normalize_leaves_numbers_alone() {
        assert_eq!(normalize_literal("[{'id': 1.0, 'x': -2}]").unwrap(), r#"[{"id": 1.0, "x": -2}]"#);
    }

    #[test]
    fn test_field_i64_coercion() {
        let record = json!({"a": 18, "b": 18.0, "c": "18.0", "d": "eighteen", "e": null, "f": " 7 "});
        assert_eq!(field_i64(&record, "a"), Some(18));
        assert_eq!(field_i64(&record, "b"), Some(18));
        assert_eq!(field_i64(&record, "c"), Some(18));
        assert_eq!(field_i64(&record, "d"), None);
        assert_eq!(field_i64(&record, "e"), None);
        assert_eq!(field_i64(&record, "f"), Some(7));
        assert_eq!(field_i64(&record, "missing"), None);
    }

    #[test]
    fn test_field_str_skips_empty() {
        let record = json!({"name": "", "iso": "US", "n": 5});
        assert_eq!(field_str(&record, "name"), None);
        assert_eq!(field_str(&record, "iso"), Some("US"));
        assert_eq!(field_str(&record, "n"), None);
    }

    #[test]
    fn test_list_items_skips_non_objects() {
        let value = json!([{"id": 1}, 2, "x", {"id": 3}]);
        assert_eq!(list_items(&value).count(), 2);
        assert_eq!(list_items(&json!({"id": 1})).count(), 0);
    }
}
