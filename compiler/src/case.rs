//! Identifier case conversion for generated code.

/// Converts a string to PascalCase.
/// - Underscore-separated words are capitalized and joined (`COLOR_RED` → `ColorRed`).
/// - A fully uppercase word keeps only its first letter uppercase.
/// - Otherwise only the first letter is forced uppercase.
pub fn to_pascal_case(s: &str) -> String {
    fn capitalize(word: &str, lower_rest: bool) -> String {
        let mut chars = word.chars();
        match chars.next() {
            None => String::new(),
            Some(first) if lower_rest => {
                first.to_uppercase().to_string() + &chars.as_str().to_lowercase()
            }
            Some(first) => first.to_uppercase().to_string() + chars.as_str(),
        }
    }

    if s.contains('_') {
        s.split('_')
            .filter(|word| !word.is_empty())
            .map(|word| capitalize(word, word == word.to_uppercase()))
            .collect()
    } else {
        capitalize(s, s == s.to_uppercase())
    }
}

/// Converts a string to snake_case without splitting acronyms
/// (`sessionID` → `session_id`, `GetHTTPStatus` → `get_http_status`).
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                if (!prev.is_uppercase() && prev != '_')
                    || (prev.is_uppercase() && i + 1 < chars.len() && chars[i + 1].is_lowercase())
                {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

pub fn to_upper_snake(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// The JSON name protoc derives for a field: underscores dropped, the
/// following letter uppercased.
pub fn to_lower_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Naive singular form used for synthesized accessor names.
pub fn singular(s: &str) -> String {
    match s.strip_suffix('s') {
        Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem.to_string(),
        _ => s.to_string(),
    }
}

/// Escapes Rust reserved keywords by suffixing with an underscore.
pub fn escape_rust_keyword(s: &str) -> String {
    const KEYWORDS: [&str; 51] = [
        "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
        "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if",
        "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
        "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
        "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while",
        "yield",
    ];
    if KEYWORDS.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// A field or method name as a Rust identifier.
pub fn field_ident(s: &str) -> String {
    escape_rust_keyword(&to_snake_case(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal() {
        assert_eq!(to_pascal_case("COLOR_RED"), "ColorRed");
        assert_eq!(to_pascal_case("SIGNAL"), "Signal");
        assert_eq!(to_pascal_case("fooBar"), "FooBar");
        assert_eq!(to_pascal_case("value_2"), "Value2");
    }

    #[test]
    fn snake() {
        assert_eq!(to_snake_case("sessionID"), "session_id");
        assert_eq!(to_snake_case("GetHTTPStatus"), "get_http_status");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("Outer_Inner"), "outer_inner");
        assert_eq!(to_upper_snake("BatchGetWidgets"), "BATCH_GET_WIDGETS");
    }

    #[test]
    fn lower_camel() {
        assert_eq!(to_lower_camel("item_ids"), "itemIds");
        assert_eq!(to_lower_camel("name"), "name");
        assert_eq!(to_lower_camel("a_b_c"), "aBC");
    }

    #[test]
    fn singular_forms() {
        assert_eq!(singular("ids"), "id");
        assert_eq!(singular("Widgets"), "Widget");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("key"), "key");
    }

    #[test]
    fn keywords() {
        assert_eq!(escape_rust_keyword("type"), "type_");
        assert_eq!(escape_rust_keyword("self"), "self_");
        assert_eq!(field_ident("matchType"), "match_type");
        assert_eq!(field_ident("async"), "async_");
    }
}
