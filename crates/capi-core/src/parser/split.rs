//! Statement and component splitting.
//!
//! Two strategies: a fast split that drops empty pieces, and a quote-aware
//! split that keeps separators found inside `'…'` or `"…"` and keeps empty
//! pieces so positional components stay aligned.

/// Split on `separator`, dropping empty pieces. No quote handling.
pub fn fast_split(input: &str, separator: char) -> Vec<&str> {
    input.split(separator).filter(|s| !s.is_empty()).collect()
}

/// Split on `separator` unless it occurs inside a quoted run.
///
/// A single quote inside a double-quoted run (and vice versa) is literal.
/// An empty input yields no pieces; a trailing separator yields a trailing
/// empty piece.
pub fn quoted_split(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    if input.is_empty() {
        return parts;
    }

    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in input.chars() {
        match ch {
            '"' if !in_single => in_double = !in_double,
            '\'' if !in_double => in_single = !in_single,
            _ => {}
        }

        if ch == separator && !in_single && !in_double {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

/// Split a filter expression into its `;`-separated statements.
/// Blank statements (e.g. from a trailing `;`) are dropped.
pub fn statements(expression: &str) -> Vec<String> {
    quoted_split(expression, ';')
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Split one statement into `field`, `operator`, `value`.
///
/// Tries the fast split first and falls back to the quote-aware split when
/// that does not yield exactly three pieces.
pub fn components(statement: &str) -> Vec<String> {
    let fast = fast_split(statement, ':');
    if fast.len() == 3 {
        return fast.into_iter().map(str::to_string).collect();
    }
    quoted_split(statement, ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_split_drops_empties() {
        assert_eq!(fast_split("a::b:c", ':'), vec!["a", "b", "c"]);
        assert!(fast_split("", ':').is_empty());
    }

    #[test]
    fn test_quoted_split_keeps_embedded_separators() {
        let parts = quoted_split("measurementdate:ge:'2024-01-01T10:00:00'", ':');
        assert_eq!(parts, vec!["measurementdate", "ge", "'2024-01-01T10:00:00'"]);
    }

    #[test]
    fn test_quoted_split_mixed_quotes() {
        let parts = quoted_split(r#"a:eq:"it's:here""#, ':');
        assert_eq!(parts, vec!["a", "eq", r#""it's:here""#]);
    }

    #[test]
    fn test_quoted_split_trailing_separator() {
        assert_eq!(quoted_split("a:b:", ':'), vec!["a", "b", ""]);
        assert!(quoted_split("", ':').is_empty());
    }

    #[test]
    fn test_components_falls_back_to_quote_aware() {
        assert_eq!(components("unit:eq:'mg/l'"), vec!["unit", "eq", "'mg/l'"]);
        assert_eq!(components("unit:eq:'a:b'"), vec!["unit", "eq", "'a:b'"]);
        assert_eq!(components("unit::'x'"), vec!["unit", "", "'x'"]);
    }

    #[test]
    fn test_statements_ignore_blank_and_quoted_semicolons() {
        let parts = statements("unit:eq:'a;b'; quantity:eq:'Q';");
        assert_eq!(parts, vec!["unit:eq:'a;b'", " quantity:eq:'Q'"]);
    }
}
