//! CQL identifier sanitization (spec.md §4.2 **[ADDED]**).
//!
//! A small subset of the CQL v1.5.3 reserved-word table, mirroring
//! `rh-cql`'s lexer keyword list, used to detect identifiers that would
//! otherwise collide with CQL syntax.
pub const KEYWORDS: &[&str] = &[
    "library", "version", "using", "include", "called", "public", "private", "codesystem", "valueset", "code",
    "concept", "parameter", "default", "context", "define", "function", "fluent", "returns", "external", "Boolean",
    "Integer", "Long", "Decimal", "String", "Date", "DateTime", "Time", "Quantity", "Ratio", "Any", "List",
    "Interval", "Tuple", "Choice", "true", "false", "null", "and", "or", "xor", "not", "implies", "between", "is",
    "as", "from", "where", "return", "sort", "let", "exists",
];

/// Lower-cases preserved, non-alphanumeric runs collapsed to `_`, a leading
/// digit gets an `m` prefix, and a collision with a reserved word gets a
/// trailing `_Measure` suffix (spec.md §4.2 **[ADDED]**).
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    let mut identifier = if trimmed.is_empty() { "measure".to_string() } else { trimmed };

    if identifier.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        identifier = format!("m{identifier}");
    }

    if KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(&identifier)) {
        identifier.push_str("_Measure");
    }
    identifier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_non_alphanumeric_runs() {
        assert_eq!(sanitize_identifier("diabetes--screening!!2026"), "diabetes_screening_2026");
    }

    #[test]
    fn leading_digit_gets_prefixed() {
        assert_eq!(sanitize_identifier("2026-measure"), "m2026_measure");
    }

    #[test]
    fn keyword_collision_gets_suffixed() {
        assert_eq!(sanitize_identifier("context"), "context_Measure");
    }
}
