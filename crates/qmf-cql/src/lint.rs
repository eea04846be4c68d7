//! A single-pass, delimiter-tracking lint over generated CQL (spec.md §4.3).
//! This never parses CQL into a syntax tree — it is a lexical sanity check
//! that catches mistakes a generator (or a hand-edited library) could make,
//! not a substitute for the real CQL-to-ELM translator.

use serde::Serialize;
use std::collections::BTreeSet;

const TYPO_TABLE: &[(&str, &str)] = &[
    ("exsits", "exists"),
    ("defien", "define"),
    ("retrun", "return"),
    ("libary", "library"),
    ("vallueset", "valueset"),
    ("contetx", "context"),
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMetadata {
    pub library_name: Option<String>,
    pub version: Option<String>,
    pub definition_count: usize,
    pub value_set_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: LintMetadata,
}

/// Tracks nesting state across the single pass: parens, brackets, the
/// in-string/in-comment mode, and whether the previous char was an escape.
#[derive(Default)]
struct LexState {
    parens: i32,
    brackets: i32,
    in_double_quote: bool,
    in_single_quote: bool,
    in_line_comment: bool,
    in_block_comment: bool,
}

fn check_delimiters(cql: &str, errors: &mut Vec<String>) {
    let mut state = LexState::default();
    let chars: Vec<char> = cql.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if state.in_line_comment {
            if c == '\n' {
                state.in_line_comment = false;
            }
            i += 1;
            continue;
        }
        if state.in_block_comment {
            if c == '*' && next == Some('/') {
                state.in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if state.in_double_quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '"' {
                state.in_double_quote = false;
            }
            i += 1;
            continue;
        }
        if state.in_single_quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == '\'' {
                state.in_single_quote = false;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('/', Some('/')) => {
                state.in_line_comment = true;
                i += 2;
                continue;
            }
            ('/', Some('*')) => {
                state.in_block_comment = true;
                i += 2;
                continue;
            }
            ('"', _) => state.in_double_quote = true,
            ('\'', _) => state.in_single_quote = true,
            ('(', _) => state.parens += 1,
            (')', _) => state.parens -= 1,
            ('[', _) => state.brackets += 1,
            (']', _) => state.brackets -= 1,
            _ => {}
        }
        i += 1;
    }

    if state.parens != 0 {
        errors.push(format!("unbalanced parentheses (net {})", state.parens));
    }
    if state.brackets != 0 {
        errors.push(format!("unbalanced brackets (net {})", state.brackets));
    }
    if state.in_double_quote {
        errors.push("unterminated double-quoted identifier".to_string());
    }
    if state.in_single_quote {
        errors.push("unterminated single-quoted literal".to_string());
    }
}

fn check_required_declarations(cql: &str, errors: &mut Vec<String>) {
    for keyword in ["library", "using", "context"] {
        if !cql.lines().any(|line| line.trim_start().starts_with(keyword)) {
            errors.push(format!("missing required '{keyword}' declaration"));
        }
    }
}

fn check_empty_identifiers(cql: &str, errors: &mut Vec<String>) {
    if cql.contains("\"\"") {
        errors.push("empty quoted identifier".to_string());
    }
}

fn check_define_colons(cql: &str, errors: &mut Vec<String>) {
    for line in cql.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("define ") || trimmed.starts_with("define\"") {
            if !trimmed.trim_end().ends_with(':') {
                errors.push(format!("define statement missing trailing ':': {trimmed}"));
            }
        }
    }
}

fn check_typos(cql: &str, warnings: &mut Vec<String>) {
    let lower = cql.to_ascii_lowercase();
    for (typo, correct) in TYPO_TABLE {
        if lower.contains(typo) {
            warnings.push(format!("possible typo '{typo}', did you mean '{correct}'?"));
        }
    }
}

fn check_unused_valuesets(cql: &str, warnings: &mut Vec<String>) {
    let mut declared = BTreeSet::new();
    for line in cql.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("valueset \"") {
            if let Some(end) = rest.find('"') {
                declared.insert(rest[..end].to_string());
            }
        }
    }
    for name in declared {
        let needle = format!("\"{name}\"");
        let uses = cql.matches(&needle).count();
        if uses <= 1 {
            warnings.push(format!("valueset '{name}' is declared but never referenced"));
        }
    }
}

fn check_trivial_defines(cql: &str, warnings: &mut Vec<String>) {
    let lines: Vec<&str> = cql.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if (trimmed.starts_with("define ") || trimmed.starts_with("define\"")) && trimmed.trim_end().ends_with(':') {
            if let Some(body) = lines.get(i + 1) {
                if body.trim() == "true" {
                    warnings.push(format!("define '{trimmed}' trivially returns true"));
                }
            }
        }
    }
}

fn extract_metadata(cql: &str) -> LintMetadata {
    let mut metadata = LintMetadata::default();
    for line in cql.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("library ") {
            let mut parts = rest.split_whitespace();
            metadata.library_name = parts.next().map(str::to_string);
            if let Some(version_token) = rest.split('\'').nth(1) {
                metadata.version = Some(version_token.to_string());
            }
        } else if trimmed.starts_with("define ") || trimmed.starts_with("define\"") {
            metadata.definition_count += 1;
        } else if trimmed.starts_with("valueset ") {
            metadata.value_set_count += 1;
        }
    }
    metadata
}

/// Lints generated CQL text (spec.md §4.3). Purely lexical; never executes
/// or type-checks the CQL.
pub fn lint(cql: &str) -> LintResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    check_delimiters(cql, &mut errors);
    check_required_declarations(cql, &mut errors);
    check_empty_identifiers(cql, &mut errors);
    check_define_colons(cql, &mut errors);
    check_typos(cql, &mut warnings);
    check_unused_valuesets(cql, &mut warnings);
    check_trivial_defines(cql, &mut warnings);

    LintResult {
        valid: errors.is_empty(),
        errors,
        warnings,
        metadata: extract_metadata(cql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_unbalanced_parentheses() {
        let result = lint("library Foo version '1.0.0'\nusing FHIR version '4.0.1'\ncontext Patient\ndefine \"X\":\n  (true");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("parentheses")));
    }

    #[test]
    fn passes_well_formed_minimal_library() {
        let cql = "library Foo version '1.0.0'\nusing FHIR version '4.0.1'\ncontext Patient\ndefine \"X\":\n  true";
        let result = lint(cql);
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.metadata.definition_count, 1);
    }

    #[test]
    fn flags_missing_required_declarations() {
        let result = lint("define \"X\":\n  true");
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("library")));
    }

    #[test]
    fn warns_on_typo() {
        let cql = "library Foo version '1.0.0'\nusing FHIR version '4.0.1'\ncontext Patient\ndefine \"X\":\n  exsits [\"Condition\"]";
        let result = lint(cql);
        assert!(result.warnings.iter().any(|w| w.contains("exsits")));
    }

    #[test]
    fn warns_on_unused_valueset() {
        let cql = "library Foo version '1.0.0'\nusing FHIR version '4.0.1'\nvalueset \"Diabetes\": 'urn:oid:1'\ncontext Patient\ndefine \"X\":\n  true";
        let result = lint(cql);
        assert!(result.warnings.iter().any(|w| w.contains("Diabetes")));
    }

    #[test]
    fn warns_on_trivial_define() {
        let cql = "library Foo version '1.0.0'\nusing FHIR version '4.0.1'\ncontext Patient\ndefine \"Denominator\":\n  true";
        let result = lint(cql);
        assert!(result.warnings.iter().any(|w| w.contains("trivially")));
    }
}
