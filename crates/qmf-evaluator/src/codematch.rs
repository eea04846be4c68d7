//! Code matching (spec.md §4.8).
//!
//! Normalize both sides, then compare code + system. No wildcard or
//! hierarchy expansion — value-set pre-expansion is required.

/// Canonicalizes a code system name to a small fixed vocabulary. Unknown
/// systems pass through normalized (upper-cased, punctuation stripped) so
/// two unrecognized spellings of the same system still compare equal.
pub fn canonicalize_system(system: &str) -> String {
    let key: String = system
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match key.as_str() {
        "ICD10CM" | "ICD10" => "ICD10".to_string(),
        "ICD9CM" | "ICD9" => "ICD9".to_string(),
        "SNOMEDCT" | "SNOMED" => "SNOMED".to_string(),
        "RXNORM" => "RxNorm".to_string(),
        "CPT4" | "CPT" => "CPT".to_string(),
        "LOINC" => "LOINC".to_string(),
        "CVX" => "CVX".to_string(),
        "HCPCS" => "HCPCS".to_string(),
        "NDC" => "NDC".to_string(),
        _ => key,
    }
}

fn is_icd(system: &str) -> bool {
    matches!(canonicalize_system(system).as_str(), "ICD10" | "ICD9")
}

/// Normalizes a code: upper-case, and for ICD systems strip the decimal
/// point (`E11.9` and `E119` compare equal).
pub fn normalize_code(code: &str, system: &str) -> String {
    let upper = code.trim().to_ascii_uppercase();
    if is_icd(system) {
        upper.replace('.', "")
    } else {
        upper
    }
}

/// A match requires code equality AND (system equality OR one side's
/// system unknown/empty).
pub fn codes_match(code_a: &str, system_a: &str, code_b: &str, system_b: &str) -> bool {
    if normalize_code(code_a, system_a) != normalize_code(code_b, system_b) {
        return false;
    }
    if system_a.trim().is_empty() || system_b.trim().is_empty() {
        return true;
    }
    canonicalize_system(system_a) == canonicalize_system(system_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icd_dots_are_stripped() {
        assert!(codes_match("E11.9", "ICD-10-CM", "E119", "ICD10"));
    }

    #[test]
    fn snomed_aliases_canonicalize_the_same() {
        assert_eq!(canonicalize_system("SNOMED-CT"), canonicalize_system("SNOMEDCT"));
        assert_eq!(canonicalize_system("SNOMED-CT"), "SNOMED");
    }

    #[test]
    fn unknown_system_on_either_side_still_matches() {
        assert!(codes_match("12345", "", "12345", "LOINC"));
    }

    #[test]
    fn different_codes_never_match() {
        assert!(!codes_match("E11.9", "ICD10", "E10.9", "ICD10"));
    }

    #[test]
    fn mismatched_known_systems_do_not_match() {
        assert!(!codes_match("12345", "LOINC", "12345", "SNOMED"));
    }
}
