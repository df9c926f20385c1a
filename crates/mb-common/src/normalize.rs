//! Text normalization shared by every scoring category. All comparisons in
//! the matcher go through these helpers so "PostgreSQL", "postgresql " and
//! "PostgreSQL," compare equal.

/// Lowercase, trim and strip trailing punctuation from a skill or keyword
/// token. Returns an empty string for whitespace-only input.
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, ',' | ';' | '.' | ':' | '(' | ')'))
        .to_lowercase()
}

/// Case-insensitive substring containment on already-arbitrary text.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// True when either string contains the other, case-insensitively. Used for
/// role/title matching where "backend engineer" should match a preferred role
/// of "engineer" and vice versa.
pub fn mutual_contains_ci(a: &str, b: &str) -> bool {
    contains_ci(a, b) || contains_ci(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_normalization_strips_case_and_punctuation() {
        assert_eq!(normalize_token("  PostgreSQL, "), "postgresql");
        assert_eq!(normalize_token("Node.js"), "node.js");
        assert_eq!(normalize_token("(Rust)"), "rust");
        assert_eq!(normalize_token("   "), "");
    }

    #[test]
    fn containment_ignores_case_and_rejects_empty_needles() {
        assert!(contains_ci("Senior Backend Engineer", "backend"));
        assert!(!contains_ci("Senior Backend Engineer", ""));
        assert!(mutual_contains_ci("Engineer", "Backend Engineer"));
        assert!(!mutual_contains_ci("Engineer", "Analyst"));
    }
}
