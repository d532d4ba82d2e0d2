//! Column-name sanitization for tolerant matching.
//!
//! Uploaded files rarely spell headers exactly the way the schema catalog
//! does, so every comparison in the pipeline runs in one normalized
//! identifier space: lowercase, alphanumerics and spaces only. Report-name
//! to alias lookups are exempt and always use the exact string.

/// Strips every character outside `[A-Za-z0-9 ]` and lowercases the rest.
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_punctuation_and_lowercases() {
        assert_eq!(sanitize("Loan Amount!"), "loan amount");
        assert_eq!(sanitize("Policy-Id"), "policyid");
        assert_eq!(sanitize("premium (EUR)"), "premium eur");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["Loan Amount!", "policy_id", "  Premium  ", "é$ value"] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn sanitize_is_case_and_punctuation_insensitive() {
        assert_eq!(sanitize("Loan Amount!"), sanitize("loan amount"));
    }
}
