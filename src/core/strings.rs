//! # Small String Helpers
//!
//! OAuth scope values are space-delimited strings in the wire format but are
//! far easier to reason about as sets once parsed. Kept here rather than
//! inlined at each call site since both the authorize and userinfo
//! endpoints need the same splitting/containment logic.

use std::collections::HashSet;

/// Split a space-delimited OAuth `scope` string into its individual values,
/// discarding empty segments (e.g. from repeated spaces).
#[must_use]
pub fn split_scope(scope: &str) -> Vec<String> {
    scope.split(' ').filter(|s| !s.is_empty()).map(ToString::to_string).collect()
}

/// Returns `true` if every value in `requested` is present in `allowed`.
#[must_use]
pub fn scopes_allowed(requested: &str, allowed: &[String]) -> bool {
    let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();
    split_scope(requested).iter().all(|s| allowed.contains(s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_ignores_repeated_spaces() {
        assert_eq!(split_scope("openid  profile email"), vec!["openid", "profile", "email"]);
    }

    #[test]
    fn checks_subset() {
        let allowed = vec!["openid".to_string(), "profile".to_string()];
        assert!(scopes_allowed("openid profile", &allowed));
        assert!(!scopes_allowed("openid email", &allowed));
    }
}
