//! Case-insensitive shell-style pattern matching.
//!
//! Every pattern in the routing system (route sources and destinations,
//! receiver channel names, hop formats and colors) is matched through this
//! module so they all share the same semantics: `*`, `?` and `[...]` as in
//! `fnmatch(3)`, no special treatment of `/`, ASCII case folded.

use glob::{MatchOptions, Pattern};

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Returns `true` if `candidate` matches the glob `pattern`.
///
/// Invalid patterns (for instance an unclosed `[`) fall back to a
/// case-insensitive literal comparison.
pub fn matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches_with(candidate, OPTIONS),
        Err(_) => pattern.eq_ignore_ascii_case(candidate),
    }
}

/// Normalizes a hop pattern to `type(name)` form.
///
/// A pattern without an opening parenthesis after its first character is
/// treated as `type(*)`.
pub fn normalize_hop_pattern(pattern: &str) -> String {
    match pattern.find('(') {
        Some(pos) if pos > 0 => pattern.to_string(),
        _ => format!("{pattern}(*)"),
    }
}

/// Extracts the part between the trailing parentheses of `type(name)`.
///
/// Returns `None` if the pattern does not end in a non-empty `(...)` group.
pub fn hop_argument(pattern: &str) -> Option<&str> {
    let inner = pattern.strip_suffix(')')?;
    let open = inner.find('(')?;
    let arg = &inner[open + 1..];
    (!arg.is_empty()).then_some(arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive() {
        assert!(matches("aopriv(*)", "AOPriv(MyBot)"));
        assert!(matches("AOPRIV(mybot)", "aopriv(MyBot)"));
        assert!(!matches("aoorg(*)", "aopriv(MyBot)"));
    }

    #[test]
    fn bare_pattern_matches_like_wildcard_name() {
        let candidates = ["aopriv(MyBot)", "aopriv(other)", "aoorg(Org)", "aopriv"];
        for candidate in candidates {
            assert_eq!(
                matches(&normalize_hop_pattern("aopriv"), candidate),
                matches("aopriv(*)", candidate),
                "{candidate}"
            );
        }
    }

    #[test]
    fn normalize_keeps_qualified_patterns() {
        assert_eq!(normalize_hop_pattern("relay(nady)"), "relay(nady)");
        assert_eq!(normalize_hop_pattern("system"), "system(*)");
    }

    #[test]
    fn invalid_pattern_falls_back_to_literal() {
        assert!(matches("web[", "WEB["));
        assert!(!matches("web[", "web"));
    }

    #[test]
    fn hop_argument_strips_parentheses() {
        assert_eq!(hop_argument("aotell(Nady)"), Some("Nady"));
        assert_eq!(hop_argument("relay(a(b))"), Some("a(b)"));
        assert_eq!(hop_argument("aoorg"), None);
        assert_eq!(hop_argument("aoorg()"), None);
    }
}
