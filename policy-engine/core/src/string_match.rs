use std::fmt;

/// Matches a string attribute against a configured pattern.
///
/// A pattern may carry a single `*` wildcard: `*` alone requires any
/// non-empty value, a leading `*` matches by suffix and a trailing `*` matches
/// by prefix. Patterns without a wildcard match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StringMatch {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Presence,
}

/// Controls how literal pattern text is compared to a value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Case {
    #[default]
    Sensitive,
    Insensitive,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern {0:?}: a '*' wildcard may only appear once, at the start or the end")]
pub struct InvalidPattern(pub String);

/// Matches `value` against `pattern`, treating malformed patterns as
/// non-matching.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    match StringMatch::parse(pattern) {
        Ok(m) => m.matches(value),
        Err(error) => {
            tracing::debug!(%error, "Ignoring malformed pattern");
            false
        }
    }
}

// === impl StringMatch ===

impl StringMatch {
    pub fn parse(pattern: &str) -> Result<Self, InvalidPattern> {
        let invalid = || InvalidPattern(pattern.to_string());

        if pattern == "*" {
            return Ok(Self::Presence);
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            if suffix.contains('*') {
                return Err(invalid());
            }
            return Ok(Self::Suffix(suffix.to_string()));
        }

        if let Some(prefix) = pattern.strip_suffix('*') {
            if prefix.contains('*') {
                return Err(invalid());
            }
            return Ok(Self::Prefix(prefix.to_string()));
        }

        if pattern.contains('*') {
            return Err(invalid());
        }

        Ok(Self::Exact(pattern.to_string()))
    }

    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        self.matches_with(value, Case::Sensitive)
    }

    pub fn matches_with(&self, value: &str, case: Case) -> bool {
        let eq = |a: &[u8], b: &[u8]| match case {
            Case::Sensitive => a == b,
            Case::Insensitive => a.eq_ignore_ascii_case(b),
        };

        let value = value.as_bytes();
        match self {
            Self::Presence => !value.is_empty(),
            Self::Exact(exact) => eq(value, exact.as_bytes()),
            Self::Prefix(prefix) => {
                let prefix = prefix.as_bytes();
                value.len() >= prefix.len() && eq(&value[..prefix.len()], prefix)
            }
            Self::Suffix(suffix) => {
                let suffix = suffix.as_bytes();
                value.len() >= suffix.len() && eq(&value[value.len() - suffix.len()..], suffix)
            }
        }
    }
}

impl std::str::FromStr for StringMatch {
    type Err = InvalidPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StringMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Suffix(suffix) => write!(f, "*{suffix}"),
            Self::Presence => f.write_str("*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_match_kind() {
        for (pattern, expected) in [
            ("*", StringMatch::Presence),
            ("*abc", StringMatch::Suffix("abc".to_string())),
            ("abc*", StringMatch::Prefix("abc".to_string())),
            ("abc", StringMatch::Exact("abc".to_string())),
            ("", StringMatch::Exact(String::new())),
        ] {
            assert_eq!(StringMatch::parse(pattern), Ok(expected), "{pattern}");
        }
    }

    #[test]
    fn rejects_misplaced_wildcards() {
        for pattern in ["*abc*", "**", "a*c", "*a*c", "ab**"] {
            assert!(StringMatch::parse(pattern).is_err(), "{pattern}");
            assert!(!matches_pattern(pattern, "abc"), "{pattern}");
        }
    }

    #[test]
    fn matches_values() {
        for (pattern, value, matches) in [
            ("*", "", false),
            ("*", "x", true),
            ("abc*", "abc", true),
            ("abc*", "abcd", true),
            ("abc*", "ab", false),
            ("*abc", "xabc", true),
            ("*abc", "abcx", false),
            ("abc", "abc", true),
            ("abc", "ABC", false),
        ] {
            assert_eq!(
                matches_pattern(pattern, value),
                matches,
                "{pattern:?} ~ {value:?}"
            );
            // Matching holds no state between calls.
            assert_eq!(matches_pattern(pattern, value), matches);
        }
    }

    #[test]
    fn case_insensitive() {
        let m = StringMatch::parse("*.Example.COM").unwrap();
        assert!(m.matches_with("api.example.com", Case::Insensitive));
        assert!(!m.matches_with("api.example.com", Case::Sensitive));

        let m = StringMatch::parse("get").unwrap();
        assert!(m.matches_with("GET", Case::Insensitive));
    }

    #[test]
    fn displays_pattern() {
        for pattern in ["*", "*abc", "abc*", "abc"] {
            assert_eq!(StringMatch::parse(pattern).unwrap().to_string(), pattern);
        }
    }
}
