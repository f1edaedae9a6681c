//! Path prefix matching.
//!
//! # Responsibilities
//! - Match a request path against a route prefix on segment boundaries
//! - Expose prefix length so the router can prefer the longest match
//!
//! Matching is case-sensitive and regex-free.

/// Matches a path prefix at a `/` boundary.
///
/// `/api/auth` matches `/api/auth`, `/api/auth/` and `/api/auth/users`,
/// but not `/api/authz`. The prefix `/` matches every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing `/` is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Specificity used to order routes (longer wins).
    pub fn len(&self) -> usize {
        if self.prefix == "/" {
            0
        } else {
            self.prefix.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path remaining after the prefix (`""` or starting with `/`).
    pub fn remainder<'a>(&self, path: &'a str) -> &'a str {
        if self.prefix == "/" {
            return path;
        }
        path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api/auth");

        assert!(matcher.matches("/api/auth"));
        assert!(matcher.matches("/api/auth/"));
        assert!(matcher.matches("/api/auth/users"));
        assert!(!matcher.matches("/api/authz"));
        assert!(!matcher.matches("/api"));
        assert!(!matcher.matches("/API/auth"));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let matcher = PathPrefixMatcher::new("/update/");
        assert_eq!(matcher.prefix(), "/update");
        assert!(matcher.matches("/update/ORD-1"));
        assert_eq!(matcher.remainder("/update/ORD-1"), "/ORD-1");
    }

    #[test]
    fn root_matches_everything_with_lowest_specificity() {
        let matcher = PathPrefixMatcher::new("/");
        assert!(matcher.matches("/anything/at/all"));
        assert!(matcher.is_empty());
        assert_eq!(matcher.remainder("/x"), "/x");
    }
}
