//! Wildcard matching for actions, resources and `StringLike` conditions
//!
//! `*` matches zero or more of any character, including `:` and `/`.
//! Every other character is literal; there is no `?` or character class.

/// Pattern matcher for action names and LRNs
pub struct PatternMatcher;

impl PatternMatcher {
    /// Check if a value matches a wildcard pattern (case-sensitive)
    ///
    /// # Examples
    /// ```
    /// use leo_auth::iam::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches("queue/*", "queue/abc"));
    /// assert!(PatternMatcher::matches("lrn:leo:*:::queue/*", "lrn:leo:bus:::queue/orders"));
    /// assert!(!PatternMatcher::matches("queue/*", "other/abc"));
    /// ```
    pub fn matches(pattern: &str, value: &str) -> bool {
        if !pattern.contains('*') {
            return pattern == value;
        }

        let parts: Vec<&str> = pattern.split('*').collect();
        let first = parts[0];
        let last = parts[parts.len() - 1];

        // Prefix and suffix may not overlap
        if value.len() < first.len() + last.len() {
            return false;
        }
        if !value.starts_with(first) || !value.ends_with(last) {
            return false;
        }

        // Middle parts must appear in order between prefix and suffix
        let middle_end = value.len() - last.len();
        let mut pos = first.len();
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match value[pos..middle_end].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }

        true
    }

    /// Case-insensitive variant used by condition operators
    pub fn matches_ignore_case(pattern: &str, value: &str) -> bool {
        Self::matches(&pattern.to_lowercase(), &value.to_lowercase())
    }

    /// True if any pattern in the list matches
    pub fn matches_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
        patterns.iter().any(|p| Self::matches(p.as_ref(), value))
    }
}
