//! Case selection by name.
//!
//! Follows libtest's conventions: a filter string selects cases whose
//! qualified name (`<suite>::<case>`) contains it, or equals it with
//! `--exact`.

/// Name filter applied by [`Suite::run`](crate::Suite::run).
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Run only cases whose qualified name contains this.
    pub pattern: Option<String>,
    /// If true, the pattern must match the qualified name exactly.
    pub exact: bool,
}

impl CaseFilter {
    /// Filter that accepts everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on `pattern`, substring or exact.
    pub fn new(pattern: Option<String>, exact: bool) -> Self {
        Self {
            pattern: pattern.filter(|p| !p.is_empty()),
            exact,
        }
    }

    /// Check if a case matches the current filter settings.
    pub fn matches(&self, suite: &str, case: &str) -> bool {
        let Some(pattern) = self.pattern.as_deref() else {
            return true;
        };
        let qualified = format!("{suite}::{case}");
        if self.exact {
            qualified == pattern
        } else {
            qualified.contains(pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pattern_matches_everything() {
        assert!(CaseFilter::all().matches("posix::mq", "mq"));
        assert!(CaseFilter::new(Some(String::new()), true).matches("posix::mq", "mq"));
    }

    #[test]
    fn substring_matches_suite_or_case() {
        let filter = CaseFilter::new(Some("mutex".into()), false);
        assert!(filter.matches("posix::pthread", "mutex"));
        assert!(filter.matches("posix::pthread", "mutexattributes"));
        assert!(!filter.matches("posix::pthread", "sem"));

        let filter = CaseFilter::new(Some("pthread".into()), false);
        assert!(filter.matches("posix::pthread", "sem"));
    }

    #[test]
    fn exact_requires_the_qualified_name() {
        let filter = CaseFilter::new(Some("posix::pthread::mutex".into()), true);
        assert!(filter.matches("posix::pthread", "mutex"));
        assert!(!filter.matches("posix::pthread", "mutexattributes"));
        assert!(!CaseFilter::new(Some("mutex".into()), true).matches("posix::pthread", "mutex"));
    }
}
