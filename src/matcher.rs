//! Fuzzy name matching for batch mode.
//!
//! A pattern is a comma-separated list of terms. Each term matches a name by
//! exact equality, by glob when it contains `*`, or else by case-insensitive
//! substring. Results keep candidate order per term and never repeat a name.

use globset::{Glob, GlobMatcher};

/// Action pattern that selects every action of an app.
pub const ALL_ACTIONS: &str = "all";

/// Matches application names against `pattern`.
pub fn match_apps<'a>(pattern: &str, known: &[&'a str]) -> Vec<&'a str> {
    match_names(pattern, known)
}

/// Matches action names against `pattern`.
///
/// `all` is reserved only as the whole pattern; inside a list it is an
/// ordinary term.
pub fn match_actions<'a>(pattern: &str, known: &[&'a str]) -> Vec<&'a str> {
    if pattern == ALL_ACTIONS {
        return known.to_vec();
    }
    match_names(pattern, known)
}

fn match_names<'a>(pattern: &str, known: &[&'a str]) -> Vec<&'a str> {
    let mut matched: Vec<&'a str> = Vec::new();
    for term in pattern.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let term = Term::new(term);
        for &candidate in known {
            if !matched.contains(&candidate) && term.matches(candidate) {
                matched.push(candidate);
            }
        }
    }
    matched
}

enum TermKind {
    Glob(Option<GlobMatcher>),
    Substring(String),
}

struct Term<'p> {
    raw: &'p str,
    kind: TermKind,
}

impl<'p> Term<'p> {
    fn new(raw: &'p str) -> Self {
        let kind = if raw.contains('*') {
            // An invalid glob still matches exactly, never fuzzily.
            TermKind::Glob(Glob::new(raw).ok().map(|g| g.compile_matcher()))
        } else {
            TermKind::Substring(raw.to_lowercase())
        };
        Self { raw, kind }
    }

    fn matches(&self, candidate: &str) -> bool {
        if candidate == self.raw {
            return true;
        }
        match &self.kind {
            TermKind::Glob(Some(glob)) => glob.is_match(candidate),
            TermKind::Glob(None) => false,
            TermKind::Substring(needle) => candidate.to_lowercase().contains(needle.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPS: [&str; 3] = ["TestApp1", "TestApp2", "Other"];

    #[test]
    fn wildcard_is_case_sensitive_glob() {
        assert_eq!(match_apps("Test*", &APPS), vec!["TestApp1", "TestApp2"]);
        assert!(match_apps("test*", &APPS).is_empty());
        assert_eq!(match_apps("*2", &APPS), vec!["TestApp2"]);
    }

    #[test]
    fn plain_terms_match_case_insensitive_substring() {
        assert_eq!(match_apps("app1", &APPS), vec!["TestApp1"]);
        assert_eq!(match_apps("OTH", &APPS), vec!["Other"]);
        assert!(match_apps("missing", &APPS).is_empty());
    }

    #[test]
    fn exact_match_wins() {
        assert_eq!(match_apps("Other", &APPS), vec!["Other"]);
    }

    #[test]
    fn comma_lists_follow_term_order_without_duplicates() {
        assert_eq!(
            match_apps("Other, TestApp2,app", &APPS),
            vec!["Other", "TestApp2", "TestApp1"]
        );
        assert_eq!(match_apps("Test*,TestApp1", &APPS), vec!["TestApp1", "TestApp2"]);
    }

    #[test]
    fn empty_terms_are_skipped() {
        assert_eq!(match_apps("Other,", &APPS), vec!["Other"]);
        assert!(match_apps(" , ", &APPS).is_empty());
    }

    #[test]
    fn all_returns_every_action_in_order() {
        let actions = ["build", "test", "clean"];
        assert_eq!(match_actions("all", &actions), vec!["build", "test", "clean"]);
    }

    #[test]
    fn all_inside_a_list_is_an_ordinary_term() {
        let actions = ["build", "test", "clean"];
        assert_eq!(match_actions("all,build", &actions), vec!["build"]);
        let actions = ["install", "build"];
        assert_eq!(match_actions("all,test", &actions), vec!["install"]);
        assert_eq!(match_actions("ALL", &["build", "test", "clean"]), Vec::<&str>::new());
    }

    #[test]
    fn action_wildcards() {
        let actions = ["build_host", "build_target", "test_unit", "clean"];
        assert_eq!(
            match_actions("build_*", &actions),
            vec!["build_host", "build_target"]
        );
        assert_eq!(
            match_actions("*_unit,clean", &actions),
            vec!["test_unit", "clean"]
        );
    }
}
