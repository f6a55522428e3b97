//! Keyword matching for search.

use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher as _;

use super::SearchMode;

/// Decides whether an entry name matches a search keyword.
pub trait KeywordMatcher: Send + Sync {
    fn is_match(&self, name: &str) -> bool;
}

/// Case-insensitive substring match; every whitespace-separated term must
/// appear in the name.
#[derive(Debug, Clone)]
pub struct PlainMatcher {
    terms: Vec<String>,
}

impl PlainMatcher {
    pub fn new(keyword: &str) -> Self {
        Self {
            terms: keyword
                .split_whitespace()
                .map(|t| crate::nfc_string(t).to_lowercase())
                .collect(),
        }
    }
}

impl KeywordMatcher for PlainMatcher {
    fn is_match(&self, name: &str) -> bool {
        let name = crate::nfc_string(name).to_lowercase();
        self.terms.iter().all(|t| name.contains(t.as_str()))
    }
}

/// Skim-style fuzzy match.
pub struct FuzzyMatcher {
    pattern: String,
    matcher: SkimMatcherV2,
}

impl std::fmt::Debug for FuzzyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzyMatcher")
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl FuzzyMatcher {
    pub fn new(keyword: &str) -> Self {
        Self {
            pattern: keyword.trim().to_string(),
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }
}

impl KeywordMatcher for FuzzyMatcher {
    fn is_match(&self, name: &str) -> bool {
        self.pattern.is_empty() || self.matcher.fuzzy_match(name, &self.pattern).is_some()
    }
}

/// Builds the matcher for `mode`.
pub fn matcher_for(mode: SearchMode, keyword: &str) -> Arc<dyn KeywordMatcher> {
    match mode {
        SearchMode::Plain => Arc::new(PlainMatcher::new(keyword)),
        SearchMode::Fuzzy => Arc::new(FuzzyMatcher::new(keyword)),
    }
}
