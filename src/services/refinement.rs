use crate::models::{Intent, SearchResultItem};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static MAX_PRICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:under|below|less than|max|maximum|up to)\s*\$?(\d+(?:\.\d+)?)").unwrap()
});

static MIN_PRICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:over|above|more than|min|minimum|from)\s*\$?(\d+(?:\.\d+)?)").unwrap()
});

/// Price bounds parsed straight from query text, for queries that never went
/// through intent analysis. Defaults to the open interval `[0, +inf)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    pub fn from_query(query: &str) -> Self {
        let max = MAX_PRICE_PATTERN
            .captures(query)
            .and_then(|cap| cap[1].parse().ok())
            .unwrap_or(f64::INFINITY);
        let min = MIN_PRICE_PATTERN
            .captures(query)
            .and_then(|cap| cap[1].parse().ok())
            .unwrap_or(0.0);
        Self { min, max }
    }

    /// The ceiling the query implied, if any.
    pub fn ceiling(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Applies hard constraints to ranked search results and bounds the output.
/// Vector search already did the semantic matching, so this stage only
/// enforces explicit constraints; it never re-sorts.
pub struct RefinementFilter {
    max_count: usize,
}

impl RefinementFilter {
    pub fn new(max_count: usize) -> Self {
        Self { max_count }
    }

    /// Dispatch on whether a structured intent is available. Both policies
    /// preserve the incoming score order and truncate to `max_count`.
    pub fn refine(
        &self,
        results: &[SearchResultItem],
        intent: Option<&Intent>,
        raw_query: &str,
    ) -> Vec<SearchResultItem> {
        match intent {
            Some(intent) => self.refine_with_intent(results, intent),
            None => self.refine_with_query(results, raw_query),
        }
    }

    /// Intent-driven policy. Price range is a hard constraint; category is
    /// informational only — the upstream search already matched
    /// semantically, so a category mismatch alone never excludes an item.
    fn refine_with_intent(
        &self,
        results: &[SearchResultItem],
        intent: &Intent,
    ) -> Vec<SearchResultItem> {
        let filtered: Vec<SearchResultItem> = results
            .iter()
            .filter(|item| match &intent.price_range {
                Some(range) => range.contains(item.price()),
                None => true,
            })
            .take(self.max_count)
            .cloned()
            .collect();

        debug!(
            "Intent refinement kept {} of {} results",
            filtered.len(),
            results.len()
        );
        filtered
    }

    /// Regex-driven policy: price bounds extracted from the query text.
    fn refine_with_query(
        &self,
        results: &[SearchResultItem],
        raw_query: &str,
    ) -> Vec<SearchResultItem> {
        let bounds = PriceBounds::from_query(&raw_query.to_lowercase());

        let filtered: Vec<SearchResultItem> = results
            .iter()
            .filter(|item| bounds.contains(item.price()))
            .take(self.max_count)
            .cloned()
            .collect();

        debug!(
            "Query refinement ({:?}) kept {} of {} results",
            bounds,
            filtered.len(),
            results.len()
        );
        filtered
    }
}
