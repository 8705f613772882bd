//! Event matching across venues.
//!
//! Pairs `Listing`s from distinct venues that describe the same underlying
//! event, using a weighted blend of whole-text similarity and keyword overlap
//! plus resolution-date proximity. Pure and stateless: the matcher holds no
//! state between calls.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::types::{Listing, PairedEvent};

const STOP_WORDS: &[&str] = &[
    "will", "the", "be", "by", "on", "in", "at", "to", "a", "an", "is", "are", "was", "were",
    "have", "has", "had", "for", "of",
];

/// Configuration for event matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum combined similarity to accept a pair.
    pub similarity_threshold: f64,
    /// Maximum allowed `|Δ resolution_time|`, in days.
    pub date_tolerance_days: i64,
    /// Weight on whole-text LCS-ratio similarity.
    pub text_weight: f64,
    /// Weight on keyword Jaccard similarity.
    pub keyword_weight: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            date_tolerance_days: 1,
            text_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

impl MatchConfig {
    /// A stricter preset for higher-confidence pairing.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            similarity_threshold: 0.95,
            date_tolerance_days: 0,
            ..Self::default()
        }
    }

    /// A looser preset for exploratory matching.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            similarity_threshold: 0.75,
            date_tolerance_days: 3,
            ..Self::default()
        }
    }
}

/// Matches equivalent markets across two venues by normalized-text
/// similarity and keyword overlap.
#[derive(Debug, Clone)]
pub struct MarketMatcher {
    config: MatchConfig,
}

impl MarketMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MatchConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(config: MatchConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Lower-cases, collapses whitespace, strips punctuation except `?`,
    /// and removes stop words.
    #[must_use]
    pub fn normalize_text(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped: String = lowered
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() || c == '?' { c } else { ' ' })
            .collect();

        let words: Vec<&str> = stripped
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .collect();

        words.join(" ")
    }

    /// Longest-common-subsequence ratio between two normalized strings,
    /// equivalent to Python's `difflib.SequenceMatcher.ratio()`.
    #[must_use]
    pub fn calculate_similarity(&self, a: &str, b: &str) -> f64 {
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let total = a_chars.len() + b_chars.len();
        if total == 0 {
            return 1.0;
        }
        let matches = lcs_length(&a_chars, &b_chars);
        (2 * matches) as f64 / total as f64
    }

    /// Tokens of length > 2 surviving normalization, for Jaccard overlap.
    #[must_use]
    pub fn extract_keywords(&self, text: &str) -> HashSet<String> {
        self.normalize_text(text)
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .map(str::to_string)
            .collect()
    }

    /// Jaccard overlap (`|intersection| / |union|`) between two keyword sets.
    #[must_use]
    pub fn keyword_overlap(&self, a: &HashSet<String>, b: &HashSet<String>) -> f64 {
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let intersection = a.intersection(b).count();
        let union = a.union(b).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Parses a resolution time from a fixed set of accepted formats.
    #[must_use]
    pub fn parse_date(&self, text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        const FORMATS: &[&str] = &[
            "%Y-%m-%d",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M:%SZ",
            "%Y-%m-%dT%H:%M:%S%.fZ",
            "%m/%d/%Y",
            "%d/%m/%Y",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
            }
            if let Ok(date) = chrono::NaiveDate::parse_from_str(text, fmt) {
                return Some(DateTime::<Utc>::from_naive_utc_and_offset(
                    date.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
                    Utc,
                ));
            }
        }
        None
    }

    /// Whether two resolution times are within tolerance. Missing dates on
    /// either side are treated as lenient (always matching).
    #[must_use]
    pub fn dates_match(&self, a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => (a - b).num_days().abs() <= self.config.date_tolerance_days,
            _ => true,
        }
    }

    /// Combined similarity and match decision for one pair of listings.
    #[must_use]
    pub fn is_match(&self, a: &Listing, b: &Listing) -> (bool, f64) {
        let norm_a = self.normalize_text(&a.question);
        let norm_b = self.normalize_text(&b.question);
        let text_similarity = self.calculate_similarity(&norm_a, &norm_b);

        let keywords_a = self.extract_keywords(&a.question);
        let keywords_b = self.extract_keywords(&b.question);
        let keyword_similarity = self.keyword_overlap(&keywords_a, &keywords_b);

        let combined =
            self.config.text_weight * text_similarity + self.config.keyword_weight * keyword_similarity;

        let dates_ok = self.dates_match(a.resolution_time, b.resolution_time);
        let matched = combined >= self.config.similarity_threshold && dates_ok;

        (matched, combined)
    }

    /// Greedy best-match pairing: for each listing from venue A, the
    /// best-scoring listing from venue B above threshold is chosen. Ties are
    /// broken by lexical ordering of `native_id` for determinism.
    #[must_use]
    pub fn find_matches(&self, listings_a: &[Listing], listings_b: &[Listing]) -> Vec<PairedEvent> {
        let mut matches = Vec::new();

        for a in listings_a {
            let mut best: Option<(&Listing, f64)> = None;

            for b in listings_b {
                let (is_match, score) = self.is_match(a, b);
                if !is_match {
                    continue;
                }
                best = match best {
                    None => Some((b, score)),
                    Some((current_best, current_score)) => {
                        if score > current_score
                            || ((score - current_score).abs() < f64::EPSILON
                                && b.native_id < current_best.native_id)
                        {
                            Some((b, score))
                        } else {
                            Some((current_best, current_score))
                        }
                    }
                };
            }

            if let Some((b, score)) = best {
                debug!(a = %a.native_id, b = %b.native_id, score, "matched listing pair");
                matches.push(PairedEvent {
                    listing_a: a.clone(),
                    listing_b: b.clone(),
                    similarity: score,
                });
            }
        }

        matches
    }
}

impl Default for MarketMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Length of the longest common subsequence between two character slices.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ai in a {
        for (j, bj) in b.iter().enumerate() {
            curr[j + 1] = if ai == bj {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListingStatus, VenueId};
    use rust_decimal_macros::dec;

    fn listing(venue: VenueId, native_id: &str, question: &str, resolution_time: Option<DateTime<Utc>>) -> Listing {
        Listing {
            venue_id: venue,
            native_id: native_id.to_string(),
            question: question.to_string(),
            description: String::new(),
            resolution_time,
            status: ListingStatus::Open,
            volume_to_date: dec!(0),
            resting_liquidity: dec!(0),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn normalize_text_strips_stopwords_and_punctuation() {
        let matcher = MarketMatcher::new();
        let normalized = matcher.normalize_text("Will the Fed raise rates by March?");
        assert!(!normalized.contains("the"));
        assert!(!normalized.contains("will"));
        assert!(normalized.contains("fed"));
        assert!(normalized.contains('?'));
    }

    #[test]
    fn identical_text_has_similarity_one() {
        let matcher = MarketMatcher::new();
        let sim = matcher.calculate_similarity("fed raise rates", "fed raise rates");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn keyword_overlap_empty_sets_is_perfect() {
        let matcher = MarketMatcher::new();
        let empty = HashSet::new();
        assert!((matcher.keyword_overlap(&empty, &empty) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dates_match_is_lenient_when_missing() {
        let matcher = MarketMatcher::new();
        assert!(matcher.dates_match(None, Some(Utc::now())));
        assert!(matcher.dates_match(None, None));
    }

    #[test]
    fn dates_match_respects_tolerance() {
        let matcher = MarketMatcher::new();
        let a = Utc::now();
        let within = a + chrono::Duration::hours(12);
        let outside = a + chrono::Duration::days(3);
        assert!(matcher.dates_match(Some(a), Some(within)));
        assert!(!matcher.dates_match(Some(a), Some(outside)));
    }

    #[test]
    fn find_matches_pairs_similar_questions() {
        let matcher = MarketMatcher::new();
        let now = Utc::now() + chrono::Duration::hours(6);

        let a = vec![listing(VenueId::VenueA, "a1", "Will the Fed raise rates in March?", Some(now))];
        let b = vec![
            listing(VenueId::VenueB, "b1", "Will the Fed raise rates in March?", Some(now)),
            listing(VenueId::VenueB, "b2", "Will it rain in Seattle tomorrow?", Some(now)),
        ];

        let matches = matcher.find_matches(&a, &b);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].listing_b.native_id, "b1");
    }

    #[test]
    fn find_matches_rejects_below_threshold() {
        let matcher = MarketMatcher::new();
        let now = Utc::now() + chrono::Duration::hours(6);
        let a = vec![listing(VenueId::VenueA, "a1", "Will the Fed raise rates in March?", Some(now))];
        let b = vec![listing(VenueId::VenueB, "b1", "Will it rain in Seattle tomorrow?", Some(now))];

        let matches = matcher.find_matches(&a, &b);
        assert!(matches.is_empty());
    }

    #[test]
    fn ties_break_on_lexical_native_id() {
        let matcher = MarketMatcher::with_config(MatchConfig {
            similarity_threshold: 0.0,
            ..MatchConfig::default()
        });
        let now = Utc::now() + chrono::Duration::hours(6);
        let a = vec![listing(VenueId::VenueA, "a1", "same text", Some(now))];
        let b = vec![
            listing(VenueId::VenueB, "zeta", "same text", Some(now)),
            listing(VenueId::VenueB, "alpha", "same text", Some(now)),
        ];

        let matches = matcher.find_matches(&a, &b);
        assert_eq!(matches[0].listing_b.native_id, "alpha");
    }
}
