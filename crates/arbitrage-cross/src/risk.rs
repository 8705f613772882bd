//! Risk scoring for a candidate pairing, independent of the Detector's
//! profitability math.
//!
//! Five additive dimensions — event definition, timing, liquidity, edge, and
//! regulatory — accumulate into a single score that maps to a tier and a
//! position-size multiplier.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{PairedEvent, RiskTier, VenueId};

const RISKY_KEYWORDS: &[(&str, &str)] = &[
    ("primary", "general election vs primary"),
    ("general", "general election vs primary"),
    ("runoff", "runoff vs first round"),
    ("plurality", "win condition differences"),
    ("majority", "win condition differences"),
    ("at least", "threshold differences"),
    ("more than", "threshold differences"),
    ("by end of", "timing ambiguity"),
    ("before", "timing ambiguity"),
];

const POLITICAL_KEYWORDS: &[&str] = &["election", "vote", "campaign", "political"];

const LIQUIDITY_RATIO: Decimal = dec!(0.1);

/// Configuration for risk scoring thresholds.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub low_medium_boundary: f64,
    pub medium_high_boundary: f64,
    pub high_critical_boundary: f64,
    pub min_liquidity_ratio: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_medium_boundary: 0.3,
            medium_high_boundary: 0.5,
            high_critical_boundary: 0.7,
            min_liquidity_ratio: LIQUIDITY_RATIO,
        }
    }
}

/// Outcome of scoring one candidate pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub score: f64,
    pub warnings: Vec<String>,
    pub size_multiplier: Decimal,
}

impl RiskAssessment {
    #[must_use]
    pub fn should_execute(&self) -> bool {
        self.tier.should_execute()
    }
}

/// Scores a `PairedEvent` plus proposed trade parameters across five
/// independent risk dimensions.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    config: RiskConfig,
}

impl RiskAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RiskConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Scores the pairing and returns a `RiskAssessment`.
    #[must_use]
    pub fn analyze(
        &self,
        pair: &PairedEvent,
        similarity: f64,
        gross_edge: Decimal,
        proposed_size: Decimal,
    ) -> RiskAssessment {
        let mut score = 0.0;
        let mut warnings = Vec::new();

        self.definition_risk(pair, similarity, &mut score, &mut warnings);
        self.timing_risk(pair, &mut score, &mut warnings);
        self.liquidity_risk(pair, proposed_size, &mut score, &mut warnings);
        self.edge_risk(gross_edge, &mut score, &mut warnings);
        self.regulatory_risk(pair, &mut score, &mut warnings);

        let (tier, size_multiplier) = self.tier_for_score(score);

        RiskAssessment {
            tier,
            score,
            warnings,
            size_multiplier,
        }
    }

    fn tier_for_score(&self, score: f64) -> (RiskTier, Decimal) {
        if score >= self.config.high_critical_boundary {
            (RiskTier::Critical, dec!(0.1))
        } else if score >= self.config.medium_high_boundary {
            (RiskTier::High, dec!(0.3))
        } else if score >= self.config.low_medium_boundary {
            (RiskTier::Medium, dec!(0.7))
        } else {
            (RiskTier::Low, dec!(1.0))
        }
    }

    fn definition_risk(&self, pair: &PairedEvent, similarity: f64, score: &mut f64, warnings: &mut Vec<String>) {
        let desc_a = pair.listing_a.description.to_lowercase();
        let desc_b = pair.listing_b.description.to_lowercase();

        for (keyword, label) in RISKY_KEYWORDS {
            let in_a = desc_a.contains(keyword);
            let in_b = desc_b.contains(keyword);
            if in_a != in_b {
                *score += 0.25;
                warnings.push(format!("{label} (asymmetric '{keyword}')"));
            }
        }

        if (0.85..0.90).contains(&similarity) {
            *score += 0.30;
            warnings.push(format!("similarity {similarity:.3} is in the marginal band"));
        }

        let primary_general_conflict =
            (desc_a.contains("primary") && desc_b.contains("general")) || (desc_a.contains("general") && desc_b.contains("primary"));
        if primary_general_conflict {
            *score += 0.50;
            warnings.push("CRITICAL: one side references primary, the other general election".to_string());
        }
    }

    fn timing_risk(&self, pair: &PairedEvent, score: &mut f64, warnings: &mut Vec<String>) {
        if pair.listing_a.resolution_time != pair.listing_b.resolution_time {
            *score += 0.15;
            warnings.push("resolution dates differ".to_string());
        }

        let question_a = pair.listing_a.question.to_lowercase();
        if question_a.contains("by end of") || question_a.contains("before") {
            *score += 0.05;
            warnings.push("early-resolution phrasing ('by end of'/'before')".to_string());
        }
    }

    fn liquidity_risk(&self, pair: &PairedEvent, proposed_size: Decimal, score: &mut f64, warnings: &mut Vec<String>) {
        for (venue, liquidity) in [
            (VenueId::VenueA, pair.listing_a.resting_liquidity),
            (VenueId::VenueB, pair.listing_b.resting_liquidity),
        ] {
            if liquidity > Decimal::ZERO && proposed_size / liquidity > self.config.min_liquidity_ratio {
                *score += 0.20;
                warnings.push(format!("proposed size exceeds {:.0}% of {venue} resting liquidity", self.config.min_liquidity_ratio * dec!(100)));
            }
        }
    }

    fn edge_risk(&self, gross_edge: Decimal, score: &mut f64, warnings: &mut Vec<String>) {
        if gross_edge < dec!(0.005) {
            *score += 0.30;
            warnings.push("gross edge below 0.5%".to_string());
        } else if gross_edge < dec!(0.01) {
            *score += 0.15;
            warnings.push("gross edge below 1%".to_string());
        }
    }

    fn regulatory_risk(&self, pair: &PairedEvent, score: &mut f64, warnings: &mut Vec<String>) {
        *score += 0.10;
        warnings.push("venue B carries baseline regulatory risk".to_string());

        let combined = format!(
            "{} {}",
            pair.listing_a.question.to_lowercase(),
            pair.listing_b.question.to_lowercase()
        );
        if POLITICAL_KEYWORDS.iter().any(|kw| combined.contains(kw)) {
            *score += 0.05;
            warnings.push("politically themed market".to_string());
        }
    }
}

impl Default for RiskAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Listing, ListingStatus, VenueId};
    use chrono::Utc;

    fn listing(venue: VenueId, question: &str, liquidity: Decimal) -> Listing {
        Listing {
            venue_id: venue,
            native_id: "id".to_string(),
            question: question.to_string(),
            description: question.to_string(),
            resolution_time: Some(Utc::now() + chrono::Duration::hours(1)),
            status: ListingStatus::Open,
            volume_to_date: dec!(0),
            resting_liquidity: liquidity,
            raw: serde_json::Value::Null,
        }
    }

    fn pair(question_a: &str, question_b: &str, liquidity: Decimal) -> PairedEvent {
        PairedEvent {
            listing_a: listing(VenueId::VenueA, question_a, liquidity),
            listing_b: listing(VenueId::VenueB, question_b, liquidity),
            similarity: 0.95,
        }
    }

    #[test]
    fn clean_pairing_is_low_risk() {
        let analyzer = RiskAnalyzer::new();
        let pair = pair("Will the Fed raise rates?", "Will the Fed raise rates?", dec!(100_000));
        let assessment = analyzer.analyze(&pair, 0.95, dec!(0.02), dec!(100));

        assert_eq!(assessment.tier, RiskTier::Low);
        assert_eq!(assessment.size_multiplier, dec!(1.0));
        assert!(assessment.should_execute());
    }

    #[test]
    fn primary_general_conflict_is_critical() {
        let analyzer = RiskAnalyzer::new();
        let pair = pair(
            "Will X win the Democratic primary?",
            "Will X win the general election?",
            dec!(100_000),
        );
        let assessment = analyzer.analyze(&pair, 0.95, dec!(0.02), dec!(100));

        assert_eq!(assessment.tier, RiskTier::Critical);
        assert!(!assessment.should_execute());
        assert!(assessment.warnings.iter().any(|w| w.contains("CRITICAL")));
    }

    #[test]
    fn marginal_similarity_band_adds_score() {
        let analyzer = RiskAnalyzer::new();
        let pair = pair("Will X happen?", "Will X happen?", dec!(100_000));
        let assessment = analyzer.analyze(&pair, 0.87, dec!(0.02), dec!(100));
        assert!(assessment.score >= 0.30);
    }

    #[test]
    fn thin_liquidity_adds_score_per_venue() {
        let analyzer = RiskAnalyzer::new();
        let pair = pair("Will X happen?", "Will X happen?", dec!(500));
        let assessment = analyzer.analyze(&pair, 0.95, dec!(0.02), dec!(100));
        assert!(assessment.warnings.iter().any(|w| w.contains("resting liquidity")));
    }

    #[test]
    fn thin_edge_is_scored_high_risk_contribution() {
        let analyzer = RiskAnalyzer::new();
        let pair = pair("Will X happen?", "Will X happen?", dec!(100_000));
        let low_edge = analyzer.analyze(&pair, 0.95, dec!(0.003), dec!(100));
        let high_edge = analyzer.analyze(&pair, 0.95, dec!(0.02), dec!(100));
        assert!(low_edge.score > high_edge.score);
    }

    #[test]
    fn political_keywords_add_regulatory_risk() {
        let analyzer = RiskAnalyzer::new();
        let political = pair("Will the election have high turnout?", "Will the election have high turnout?", dec!(100_000));
        let non_political = pair("Will it rain tomorrow?", "Will it rain tomorrow?", dec!(100_000));

        let political_assessment = analyzer.analyze(&political, 0.95, dec!(0.02), dec!(100));
        let baseline_assessment = analyzer.analyze(&non_political, 0.95, dec!(0.02), dec!(100));

        assert!(political_assessment.score > baseline_assessment.score);
    }

    #[test]
    fn tier_boundaries_are_exact() {
        let analyzer = RiskAnalyzer::new();
        assert_eq!(analyzer.tier_for_score(0.0).0, RiskTier::Low);
        assert_eq!(analyzer.tier_for_score(0.29).0, RiskTier::Low);
        assert_eq!(analyzer.tier_for_score(0.3).0, RiskTier::Medium);
        assert_eq!(analyzer.tier_for_score(0.49).0, RiskTier::Medium);
        assert_eq!(analyzer.tier_for_score(0.5).0, RiskTier::High);
        assert_eq!(analyzer.tier_for_score(0.69).0, RiskTier::High);
        assert_eq!(analyzer.tier_for_score(0.7).0, RiskTier::Critical);
    }
}
