//! Score Calculator (C7, first half): weighted visibility score and
//! competitive gap.

use std::collections::HashMap;

use crate::models::Platform;

fn platform_weight(platform: Platform) -> f64 {
    match platform {
        Platform::Chatgpt => 0.40,
        Platform::Perplexity => 0.35,
        Platform::GoogleAi => 0.25,
    }
}

fn position_score(rank_position: u8) -> f64 {
    match rank_position {
        1 => 100.0,
        2 => 75.0,
        3 => 50.0,
        4 => 30.0,
        5 => 15.0,
        _ => 0.0,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The weighted contribution of a single (platform, rank_position)
/// observation, as written to the time-series store alongside the raw rank.
pub fn score_contribution(platform: Platform, rank_position: u8) -> f64 {
    round2(platform_weight(platform) * position_score(rank_position))
}

/// One brand's rank on one platform, the input to score calculation.
#[derive(Debug, Clone, Copy)]
pub struct PlatformRanking {
    pub platform: Platform,
    pub rank_position: u8,
}

/// Weighted visibility score for a single brand from its per-platform
/// rank observations. Range [0, 100], rounded to 2 decimals.
pub fn calculate_visibility_score(rankings: &[PlatformRanking]) -> f64 {
    if rankings.is_empty() {
        return 0.0;
    }
    let total: f64 = rankings
        .iter()
        .map(|r| platform_weight(r.platform) * position_score(r.rank_position))
        .sum();
    round2(total)
}

/// Primary-brand score minus the best competitor score; equals the primary
/// score unmodified when there are no competitors. Rounded to 2 decimals.
pub fn calculate_competitive_gap(
    primary_score: f64,
    competitor_scores: &HashMap<String, f64>,
) -> f64 {
    if competitor_scores.is_empty() {
        return round2(primary_score);
    }
    let max_competitor = competitor_scores
        .values()
        .cloned()
        .fold(f64::MIN, f64::max);
    round2(primary_score - max_competitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rankings_scores_zero() {
        assert_eq!(calculate_visibility_score(&[]), 0.0);
    }

    /// S2 — score arithmetic.
    #[test]
    fn s2_score_arithmetic() {
        let rankings = vec![
            PlatformRanking { platform: Platform::Chatgpt, rank_position: 1 },
            PlatformRanking { platform: Platform::Perplexity, rank_position: 3 },
            PlatformRanking { platform: Platform::GoogleAi, rank_position: 5 },
        ];
        let score = calculate_visibility_score(&rankings);
        assert_eq!(score, 61.25);
    }

    #[test]
    fn additivity_over_disjoint_platform_subsets() {
        let a = vec![PlatformRanking { platform: Platform::Chatgpt, rank_position: 1 }];
        let b = vec![PlatformRanking { platform: Platform::Perplexity, rank_position: 3 }];
        let combined = vec![
            PlatformRanking { platform: Platform::Chatgpt, rank_position: 1 },
            PlatformRanking { platform: Platform::Perplexity, rank_position: 3 },
        ];
        let sum = calculate_visibility_score(&a) + calculate_visibility_score(&b);
        assert_eq!(sum, calculate_visibility_score(&combined));
    }

    /// S3 — competitive gap leading.
    #[test]
    fn s3_competitive_gap_leading() {
        let mut competitors = HashMap::new();
        competitors.insert("Dyson".to_string(), 60.0);
        competitors.insert("Coway".to_string(), 45.0);
        competitors.insert("Honeywell".to_string(), 30.0);
        let gap = calculate_competitive_gap(85.0, &competitors);
        assert_eq!(gap, 25.00);
    }

    #[test]
    fn gap_with_no_competitors_equals_primary_score() {
        let gap = calculate_competitive_gap(42.5, &HashMap::new());
        assert_eq!(gap, 42.5);
    }
}
