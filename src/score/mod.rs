pub mod calculator;

pub use calculator::{
    calculate_competitive_gap, calculate_visibility_score, score_contribution, PlatformRanking,
};
