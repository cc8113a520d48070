//! Two independent banding schemes: category ratio bands and whole-score bands.

use crate::models::report::{CategoryBand, OverallBand};

const ON_TRACK_PCT: f64 = 85.0;
const IMPROVE_PCT: f64 = 70.0;

/// Percentage of `max` earned; zero when `max` is zero.
pub fn percent_of(earned: f64, max: f64) -> f64 {
    if max == 0.0 {
        return 0.0;
    }
    earned * 100.0 / max
}

/// Whole-score counterpart of the on-track band.
pub fn is_above_target(score: f64) -> bool {
    score >= ON_TRACK_PCT
}

pub fn status_band(earned: f64, max: f64) -> CategoryBand {
    let pct = percent_of(earned, max);
    if pct >= ON_TRACK_PCT {
        CategoryBand::OnTrack
    } else if pct >= IMPROVE_PCT {
        CategoryBand::Improve
    } else {
        CategoryBand::NeedsAttention
    }
}

/// Grades an overall score out of 100.
pub fn overall_band(score: f64) -> OverallBand {
    if score >= 90.0 {
        OverallBand::Outstanding
    } else if score >= 80.0 {
        OverallBand::ExceedsExpectations
    } else if score >= 70.0 {
        OverallBand::MeetsExpectations
    } else if score >= 60.0 {
        OverallBand::NeedsImprovement
    } else {
        OverallBand::Unsatisfactory
    }
}

/// Coaching line shown next to an employee in the analytics ranking.
pub fn recommendation(score: f64) -> &'static str {
    if score < IMPROVE_PCT {
        "Needs improvement: focus on process efficiency and documentation."
    } else if score < ON_TRACK_PCT {
        "Improving steadily: maintain consistency."
    } else {
        "Excellent: keep performance at this level."
    }
}
