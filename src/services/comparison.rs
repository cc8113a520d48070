use crate::models::report::{Benchmark, PeriodComparison, ScoreHistoryEntry};
use crate::services::aggregation::trend_pct;

/// The most recent `n` entries of a most-recent-first history.
pub fn recent(history: &[ScoreHistoryEntry], n: usize) -> &[ScoreHistoryEntry] {
    &history[..n.min(history.len())]
}

/// Compares entry 0 (current) with entry 1 (previous). `None` when fewer
/// than two periods exist.
pub fn compare(history: &[ScoreHistoryEntry]) -> Option<PeriodComparison> {
    let [current, previous, ..] = history else {
        return None;
    };

    Some(PeriodComparison {
        current: current.clone(),
        previous: previous.clone(),
        delta: current.total_score - previous.total_score,
        trend_pct: trend_pct(current.total_score, previous.total_score),
    })
}

pub fn benchmark(score: f64, team_avg: Option<f64>, company_avg: Option<f64>) -> Benchmark {
    Benchmark {
        score,
        team_avg,
        vs_team: team_avg.map(|avg| score - avg),
        company_avg,
        vs_company: company_avg.map(|avg| score - avg),
    }
}
