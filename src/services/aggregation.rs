use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::assessment::{AssessmentRecord, CategoryTotal};
use crate::models::catalog::KpiCatalog;
use crate::models::period::PeriodGranularity;
use crate::models::report::{HistogramBin, ScoreHistoryEntry};
use crate::models::snapshot::{EmployeePeriodScore, GroupStats};
use crate::services::grading;

/// Rolls KPI points up into category totals. Every catalog category is
/// present, in catalog order, with `max` taken from the catalog. Categories
/// only seen in the points (a retired catalog entry) follow, using the weight
/// recorded alongside them.
pub fn category_totals<'a>(
    catalog: &KpiCatalog,
    points: impl IntoIterator<Item = (&'a str, f64, f64)>,
) -> Vec<CategoryTotal> {
    let mut earned: HashMap<&str, f64> = HashMap::new();
    let mut extra: Vec<(&str, f64)> = Vec::new();

    for (category, kpi_points, recorded_weight) in points {
        *earned.entry(category).or_insert(0.0) += kpi_points;
        if catalog.category(category).is_none() && !extra.iter().any(|(name, _)| *name == category) {
            extra.push((category, recorded_weight));
        }
    }

    let mut totals: Vec<CategoryTotal> = catalog
        .categories()
        .iter()
        .map(|category| CategoryTotal {
            category: category.name.clone(),
            earned: earned.get(category.name.as_str()).copied().unwrap_or(0.0),
            max: category.weight,
        })
        .collect();

    totals.extend(extra.into_iter().map(|(category, max)| CategoryTotal {
        category: category.to_string(),
        earned: earned.get(category).copied().unwrap_or(0.0),
        max,
    }));

    totals
}

pub fn category_totals_from_records(
    catalog: &KpiCatalog,
    records: &[AssessmentRecord],
) -> Vec<CategoryTotal> {
    category_totals(
        catalog,
        records
            .iter()
            .map(|record| (record.category.as_str(), record.points_earned, record.category_weight)),
    )
}

pub fn overall_score(categories: &[CategoryTotal]) -> f64 {
    categories.iter().map(|category| category.earned).sum()
}

/// `None` for an empty group.
pub fn group_stats(scores: &[f64]) -> Option<GroupStats> {
    if scores.is_empty() {
        return None;
    }

    let count = scores.len();
    let sum: f64 = scores.iter().sum();
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(GroupStats {
        avg: sum / count as f64,
        min,
        max,
        count,
    })
}

/// Percentage change from `previous` to `current`; zero when there is no baseline.
pub fn trend_pct(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) * 100.0 / previous
}

/// Keeps each employee's latest submission (by assessment date).
pub fn latest_per_employee(scores: Vec<EmployeePeriodScore>) -> Vec<EmployeePeriodScore> {
    let mut latest: BTreeMap<i64, EmployeePeriodScore> = BTreeMap::new();
    for score in scores {
        match latest.get(&score.employee_id) {
            Some(existing) if existing.assessment_date >= score.assessment_date => {}
            _ => {
                latest.insert(score.employee_id, score);
            }
        }
    }
    latest.into_values().collect()
}

/// One entry per bucket, most recent first. Within a bucket the latest
/// submission wins.
pub fn score_history(
    submissions: &[EmployeePeriodScore],
    granularity: PeriodGranularity,
) -> Vec<ScoreHistoryEntry> {
    let mut buckets: BTreeMap<String, &EmployeePeriodScore> = BTreeMap::new();

    for submission in submissions {
        let Ok(date) = NaiveDate::parse_from_str(&submission.assessment_date, "%Y-%m-%d") else {
            continue;
        };
        let label = granularity.bucket_label(date);
        match buckets.get(&label) {
            Some(existing) if existing.assessment_date >= submission.assessment_date => {}
            _ => {
                buckets.insert(label, submission);
            }
        }
    }

    buckets
        .into_iter()
        .rev()
        .map(|(period, submission)| ScoreHistoryEntry {
            period,
            assessment_date: submission.assessment_date.clone(),
            total_score: submission.total_score,
            band: grading::overall_band(submission.total_score),
        })
        .collect()
}

/// Equal-width bins over [0, 100]; a score of exactly 100 lands in the last bin.
pub fn histogram(scores: &[f64], bins: usize) -> Vec<HistogramBin> {
    let bins = bins.max(1);
    let width = 100.0 / bins as f64;
    let mut counts = vec![0usize; bins];

    for score in scores {
        let clamped = score.clamp(0.0, 100.0);
        let index = ((clamped / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(index, count)| HistogramBin {
            lower: index as f64 * width,
            upper: (index + 1) as f64 * width,
            count,
        })
        .collect()
}
