use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::db::repositories::assessment_repository::AssessmentRepository;
use crate::db::repositories::snapshot_repository::SnapshotRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::assessment::{AssessmentRecord, CategoryTotal, KpiStatus};
use crate::models::catalog::KpiCatalog;
use crate::models::period::PeriodKey;
use crate::models::report::{CategoryAverage, CategoryBand, PeriodAnalytics, RankedEmployee, WeakArea};
use crate::models::snapshot::{CompanySnapshot, EmployeePeriodScore, TeamPerformanceSnapshot};
use crate::services::{aggregation, grading};

const DISTRIBUTION_BINS: usize = 10;

pub struct AnalyticsService {
    db: DbPool,
    catalog: Arc<KpiCatalog>,
}

impl AnalyticsService {
    pub fn new(db: DbPool, catalog: Arc<KpiCatalog>) -> Self {
        Self { db, catalog }
    }

    /// Team snapshots of one period, or of every period when `period` is `None`.
    pub fn team_snapshots(&self, period: Option<&PeriodKey>) -> AppResult<Vec<TeamPerformanceSnapshot>> {
        let period = period.map(ToString::to_string);
        self.db
            .with_connection(|conn| SnapshotRepository::list_teams(conn, period.as_deref()))
    }

    pub fn team_history(&self, department: &str) -> AppResult<Vec<TeamPerformanceSnapshot>> {
        self.db
            .with_connection(|conn| SnapshotRepository::list_team_history(conn, department.trim()))
    }

    pub fn company_snapshot(&self, period: &PeriodKey) -> AppResult<Option<CompanySnapshot>> {
        let period = period.to_string();
        self.db
            .with_connection(|conn| SnapshotRepository::find_company(conn, &period))
    }

    pub fn company_history(&self) -> AppResult<Vec<CompanySnapshot>> {
        self.db.with_connection(SnapshotRepository::list_company)
    }

    /// Distribution, category averages, ranking and trend for one period,
    /// computed from each employee's latest submission in it.
    pub fn period_analytics(&self, period: &PeriodKey) -> AppResult<PeriodAnalytics> {
        let key = period.to_string();
        let previous_key = period.previous().to_string();

        let (scores, records, company, teams, previous_company) = self.db.with_connection(|conn| {
            let scores = aggregation::latest_per_employee(AssessmentRepository::list_period_scores(conn, &key)?);
            let submission_ids: Vec<String> = scores.iter().map(|score| score.submission_id.clone()).collect();
            let records = AssessmentRepository::list_records_for_submissions(conn, &submission_ids)?;
            let company = SnapshotRepository::find_company(conn, &key)?;
            let teams = SnapshotRepository::list_teams(conn, Some(key.as_str()))?;
            let previous_company = SnapshotRepository::find_company(conn, &previous_key)?;
            Ok((scores, records, company, teams, previous_company))
        })?;

        let totals: Vec<f64> = scores.iter().map(|score| score.total_score).collect();
        let distribution = if totals.is_empty() {
            Vec::new()
        } else {
            aggregation::histogram(&totals, DISTRIBUTION_BINS)
        };

        let mut per_submission: Vec<Vec<CategoryTotal>> = Vec::with_capacity(scores.len());
        let mut weak_by_submission: HashMap<String, Vec<WeakArea>> = HashMap::new();
        for score in &scores {
            let rows: Vec<AssessmentRecord> = records
                .iter()
                .filter(|record| record.submission_id == score.submission_id)
                .cloned()
                .collect();
            let category_totals = aggregation::category_totals_from_records(&self.catalog, &rows);
            weak_by_submission.insert(score.submission_id.clone(), weak_areas(&category_totals, &rows));
            per_submission.push(category_totals);
        }

        let company_trend_pct = match (&company, &previous_company) {
            (Some(current), Some(previous)) => Some(aggregation::trend_pct(current.stats.avg, previous.stats.avg)),
            _ => None,
        };

        debug!(
            target: "app::analytics",
            period = %key,
            participants = scores.len(),
            teams = teams.len(),
            "period analytics computed"
        );

        Ok(PeriodAnalytics {
            period: key,
            stats: aggregation::group_stats(&totals),
            company,
            teams,
            above_target: totals.iter().filter(|total| grading::is_above_target(**total)).count(),
            distribution,
            category_averages: category_averages(&per_submission),
            ranking: rank(&scores, &weak_by_submission),
            company_trend_pct,
        })
    }
}

/// Mean earned points per category across submissions; categories keep the
/// order of the first submission.
pub fn category_averages(per_submission: &[Vec<CategoryTotal>]) -> Vec<CategoryAverage> {
    let Some(first) = per_submission.first() else {
        return Vec::new();
    };

    first
        .iter()
        .map(|template| {
            let earned: Vec<f64> = per_submission
                .iter()
                .filter_map(|totals| totals.iter().find(|total| total.category == template.category))
                .map(|total| total.earned)
                .collect();
            let avg_earned = earned.iter().sum::<f64>() / earned.len().max(1) as f64;
            CategoryAverage {
                category: template.category.clone(),
                avg_earned,
                max: template.max,
                avg_percent: grading::percent_of(avg_earned, template.max),
            }
        })
        .collect()
}

/// Categories in the needs-attention band, each with its Partial and Not Met
/// KPIs. Categories without weight are skipped.
pub fn weak_areas(totals: &[CategoryTotal], records: &[AssessmentRecord]) -> Vec<WeakArea> {
    totals
        .iter()
        .filter(|total| total.max > 0.0)
        .filter(|total| grading::status_band(total.earned, total.max) == CategoryBand::NeedsAttention)
        .map(|total| WeakArea {
            category: total.category.clone(),
            percent: grading::percent_of(total.earned, total.max),
            weak_kpis: records
                .iter()
                .filter(|record| record.category == total.category && record.status != KpiStatus::Met)
                .map(|record| record.kpi_name.clone())
                .collect(),
        })
        .collect()
}

/// Highest score first; ties share a rank and are listed by name.
/// `weak_areas` is keyed by submission id.
pub fn rank(
    scores: &[EmployeePeriodScore],
    weak_areas: &HashMap<String, Vec<WeakArea>>,
) -> Vec<RankedEmployee> {
    let mut sorted: Vec<&EmployeePeriodScore> = scores.iter().collect();
    sorted.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.employee_name.cmp(&b.employee_name))
    });

    let mut ranking: Vec<RankedEmployee> = Vec::with_capacity(sorted.len());
    for (index, score) in sorted.into_iter().enumerate() {
        let rank = match ranking.last() {
            Some(previous) if previous.total_score == score.total_score => previous.rank,
            _ => index + 1,
        };
        ranking.push(RankedEmployee {
            rank,
            employee_name: score.employee_name.clone(),
            department: score.department.clone(),
            total_score: score.total_score,
            band: grading::overall_band(score.total_score),
            status: grading::status_band(score.total_score, 100.0),
            recommendation: grading::recommendation(score.total_score).to_string(),
            weak_areas: weak_areas.get(&score.submission_id).cloned().unwrap_or_default(),
        });
    }
    ranking
}
