use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::assessment::{DraftSubmission, KpiInput, KpiStatus, ScoredKpi, ScoredSubmission};
use crate::models::catalog::{KpiCatalog, KpiDefinition};
use crate::services::aggregation;

const PARTIAL_CREDIT: f64 = 0.5;

/// Points earned for one KPI: full weight when met, half when partial.
pub fn points(status: KpiStatus, weight: f64) -> f64 {
    match status {
        KpiStatus::Met => weight,
        KpiStatus::Partial => weight * PARTIAL_CREDIT,
        KpiStatus::NotMet => 0.0,
    }
}

/// Measurement front end: met at or above target, partial at half of it.
pub fn status_from_measurement(actual: f64, target: f64) -> KpiStatus {
    if actual >= target {
        KpiStatus::Met
    } else if actual >= target * PARTIAL_CREDIT {
        KpiStatus::Partial
    } else {
        KpiStatus::NotMet
    }
}

/// Resolves an answer to a status, keeping the raw measurement when there was one.
pub fn resolve_status(kpi: &KpiDefinition, input: KpiInput) -> AppResult<(KpiStatus, Option<f64>)> {
    match input {
        KpiInput::Status(status) => Ok((status, None)),
        KpiInput::Measurement(actual) => {
            let target = kpi.target_value.ok_or_else(|| {
                AppError::validation(format!(
                    "KPI '{}' has no target value; pick a status instead",
                    kpi.name
                ))
            })?;
            Ok((status_from_measurement(actual, target), Some(actual)))
        }
    }
}

/// Scores a draft against the catalog. Every answer must name a known KPI;
/// when `require_complete` is set every catalog KPI must be answered.
pub fn score_draft(
    catalog: &KpiCatalog,
    draft: &DraftSubmission,
    require_complete: bool,
) -> AppResult<ScoredSubmission> {
    let employee = draft.employee.normalized()?;

    if let Some(unknown) = draft.unknown_kpis(catalog).into_iter().next() {
        return Err(AppError::unknown_kpi(unknown));
    }

    let missing = draft.missing_kpis(catalog);
    if require_complete && !missing.is_empty() {
        return Err(AppError::incomplete_submission(missing));
    }
    if draft.is_empty() {
        return Err(AppError::validation("submission has no KPI answers"));
    }

    let mut kpis = Vec::with_capacity(draft.len());
    for category in catalog.categories() {
        for kpi in &category.kpis {
            let Some(entry) = draft.entry(&kpi.name) else {
                continue;
            };
            let (status, actual_value) = resolve_status(kpi, entry.input)?;
            kpis.push(ScoredKpi {
                category: category.name.clone(),
                kpi_name: kpi.name.clone(),
                status,
                actual_value,
                points_earned: points(status, kpi.weight),
                kpi_weight: kpi.weight,
                category_weight: category.weight,
                notes: entry.notes.clone(),
            });
        }
    }

    let categories = aggregation::category_totals(
        catalog,
        kpis.iter()
            .map(|kpi| (kpi.category.as_str(), kpi.points_earned, kpi.category_weight)),
    );
    let overall_score = aggregation::overall_score(&categories);

    debug!(
        target: "app::scoring",
        employee = %employee.name,
        answered = kpis.len(),
        missing = missing.len(),
        overall_score,
        "scored draft submission"
    );

    Ok(ScoredSubmission {
        employee,
        assessment_date: draft.assessment_date,
        period: draft.period(),
        kpis,
        categories,
        overall_score,
    })
}
