use chrono::NaiveDate;

use crate::models::assessment::{
    parse_assessment_date, ScoredSubmission, StoredSubmission, SubmissionInput, SubmissionReceipt,
};
use crate::models::catalog::KpiCatalog;
use crate::models::period::PeriodKey;
use crate::models::snapshot::SnapshotRefresh;

use super::{parse_optional_period, parse_period, run, AppState, CommandResult};

pub fn catalog_get(state: &AppState) -> CommandResult<KpiCatalog> {
    Ok(state.catalog().as_ref().clone())
}

pub fn assessment_preview(state: &AppState, input: SubmissionInput) -> CommandResult<ScoredSubmission> {
    run(|| {
        let draft = input.into_draft()?;
        state.assessments().preview(&draft)
    })
}

pub fn assessment_submit(state: &AppState, input: SubmissionInput) -> CommandResult<SubmissionReceipt> {
    run(|| {
        let draft = input.into_draft()?;
        state.assessments().submit(&draft)
    })
}

/// By period: the latest submission in it. By date: that exact submission.
pub fn assessment_fetch(
    state: &AppState,
    employee: &str,
    period: Option<&str>,
    date: Option<&str>,
) -> CommandResult<Option<StoredSubmission>> {
    run(|| match (date, parse_optional_period(period)?) {
        (Some(date), _) => state
            .assessments()
            .fetch_submission_on(employee, parse_assessment_date(date)?),
        (None, Some(period)) => state.assessments().fetch_submission(employee, &period),
        (None, None) => {
            let today = chrono::Utc::now().date_naive();
            state
                .assessments()
                .fetch_submission(employee, &PeriodKey::from_date(today))
        }
    })
}

pub fn assessment_delete(state: &AppState, employee: &str, date: &str) -> CommandResult<bool> {
    run(|| {
        let date: NaiveDate = parse_assessment_date(date)?;
        state.assessments().delete_submission(employee, date)
    })
}

pub fn snapshots_recompute(state: &AppState, period: Option<&str>) -> CommandResult<Vec<SnapshotRefresh>> {
    run(|| match period {
        Some(raw) => Ok(vec![state.assessments().recompute_period(&parse_period(raw)?)?]),
        None => state.assessments().recompute_all(),
    })
}
