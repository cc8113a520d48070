use crate::models::period::PeriodGranularity;
use crate::models::report::{ExportFormat, ExportResult, ScoreHistoryResponse, SubmissionReport};

use super::{parse_optional_period, run, AppState, CommandResult};

pub fn report_fetch(
    state: &AppState,
    employee: &str,
    period: Option<&str>,
) -> CommandResult<Option<SubmissionReport>> {
    run(|| {
        let period = parse_optional_period(period)?;
        state.reports().submission_report(employee, period.as_ref())
    })
}

pub fn report_history(
    state: &AppState,
    employee: &str,
    granularity: PeriodGranularity,
    limit: Option<usize>,
) -> CommandResult<ScoreHistoryResponse> {
    run(|| state.reports().score_history(employee, granularity, limit))
}

pub fn report_export(
    state: &AppState,
    employee: &str,
    period: Option<&str>,
    format: ExportFormat,
) -> CommandResult<Option<ExportResult>> {
    run(|| {
        let period = parse_optional_period(period)?;
        state.reports().export_submission(employee, period.as_ref(), format)
    })
}
