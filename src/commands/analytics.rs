use crate::models::report::PeriodAnalytics;
use crate::models::snapshot::{CompanySnapshot, TeamPerformanceSnapshot};

use super::{parse_optional_period, parse_period, run, AppState, CommandResult};

pub fn team_snapshots_get(
    state: &AppState,
    period: Option<&str>,
) -> CommandResult<Vec<TeamPerformanceSnapshot>> {
    run(|| {
        let period = parse_optional_period(period)?;
        state.analytics().team_snapshots(period.as_ref())
    })
}

pub fn team_history_get(state: &AppState, department: &str) -> CommandResult<Vec<TeamPerformanceSnapshot>> {
    run(|| state.analytics().team_history(department))
}

pub fn company_snapshot_get(state: &AppState, period: &str) -> CommandResult<Option<CompanySnapshot>> {
    run(|| state.analytics().company_snapshot(&parse_period(period)?))
}

pub fn company_history_get(state: &AppState) -> CommandResult<Vec<CompanySnapshot>> {
    run(|| state.analytics().company_history())
}

pub fn period_analytics_get(state: &AppState, period: &str) -> CommandResult<PeriodAnalytics> {
    run(|| state.analytics().period_analytics(&parse_period(period)?))
}
