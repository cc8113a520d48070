use std::collections::BTreeMap;

use kpi_scorecard_lib::commands::{analytics, assessment, employee, AppState};
use kpi_scorecard_lib::db::DbPool;
use kpi_scorecard_lib::models::assessment::{KpiStatus, SubmissionInput};
use kpi_scorecard_lib::models::catalog::KpiCatalog;
use kpi_scorecard_lib::models::employee::EmployeeIdentity;
use kpi_scorecard_lib::services::assessment_service::AssessmentPolicy;
use tempfile::{tempdir, TempDir};

const SIXTY_POINT_KPIS: [&str; 9] = [
    "Task Completion Rate",
    "Quality of Output",
    "Process Efficiency",
    "Documentation & Compliance",
    "Cross-Team Communication",
    "Meeting Participation",
    "Collaboration Quality",
    "Team Morale Contribution",
    "Accountability",
];

fn state() -> (AppState, TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("rollup.sqlite")).expect("db pool");
    let state = AppState::from_parts(
        pool,
        KpiCatalog::standard(),
        AssessmentPolicy::default(),
        Some(dir.path().join("reports")),
    )
    .expect("app state");
    (state, dir)
}

fn input(name: &str, department: &str, date: &str, met: &[&str]) -> SubmissionInput {
    let statuses: BTreeMap<String, String> = KpiCatalog::standard()
        .kpis()
        .map(|kpi| {
            let status = if met.contains(&kpi.name.as_str()) {
                KpiStatus::Met
            } else {
                KpiStatus::NotMet
            };
            (kpi.name.clone(), status.as_str().to_string())
        })
        .collect();
    SubmissionInput {
        employee: EmployeeIdentity::new(name, department),
        assessment_date: date.to_string(),
        statuses,
        ..SubmissionInput::default()
    }
}

fn all_kpis() -> Vec<String> {
    KpiCatalog::standard().kpis().map(|kpi| kpi.name.clone()).collect()
}

fn full_marks(name: &str, department: &str, date: &str) -> SubmissionInput {
    let names = all_kpis();
    let met: Vec<&str> = names.iter().map(String::as_str).collect();
    input(name, department, date, &met)
}

#[test]
fn team_and_company_snapshots_follow_submissions() {
    let (state, _dir) = state();

    let first = assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-07-03"))
        .expect("first submit");
    assert_eq!(first.overall_score, 100.0);
    let second = assessment::assessment_submit(
        &state,
        input("B. Jones", "Programming", "2024-08-14", &SIXTY_POINT_KPIS),
    )
    .expect("second submit");
    assert_eq!(second.overall_score, 60.0);

    let teams = analytics::team_snapshots_get(&state, Some("2024-Q3")).expect("teams");
    assert_eq!(teams.len(), 1);
    let team = &teams[0];
    assert_eq!(team.department, "Programming");
    assert_eq!(team.stats.avg, 80.0);
    assert_eq!(team.stats.min, 60.0);
    assert_eq!(team.stats.max, 100.0);
    assert_eq!(team.stats.count, 2);

    let company = analytics::company_snapshot_get(&state, "2024-Q3")
        .expect("company")
        .expect("company snapshot exists");
    assert_eq!(company.stats.avg, 80.0);
    assert_eq!(company.stats.count, 2);
    assert_eq!(company.department_count, 1);
}

#[test]
fn recomputing_is_idempotent() {
    let (state, _dir) = state();
    assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-07-03")).expect("submit");
    assessment::assessment_submit(
        &state,
        input("B. Jones", "Data Management", "2024-09-30", &SIXTY_POINT_KPIS),
    )
    .expect("submit");

    let before = analytics::team_snapshots_get(&state, Some("2024-Q3")).expect("teams");
    let first = assessment::snapshots_recompute(&state, Some("2024-Q3")).expect("recompute");
    let second = assessment::snapshots_recompute(&state, None).expect("recompute all");
    let after = analytics::team_snapshots_get(&state, Some("2024-Q3")).expect("teams");

    let stats = |teams: &[kpi_scorecard_lib::models::snapshot::TeamPerformanceSnapshot]| {
        teams
            .iter()
            .map(|team| (team.department.clone(), team.stats))
            .collect::<Vec<_>>()
    };
    assert_eq!(stats(&before), stats(&after));
    assert_eq!(first[0].teams.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].company.as_ref().map(|company| company.stats.avg), Some(80.0));
}

#[test]
fn resubmitting_a_date_replaces_and_latest_in_period_counts() {
    let (state, _dir) = state();
    assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-04-10")).expect("submit");
    assessment::assessment_submit(
        &state,
        input("A. Smith", "Programming", "2024-04-10", &SIXTY_POINT_KPIS),
    )
    .expect("resubmit same date");

    let stored = assessment::assessment_fetch(&state, "A. Smith", None, Some("2024-04-10"))
        .expect("fetch")
        .expect("stored");
    assert_eq!(stored.records.len(), 20);
    assert_eq!(stored.total_score, 60.0);

    // A later date in the same quarter supersedes the earlier one for rollups.
    assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-06-01")).expect("later");
    let team = analytics::team_snapshots_get(&state, Some("2024-Q2")).expect("teams");
    assert_eq!(team[0].stats.count, 1);
    assert_eq!(team[0].stats.avg, 100.0);

    let latest = assessment::assessment_fetch(&state, "A. Smith", Some("2024-Q2"), None)
        .expect("fetch")
        .expect("latest");
    assert_eq!(latest.assessment_date, "2024-06-01");
}

#[test]
fn removing_an_employee_rebuilds_their_periods() {
    let (state, _dir) = state();
    assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-01-15")).expect("submit");
    assessment::assessment_submit(
        &state,
        input("B. Jones", "Programming", "2024-02-20", &SIXTY_POINT_KPIS),
    )
    .expect("submit");

    let removal = employee::employee_remove(&state, "B. Jones").expect("remove");
    assert!(removal.removed);
    assert_eq!(removal.assessment_rows_removed, 20);

    let team = analytics::team_snapshots_get(&state, Some("2024-Q1")).expect("teams");
    assert_eq!(team[0].stats.count, 1);
    assert_eq!(team[0].stats.avg, 100.0);

    let missing = employee::employee_remove(&state, "B. Jones").expect("remove again");
    assert!(!missing.removed);
    assert_eq!(
        employee::departments_list(&state).expect("departments"),
        vec!["Programming".to_string()]
    );
}

#[test]
fn deleting_the_only_submission_clears_the_company_row() {
    let (state, _dir) = state();
    assessment::assessment_submit(&state, full_marks("A. Smith", "Programming", "2024-10-01")).expect("submit");
    assert!(assessment::assessment_delete(&state, "A. Smith", "2024-10-01").expect("delete"));
    assert!(!assessment::assessment_delete(&state, "A. Smith", "2024-10-01").expect("delete again"));

    assert!(analytics::company_snapshot_get(&state, "2024-Q4").expect("company").is_none());
    assert!(analytics::team_snapshots_get(&state, Some("2024-Q4")).expect("teams").is_empty());
}
