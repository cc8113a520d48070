use std::collections::BTreeMap;
use std::time::Duration;

use kpi_scorecard_lib::commands::{analytics, assessment, employee, report, AppState};
use kpi_scorecard_lib::db::{ConnectionOptions, DbPool, RetryPolicy};
use kpi_scorecard_lib::error::AppError;
use kpi_scorecard_lib::models::assessment::{DraftSubmission, KpiStatus, SubmissionInput};
use kpi_scorecard_lib::models::catalog::KpiCatalog;
use kpi_scorecard_lib::models::employee::EmployeeIdentity;
use kpi_scorecard_lib::models::period::PeriodGranularity;
use kpi_scorecard_lib::services::assessment_service::{AssessmentPolicy, AssessmentService};
use rusqlite::Connection;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn state_with(policy: AssessmentPolicy) -> (AppState, TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("errors.sqlite")).expect("db pool");
    let state = AppState::from_parts(
        pool,
        KpiCatalog::standard(),
        policy,
        Some(dir.path().join("reports")),
    )
    .expect("app state");
    (state, dir)
}

fn complete_input(name: &str, date: &str) -> SubmissionInput {
    let statuses: BTreeMap<String, String> = KpiCatalog::standard()
        .kpis()
        .map(|kpi| (kpi.name.clone(), "Met".to_string()))
        .collect();
    SubmissionInput {
        employee: EmployeeIdentity::new(name, "Programming"),
        assessment_date: date.to_string(),
        statuses,
        ..SubmissionInput::default()
    }
}

#[test]
fn incomplete_submission_lists_missing_kpis_and_writes_nothing() {
    let (state, _dir) = state_with(AssessmentPolicy::default());
    let mut input = complete_input("A. Smith", "2024-03-15");
    input.statuses.remove("Strategic Alignment");
    input.statuses.remove("Accountability");

    let err = assessment::assessment_submit(&state, input).expect_err("incomplete");
    assert_eq!(err.code, "INCOMPLETE_SUBMISSION");
    let missing = err.details.expect("details")["missing"].clone();
    let missing: Vec<String> = serde_json::from_value(missing).expect("missing list");
    assert_eq!(missing.len(), 2);
    assert!(missing.contains(&"Strategic Alignment".to_string()));

    assert!(employee::employees_list(&state, None).expect("list").is_empty());
}

#[test]
fn partial_submissions_are_allowed_when_completeness_is_relaxed() {
    let policy = AssessmentPolicy {
        require_complete: false,
        ..AssessmentPolicy::default()
    };
    let (state, _dir) = state_with(policy);
    let mut input = complete_input("A. Smith", "2024-03-15");
    input.statuses.remove("Strategic Alignment");

    let receipt = assessment::assessment_submit(&state, input).expect("partial submit");
    assert_eq!(receipt.rows_written, 19);
    assert_eq!(receipt.overall_score, 97.5);
}

#[test]
fn invalid_inputs_map_to_distinct_codes() {
    let (state, _dir) = state_with(AssessmentPolicy::default());

    let mut bad_status = complete_input("A. Smith", "2024-03-15");
    bad_status.statuses.insert("Teamwork Quality".into(), "Met".into());
    let err = assessment::assessment_preview(&state, bad_status).expect_err("unknown kpi");
    assert_eq!(err.code, "UNKNOWN_KPI");

    let mut bad_status = complete_input("A. Smith", "2024-03-15");
    bad_status.statuses.insert("Accountability".into(), "Excellent".into());
    let err = assessment::assessment_preview(&state, bad_status).expect_err("invalid status");
    assert_eq!(err.code, "INVALID_STATUS");
    assert_eq!(err.details.expect("details")["value"], "Excellent");

    let err = assessment::assessment_preview(&state, complete_input("A. Smith", "15/03/2024"))
        .expect_err("bad date");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = assessment::assessment_preview(&state, complete_input("   ", "2024-03-15"))
        .expect_err("blank name");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let err = analytics::period_analytics_get(&state, "2024-Q7").expect_err("bad period");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[test]
fn unconfigured_department_is_rejected_with_allowed_list() {
    let policy = AssessmentPolicy {
        allowed_departments: vec!["Data Management".into()],
        ..AssessmentPolicy::default()
    };
    let (state, _dir) = state_with(policy);

    let err = assessment::assessment_submit(&state, complete_input("A. Smith", "2024-03-15"))
        .expect_err("department not allowed");
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(
        err.details.expect("details")["allowedDepartments"][0],
        "Data Management"
    );
}

#[test]
fn unknown_lookups_are_empty_rather_than_errors() {
    let (state, _dir) = state_with(AssessmentPolicy::default());

    assert!(assessment::assessment_fetch(&state, "Nobody", Some("2024-Q1"), None)
        .expect("fetch")
        .is_none());
    assert!(!assessment::assessment_delete(&state, "Nobody", "2024-01-01").expect("delete"));
    assert!(report::report_fetch(&state, "Nobody", None).expect("report").is_none());
    assert!(report::report_history(&state, "Nobody", PeriodGranularity::Year, None)
        .expect("history")
        .entries
        .is_empty());
    assert!(analytics::team_history_get(&state, "Nowhere").expect("team").is_empty());
    assert!(analytics::company_snapshot_get(&state, "2024-Q1").expect("company").is_none());
    assert!(!employee::employee_remove(&state, "Nobody").expect("remove").removed);
}

#[test]
fn locked_store_escalates_after_retries_without_partial_writes() {
    let dir = tempdir().expect("temp dir");
    let db_path = dir.path().join("locked.sqlite");
    let options = ConnectionOptions {
        busy_timeout: Duration::ZERO,
        retry: RetryPolicy::new(3, Duration::ZERO),
    };
    let pool = DbPool::with_options(&db_path, options).expect("db pool");
    let service = AssessmentService::new(
        pool.clone(),
        Arc::new(KpiCatalog::standard()),
        AssessmentPolicy::default(),
    );

    let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");
    let mut draft = DraftSubmission::new(EmployeeIdentity::new("A. Smith", "Programming"), date);
    draft.fill_all(&KpiCatalog::standard(), KpiStatus::Met);

    let holder = Connection::open(&db_path).expect("second connection");
    holder.execute_batch("BEGIN EXCLUSIVE;").expect("hold write lock");

    let err = service.submit(&draft).expect_err("store is locked");
    match err {
        AppError::StorageUnavailable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected StorageUnavailable, got {other:?}"),
    }

    holder.execute_batch("ROLLBACK;").expect("release lock");
    drop(holder);

    let stored = pool
        .with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM assessments", [], |row| row.get(0))?;
            let employees: i64 = conn.query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))?;
            Ok((count, employees))
        })
        .expect("count rows");
    assert_eq!(stored, (0, 0));

    // Once released the same submission goes through.
    let receipt = service.submit(&draft).expect("submit after release");
    assert_eq!(receipt.rows_written, 20);
}
