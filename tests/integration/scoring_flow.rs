use std::sync::Arc;

use chrono::NaiveDate;
use kpi_scorecard_lib::db::DbPool;
use kpi_scorecard_lib::models::assessment::{DraftSubmission, KpiStatus};
use kpi_scorecard_lib::models::catalog::KpiCatalog;
use kpi_scorecard_lib::models::employee::EmployeeIdentity;
use kpi_scorecard_lib::models::period::PeriodKey;
use kpi_scorecard_lib::models::report::{CategoryBand, OverallBand};
use kpi_scorecard_lib::services::assessment_service::{AssessmentPolicy, AssessmentService};
use kpi_scorecard_lib::services::report_service::ReportService;
use tempfile::tempdir;

fn uniform_draft(name: &str, department: &str, date: NaiveDate, status: KpiStatus) -> DraftSubmission {
    let mut draft = DraftSubmission::new(EmployeeIdentity::new(name, department), date);
    draft.fill_all(&KpiCatalog::standard(), status);
    draft
}

#[test]
fn all_met_submission_scores_full_marks_and_reads_back() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("scoring.sqlite")).expect("db pool");
    let catalog = Arc::new(KpiCatalog::standard());
    let assessments = AssessmentService::new(pool.clone(), Arc::clone(&catalog), AssessmentPolicy::default());
    let reports = ReportService::new(pool, catalog, Some(dir.path().join("reports"))).expect("report service");

    let date = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");
    let draft = uniform_draft("A. Smith", "Programming", date, KpiStatus::Met);

    let preview = assessments.preview(&draft).expect("preview");
    assert_eq!(preview.period.to_string(), "2024-Q1");
    assert_eq!(preview.overall_score, 100.0);
    assert!(preview.categories.iter().all(|category| category.earned == category.max));

    let receipt = assessments.submit(&draft).expect("submit");
    assert_eq!(receipt.period, "2024-Q1");
    assert_eq!(receipt.overall_score, 100.0);
    assert_eq!(receipt.band, "Outstanding");
    assert_eq!(receipt.rows_written, 20);

    let period = PeriodKey::new(2024, 1).expect("period");
    let stored = assessments
        .fetch_submission("A. Smith", &period)
        .expect("fetch")
        .expect("submission exists");
    assert_eq!(stored.submission_id, receipt.submission_id);
    assert_eq!(stored.records.len(), 20);
    assert!(stored.records.iter().all(|record| record.status == KpiStatus::Met));
    assert!(stored.records.iter().all(|record| record.total_score == 100.0));
    assert!(stored.records.iter().all(|record| record.period == "2024-Q1"));

    let report = reports
        .submission_report("A. Smith", Some(&period))
        .expect("report")
        .expect("report exists");
    assert_eq!(report.band, OverallBand::Outstanding);
    assert_eq!(report.categories.len(), 5);
    assert!(report
        .categories
        .iter()
        .all(|row| row.status == CategoryBand::OnTrack && row.percent == 100.0));
}

#[test]
fn all_not_met_submission_scores_zero() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("scoring.sqlite")).expect("db pool");
    let catalog = Arc::new(KpiCatalog::standard());
    let assessments = AssessmentService::new(pool.clone(), Arc::clone(&catalog), AssessmentPolicy::default());
    let reports = ReportService::new(pool, catalog, Some(dir.path().join("reports"))).expect("report service");

    let date = NaiveDate::from_ymd_opt(2024, 8, 1).expect("date");
    let receipt = assessments
        .submit(&uniform_draft("C. Lee", "Data Management", date, KpiStatus::NotMet))
        .expect("submit");
    assert_eq!(receipt.overall_score, 0.0);
    assert_eq!(receipt.band, "Unsatisfactory");
    assert_eq!(receipt.period, "2024-Q3");

    let report = reports
        .submission_report("C. Lee", None)
        .expect("report")
        .expect("report exists");
    assert_eq!(report.band, OverallBand::Unsatisfactory);
    assert!(report
        .categories
        .iter()
        .all(|row| row.status == CategoryBand::NeedsAttention && row.earned == 0.0));
}

#[test]
fn mixed_answers_and_measurements_sum_per_category() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("scoring.sqlite")).expect("db pool");
    let catalog = Arc::new(KpiCatalog::standard());
    let assessments = AssessmentService::new(pool, Arc::clone(&catalog), AssessmentPolicy::default());

    let date = NaiveDate::from_ymd_opt(2024, 11, 20).expect("date");
    let mut draft = uniform_draft("D. Park", "Programming", date, KpiStatus::Met);
    draft.set_status("Quality of Output", KpiStatus::Partial);
    draft.set_status("Knowledge Sharing", KpiStatus::NotMet);
    // 95 against a 90 target resolves to Met.
    draft.set_measurement("Task Completion Rate", 95.0);

    let scored = assessments.preview(&draft).expect("preview");
    let delivery = scored
        .categories
        .iter()
        .find(|category| category.category == "Performance & Delivery")
        .expect("delivery category");
    assert_eq!(delivery.earned, 35.0 - 8.75 / 2.0);
    assert_eq!(scored.overall_score, 100.0 - 4.375 - 3.75);

    let task_completion = scored
        .kpis
        .iter()
        .find(|kpi| kpi.kpi_name == "Task Completion Rate")
        .expect("measured kpi");
    assert_eq!(task_completion.status, KpiStatus::Met);
    assert_eq!(task_completion.actual_value, Some(95.0));
}

#[test]
fn unknown_employee_reads_are_empty() {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("scoring.sqlite")).expect("db pool");
    let catalog = Arc::new(KpiCatalog::standard());
    let assessments = AssessmentService::new(pool.clone(), Arc::clone(&catalog), AssessmentPolicy::default());
    let reports = ReportService::new(pool, catalog, Some(dir.path().join("reports"))).expect("report service");

    let period = PeriodKey::new(2024, 2).expect("period");
    assert!(assessments.fetch_submission("Nobody", &period).expect("fetch").is_none());
    assert!(reports.submission_report("Nobody", None).expect("report").is_none());
    let history = reports
        .score_history("Nobody", Default::default(), None)
        .expect("history");
    assert!(history.entries.is_empty());
    assert!(history.comparison.is_none());
}
