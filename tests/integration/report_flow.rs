use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use kpi_scorecard_lib::commands::{analytics, assessment, report, AppState};
use kpi_scorecard_lib::db::DbPool;
use kpi_scorecard_lib::models::assessment::SubmissionInput;
use kpi_scorecard_lib::models::catalog::KpiCatalog;
use kpi_scorecard_lib::models::employee::EmployeeIdentity;
use kpi_scorecard_lib::models::period::PeriodGranularity;
use kpi_scorecard_lib::models::report::{ExportFormat, OverallBand};
use kpi_scorecard_lib::services::assessment_service::AssessmentPolicy;
use tempfile::{tempdir, TempDir};

/// Met on these and Not Met elsewhere scores exactly 60.
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

fn seeded_state() -> (AppState, TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("reports.sqlite")).expect("db pool");
    let state = AppState::from_parts(
        pool,
        KpiCatalog::standard(),
        AssessmentPolicy::default(),
        Some(dir.path().join("reports")),
    )
    .expect("app state");

    submit(&state, "A. Smith", "Programming", "2024-02-01", Some(&SIXTY_POINT_KPIS[..]));
    submit(&state, "A. Smith", "Programming", "2024-05-01", None);
    submit(&state, "B. Jones", "Data Management", "2024-05-20", Some(&SIXTY_POINT_KPIS[..]));
    (state, dir)
}

/// `met: None` marks every KPI as Met.
fn submit(state: &AppState, name: &str, department: &str, date: &str, met: Option<&[&str]>) {
    let statuses: BTreeMap<String, String> = KpiCatalog::standard()
        .kpis()
        .map(|kpi| {
            let hit = met.map_or(true, |names| names.contains(&kpi.name.as_str()));
            let status = if hit { "Met" } else { "Not Met" };
            (kpi.name.clone(), status.to_string())
        })
        .collect();
    let mut employee = EmployeeIdentity::new(name, department);
    employee.employee_code = name.chars().next().map(|initial| format!("E-{initial}"));
    let input = SubmissionInput {
        employee,
        assessment_date: date.to_string(),
        statuses,
        ..SubmissionInput::default()
    };
    assessment::assessment_submit(state, input).expect("submit");
}

fn read(path: &str) -> String {
    assert!(Path::new(path).exists(), "{path} should exist");
    fs::read_to_string(path).expect("read export")
}

#[test]
fn history_compares_the_two_latest_quarters() {
    let (state, _dir) = seeded_state();

    let history = report::report_history(&state, "A. Smith", PeriodGranularity::Quarter, None)
        .expect("history");
    let periods: Vec<&str> = history.entries.iter().map(|entry| entry.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-Q2", "2024-Q1"]);

    let comparison = history.comparison.expect("comparison");
    assert_eq!(comparison.delta, 40.0);
    assert!((comparison.trend_pct - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(comparison.current.band, OverallBand::Outstanding);
    assert_eq!(comparison.previous.band, OverallBand::NeedsImprovement);

    let limited = report::report_history(&state, "A. Smith", PeriodGranularity::Quarter, Some(1))
        .expect("limited history");
    assert_eq!(limited.entries.len(), 1);
    assert!(limited.comparison.is_none());

    let latest_two = report::report_history(&state, "A. Smith", PeriodGranularity::Quarter, Some(2))
        .expect("two entries");
    assert_eq!(latest_two.entries.len(), 2);
    assert_eq!(latest_two.comparison.map(|c| c.delta), Some(40.0));

    let yearly = report::report_history(&state, "A. Smith", PeriodGranularity::Year, None)
        .expect("yearly history");
    assert_eq!(yearly.entries.len(), 1);
    assert_eq!(yearly.entries[0].period, "2024");
    assert_eq!(yearly.entries[0].total_score, 100.0);
    assert!(yearly.comparison.is_none());
}

#[test]
fn report_carries_comparison_and_benchmarks() {
    let (state, _dir) = seeded_state();

    let summary = report::report_fetch(&state, "A. Smith", Some("2024-Q2"))
        .expect("report")
        .expect("report exists");
    assert_eq!(summary.title.period, "2024-Q2");
    assert_eq!(summary.overall_score, 100.0);
    assert_eq!(summary.chart.labels.len(), 5);

    let benchmark = summary.benchmark.expect("benchmark");
    assert_eq!(benchmark.team_avg, Some(100.0));
    assert_eq!(benchmark.company_avg, Some(80.0));
    assert_eq!(benchmark.vs_company, Some(20.0));

    // An earlier period only compares against what came before it.
    let earlier = report::report_fetch(&state, "A. Smith", Some("2024-Q1"))
        .expect("report")
        .expect("report exists");
    assert_eq!(earlier.overall_score, 60.0);
    assert!(earlier.comparison.is_none());

    assert!(report::report_fetch(&state, "A. Smith", Some("2023-Q4"))
        .expect("report")
        .is_none());
}

#[test]
fn exports_are_written_to_the_reports_directory() {
    let (state, dir) = seeded_state();

    let raw = report::report_export(&state, "A. Smith", Some("2024-Q2"), ExportFormat::Csv)
        .expect("csv export")
        .expect("export written");
    assert_eq!(raw.rows, 20);
    assert!(raw.file_path.ends_with("a-smith-2024-Q2-kpi.csv"));
    assert!(Path::new(&raw.file_path).starts_with(dir.path().join("reports")));
    let content = read(&raw.file_path);
    assert!(content.starts_with("employee,department,assessment_date,period,category,kpi_name,status"));
    assert_eq!(content.lines().count(), 21);

    let summary = report::report_export(&state, "A. Smith", None, ExportFormat::SummaryCsv)
        .expect("summary export")
        .expect("export written");
    assert_eq!(summary.rows, 6);
    let content = read(&summary.file_path);
    let last = content.lines().last().expect("overall row");
    assert!(last.starts_with("Overall,100"));
    assert!(last.ends_with("Outstanding"));

    let markdown = report::report_export(&state, "B. Jones", None, ExportFormat::Markdown)
        .expect("markdown export")
        .expect("export written");
    assert!(markdown.file_path.ends_with("b-jones-2024-Q2-report.md"));
    let content = read(&markdown.file_path);
    assert!(content.contains("# KPI Assessment Report"));
    assert!(content.contains("Needs Improvement"));

    let json = report::report_export(&state, "B. Jones", Some("2024-Q2"), ExportFormat::Json)
        .expect("json export")
        .expect("export written");
    let value: serde_json::Value = serde_json::from_str(&read(&json.file_path)).expect("valid json");
    assert_eq!(value["overallScore"], 60.0);
    assert_eq!(value["title"]["department"], "Data Management");

    assert!(report::report_export(&state, "Nobody", None, ExportFormat::Json)
        .expect("export")
        .is_none());
}

#[test]
fn period_analytics_rank_and_distribute_scores() {
    let (state, _dir) = seeded_state();

    let analytics = analytics::period_analytics_get(&state, "2024-Q2").expect("analytics");
    let stats = analytics.stats.expect("stats");
    assert_eq!(stats.avg, 80.0);
    assert_eq!(stats.count, 2);
    assert_eq!(analytics.teams.len(), 2);

    assert_eq!(analytics.distribution.len(), 10);
    assert_eq!(analytics.distribution.iter().map(|bin| bin.count).sum::<usize>(), 2);
    assert_eq!(analytics.distribution[9].count, 1);
    assert_eq!(analytics.distribution[6].count, 1);

    assert_eq!(analytics.ranking[0].employee_name, "A. Smith");
    assert_eq!(analytics.ranking[0].rank, 1);
    assert_eq!(analytics.ranking[1].rank, 2);
    assert_eq!(analytics.above_target, 1);
    assert_eq!(analytics.category_averages.len(), 5);

    assert!(analytics.ranking[0].weak_areas.is_empty());
    let weak = &analytics.ranking[1].weak_areas;
    let categories: Vec<&str> = weak.iter().map(|area| area.category.as_str()).collect();
    assert_eq!(
        categories,
        vec!["Ownership & Initiative", "Learning & Growth", "Business & Impact Alignment"]
    );
    assert_eq!(weak[0].percent, 25.0);
    assert_eq!(
        weak[0].weak_kpis,
        vec!["Problem Solving", "Innovation & Continuous Improvement", "Dependability Index"]
    );
    assert_eq!(weak[1].weak_kpis.len(), 4);

    // Q1 company average was 60.
    let trend = analytics.company_trend_pct.expect("trend");
    assert!((trend - 100.0 / 3.0).abs() < 1e-9);

    let empty = analytics::period_analytics_get(&state, "2025-Q1").expect("empty analytics");
    assert!(empty.stats.is_none());
    assert!(empty.distribution.is_empty());
    assert!(empty.ranking.is_empty());
    assert_eq!(empty.above_target, 0);
}

#[test]
fn company_history_lists_every_period() {
    let (state, _dir) = seeded_state();
    let history = analytics::company_history_get(&state).expect("company history");
    let periods: Vec<&str> = history.iter().map(|row| row.period.as_str()).collect();
    assert!(periods.contains(&"2024-Q1"));
    assert!(periods.contains(&"2024-Q2"));

    let programming = analytics::team_history_get(&state, "Programming").expect("team history");
    assert_eq!(programming.len(), 2);
}
