use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::db::repositories::assessment_repository::AssessmentRepository;
use crate::db::repositories::employee_repository::EmployeeRepository;
use crate::db::repositories::snapshot_repository::SnapshotRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::assessment::{AssessmentRecord, CategoryTotal, StoredSubmission};
use crate::models::catalog::KpiCatalog;
use crate::models::employee::EmployeeRecord;
use crate::models::period::{PeriodGranularity, PeriodKey};
use crate::models::report::{
    ChartSeries, CategorySummaryRow, ExportFormat, ExportResult, KpiHeatmap, KpiHeatmapCell,
    KpiHeatmapRow, ReportTitle, ScoreHistoryEntry, ScoreHistoryResponse, SubmissionReport,
};
use crate::services::{aggregation, comparison, grading};

static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

pub struct ReportService {
    db: DbPool,
    catalog: Arc<KpiCatalog>,
    reports_dir: PathBuf,
}

struct LoadedSubmission {
    employee: EmployeeRecord,
    submission: StoredSubmission,
    report: SubmissionReport,
}

impl ReportService {
    pub fn new(db: DbPool, catalog: Arc<KpiCatalog>, reports_dir: Option<PathBuf>) -> AppResult<Self> {
        let reports_dir = reports_dir.unwrap_or_else(|| default_reports_dir(db.path()));
        fs::create_dir_all(&reports_dir)?;
        Ok(Self {
            db,
            catalog,
            reports_dir,
        })
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Dashboard view of one submission: the latest in `period`, or the
    /// employee's latest overall. `None` when there is nothing to show.
    pub fn submission_report(
        &self,
        employee_name: &str,
        period: Option<&PeriodKey>,
    ) -> AppResult<Option<SubmissionReport>> {
        self.db
            .with_connection(|conn| Ok(self.load(conn, employee_name, period)?.map(|loaded| loaded.report)))
    }

    /// Per-bucket history, most recent first, with the comparison of the two
    /// most recent buckets. With `limit`, the comparison only draws on the
    /// entries that are returned.
    pub fn score_history(
        &self,
        employee_name: &str,
        granularity: PeriodGranularity,
        limit: Option<usize>,
    ) -> AppResult<ScoreHistoryResponse> {
        let entries = self.db.with_connection(|conn| {
            let Some(employee) = EmployeeRepository::find_by_name(conn, employee_name)? else {
                return Ok(Vec::new());
            };
            let submissions = AssessmentRepository::list_employee_submissions(conn, employee.id)?;
            Ok(aggregation::score_history(&submissions, granularity))
        })?;

        let entries = match limit {
            Some(n) => comparison::recent(&entries, n).to_vec(),
            None => entries,
        };
        let comparison = comparison::compare(&entries);

        Ok(ScoreHistoryResponse {
            employee_name: employee_name.trim().to_string(),
            granularity: granularity.as_str().to_string(),
            entries,
            comparison,
        })
    }

    /// Writes one submission to the reports directory. `None` when the
    /// employee or period has no submission.
    pub fn export_submission(
        &self,
        employee_name: &str,
        period: Option<&PeriodKey>,
        format: ExportFormat,
    ) -> AppResult<Option<ExportResult>> {
        let Some(loaded) = self
            .db
            .with_connection(|conn| self.load(conn, employee_name, period))?
        else {
            return Ok(None);
        };

        let filename = format!(
            "{}-{}-{}.{}",
            slugify(&loaded.employee.name),
            loaded.submission.period,
            format.file_suffix(),
            format.file_extension()
        );
        let path = self.reports_dir.join(filename);

        let rows = match format {
            ExportFormat::Csv => write_raw_csv(&path, &loaded.employee, &loaded.submission.records)?,
            ExportFormat::SummaryCsv => write_summary_csv(&path, &loaded.report)?,
            ExportFormat::Markdown => {
                fs::write(&path, render_markdown_report(&loaded.report))?;
                loaded.report.categories.len()
            }
            ExportFormat::Json => {
                fs::write(&path, serde_json::to_string_pretty(&loaded.report)?)?;
                loaded.report.categories.len()
            }
        };

        info!(
            target: "app::report",
            employee = %loaded.employee.name,
            period = %loaded.submission.period,
            path = %path.display(),
            rows,
            "report exported"
        );

        Ok(Some(ExportResult {
            file_path: path.to_string_lossy().to_string(),
            format,
            generated_at: Utc::now().to_rfc3339(),
            rows,
        }))
    }

    fn load(
        &self,
        conn: &Connection,
        employee_name: &str,
        period: Option<&PeriodKey>,
    ) -> AppResult<Option<LoadedSubmission>> {
        let Some(employee) = EmployeeRepository::find_by_name(conn, employee_name)? else {
            return Ok(None);
        };

        let submissions = AssessmentRepository::list_employee_submissions(conn, employee.id)?;
        let submission = match period {
            Some(period) => AssessmentRepository::find_latest_in_period(conn, employee.id, &period.to_string())?,
            None => match submissions.last() {
                Some(latest) => AssessmentRepository::find_submission(conn, employee.id, &latest.assessment_date)?,
                None => None,
            },
        };
        let Some(submission) = submission else {
            return Ok(None);
        };

        let history: Vec<ScoreHistoryEntry> = aggregation::score_history(&submissions, PeriodGranularity::Quarter)
            .into_iter()
            .filter(|entry| entry.period <= submission.period)
            .collect();
        let team_avg = SnapshotRepository::find_team(conn, &submission.department, &submission.period)?
            .map(|team| team.stats.avg);
        let company_avg = SnapshotRepository::find_company(conn, &submission.period)?.map(|company| company.stats.avg);

        let report = build_report(&self.catalog, &employee, &submission, &history, team_avg, company_avg);
        Ok(Some(LoadedSubmission {
            employee,
            submission,
            report,
        }))
    }
}

pub fn default_reports_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(|dir| dir.join("reports"))
        .unwrap_or_else(|| std::env::temp_dir().join("kpi-scorecard"))
}

pub fn build_report(
    catalog: &KpiCatalog,
    employee: &EmployeeRecord,
    submission: &StoredSubmission,
    history: &[ScoreHistoryEntry],
    team_avg: Option<f64>,
    company_avg: Option<f64>,
) -> SubmissionReport {
    let totals = aggregation::category_totals_from_records(catalog, &submission.records);
    let overall_score = submission.total_score;

    SubmissionReport {
        title: ReportTitle {
            employee_name: employee.name.clone(),
            employee_code: employee.employee_code.clone(),
            department: submission.department.clone(),
            assessment_date: submission.assessment_date.clone(),
            period: submission.period.clone(),
        },
        overall_score,
        band: grading::overall_band(overall_score),
        categories: category_summary(&totals),
        chart: chart_series(&totals),
        heatmap: kpi_heatmap(&submission.records),
        comparison: comparison::compare(history),
        benchmark: (team_avg.is_some() || company_avg.is_some())
            .then(|| comparison::benchmark(overall_score, team_avg, company_avg)),
    }
}

pub fn category_summary(totals: &[CategoryTotal]) -> Vec<CategorySummaryRow> {
    totals
        .iter()
        .map(|total| CategorySummaryRow {
            category: total.category.clone(),
            earned: total.earned,
            max: total.max,
            percent: grading::percent_of(total.earned, total.max),
            status: grading::status_band(total.earned, total.max),
        })
        .collect()
}

/// Ratio-of-max per category, as a percentage.
pub fn chart_series(totals: &[CategoryTotal]) -> ChartSeries {
    ChartSeries {
        labels: totals.iter().map(|total| total.category.clone()).collect(),
        values: totals
            .iter()
            .map(|total| grading::percent_of(total.earned, total.max))
            .collect(),
    }
}

/// Category × KPI matrix of earned points, rows in first-seen order.
pub fn kpi_heatmap(records: &[AssessmentRecord]) -> KpiHeatmap {
    let mut rows: Vec<KpiHeatmapRow> = Vec::new();
    for record in records {
        let cell = KpiHeatmapCell {
            kpi_name: record.kpi_name.clone(),
            status: record.status,
            points: record.points_earned,
            weight: record.kpi_weight,
        };
        match rows.iter_mut().find(|row| row.category == record.category) {
            Some(row) => row.cells.push(cell),
            None => rows.push(KpiHeatmapRow {
                category: record.category.clone(),
                cells: vec![cell],
            }),
        }
    }
    KpiHeatmap { rows }
}

pub fn render_markdown_report(report: &SubmissionReport) -> String {
    let title = &report.title;
    let mut content = String::new();
    content.push_str("# KPI Assessment Report\n\n");
    content.push_str(&format!("- Employee: {}\n", title.employee_name));
    if let Some(code) = &title.employee_code {
        content.push_str(&format!("- Employee code: {code}\n"));
    }
    content.push_str(&format!(
        "- Department: {}\n- Assessment date: {}\n- Period: {}\n- Overall score: {:.2}\n- Rating: {}\n\n",
        title.department,
        title.assessment_date,
        title.period,
        report.overall_score,
        report.band.as_str()
    ));

    content.push_str("## Category Summary\n\n");
    content.push_str("| Category | Earned | Max | Percent | Status |\n");
    content.push_str("|---|---:|---:|---:|---|\n");
    for row in &report.categories {
        content.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.1}% | {} |\n",
            row.category,
            row.earned,
            row.max,
            row.percent,
            row.status.as_str()
        ));
    }
    content.push('\n');

    content.push_str("## KPI Detail\n\n");
    for row in &report.heatmap.rows {
        content.push_str(&format!("### {}\n", row.category));
        for cell in &row.cells {
            content.push_str(&format!(
                "- {}: {} ({:.3} / {:.3})\n",
                cell.kpi_name, cell.status, cell.points, cell.weight
            ));
        }
        content.push('\n');
    }

    if let Some(comparison) = &report.comparison {
        content.push_str("## Trend\n\n");
        content.push_str(&format!(
            "- {}: {:.2}\n- {}: {:.2}\n- Change: {:+.2} ({:+.1}%)\n\n",
            comparison.current.period,
            comparison.current.total_score,
            comparison.previous.period,
            comparison.previous.total_score,
            comparison.delta,
            comparison.trend_pct
        ));
    }

    if let Some(benchmark) = &report.benchmark {
        content.push_str("## Benchmark\n\n");
        if let (Some(avg), Some(delta)) = (benchmark.team_avg, benchmark.vs_team) {
            content.push_str(&format!("- Team average: {avg:.2} ({delta:+.2})\n"));
        }
        if let (Some(avg), Some(delta)) = (benchmark.company_avg, benchmark.vs_company) {
            content.push_str(&format!("- Company average: {avg:.2} ({delta:+.2})\n"));
        }
    }

    content
}

#[derive(Serialize)]
struct RawCsvRow<'a> {
    employee: &'a str,
    department: &'a str,
    assessment_date: &'a str,
    period: &'a str,
    category: &'a str,
    kpi_name: &'a str,
    status: &'a str,
    actual_value: Option<f64>,
    points_earned: f64,
    kpi_weight: f64,
    category_weight: f64,
    total_score: f64,
    notes: Option<&'a str>,
}

#[derive(Serialize)]
struct SummaryCsvRow<'a> {
    category: &'a str,
    earned: f64,
    max: f64,
    percent: f64,
    status: &'a str,
}

fn write_raw_csv(path: &Path, employee: &EmployeeRecord, records: &[AssessmentRecord]) -> AppResult<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(RawCsvRow {
            employee: &employee.name,
            department: &employee.department,
            assessment_date: &record.assessment_date,
            period: &record.period,
            category: &record.category,
            kpi_name: &record.kpi_name,
            status: record.status.as_str(),
            actual_value: record.actual_value,
            points_earned: record.points_earned,
            kpi_weight: record.kpi_weight,
            category_weight: record.category_weight,
            total_score: record.total_score,
            notes: record.notes.as_deref(),
        })?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// One row per category, then an `Overall` row carrying the score and rating.
fn write_summary_csv(path: &Path, report: &SubmissionReport) -> AppResult<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in &report.categories {
        writer.serialize(SummaryCsvRow {
            category: &row.category,
            earned: row.earned,
            max: row.max,
            percent: row.percent,
            status: row.status.as_str(),
        })?;
    }
    writer.serialize(SummaryCsvRow {
        category: "Overall",
        earned: report.overall_score,
        max: 100.0,
        percent: report.overall_score,
        status: report.band.as_str(),
    })?;
    writer.flush()?;
    Ok(report.categories.len() + 1)
}

fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = SLUG_SEPARATORS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "employee".to_string()
    } else {
        slug.to_string()
    }
}
