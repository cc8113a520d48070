use serde::{Deserialize, Serialize};

use crate::models::assessment::KpiStatus;
use crate::models::snapshot::{CompanySnapshot, GroupStats, TeamPerformanceSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryBand {
    #[serde(rename = "On Track")]
    OnTrack,
    #[serde(rename = "Improve")]
    Improve,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
}

impl CategoryBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryBand::OnTrack => "On Track",
            CategoryBand::Improve => "Improve",
            CategoryBand::NeedsAttention => "Needs Attention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverallBand {
    #[serde(rename = "Outstanding")]
    Outstanding,
    #[serde(rename = "Exceeds Expectations")]
    ExceedsExpectations,
    #[serde(rename = "Meets Expectations")]
    MeetsExpectations,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
    #[serde(rename = "Unsatisfactory")]
    Unsatisfactory,
}

impl OverallBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallBand::Outstanding => "Outstanding",
            OverallBand::ExceedsExpectations => "Exceeds Expectations",
            OverallBand::MeetsExpectations => "Meets Expectations",
            OverallBand::NeedsImprovement => "Needs Improvement",
            OverallBand::Unsatisfactory => "Unsatisfactory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummaryRow {
    pub category: String,
    pub earned: f64,
    pub max: f64,
    pub percent: f64,
    pub status: CategoryBand,
}

/// Ratio-of-max per category, ready for a radar or bar chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Points per KPI laid out category by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiHeatmap {
    pub rows: Vec<KpiHeatmapRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiHeatmapRow {
    pub category: String,
    pub cells: Vec<KpiHeatmapCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiHeatmapCell {
    pub kpi_name: String,
    pub status: KpiStatus,
    pub points: f64,
    pub weight: f64,
}

/// Everything a dashboard or exporter needs for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub title: ReportTitle,
    pub overall_score: f64,
    pub band: OverallBand,
    pub categories: Vec<CategorySummaryRow>,
    pub chart: ChartSeries,
    pub heatmap: KpiHeatmap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PeriodComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Benchmark>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTitle {
    pub employee_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_code: Option<String>,
    pub department: String,
    pub assessment_date: String,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryEntry {
    pub period: String,
    pub assessment_date: String,
    pub total_score: f64,
    pub band: OverallBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub current: ScoreHistoryEntry,
    pub previous: ScoreHistoryEntry,
    pub delta: f64,
    pub trend_pct: f64,
}

/// Entity-vs-group deltas for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_team: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_company: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryResponse {
    pub employee_name: String,
    pub granularity: String,
    pub entries: Vec<ScoreHistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PeriodComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    pub category: String,
    pub avg_earned: f64,
    pub max: f64,
    pub avg_percent: f64,
}

/// A category below the improve threshold and the KPIs in it that were not met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakArea {
    pub category: String,
    pub percent: f64,
    pub weak_kpis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEmployee {
    pub rank: usize,
    pub employee_name: String,
    pub department: String,
    pub total_score: f64,
    pub band: OverallBand,
    pub status: CategoryBand,
    pub recommendation: String,
    pub weak_areas: Vec<WeakArea>,
}

/// Company-wide analytics for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAnalytics {
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<GroupStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanySnapshot>,
    pub teams: Vec<TeamPerformanceSnapshot>,
    /// Participants scoring at or above the on-track threshold.
    pub above_target: usize,
    pub distribution: Vec<HistogramBin>,
    pub category_averages: Vec<CategoryAverage>,
    pub ranking: Vec<RankedEmployee>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_trend_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    Csv,
    SummaryCsv,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv | ExportFormat::SummaryCsv => "csv",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "kpi",
            ExportFormat::SummaryCsv => "summary",
            ExportFormat::Markdown => "report",
            ExportFormat::Json => "report",
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Markdown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub file_path: String,
    pub format: ExportFormat,
    pub generated_at: String,
    pub rows: usize,
}
