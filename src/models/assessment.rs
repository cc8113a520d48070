use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::catalog::KpiCatalog;
use crate::models::employee::EmployeeIdentity;
use crate::models::period::PeriodKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KpiStatus {
    #[serde(rename = "Met")]
    Met,
    #[serde(rename = "Partial")]
    Partial,
    #[serde(rename = "Not Met")]
    NotMet,
}

impl KpiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiStatus::Met => "Met",
            KpiStatus::Partial => "Partial",
            KpiStatus::NotMet => "Not Met",
        }
    }
}

impl fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KpiStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "met" => Ok(KpiStatus::Met),
            "partial" => Ok(KpiStatus::Partial),
            "notmet" => Ok(KpiStatus::NotMet),
            _ => Err(AppError::invalid_status(value)),
        }
    }
}

/// How a manager answered a single KPI: a direct status pick, or an actual
/// measurement compared against the catalog target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KpiInput {
    Status(KpiStatus),
    Measurement(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiEntry {
    pub input: KpiInput,
    pub notes: Option<String>,
}

/// Entered-but-unsaved assessment. Owned by the caller and handed to the
/// scorer explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSubmission {
    pub employee: EmployeeIdentity,
    pub assessment_date: NaiveDate,
    entries: BTreeMap<String, KpiEntry>,
}

impl DraftSubmission {
    pub fn new(employee: EmployeeIdentity, assessment_date: NaiveDate) -> Self {
        Self {
            employee,
            assessment_date,
            entries: BTreeMap::new(),
        }
    }

    pub fn set_status(&mut self, kpi: impl Into<String>, status: KpiStatus) -> &mut Self {
        self.insert(kpi.into(), KpiInput::Status(status))
    }

    pub fn set_measurement(&mut self, kpi: impl Into<String>, actual: f64) -> &mut Self {
        self.insert(kpi.into(), KpiInput::Measurement(actual))
    }

    pub fn set_note(&mut self, kpi: &str, note: impl Into<String>) -> &mut Self {
        if let Some(entry) = self.entries.get_mut(kpi) {
            let note = note.into();
            entry.notes = Some(note).filter(|value| !value.trim().is_empty());
        }
        self
    }

    /// Answers every catalog KPI with the same status.
    pub fn fill_all(&mut self, catalog: &KpiCatalog, status: KpiStatus) -> &mut Self {
        for kpi in catalog.kpis() {
            self.set_status(kpi.name.clone(), status);
        }
        self
    }

    pub fn entry(&self, kpi: &str) -> Option<&KpiEntry> {
        self.entries.get(kpi)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn period(&self) -> PeriodKey {
        PeriodKey::from_date(self.assessment_date)
    }

    /// Catalog KPIs without an answer, in catalog order.
    pub fn missing_kpis(&self, catalog: &KpiCatalog) -> Vec<String> {
        catalog
            .kpis()
            .filter(|kpi| !self.entries.contains_key(&kpi.name))
            .map(|kpi| kpi.name.clone())
            .collect()
    }

    /// Answers naming KPIs the catalog does not know.
    pub fn unknown_kpis(&self, catalog: &KpiCatalog) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| catalog.kpi(name).is_none())
            .cloned()
            .collect()
    }

    fn insert(&mut self, kpi: String, input: KpiInput) -> &mut Self {
        let notes = self.entries.remove(&kpi).and_then(|entry| entry.notes);
        self.entries.insert(kpi, KpiEntry { input, notes });
        self
    }
}

/// Serialisable submission shape accepted from files and the command layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    #[serde(flatten)]
    pub employee: EmployeeIdentity,
    pub assessment_date: String,
    #[serde(default)]
    pub statuses: BTreeMap<String, String>,
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

impl SubmissionInput {
    pub fn into_draft(self) -> AppResult<DraftSubmission> {
        let assessment_date = parse_assessment_date(&self.assessment_date)?;
        let mut draft = DraftSubmission::new(self.employee, assessment_date);

        for (kpi, raw_status) in self.statuses {
            let status = raw_status.parse::<KpiStatus>()?;
            draft.set_status(kpi.trim().to_string(), status);
        }
        for (kpi, actual) in self.measurements {
            let kpi = kpi.trim().to_string();
            if draft.entry(&kpi).is_some() {
                return Err(AppError::validation(format!(
                    "KPI '{kpi}' has both a status and a measurement"
                )));
            }
            if !actual.is_finite() {
                return Err(AppError::validation(format!(
                    "measurement for '{kpi}' must be a finite number"
                )));
            }
            draft.set_measurement(kpi, actual);
        }
        for (kpi, note) in self.notes {
            draft.set_note(kpi.trim(), note);
        }

        Ok(draft)
    }
}

pub fn parse_assessment_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|err| {
        AppError::validation(format!("assessment date '{raw}' is not YYYY-MM-DD: {err}"))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredKpi {
    pub category: String,
    pub kpi_name: String,
    pub status: KpiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    pub points_earned: f64,
    pub kpi_weight: f64,
    pub category_weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub earned: f64,
    pub max: f64,
}

/// A draft after every answer has been resolved to points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSubmission {
    pub employee: EmployeeIdentity,
    pub assessment_date: NaiveDate,
    pub period: PeriodKey,
    pub kpis: Vec<ScoredKpi>,
    pub categories: Vec<CategoryTotal>,
    pub overall_score: f64,
}

/// One persisted row: one KPI of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: i64,
    pub submission_id: String,
    pub employee_id: i64,
    pub assessment_date: String,
    pub year: i32,
    pub quarter: u32,
    pub period: String,
    pub category: String,
    pub kpi_name: String,
    pub status: KpiStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    pub points_earned: f64,
    pub kpi_weight: f64,
    pub category_weight: f64,
    pub total_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

/// All rows of one employee/date submission as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubmission {
    pub submission_id: String,
    pub employee_id: i64,
    pub employee_name: String,
    pub department: String,
    pub assessment_date: String,
    pub period: String,
    pub total_score: f64,
    pub records: Vec<AssessmentRecord>,
}

/// Returned to the caller once a submission has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub submission_id: String,
    pub employee_id: i64,
    pub employee_name: String,
    pub department: String,
    pub assessment_date: String,
    pub period: String,
    pub overall_score: f64,
    pub band: String,
    pub rows_written: usize,
    pub replaced_rows: usize,
}
