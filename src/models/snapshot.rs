use serde::{Deserialize, Serialize};

/// Unweighted statistics over a set of per-employee overall scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPerformanceSnapshot {
    pub department: String,
    pub period: String,
    #[serde(flatten)]
    pub stats: GroupStats,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySnapshot {
    pub period: String,
    #[serde(flatten)]
    pub stats: GroupStats,
    pub department_count: usize,
    pub updated_at: String,
}

/// An employee's score for one period: the total of their latest submission in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePeriodScore {
    pub employee_id: i64,
    pub employee_name: String,
    pub department: String,
    pub period: String,
    pub submission_id: String,
    pub assessment_date: String,
    pub total_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRefresh {
    pub period: String,
    pub teams: Vec<TeamPerformanceSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanySnapshot>,
}
