use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_code: Option<String>,
    pub department: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Who a submission is for. Name is the natural key; metadata is refreshed on
/// every submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeIdentity {
    pub name: String,
    pub department: String,
    #[serde(default)]
    pub employee_code: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub hire_date: Option<String>,
}

impl EmployeeIdentity {
    pub fn new(name: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            department: department.into(),
            ..Self::default()
        }
    }

    /// Trims every field, drops blank optionals, and rejects a missing name or department.
    pub fn normalized(&self) -> AppResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("employee name is required"));
        }
        let department = self.department.trim().to_string();
        if department.is_empty() {
            return Err(AppError::validation("department is required"));
        }
        if let Some(hire_date) = non_blank(&self.hire_date) {
            chrono::NaiveDate::parse_from_str(&hire_date, "%Y-%m-%d").map_err(|err| {
                AppError::validation(format!("hire date '{hire_date}' is not YYYY-MM-DD: {err}"))
            })?;
        }

        Ok(Self {
            name,
            department,
            employee_code: non_blank(&self.employee_code),
            position: non_blank(&self.position),
            manager: non_blank(&self.manager),
            hire_date: non_blank(&self.hire_date),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRemoval {
    pub name: String,
    pub removed: bool,
    pub assessment_rows_removed: usize,
}
