pub mod analytics;
pub mod assessment;
pub mod employee;
pub mod report;
pub mod system;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::catalog::KpiCatalog;
use crate::models::period::PeriodKey;
use crate::services::analytics_service::AnalyticsService;
use crate::services::assessment_service::{AssessmentPolicy, AssessmentService};
use crate::services::employee_service::EmployeeService;
use crate::services::report_service::ReportService;

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    catalog: Arc<KpiCatalog>,
    assessment_service: Arc<AssessmentService>,
    employee_service: Arc<EmployeeService>,
    report_service: Arc<ReportService>,
    analytics_service: Arc<AnalyticsService>,
}

impl AppState {
    /// Opens the store named by `config` (running migrations) and wires the services.
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let catalog = config.load_catalog()?;
        let db_pool = DbPool::with_options(&config.database.path, config.connection_options())?;
        Self::from_parts(
            db_pool,
            catalog,
            config.assessment_policy(),
            Some(config.reports_dir()),
        )
    }

    pub fn from_parts(
        db_pool: DbPool,
        catalog: KpiCatalog,
        policy: AssessmentPolicy,
        reports_dir: Option<PathBuf>,
    ) -> AppResult<Self> {
        let catalog = Arc::new(catalog);
        let assessment_service = Arc::new(AssessmentService::new(
            db_pool.clone(),
            Arc::clone(&catalog),
            policy,
        ));
        let employee_service = Arc::new(EmployeeService::new(db_pool.clone()));
        let report_service = Arc::new(ReportService::new(
            db_pool.clone(),
            Arc::clone(&catalog),
            reports_dir,
        )?);
        let analytics_service = Arc::new(AnalyticsService::new(db_pool.clone(), Arc::clone(&catalog)));

        Ok(Self {
            db_pool,
            catalog,
            assessment_service,
            employee_service,
            report_service,
            analytics_service,
        })
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub fn catalog(&self) -> Arc<KpiCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn assessments(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessment_service)
    }

    pub fn employees(&self) -> Arc<EmployeeService> {
        Arc::clone(&self.employee_service)
    }

    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.report_service)
    }

    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics_service)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::IncompleteSubmission { missing } => CommandError::new(
                "INCOMPLETE_SUBMISSION",
                format!("submission is missing {} KPI status(es)", missing.len()),
                Some(serde_json::json!({ "missing": missing })),
            ),
            AppError::InvalidStatus { value } => CommandError::new(
                "INVALID_STATUS",
                format!("'{value}' is not one of Met, Partial, Not Met"),
                Some(serde_json::json!({ "value": value })),
            ),
            AppError::UnknownKpi { name } => CommandError::new(
                "UNKNOWN_KPI",
                format!("'{name}' is not in the KPI catalog"),
                Some(serde_json::json!({ "kpi": name })),
            ),
            AppError::NotFound => CommandError::new("NOT_FOUND", "the requested record does not exist", None),
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::StorageLocked { message } => {
                warn!(target: "app::command", %message, "storage locked in command");
                CommandError::new("STORAGE_LOCKED", message, None)
            }
            AppError::StorageUnavailable { attempts, message } => {
                error!(target: "app::command", attempts, %message, "storage unavailable in command");
                CommandError::new(
                    "STORAGE_UNAVAILABLE",
                    message,
                    Some(serde_json::json!({ "attempts": attempts })),
                )
            }
            AppError::Config(message) => CommandError::new("CONFIG_ERROR", message, None),
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "serialization failed", None)
            }
            AppError::Csv(error) => {
                error!(target: "app::command", error = %error, "csv error in command");
                CommandError::new("UNKNOWN", "csv export failed", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", format!("file system error: {error}"), None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

pub(crate) fn run<T>(task: impl FnOnce() -> AppResult<T>) -> CommandResult<T> {
    task().map_err(CommandError::from)
}

pub(crate) fn parse_period(raw: &str) -> AppResult<PeriodKey> {
    raw.parse()
}

pub(crate) fn parse_optional_period(raw: Option<&str>) -> AppResult<Option<PeriodKey>> {
    raw.map(parse_period).transpose()
}
