use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{ConnectionOptions, RetryPolicy};
use crate::error::{AppError, AppResult};
use crate::models::catalog::KpiCatalog;
use crate::services::assessment_service::AssessmentPolicy;
use crate::services::report_service::default_reports_dir;

pub const CONFIG_ENV: &str = "KPI_CONFIG";
pub const DB_PATH_ENV: &str = "KPI_DB_PATH";
pub const LOG_DIR_ENV: &str = "KPI_LOG_DIR";
pub const REPORTS_DIR_ENV: &str = "KPI_REPORTS_DIR";

/// Top-level configuration. Every section has defaults, so an empty YAML
/// document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub assessment: AssessmentConfig,
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data").join("kpi.sqlite"),
            busy_timeout_ms: 5_000,
            retry_attempts: 3,
            retry_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub directives: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            directives: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentConfig {
    pub require_complete: bool,
    pub allowed_departments: Vec<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            require_complete: true,
            allowed_departments: Vec::new(),
            catalog_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportsConfig {
    /// Defaults to a `reports` directory beside the database.
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then the YAML file (`explicit` or `$KPI_CONFIG`), then
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> AppResult<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::config(format!("cannot read config file {}: {err}", path.display()))
        })?;
        let config = Self::from_yaml_str(&raw)?;
        info!(target: "app::config", path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Applies `KPI_DB_PATH`, `KPI_LOG_DIR` and `KPI_REPORTS_DIR` as
    /// returned by `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = value(DB_PATH_ENV) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dir) = value(LOG_DIR_ENV) {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(dir) = value(REPORTS_DIR_ENV) {
            self.reports.dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(AppError::config("database.path must not be empty"));
        }
        if self.database.retry_attempts == 0 {
            return Err(AppError::config("database.retryAttempts must be at least 1"));
        }
        if self.logging.dir.as_os_str().is_empty() {
            return Err(AppError::config("logging.dir must not be empty"));
        }
        if let Some(dir) = &self.reports.dir {
            if dir.as_os_str().is_empty() {
                return Err(AppError::config("reports.dir must not be empty"));
            }
        }
        if self
            .assessment
            .allowed_departments
            .iter()
            .any(|department| department.trim().is_empty())
        {
            return Err(AppError::config("assessment.allowedDepartments contains a blank entry"));
        }
        Ok(())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            retry: RetryPolicy::new(
                self.database.retry_attempts,
                Duration::from_millis(self.database.retry_delay_ms),
            ),
        }
    }

    pub fn assessment_policy(&self) -> AssessmentPolicy {
        AssessmentPolicy {
            require_complete: self.assessment.require_complete,
            allowed_departments: self
                .assessment
                .allowed_departments
                .iter()
                .map(|department| department.trim().to_string())
                .collect(),
        }
    }

    /// The configured catalog file, or the built-in catalog.
    pub fn load_catalog(&self) -> AppResult<KpiCatalog> {
        match &self.assessment.catalog_path {
            Some(path) => KpiCatalog::from_yaml_path(path),
            None => Ok(KpiCatalog::standard()),
        }
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.reports
            .dir
            .clone()
            .unwrap_or_else(|| default_reports_dir(&self.database.path))
    }
}
