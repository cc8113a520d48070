use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::commands::{self, AppState, CommandError};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::assessment::SubmissionInput;
use crate::models::period::PeriodGranularity;
use crate::models::report::ExportFormat;
use crate::utils::logger;

#[derive(Parser, Debug)]
#[command(
    name = "kpi-scorecard",
    about = "Score employee KPI assessments and roll them up by team and company",
    version
)]
pub struct Cli {
    /// YAML configuration file (falls back to $KPI_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the configured SQLite database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or upgrade the database and print its schema status
    Init,
    /// Print the KPI catalog with weights and targets
    Catalog,
    /// Score an assessment and store it (or only preview it with --dry-run)
    Submit(SubmitArgs),
    /// Show a stored submission
    Show(ShowArgs),
    /// Delete the submission recorded for an employee on a date
    Delete {
        #[arg(long)]
        employee: String,
        /// Assessment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
    /// Dashboard report for an employee's submission
    Report {
        #[arg(long)]
        employee: String,
        /// Period such as 2024-Q3 (defaults to the latest submission)
        #[arg(long)]
        period: Option<String>,
    },
    /// Score history of an employee with the latest period-over-period change
    History {
        #[arg(long)]
        employee: String,
        /// Bucket size: quarter or year
        #[arg(long, default_value = "quarter", value_parser = parse_granularity)]
        by: PeriodGranularity,
        /// Only return the most recent N buckets
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List or remove employees
    Employees {
        #[command(subcommand)]
        command: EmployeesCommand,
    },
    /// Team snapshots for a period, or the history of one department
    Team {
        #[arg(long)]
        period: Option<String>,
        #[arg(long, conflicts_with = "period")]
        department: Option<String>,
    },
    /// Company snapshot for a period, or every period when omitted
    Company {
        #[arg(long)]
        period: Option<String>,
    },
    /// Distribution, category averages and ranking for a period
    Analytics {
        #[arg(long)]
        period: String,
    },
    /// Write a submission to the reports directory
    Export {
        #[arg(long)]
        employee: String,
        #[arg(long)]
        period: Option<String>,
        /// csv, summary-csv, markdown or json
        #[arg(long, default_value = "markdown", value_parser = parse_format)]
        format: ExportFormat,
    },
    /// Rebuild team and company snapshots from stored submissions
    Recompute {
        #[arg(long)]
        period: Option<String>,
    },
    /// List applied schema migrations
    Migrations,
}

#[derive(Subcommand, Debug)]
pub enum EmployeesCommand {
    /// List employees, optionally for one department
    List {
        #[arg(long)]
        department: Option<String>,
    },
    /// List departments with at least one employee
    Departments,
    /// Remove an employee and every assessment row they own
    Remove {
        #[arg(long)]
        name: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct SubmitArgs {
    /// YAML or JSON submission document
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long)]
    pub employee: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    /// Assessment date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
    /// KPI status as NAME=STATUS, repeatable
    #[arg(long = "status", value_name = "NAME=STATUS")]
    pub statuses: Vec<String>,
    /// Measured value as NAME=NUMBER, repeatable
    #[arg(long = "measure", value_name = "NAME=NUMBER")]
    pub measurements: Vec<String>,
    /// Score without storing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long)]
    pub employee: String,
    /// Period such as 2024-Q3 (defaults to the current quarter)
    #[arg(long)]
    pub period: Option<String>,
    /// Exact assessment date; wins over --period
    #[arg(long)]
    pub date: Option<String>,
}

fn parse_granularity(raw: &str) -> Result<PeriodGranularity, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "quarter" => Ok(PeriodGranularity::Quarter),
        "year" => Ok(PeriodGranularity::Year),
        other => Err(format!("'{other}' is not quarter or year")),
    }
}

fn parse_format(raw: &str) -> Result<ExportFormat, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "csv" => Ok(ExportFormat::Csv),
        "summary-csv" => Ok(ExportFormat::SummaryCsv),
        "markdown" | "md" => Ok(ExportFormat::Markdown),
        "json" => Ok(ExportFormat::Json),
        other => Err(format!("'{other}' is not csv, summary-csv, markdown or json")),
    }
}

fn split_pair(raw: &str) -> AppResult<(String, String)> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .ok_or_else(|| AppError::validation(format!("'{raw}' is not NAME=VALUE")))
}

impl SubmitArgs {
    /// The file document (if any) with flags layered on top.
    pub fn into_input(self) -> AppResult<SubmissionInput> {
        let mut input = match &self.file {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                serde_yaml::from_str::<SubmissionInput>(&raw).map_err(|err| {
                    AppError::validation(format!(
                        "submission file {} is malformed: {err}",
                        path.display()
                    ))
                })?
            }
            None => SubmissionInput::default(),
        };

        if let Some(name) = self.employee {
            input.employee.name = name;
        }
        if let Some(department) = self.department {
            input.employee.department = department;
        }
        if let Some(date) = self.date {
            input.assessment_date = date;
        }
        for raw in &self.statuses {
            let (kpi, status) = split_pair(raw)?;
            input.statuses.insert(kpi, status);
        }
        for raw in &self.measurements {
            let (kpi, value) = split_pair(raw)?;
            let actual = value
                .parse::<f64>()
                .map_err(|_| AppError::validation(format!("measurement for '{kpi}' is not a number")))?;
            input.measurements.insert(kpi, actual);
        }
        Ok(input)
    }
}

fn emit<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value).map_err(AppError::from)?;
    println!("{rendered}");
    Ok(())
}

/// Loads configuration, starts logging, opens the store and dispatches.
pub fn execute(cli: Cli) -> Result<(), CommandError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.db {
        config.database.path = path;
    }
    logger::init_logging(&config.logging.dir, config.logging.directives.as_deref())?;

    let state = AppState::new(&config)?;
    info!(
        target: "app::cli",
        database = %config.database.path.display(),
        "store ready"
    );
    dispatch(&state, cli.command)
}

pub fn dispatch(state: &AppState, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Init | Command::Migrations => emit(&commands::system::schema_status(state)?),
        Command::Catalog => emit(&commands::assessment::catalog_get(state)?),
        Command::Submit(args) => {
            let dry_run = args.dry_run;
            let input = args.into_input()?;
            if dry_run {
                emit(&commands::assessment::assessment_preview(state, input)?)
            } else {
                emit(&commands::assessment::assessment_submit(state, input)?)
            }
        }
        Command::Show(args) => emit(&commands::assessment::assessment_fetch(
            state,
            &args.employee,
            args.period.as_deref(),
            args.date.as_deref(),
        )?),
        Command::Delete { employee, date } => {
            let removed = commands::assessment::assessment_delete(state, &employee, &date)?;
            emit(&serde_json::json!({ "employee": employee, "date": date, "removed": removed }))
        }
        Command::Report { employee, period } => emit(&commands::report::report_fetch(
            state,
            &employee,
            period.as_deref(),
        )?),
        Command::History { employee, by, limit } => emit(&commands::report::report_history(
            state, &employee, by, limit,
        )?),
        Command::Employees { command } => match command {
            EmployeesCommand::List { department } => emit(&commands::employee::employees_list(
                state,
                department.as_deref(),
            )?),
            EmployeesCommand::Departments => emit(&commands::employee::departments_list(state)?),
            EmployeesCommand::Remove { name } => {
                emit(&commands::employee::employee_remove(state, &name)?)
            }
        },
        Command::Team { period, department } => match department {
            Some(department) => emit(&commands::analytics::team_history_get(state, &department)?),
            None => emit(&commands::analytics::team_snapshots_get(state, period.as_deref())?),
        },
        Command::Company { period } => match period {
            Some(period) => emit(&commands::analytics::company_snapshot_get(state, &period)?),
            None => emit(&commands::analytics::company_history_get(state)?),
        },
        Command::Analytics { period } => {
            emit(&commands::analytics::period_analytics_get(state, &period)?)
        }
        Command::Export {
            employee,
            period,
            format,
        } => emit(&commands::report::report_export(
            state,
            &employee,
            period.as_deref(),
            format,
        )?),
        Command::Recompute { period } => emit(&commands::assessment::snapshots_recompute(
            state,
            period.as_deref(),
        )?),
    }
}
