use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::repositories::assessment_repository::AssessmentRepository;
use crate::db::repositories::employee_repository::EmployeeRepository;
use crate::db::repositories::snapshot_repository::SnapshotRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::assessment::{
    AssessmentRecord, DraftSubmission, ScoredSubmission, StoredSubmission, SubmissionReceipt,
};
use crate::models::catalog::KpiCatalog;
use crate::models::period::PeriodKey;
use crate::models::snapshot::{CompanySnapshot, SnapshotRefresh, TeamPerformanceSnapshot};
use crate::services::{aggregation, grading, scoring};

/// What a submission must satisfy before it is written.
#[derive(Debug, Clone)]
pub struct AssessmentPolicy {
    pub require_complete: bool,
    /// Empty means any department is accepted.
    pub allowed_departments: Vec<String>,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            require_complete: true,
            allowed_departments: Vec::new(),
        }
    }
}

pub struct AssessmentService {
    db: DbPool,
    catalog: Arc<KpiCatalog>,
    policy: AssessmentPolicy,
}

impl AssessmentService {
    pub fn new(db: DbPool, catalog: Arc<KpiCatalog>, policy: AssessmentPolicy) -> Self {
        Self {
            db,
            catalog,
            policy,
        }
    }

    pub fn catalog(&self) -> &KpiCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &AssessmentPolicy {
        &self.policy
    }

    /// Scores the draft without touching storage.
    pub fn preview(&self, draft: &DraftSubmission) -> AppResult<ScoredSubmission> {
        let scored = scoring::score_draft(&self.catalog, draft, self.policy.require_complete)?;
        self.ensure_department_allowed(&scored.employee.department)?;
        Ok(scored)
    }

    /// Scores and persists a submission. An existing submission for the same
    /// employee and date is replaced, and the period's team and company
    /// snapshots are recomputed, all in one transaction.
    pub fn submit(&self, draft: &DraftSubmission) -> AppResult<SubmissionReceipt> {
        let scored = self.preview(draft)?;
        let assessment_date = scored.assessment_date.format("%Y-%m-%d").to_string();
        let period = scored.period.to_string();

        let receipt = self.db.write_transaction("save_submission", |tx| {
            let previous = EmployeeRepository::find_by_name(tx, &scored.employee.name)?;
            let employee = EmployeeRepository::upsert_by_name(tx, &scored.employee)?;
            let replaced_rows = AssessmentRepository::delete_submission(tx, employee.id, &assessment_date)?;

            let submission_id = Uuid::new_v4().to_string();
            let created_at = Utc::now().to_rfc3339();
            for kpi in &scored.kpis {
                let record = AssessmentRecord {
                    id: 0,
                    submission_id: submission_id.clone(),
                    employee_id: employee.id,
                    assessment_date: assessment_date.clone(),
                    year: scored.period.year,
                    quarter: scored.period.quarter,
                    period: period.clone(),
                    category: kpi.category.clone(),
                    kpi_name: kpi.kpi_name.clone(),
                    status: kpi.status,
                    actual_value: kpi.actual_value,
                    points_earned: kpi.points_earned,
                    kpi_weight: kpi.kpi_weight,
                    category_weight: kpi.category_weight,
                    total_score: scored.overall_score,
                    notes: kpi.notes.clone(),
                    created_at: created_at.clone(),
                };
                AssessmentRepository::insert(tx, &record)?;
            }

            let department_changed = previous
                .as_ref()
                .is_some_and(|record| record.department != employee.department);
            if department_changed {
                for other in AssessmentRepository::periods_for_employee(tx, employee.id)? {
                    refresh_period_snapshots(tx, &other)?;
                }
            } else {
                refresh_period_snapshots(tx, &period)?;
            }

            Ok(SubmissionReceipt {
                submission_id,
                employee_id: employee.id,
                employee_name: employee.name.clone(),
                department: employee.department.clone(),
                assessment_date: assessment_date.clone(),
                period: period.clone(),
                overall_score: scored.overall_score,
                band: grading::overall_band(scored.overall_score).as_str().to_string(),
                rows_written: scored.kpis.len(),
                replaced_rows,
            })
        })?;

        info!(
            target: "app::assessment",
            employee = %receipt.employee_name,
            period = %receipt.period,
            overall_score = receipt.overall_score,
            replaced_rows = receipt.replaced_rows,
            "submission saved"
        );

        Ok(receipt)
    }

    /// The employee's latest submission in `period`; `None` when either is unknown.
    pub fn fetch_submission(&self, employee_name: &str, period: &PeriodKey) -> AppResult<Option<StoredSubmission>> {
        self.db.with_connection(|conn| {
            let Some(employee) = EmployeeRepository::find_by_name(conn, employee_name)? else {
                return Ok(None);
            };
            AssessmentRepository::find_latest_in_period(conn, employee.id, &period.to_string())
        })
    }

    pub fn fetch_submission_on(&self, employee_name: &str, date: NaiveDate) -> AppResult<Option<StoredSubmission>> {
        self.db.with_connection(|conn| {
            let Some(employee) = EmployeeRepository::find_by_name(conn, employee_name)? else {
                return Ok(None);
            };
            AssessmentRepository::find_submission(conn, employee.id, &date.format("%Y-%m-%d").to_string())
        })
    }

    /// Removes one submission and refreshes its period. `false` when nothing matched.
    pub fn delete_submission(&self, employee_name: &str, date: NaiveDate) -> AppResult<bool> {
        let assessment_date = date.format("%Y-%m-%d").to_string();
        let period = PeriodKey::from_date(date).to_string();

        let removed = self.db.write_transaction("delete_submission", |tx| {
            let Some(employee) = EmployeeRepository::find_by_name(tx, employee_name)? else {
                return Ok(0);
            };
            let removed = AssessmentRepository::delete_submission(tx, employee.id, &assessment_date)?;
            if removed > 0 {
                refresh_period_snapshots(tx, &period)?;
            }
            Ok(removed)
        })?;

        if removed > 0 {
            info!(
                target: "app::assessment",
                employee = employee_name,
                assessment_date = %assessment_date,
                rows = removed,
                "submission deleted"
            );
        }
        Ok(removed > 0)
    }

    /// Rebuilds the snapshots of one period from its stored submissions.
    pub fn recompute_period(&self, period: &PeriodKey) -> AppResult<SnapshotRefresh> {
        let period = period.to_string();
        self.db
            .write_transaction("recompute_snapshots", |tx| refresh_period_snapshots(tx, &period))
    }

    /// Rebuilds the snapshots of every period that has submissions.
    pub fn recompute_all(&self) -> AppResult<Vec<SnapshotRefresh>> {
        self.db.write_transaction("recompute_snapshots", |tx| {
            AssessmentRepository::list_periods(tx)?
                .iter()
                .map(|period| refresh_period_snapshots(tx, period))
                .collect()
        })
    }

    fn ensure_department_allowed(&self, department: &str) -> AppResult<()> {
        if self.policy.allowed_departments.is_empty()
            || self
                .policy
                .allowed_departments
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(department))
        {
            return Ok(());
        }
        Err(AppError::validation_with_details(
            format!("department '{department}' is not configured"),
            serde_json::json!({ "allowedDepartments": self.policy.allowed_departments }),
        ))
    }
}

/// Recomputes the team and company snapshots of `period` from each
/// employee's latest submission in it. A period with no submissions left
/// loses its snapshot rows.
pub(crate) fn refresh_period_snapshots(conn: &Connection, period: &str) -> AppResult<SnapshotRefresh> {
    let scores = aggregation::latest_per_employee(AssessmentRepository::list_period_scores(conn, period)?);
    let updated_at = Utc::now().to_rfc3339();

    let mut by_department: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for score in &scores {
        by_department
            .entry(score.department.as_str())
            .or_default()
            .push(score.total_score);
    }

    let teams: Vec<TeamPerformanceSnapshot> = by_department
        .into_iter()
        .filter_map(|(department, totals)| {
            aggregation::group_stats(&totals).map(|stats| TeamPerformanceSnapshot {
                department: department.to_string(),
                period: period.to_string(),
                stats,
                updated_at: updated_at.clone(),
            })
        })
        .collect();
    SnapshotRepository::replace_team_snapshots(conn, period, &teams)?;

    let totals: Vec<f64> = scores.iter().map(|score| score.total_score).collect();
    let company = match aggregation::group_stats(&totals) {
        Some(stats) => {
            let snapshot = CompanySnapshot {
                period: period.to_string(),
                stats,
                department_count: teams.len(),
                updated_at: updated_at.clone(),
            };
            SnapshotRepository::upsert_company(conn, &snapshot)?;
            Some(snapshot)
        }
        None => {
            SnapshotRepository::delete_company(conn, period)?;
            None
        }
    };

    debug!(
        target: "app::assessment",
        period,
        teams = teams.len(),
        participants = totals.len(),
        "snapshots recomputed"
    );

    Ok(SnapshotRefresh {
        period: period.to_string(),
        teams,
        company,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionOptions, RetryPolicy};
    use crate::models::assessment::KpiStatus;
    use crate::models::employee::EmployeeIdentity;
    use tempfile::{tempdir, TempDir};

    fn service(policy: AssessmentPolicy) -> (AssessmentService, TempDir) {
        let dir = tempdir().expect("temp dir");
        let options = ConnectionOptions {
            retry: RetryPolicy::no_retry(),
            ..ConnectionOptions::default()
        };
        let pool = DbPool::with_options(dir.path().join("kpi.sqlite"), options).expect("pool");
        (
            AssessmentService::new(pool, Arc::new(KpiCatalog::standard()), policy),
            dir,
        )
    }

    fn draft(name: &str, department: &str, date: (i32, u32, u32), status: KpiStatus) -> DraftSubmission {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("date");
        let mut draft = DraftSubmission::new(EmployeeIdentity::new(name, department), date);
        draft.fill_all(&KpiCatalog::standard(), status);
        draft
    }

    #[test]
    fn submit_writes_one_row_per_kpi_with_shared_total() {
        let (service, _dir) = service(AssessmentPolicy::default());
        let receipt = service
            .submit(&draft("A. Smith", "Programming", (2024, 3, 15), KpiStatus::Met))
            .expect("submit");
        assert_eq!(receipt.rows_written, 20);
        assert_eq!(receipt.period, "2024-Q1");
        assert_eq!(receipt.band, "Outstanding");

        let stored = service
            .fetch_submission("A. Smith", &PeriodKey::new(2024, 1).unwrap())
            .unwrap()
            .expect("stored");
        assert_eq!(stored.records.len(), 20);
        assert!(stored.records.iter().all(|record| record.total_score == 100.0));
    }

    #[test]
    fn resubmitting_the_same_date_replaces_rows() {
        let (service, _dir) = service(AssessmentPolicy::default());
        service
            .submit(&draft("A. Smith", "Programming", (2024, 3, 15), KpiStatus::Met))
            .unwrap();
        let second = service
            .submit(&draft("A. Smith", "Programming", (2024, 3, 15), KpiStatus::Partial))
            .unwrap();
        assert_eq!(second.replaced_rows, 20);

        let stored = service
            .fetch_submission_on("A. Smith", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.records.len(), 20);
        assert_eq!(stored.total_score, 50.0);
    }

    #[test]
    fn disallowed_department_is_rejected() {
        let policy = AssessmentPolicy {
            require_complete: true,
            allowed_departments: vec!["Programming".into()],
        };
        let (service, _dir) = service(policy);
        let err = service
            .submit(&draft("B. Jones", "Catering", (2024, 3, 15), KpiStatus::Met))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn deleting_last_submission_clears_snapshots() {
        let (service, _dir) = service(AssessmentPolicy::default());
        service
            .submit(&draft("A. Smith", "Programming", (2024, 3, 15), KpiStatus::Met))
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(service.delete_submission("A. Smith", date).unwrap());
        assert!(!service.delete_submission("A. Smith", date).unwrap());

        let refresh = service.recompute_period(&PeriodKey::new(2024, 1).unwrap()).unwrap();
        assert!(refresh.teams.is_empty());
        assert!(refresh.company.is_none());
    }

    #[test]
    fn moving_department_refreshes_earlier_periods() {
        let (service, _dir) = service(AssessmentPolicy::default());
        service
            .submit(&draft("A. Smith", "Programming", (2024, 1, 10), KpiStatus::Met))
            .unwrap();
        service
            .submit(&draft("A. Smith", "Support", (2024, 5, 10), KpiStatus::Met))
            .unwrap();

        let refreshed = service.recompute_all().unwrap();
        let q1 = refreshed.iter().find(|r| r.period == "2024-Q1").unwrap();
        assert_eq!(q1.teams.len(), 1);
        assert_eq!(q1.teams[0].department, "Support");
    }
}
