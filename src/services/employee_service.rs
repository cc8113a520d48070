use tracing::info;

use crate::db::repositories::assessment_repository::AssessmentRepository;
use crate::db::repositories::employee_repository::EmployeeRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::employee::{EmployeeRecord, EmployeeRemoval};
use crate::services::assessment_service::refresh_period_snapshots;

pub struct EmployeeService {
    db: DbPool,
}

impl EmployeeService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn list(&self, department: Option<&str>) -> AppResult<Vec<EmployeeRecord>> {
        self.db
            .with_connection(|conn| EmployeeRepository::list(conn, department))
    }

    pub fn find(&self, name: &str) -> AppResult<Option<EmployeeRecord>> {
        self.db
            .with_connection(|conn| EmployeeRepository::find_by_name(conn, name))
    }

    pub fn departments(&self) -> AppResult<Vec<String>> {
        self.db.with_connection(EmployeeRepository::list_departments)
    }

    /// Deletes the employee and all their assessment rows, then refreshes the
    /// snapshots of every period they had submissions in. Removing an unknown
    /// name reports `removed: false`.
    pub fn remove(&self, name: &str) -> AppResult<EmployeeRemoval> {
        let removal = self.db.write_transaction("remove_employee", |tx| {
            let Some(employee) = EmployeeRepository::find_by_name(tx, name)? else {
                return Ok(EmployeeRemoval {
                    name: name.trim().to_string(),
                    removed: false,
                    assessment_rows_removed: 0,
                });
            };

            let periods = AssessmentRepository::periods_for_employee(tx, employee.id)?;
            let rows = AssessmentRepository::count_for_employee(tx, employee.id)?;
            let removed = EmployeeRepository::delete(tx, employee.id)?;
            for period in &periods {
                refresh_period_snapshots(tx, period)?;
            }

            Ok(EmployeeRemoval {
                name: employee.name,
                removed,
                assessment_rows_removed: rows,
            })
        })?;

        if removal.removed {
            info!(
                target: "app::assessment",
                employee = %removal.name,
                rows = removal.assessment_rows_removed,
                "employee removed"
            );
        }
        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::models::assessment::{DraftSubmission, KpiStatus};
    use crate::models::catalog::KpiCatalog;
    use crate::models::employee::EmployeeIdentity;
    use crate::models::period::PeriodKey;
    use crate::services::assessment_service::{AssessmentPolicy, AssessmentService};

    #[test]
    fn removing_employee_cascades_and_refreshes_team() {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("kpi.sqlite")).expect("pool");
        let catalog = Arc::new(KpiCatalog::standard());
        let assessments = AssessmentService::new(pool.clone(), catalog.clone(), AssessmentPolicy::default());
        let employees = EmployeeService::new(pool.clone());

        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        for (name, status) in [("A. Smith", KpiStatus::Met), ("B. Jones", KpiStatus::Partial)] {
            let mut draft = DraftSubmission::new(EmployeeIdentity::new(name, "Programming"), date);
            draft.fill_all(&catalog, status);
            assessments.submit(&draft).unwrap();
        }

        let removal = employees.remove("B. Jones").unwrap();
        assert!(removal.removed);
        assert_eq!(removal.assessment_rows_removed, 20);

        let refresh = assessments.recompute_period(&PeriodKey::new(2024, 1).unwrap()).unwrap();
        assert_eq!(refresh.teams[0].stats.count, 1);
        assert_eq!(refresh.teams[0].stats.avg, 100.0);
        assert_eq!(employees.list(None).unwrap().len(), 1);
    }

    #[test]
    fn removing_unknown_employee_is_not_an_error() {
        let dir = tempdir().expect("temp dir");
        let pool = DbPool::new(dir.path().join("kpi.sqlite")).expect("pool");
        let removal = EmployeeService::new(pool).remove("Nobody").unwrap();
        assert!(!removal.removed);
        assert!(EmployeeService::new(DbPool::new(dir.path().join("kpi.sqlite")).unwrap())
            .find("Nobody")
            .unwrap()
            .is_none());
    }
}
