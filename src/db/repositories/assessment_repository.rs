use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::assessment::{AssessmentRecord, KpiStatus, StoredSubmission};
use crate::models::snapshot::EmployeePeriodScore;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        submission_id,
        employee_id,
        assessment_date,
        year,
        quarter,
        period,
        category,
        kpi_name,
        status,
        actual_value,
        points_earned,
        kpi_weight,
        category_weight,
        total_score,
        notes,
        created_at
    FROM assessments
"#;

const SUBMISSION_SCORE_SELECT: &str = r#"
    SELECT
        a.employee_id AS employee_id,
        e.name AS employee_name,
        e.department AS department,
        a.period AS period,
        a.submission_id AS submission_id,
        a.assessment_date AS assessment_date,
        MAX(a.total_score) AS total_score
    FROM assessments a
    JOIN employees e ON e.id = a.employee_id
"#;

#[derive(Debug, Clone)]
pub struct AssessmentRow {
    pub id: i64,
    pub submission_id: String,
    pub employee_id: i64,
    pub assessment_date: String,
    pub year: i32,
    pub quarter: u32,
    pub period: String,
    pub category: String,
    pub kpi_name: String,
    pub status: String,
    pub actual_value: Option<f64>,
    pub points_earned: f64,
    pub kpi_weight: f64,
    pub category_weight: f64,
    pub total_score: f64,
    pub notes: Option<String>,
    pub created_at: String,
}

impl AssessmentRow {
    pub fn from_record(record: &AssessmentRecord) -> Self {
        Self {
            id: record.id,
            submission_id: record.submission_id.clone(),
            employee_id: record.employee_id,
            assessment_date: record.assessment_date.clone(),
            year: record.year,
            quarter: record.quarter,
            period: record.period.clone(),
            category: record.category.clone(),
            kpi_name: record.kpi_name.clone(),
            status: record.status.as_str().to_string(),
            actual_value: record.actual_value,
            points_earned: record.points_earned,
            kpi_weight: record.kpi_weight,
            category_weight: record.category_weight,
            total_score: record.total_score,
            notes: record.notes.clone(),
            created_at: record.created_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<AssessmentRecord> {
        let status = self.status.parse::<KpiStatus>()?;
        Ok(AssessmentRecord {
            id: self.id,
            submission_id: self.submission_id,
            employee_id: self.employee_id,
            assessment_date: self.assessment_date,
            year: self.year,
            quarter: self.quarter,
            period: self.period,
            category: self.category,
            kpi_name: self.kpi_name,
            status,
            actual_value: self.actual_value,
            points_earned: self.points_earned,
            kpi_weight: self.kpi_weight,
            category_weight: self.category_weight,
            total_score: self.total_score,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<&Row<'_>> for AssessmentRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            submission_id: row.get("submission_id")?,
            employee_id: row.get("employee_id")?,
            assessment_date: row.get("assessment_date")?,
            year: row.get("year")?,
            quarter: row.get("quarter")?,
            period: row.get("period")?,
            category: row.get("category")?,
            kpi_name: row.get("kpi_name")?,
            status: row.get("status")?,
            actual_value: row.get("actual_value")?,
            points_earned: row.get("points_earned")?,
            kpi_weight: row.get("kpi_weight")?,
            category_weight: row.get("category_weight")?,
            total_score: row.get("total_score")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn period_score_from_row(row: &Row<'_>) -> Result<EmployeePeriodScore, rusqlite::Error> {
    Ok(EmployeePeriodScore {
        employee_id: row.get("employee_id")?,
        employee_name: row.get("employee_name")?,
        department: row.get("department")?,
        period: row.get("period")?,
        submission_id: row.get("submission_id")?,
        assessment_date: row.get("assessment_date")?,
        total_score: row.get("total_score")?,
    })
}

pub struct AssessmentRepository;

impl AssessmentRepository {
    pub fn insert(conn: &Connection, record: &AssessmentRecord) -> AppResult<i64> {
        let row = AssessmentRow::from_record(record);
        conn.execute(
            r#"
                INSERT INTO assessments (
                    submission_id,
                    employee_id,
                    assessment_date,
                    year,
                    quarter,
                    period,
                    category,
                    kpi_name,
                    status,
                    actual_value,
                    points_earned,
                    kpi_weight,
                    category_weight,
                    total_score,
                    notes,
                    created_at
                ) VALUES (
                    :submission_id,
                    :employee_id,
                    :assessment_date,
                    :year,
                    :quarter,
                    :period,
                    :category,
                    :kpi_name,
                    :status,
                    :actual_value,
                    :points_earned,
                    :kpi_weight,
                    :category_weight,
                    :total_score,
                    :notes,
                    :created_at
                )
            "#,
            named_params! {
                ":submission_id": &row.submission_id,
                ":employee_id": row.employee_id,
                ":assessment_date": &row.assessment_date,
                ":year": row.year,
                ":quarter": row.quarter,
                ":period": &row.period,
                ":category": &row.category,
                ":kpi_name": &row.kpi_name,
                ":status": &row.status,
                ":actual_value": row.actual_value,
                ":points_earned": row.points_earned,
                ":kpi_weight": row.kpi_weight,
                ":category_weight": row.category_weight,
                ":total_score": row.total_score,
                ":notes": &row.notes,
                ":created_at": &row.created_at,
            },
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Removes every row of the employee's submission on `assessment_date`.
    /// Returns the number of rows removed.
    pub fn delete_submission(
        conn: &Connection,
        employee_id: i64,
        assessment_date: &str,
    ) -> AppResult<usize> {
        let affected = conn.execute(
            "DELETE FROM assessments WHERE employee_id = :employee_id AND assessment_date = :assessment_date",
            named_params! {
                ":employee_id": employee_id,
                ":assessment_date": assessment_date,
            },
        )?;
        Ok(affected)
    }

    pub fn count_for_employee(conn: &Connection, employee_id: i64) -> AppResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM assessments WHERE employee_id = :employee_id",
            named_params! {":employee_id": employee_id},
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn find_submission(
        conn: &Connection,
        employee_id: i64,
        assessment_date: &str,
    ) -> AppResult<Option<StoredSubmission>> {
        let sql = format!(
            "{BASE_SELECT} WHERE employee_id = :employee_id AND assessment_date = :assessment_date ORDER BY id"
        );
        let records = Self::query_records(
            conn,
            &sql,
            named_params! {
                ":employee_id": employee_id,
                ":assessment_date": assessment_date,
            },
        )?;
        Self::assemble(conn, records)
    }

    /// The employee's latest submission within `period`, if any.
    pub fn find_latest_in_period(
        conn: &Connection,
        employee_id: i64,
        period: &str,
    ) -> AppResult<Option<StoredSubmission>> {
        let latest_date: Option<String> = conn
            .query_row(
                r#"
                    SELECT MAX(assessment_date)
                    FROM assessments
                    WHERE employee_id = :employee_id AND period = :period
                "#,
                named_params! {":employee_id": employee_id, ":period": period},
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();

        match latest_date {
            Some(date) => Self::find_submission(conn, employee_id, &date),
            None => Ok(None),
        }
    }

    /// One entry per submission in `period`, including superseded ones.
    pub fn list_period_scores(conn: &Connection, period: &str) -> AppResult<Vec<EmployeePeriodScore>> {
        let sql = format!(
            "{SUBMISSION_SCORE_SELECT} WHERE a.period = :period GROUP BY a.submission_id ORDER BY e.name, a.assessment_date"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(named_params! {":period": period}, period_score_from_row)?;

        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?);
        }
        Ok(scores)
    }

    /// Every submission of the employee, oldest first.
    pub fn list_employee_submissions(
        conn: &Connection,
        employee_id: i64,
    ) -> AppResult<Vec<EmployeePeriodScore>> {
        let sql = format!(
            "{SUBMISSION_SCORE_SELECT} WHERE a.employee_id = :employee_id GROUP BY a.submission_id ORDER BY a.assessment_date"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(named_params! {":employee_id": employee_id}, period_score_from_row)?;

        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?);
        }
        Ok(scores)
    }

    pub fn periods_for_employee(conn: &Connection, employee_id: i64) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT period FROM assessments WHERE employee_id = :employee_id ORDER BY period",
        )?;
        let rows = stmt.query_map(named_params! {":employee_id": employee_id}, |row| {
            row.get::<_, String>(0)
        })?;

        let mut periods = Vec::new();
        for row in rows {
            periods.push(row?);
        }
        Ok(periods)
    }

    pub fn list_periods(conn: &Connection) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT period FROM assessments ORDER BY period")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut periods = Vec::new();
        for row in rows {
            periods.push(row?);
        }
        Ok(periods)
    }

    /// Rows of the given submissions, grouped by submission in id order.
    pub fn list_records_for_submissions(
        conn: &Connection,
        submission_ids: &[String],
    ) -> AppResult<Vec<AssessmentRecord>> {
        let sql = format!("{BASE_SELECT} WHERE submission_id = :submission_id ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;

        let mut records = Vec::new();
        for submission_id in submission_ids {
            let rows = stmt.query_map(named_params! {":submission_id": submission_id}, |row| {
                AssessmentRow::try_from(row)
            })?;
            for row in rows {
                records.push(row?.into_record()?);
            }
        }
        Ok(records)
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: &[(&str, &dyn rusqlite::ToSql)],
    ) -> AppResult<Vec<AssessmentRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| AssessmentRow::try_from(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn assemble(
        conn: &Connection,
        records: Vec<AssessmentRecord>,
    ) -> AppResult<Option<StoredSubmission>> {
        let Some(first) = records.first() else {
            return Ok(None);
        };

        let (employee_name, department): (String, String) = conn
            .query_row(
                "SELECT name, department FROM employees WHERE id = :id",
                named_params! {":id": first.employee_id},
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| {
                AppError::database(format!(
                    "assessment rows reference missing employee {}",
                    first.employee_id
                ))
            })?;

        Ok(Some(StoredSubmission {
            submission_id: first.submission_id.clone(),
            employee_id: first.employee_id,
            employee_name,
            department,
            assessment_date: first.assessment_date.clone(),
            period: first.period.clone(),
            total_score: first.total_score,
            records,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::db::repositories::employee_repository::EmployeeRepository;
    use crate::models::employee::EmployeeIdentity;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.pragma_update(None, "foreign_keys", &1).expect("fk");
        migrations::run(&conn).expect("migrations");
        conn
    }

    fn record(employee_id: i64, submission_id: &str, date: &str, kpi: &str, total: f64) -> AssessmentRecord {
        AssessmentRecord {
            id: 0,
            submission_id: submission_id.into(),
            employee_id,
            assessment_date: date.into(),
            year: 2024,
            quarter: 1,
            period: "2024-Q1".into(),
            category: "Learning & Growth".into(),
            kpi_name: kpi.into(),
            status: KpiStatus::Partial,
            actual_value: None,
            points_earned: 1.875,
            kpi_weight: 3.75,
            category_weight: 15.0,
            total_score: total,
            notes: None,
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn latest_submission_in_period_wins() {
        let conn = setup();
        let employee =
            EmployeeRepository::upsert_by_name(&conn, &EmployeeIdentity::new("A. Smith", "Programming")).unwrap();
        AssessmentRepository::insert(&conn, &record(employee.id, "s1", "2024-01-10", "Skill Advancement", 40.0)).unwrap();
        AssessmentRepository::insert(&conn, &record(employee.id, "s2", "2024-02-10", "Skill Advancement", 70.0)).unwrap();

        let latest = AssessmentRepository::find_latest_in_period(&conn, employee.id, "2024-Q1")
            .unwrap()
            .expect("submission");
        assert_eq!(latest.submission_id, "s2");
        assert_eq!(latest.total_score, 70.0);
        assert_eq!(latest.department, "Programming");

        let scores = AssessmentRepository::list_period_scores(&conn, "2024-Q1").unwrap();
        assert_eq!(scores.len(), 2);
        assert!(AssessmentRepository::find_latest_in_period(&conn, employee.id, "2023-Q4")
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_kpi_in_one_submission_is_a_conflict() {
        let conn = setup();
        let employee =
            EmployeeRepository::upsert_by_name(&conn, &EmployeeIdentity::new("A. Smith", "Programming")).unwrap();
        AssessmentRepository::insert(&conn, &record(employee.id, "s1", "2024-01-10", "Skill Advancement", 40.0)).unwrap();
        let err = AssessmentRepository::insert(&conn, &record(employee.id, "s1", "2024-01-10", "Skill Advancement", 40.0))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[test]
    fn deleting_employee_cascades_to_rows() {
        let conn = setup();
        let employee =
            EmployeeRepository::upsert_by_name(&conn, &EmployeeIdentity::new("A. Smith", "Programming")).unwrap();
        AssessmentRepository::insert(&conn, &record(employee.id, "s1", "2024-01-10", "Skill Advancement", 40.0)).unwrap();

        assert!(EmployeeRepository::delete(&conn, employee.id).unwrap());
        assert_eq!(AssessmentRepository::count_for_employee(&conn, employee.id).unwrap(), 0);
    }
}
