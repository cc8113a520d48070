use std::convert::TryFrom;

use chrono::Utc;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::employee::{EmployeeIdentity, EmployeeRecord};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        name,
        employee_code,
        department,
        position,
        manager,
        hire_date,
        created_at,
        updated_at
    FROM employees
"#;

#[derive(Debug, Clone)]
pub struct EmployeeRow {
    pub id: i64,
    pub name: String,
    pub employee_code: Option<String>,
    pub department: String,
    pub position: Option<String>,
    pub manager: Option<String>,
    pub hire_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EmployeeRow {
    pub fn into_record(self) -> EmployeeRecord {
        EmployeeRecord {
            id: self.id,
            name: self.name,
            employee_code: self.employee_code,
            department: self.department,
            position: self.position,
            manager: self.manager,
            hire_date: self.hire_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for EmployeeRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            employee_code: row.get("employee_code")?,
            department: row.get("department")?,
            position: row.get("position")?,
            manager: row.get("manager")?,
            hire_date: row.get("hire_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct EmployeeRepository;

impl EmployeeRepository {
    /// Inserts the employee or refreshes department and metadata of the
    /// existing row with the same name. Metadata absent from `identity` is
    /// left as stored.
    pub fn upsert_by_name(conn: &Connection, identity: &EmployeeIdentity) -> AppResult<EmployeeRecord> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
                INSERT INTO employees (
                    name,
                    employee_code,
                    department,
                    position,
                    manager,
                    hire_date,
                    created_at,
                    updated_at
                ) VALUES (
                    :name,
                    :employee_code,
                    :department,
                    :position,
                    :manager,
                    :hire_date,
                    :now,
                    :now
                )
                ON CONFLICT(name) DO UPDATE SET
                    department = excluded.department,
                    employee_code = COALESCE(excluded.employee_code, employees.employee_code),
                    position = COALESCE(excluded.position, employees.position),
                    manager = COALESCE(excluded.manager, employees.manager),
                    hire_date = COALESCE(excluded.hire_date, employees.hire_date),
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":name": &identity.name,
                ":employee_code": &identity.employee_code,
                ":department": &identity.department,
                ":position": &identity.position,
                ":manager": &identity.manager,
                ":hire_date": &identity.hire_date,
                ":now": &now,
            },
        )?;

        let sql = format!("{BASE_SELECT} WHERE name = :name");
        let row = conn.query_row(&sql, named_params! {":name": &identity.name}, |row| {
            EmployeeRow::try_from(row)
        })?;
        Ok(row.into_record())
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<EmployeeRecord>> {
        let sql = format!("{BASE_SELECT} WHERE name = :name");
        let row = conn
            .query_row(&sql, named_params! {":name": name.trim()}, |row| {
                EmployeeRow::try_from(row)
            })
            .optional()?;
        Ok(row.map(EmployeeRow::into_record))
    }

    pub fn list(conn: &Connection, department: Option<&str>) -> AppResult<Vec<EmployeeRecord>> {
        let sql = format!(
            "{BASE_SELECT} WHERE (:department IS NULL OR department = :department) ORDER BY department, name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(named_params! {":department": department}, |row| {
            EmployeeRow::try_from(row)
        })?;

        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?.into_record());
        }
        Ok(employees)
    }

    pub fn list_departments(conn: &Connection) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT department FROM employees ORDER BY department")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut departments = Vec::new();
        for row in rows {
            departments.push(row?);
        }
        Ok(departments)
    }

    /// Deletes the employee; assessment rows go with it via the foreign key.
    pub fn delete(conn: &Connection, id: i64) -> AppResult<bool> {
        let affected = conn.execute("DELETE FROM employees WHERE id = :id", named_params! {":id": id})?;
        Ok(affected > 0)
    }
}
