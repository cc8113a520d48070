use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::{info, warn};

use crate::error::AppResult;

pub const USER_VERSION: i32 = 3;

#[derive(Debug)]
pub struct MigrationInfo {
    pub version: i32,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

pub fn run(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migration_history (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            rollback_sql TEXT
        );
        "#,
    )?;

    let mut current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version < 1 {
        info!(target: "app::db", version = current_version, "running migration v1");
        migrate_to_v1(conn)?;
        current_version = 1;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            1,
            "Add employees and assessments",
            Some(
                r#"
                DROP TABLE IF EXISTS assessments;
                DROP TABLE IF EXISTS employees;
                "#,
            ),
        )?;
    }

    if current_version < 2 {
        info!(target: "app::db", version = current_version, "running migration v2");
        migrate_to_v2(conn)?;
        current_version = 2;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            2,
            "Add year, quarter and period columns to assessments",
            Some("DROP INDEX IF EXISTS idx_assessments_period;"),
        )?;
    }

    if current_version < 3 {
        info!(target: "app::db", version = current_version, "running migration v3");
        migrate_to_v3(conn)?;
        current_version = 3;
        conn.execute(&format!("PRAGMA user_version = {}", current_version), [])?;
        record_migration(
            conn,
            3,
            "Add team and company performance snapshots",
            Some(
                r#"
                DROP TABLE IF EXISTS company_performance;
                DROP TABLE IF EXISTS team_performance;
                "#,
            ),
        )?;
    }

    if current_version != USER_VERSION {
        conn.execute(&format!("PRAGMA user_version = {}", USER_VERSION), [])?;
    }

    Ok(())
}

fn record_migration(
    conn: &Connection,
    version: i32,
    description: &str,
    rollback_sql: Option<&str>,
) -> AppResult<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR REPLACE INTO migration_history (version, description, applied_at, rollback_sql) VALUES (?, ?, ?, ?)",
        (version, description, now, rollback_sql),
    )?;
    Ok(())
}

pub fn rollback_to_version(conn: &Connection, target_version: i32) -> AppResult<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if target_version >= current_version {
        warn!(
            target: "app::db",
            target_version, current_version, "rollback target is not below the current version"
        );
        return Ok(());
    }

    // Collected up front: dropping a table while the history cursor is open fails with SQLITE_LOCKED.
    let pending: Vec<(i32, Option<String>)> = {
        let mut stmt = conn.prepare(
            "SELECT version, rollback_sql FROM migration_history WHERE version > ? ORDER BY version DESC",
        )?;
        let rows = stmt.query_map([target_version], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        rows.collect::<Result<_, _>>()?
    };

    let tx = conn.unchecked_transaction()?;
    for (version, rollback_sql) in &pending {
        match rollback_sql {
            Some(sql) => {
                info!(target: "app::db", version, "rolling back migration");
                tx.execute_batch(sql)?;
            }
            None => warn!(target: "app::db", version, "no rollback script available for migration"),
        }
    }
    tx.execute_batch(&format!("PRAGMA user_version = {target_version};"))?;
    tx.execute("DELETE FROM migration_history WHERE version > ?", [target_version])?;
    tx.commit()?;

    Ok(())
}

pub fn get_migration_history(conn: &Connection) -> AppResult<Vec<MigrationInfo>> {
    let mut stmt = conn.prepare(
        "SELECT version, description, applied_at FROM migration_history ORDER BY version",
    )?;

    let migration_iter = stmt.query_map([], |row| {
        let applied_at_str: String = row.get(2)?;
        let applied_at = DateTime::parse_from_rfc3339(&applied_at_str)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    2,
                    "applied_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Utc);

        Ok(MigrationInfo {
            version: row.get(0)?,
            description: row.get(1)?,
            applied_at,
        })
    })?;

    let mut migrations = Vec::new();
    for migration in migration_iter {
        migrations.push(migration?);
    }
    Ok(migrations)
}

fn migrate_to_v1(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            employee_code TEXT UNIQUE,
            department TEXT NOT NULL,
            position TEXT,
            manager TEXT,
            hire_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- One row per KPI per submission. total_score repeats the submission
        -- grand total on every row and is rewritten whenever the submission is saved.
        CREATE TABLE IF NOT EXISTS assessments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id TEXT NOT NULL,
            employee_id INTEGER NOT NULL,
            assessment_date TEXT NOT NULL,
            category TEXT NOT NULL,
            kpi_name TEXT NOT NULL,
            status TEXT NOT NULL,
            actual_value REAL,
            points_earned REAL NOT NULL,
            kpi_weight REAL NOT NULL,
            category_weight REAL NOT NULL,
            total_score REAL NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE,
            UNIQUE(submission_id, kpi_name)
        );

        CREATE INDEX IF NOT EXISTS idx_assessments_employee_date
            ON assessments(employee_id, assessment_date);
        CREATE INDEX IF NOT EXISTS idx_assessments_submission
            ON assessments(submission_id);
        "#,
    )?;

    Ok(())
}

fn migrate_to_v2(conn: &Connection) -> AppResult<()> {
    ensure_column(conn, "assessments", "year", "INTEGER")?;
    ensure_column(conn, "assessments", "quarter", "INTEGER")?;
    ensure_column(conn, "assessments", "period", "TEXT")?;

    conn.execute_batch(
        r#"
        UPDATE assessments
        SET year = CAST(substr(assessment_date, 1, 4) AS INTEGER),
            quarter = (CAST(substr(assessment_date, 6, 2) AS INTEGER) - 1) / 3 + 1
        WHERE year IS NULL OR quarter IS NULL;

        UPDATE assessments
        SET period = year || '-Q' || quarter
        WHERE period IS NULL;

        CREATE INDEX IF NOT EXISTS idx_assessments_period
            ON assessments(period, employee_id);
        "#,
    )?;

    Ok(())
}

fn migrate_to_v3(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS team_performance (
            department TEXT NOT NULL,
            period TEXT NOT NULL,
            avg_score REAL NOT NULL,
            min_score REAL NOT NULL,
            max_score REAL NOT NULL,
            participant_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (department, period)
        );

        CREATE TABLE IF NOT EXISTS company_performance (
            period TEXT PRIMARY KEY,
            avg_score REAL NOT NULL,
            min_score REAL NOT NULL,
            max_score REAL NOT NULL,
            participant_count INTEGER NOT NULL,
            department_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn ensure_column(conn: &Connection, table: &str, column: &str, definition: &str) -> AppResult<()> {
    if !column_exists(conn, table, column)? {
        let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition};");
        conn.execute(&sql, [])?;
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let pragma = format!("PRAGMA table_info({table})");
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        if equals_name(row, column)? {
            return Ok(true);
        }
    }

    Ok(false)
}

fn equals_name(row: &Row<'_>, column: &str) -> Result<bool, rusqlite::Error> {
    let name: String = row.get(1)?;
    Ok(name.eq_ignore_ascii_case(column))
}
