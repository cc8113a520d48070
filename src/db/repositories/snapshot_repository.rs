use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::snapshot::{CompanySnapshot, GroupStats, TeamPerformanceSnapshot};

#[derive(Debug, Clone)]
pub struct TeamPerformanceRow {
    pub department: String,
    pub period: String,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub participant_count: i64,
    pub updated_at: String,
}

impl TeamPerformanceRow {
    pub fn into_snapshot(self) -> TeamPerformanceSnapshot {
        TeamPerformanceSnapshot {
            department: self.department,
            period: self.period,
            stats: GroupStats {
                avg: self.avg_score,
                min: self.min_score,
                max: self.max_score,
                count: self.participant_count.max(0) as usize,
            },
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for TeamPerformanceRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            department: row.get("department")?,
            period: row.get("period")?,
            avg_score: row.get("avg_score")?,
            min_score: row.get("min_score")?,
            max_score: row.get("max_score")?,
            participant_count: row.get("participant_count")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompanyPerformanceRow {
    pub period: String,
    pub avg_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub participant_count: i64,
    pub department_count: i64,
    pub updated_at: String,
}

impl CompanyPerformanceRow {
    pub fn into_snapshot(self) -> CompanySnapshot {
        CompanySnapshot {
            period: self.period,
            stats: GroupStats {
                avg: self.avg_score,
                min: self.min_score,
                max: self.max_score,
                count: self.participant_count.max(0) as usize,
            },
            department_count: self.department_count.max(0) as usize,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for CompanyPerformanceRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            period: row.get("period")?,
            avg_score: row.get("avg_score")?,
            min_score: row.get("min_score")?,
            max_score: row.get("max_score")?,
            participant_count: row.get("participant_count")?,
            department_count: row.get("department_count")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct SnapshotRepository;

impl SnapshotRepository {
    /// Replaces every team row of `period` with `snapshots`. Departments with
    /// no remaining submissions simply disappear.
    pub fn replace_team_snapshots(
        conn: &Connection,
        period: &str,
        snapshots: &[TeamPerformanceSnapshot],
    ) -> AppResult<()> {
        conn.execute(
            "DELETE FROM team_performance WHERE period = :period",
            named_params! {":period": period},
        )?;

        let mut stmt = conn.prepare(
            r#"
                INSERT INTO team_performance (
                    department,
                    period,
                    avg_score,
                    min_score,
                    max_score,
                    participant_count,
                    updated_at
                ) VALUES (
                    :department,
                    :period,
                    :avg_score,
                    :min_score,
                    :max_score,
                    :participant_count,
                    :updated_at
                )
                ON CONFLICT(department, period) DO UPDATE SET
                    avg_score = excluded.avg_score,
                    min_score = excluded.min_score,
                    max_score = excluded.max_score,
                    participant_count = excluded.participant_count,
                    updated_at = excluded.updated_at
            "#,
        )?;

        for snapshot in snapshots {
            stmt.execute(named_params! {
                ":department": &snapshot.department,
                ":period": &snapshot.period,
                ":avg_score": snapshot.stats.avg,
                ":min_score": snapshot.stats.min,
                ":max_score": snapshot.stats.max,
                ":participant_count": snapshot.stats.count as i64,
                ":updated_at": &snapshot.updated_at,
            })?;
        }

        Ok(())
    }

    pub fn upsert_company(conn: &Connection, snapshot: &CompanySnapshot) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO company_performance (
                    period,
                    avg_score,
                    min_score,
                    max_score,
                    participant_count,
                    department_count,
                    updated_at
                ) VALUES (
                    :period,
                    :avg_score,
                    :min_score,
                    :max_score,
                    :participant_count,
                    :department_count,
                    :updated_at
                )
                ON CONFLICT(period) DO UPDATE SET
                    avg_score = excluded.avg_score,
                    min_score = excluded.min_score,
                    max_score = excluded.max_score,
                    participant_count = excluded.participant_count,
                    department_count = excluded.department_count,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":period": &snapshot.period,
                ":avg_score": snapshot.stats.avg,
                ":min_score": snapshot.stats.min,
                ":max_score": snapshot.stats.max,
                ":participant_count": snapshot.stats.count as i64,
                ":department_count": snapshot.department_count as i64,
                ":updated_at": &snapshot.updated_at,
            },
        )?;
        Ok(())
    }

    pub fn delete_company(conn: &Connection, period: &str) -> AppResult<bool> {
        let affected = conn.execute(
            "DELETE FROM company_performance WHERE period = :period",
            named_params! {":period": period},
        )?;
        Ok(affected > 0)
    }

    pub fn find_team(
        conn: &Connection,
        department: &str,
        period: &str,
    ) -> AppResult<Option<TeamPerformanceSnapshot>> {
        let row = conn
            .query_row(
                r#"
                    SELECT department, period, avg_score, min_score, max_score, participant_count, updated_at
                    FROM team_performance
                    WHERE department = :department AND period = :period
                "#,
                named_params! {":department": department, ":period": period},
                |row| TeamPerformanceRow::try_from(row),
            )
            .optional()?;
        Ok(row.map(TeamPerformanceRow::into_snapshot))
    }

    /// Team rows, optionally narrowed to one period; newest period first.
    pub fn list_teams(conn: &Connection, period: Option<&str>) -> AppResult<Vec<TeamPerformanceSnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT department, period, avg_score, min_score, max_score, participant_count, updated_at
                FROM team_performance
                WHERE (:period IS NULL OR period = :period)
                ORDER BY period DESC, department
            "#,
        )?;
        let rows = stmt.query_map(named_params! {":period": period}, |row| {
            TeamPerformanceRow::try_from(row)
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?.into_snapshot());
        }
        Ok(snapshots)
    }

    pub fn list_team_history(conn: &Connection, department: &str) -> AppResult<Vec<TeamPerformanceSnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT department, period, avg_score, min_score, max_score, participant_count, updated_at
                FROM team_performance
                WHERE department = :department
                ORDER BY period DESC
            "#,
        )?;
        let rows = stmt.query_map(named_params! {":department": department}, |row| {
            TeamPerformanceRow::try_from(row)
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?.into_snapshot());
        }
        Ok(snapshots)
    }

    pub fn find_company(conn: &Connection, period: &str) -> AppResult<Option<CompanySnapshot>> {
        let row = conn
            .query_row(
                r#"
                    SELECT period, avg_score, min_score, max_score, participant_count, department_count, updated_at
                    FROM company_performance
                    WHERE period = :period
                "#,
                named_params! {":period": period},
                |row| CompanyPerformanceRow::try_from(row),
            )
            .optional()?;
        Ok(row.map(CompanyPerformanceRow::into_snapshot))
    }

    /// Company rows, newest period first.
    pub fn list_company(conn: &Connection) -> AppResult<Vec<CompanySnapshot>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT period, avg_score, min_score, max_score, participant_count, department_count, updated_at
                FROM company_performance
                ORDER BY period DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| CompanyPerformanceRow::try_from(row))?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?.into_snapshot());
        }
        Ok(snapshots)
    }
}
