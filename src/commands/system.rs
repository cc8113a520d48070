use serde::Serialize;

use crate::db::migrations::{self, MigrationInfo, USER_VERSION};

use super::{run, AppState, CommandResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationEntry {
    pub version: i32,
    pub description: String,
    pub applied_at: String,
}

impl From<MigrationInfo> for MigrationEntry {
    fn from(info: MigrationInfo) -> Self {
        Self {
            version: info.version,
            description: info.description,
            applied_at: info.applied_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaStatus {
    pub database_path: String,
    pub schema_version: i32,
    pub latest_version: i32,
    pub migrations: Vec<MigrationEntry>,
}

pub fn schema_status(state: &AppState) -> CommandResult<SchemaStatus> {
    run(|| {
        let db = state.db();
        let (schema_version, history) = db.with_connection(|conn| {
            let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            Ok((version, migrations::get_migration_history(conn)?))
        })?;
        Ok(SchemaStatus {
            database_path: db.path().display().to_string(),
            schema_version,
            latest_version: USER_VERSION,
            migrations: history.into_iter().map(MigrationEntry::from).collect(),
        })
    })
}
