use chrono::Utc;
use log::{info, warn};
use rusqlite::{params, Connection, TransactionBehavior};
use crate::error::{TrackerError, TrackerResult};
use crate::storage::models::GovernorId;

pub const LATEST_SCHEMA_VERSION: i64 = 3;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

// v1: the first layout. Links are keyed by the (main, farm) pair, so nothing stops
// a farm from being claimed by several mains.
const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS Accounts (
  GovernorId INTEGER PRIMARY KEY,
  GovernorName TEXT NOT NULL,
  OldGovernorNames TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS AccountLinks (
  MainGovernorId INTEGER NOT NULL REFERENCES Accounts (GovernorId),
  FarmGovernorId INTEGER NOT NULL REFERENCES Accounts (GovernorId),
  PRIMARY KEY (MainGovernorId, FarmGovernorId)
);

CREATE TABLE IF NOT EXISTS AccountStats (
  Id INTEGER PRIMARY KEY AUTOINCREMENT,
  GovernorId INTEGER NOT NULL REFERENCES Accounts (GovernorId),
  GovernorName TEXT NOT NULL,
  SnapshotTime TEXT NOT NULL,
  CH INTEGER,
  Domain REAL,
  Clickable INTEGER,
  Alliance TEXT,
  Power INTEGER,
  HighestPower REAL,
  TroopPower REAL,
  Victory REAL,
  Defeat REAL,
  Helps REAL,
  ScoutTimes REAL,
  Gathered REAL,
  Assistance REAL,
  TotalKillPoints REAL,
  TotalKills REAL,
  T1Kills INTEGER,
  T2Kills INTEGER,
  T3Kills INTEGER,
  T4Kills INTEGER,
  T5Kills INTEGER,
  RangedKills REAL,
  Dead REAL,
  Healed REAL,
  MostUnitsKilled REAL,
  MostUnitsLost REAL,
  MostUnitsHealed REAL,
  Autarch REAL,
  Participated REAL,
  Civilization TEXT,
  UNIQUE (GovernorId, SnapshotTime)
);
";

// v2: surrogate key, one main per farm, index for listing a main's farms.
const MIGRATION_002_SQL: &str = r"
CREATE TABLE AccountLinks_v2 (
  Id INTEGER PRIMARY KEY AUTOINCREMENT,
  MainGovernorId INTEGER NOT NULL,
  FarmGovernorId INTEGER NOT NULL,
  CONSTRAINT unique_farm_governor UNIQUE (FarmGovernorId),
  CONSTRAINT fk_main_governor FOREIGN KEY (MainGovernorId) REFERENCES Accounts (GovernorId),
  CONSTRAINT fk_farm_governor FOREIGN KEY (FarmGovernorId) REFERENCES Accounts (GovernorId)
);

INSERT INTO AccountLinks_v2 (MainGovernorId, FarmGovernorId)
  SELECT MainGovernorId, FarmGovernorId FROM AccountLinks ORDER BY rowid;

DROP TABLE AccountLinks;
ALTER TABLE AccountLinks_v2 RENAME TO AccountLinks;
CREATE INDEX IF NOT EXISTS idx_main_governor ON AccountLinks (MainGovernorId);
";

const REVERT_002_SQL: &str = r"
CREATE TABLE AccountLinks_v1 (
  MainGovernorId INTEGER NOT NULL REFERENCES Accounts (GovernorId),
  FarmGovernorId INTEGER NOT NULL REFERENCES Accounts (GovernorId),
  PRIMARY KEY (MainGovernorId, FarmGovernorId)
);

INSERT INTO AccountLinks_v1 (MainGovernorId, FarmGovernorId)
  SELECT MainGovernorId, FarmGovernorId FROM AccountLinks ORDER BY Id;

DROP INDEX IF EXISTS idx_main_governor;
DROP TABLE AccountLinks;
ALTER TABLE AccountLinks_v1 RENAME TO AccountLinks;
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

/// Applies every pending migration and returns the resulting status.
pub fn migrate(conn: &mut Connection) -> TrackerResult<SchemaStatus> {
    conn.execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)?;

    let mut version = current_schema_version(conn)?;
    if version == 0 {
        version = bootstrap_schema_version(conn)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
    }

    if version < 3 {
        apply_migration_3(conn)?;
        version = 3;
    }

    if version != LATEST_SCHEMA_VERSION {
        return Err(TrackerError::Migration(format!(
            "unsupported schema version {}; expected {}",
            version, LATEST_SCHEMA_VERSION
        )));
    }

    schema_status(conn)
}

/// Reports the schema version without writing anything, so it is safe on a read-only connection.
pub fn schema_status(conn: &Connection) -> TrackerResult<SchemaStatus> {
    let (current_version, inferred_from_legacy) = detect_effective_schema_version(conn)?;
    let pending_versions = ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect();

    Ok(SchemaStatus {
        current_version,
        target_version: LATEST_SCHEMA_VERSION,
        pending_versions,
        inferred_from_legacy,
    })
}

/// Walks the schema back down to `target`. Only recorded versions can be reverted.
pub fn revert_to(conn: &mut Connection, target: i64) -> TrackerResult<SchemaStatus> {
    let mut version = current_schema_version(conn)?;
    if target < 1 || target > version {
        return Err(TrackerError::Validation(format!(
            "cannot revert schema from version {} to {}",
            version, target
        )));
    }

    while version > target {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match version {
            3 => {}
            2 => step(2, tx.execute_batch(REVERT_002_SQL))?,
            other => {
                return Err(TrackerError::Migration(format!(
                    "no revert step for schema version {}",
                    other
                )))
            }
        }
        tx.execute("DELETE FROM schema_migrations WHERE version = ?1", params![version])?;
        tx.commit()?;
        warn!("Reverted schema version {}", version);
        version -= 1;
    }

    schema_status(conn)
}

fn bootstrap_schema_version(conn: &mut Connection) -> TrackerResult<i64> {
    let legacy = table_exists(conn, "Accounts")? || table_exists(conn, "AccountLinks")?;
    let links_have_id = table_has_column(conn, "AccountLinks", "Id")?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    step(1, tx.execute_batch(MIGRATION_001_SQL))?;
    record_schema_version(&tx, 1)?;

    let version = if links_have_id {
        // Already in the keyed-link shape, but created before versions were recorded.
        step(2, tx.execute_batch("CREATE INDEX IF NOT EXISTS idx_main_governor ON AccountLinks (MainGovernorId);"))?;
        record_schema_version(&tx, 2)?;
        2
    } else {
        1
    };
    tx.commit()?;

    if legacy {
        info!("Found an unversioned database; treating it as schema version {}", version);
    }
    Ok(version)
}

fn apply_migration_2(conn: &mut Connection) -> TrackerResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let contested = query_ids(
        &tx,
        "SELECT FarmGovernorId FROM AccountLinks
         GROUP BY FarmGovernorId HAVING COUNT(*) > 1
         ORDER BY FarmGovernorId",
    )?;
    if !contested.is_empty() {
        return Err(TrackerError::Migration(format!(
            "v2: farm governors linked to more than one main account: {}",
            join_ids(&contested)
        )));
    }

    step(2, tx.execute_batch(MIGRATION_002_SQL))?;
    record_schema_version(&tx, 2)?;
    tx.commit()?;
    info!("Applied schema migration v2 (account linking relationship)");
    Ok(())
}

fn apply_migration_3(conn: &mut Connection) -> TrackerResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let both = query_ids(
        &tx,
        "SELECT DISTINCT farm.FarmGovernorId FROM AccountLinks farm
         WHERE EXISTS (SELECT 1 FROM AccountLinks main WHERE main.MainGovernorId = farm.FarmGovernorId)
         ORDER BY farm.FarmGovernorId",
    )?;
    if !both.is_empty() {
        return Err(TrackerError::Migration(format!(
            "v3: governors used as both main and farm account: {}",
            join_ids(&both)
        )));
    }

    record_schema_version(&tx, 3)?;
    tx.commit()?;
    info!("Applied schema migration v3 (main cannot be farm)");
    Ok(())
}

fn step<T>(version: i64, result: rusqlite::Result<T>) -> TrackerResult<T> {
    result.map_err(|e| TrackerError::Migration(format!("v{}: {}", version, e)))
}

fn query_ids(conn: &Connection, sql: &str) -> TrackerResult<Vec<GovernorId>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<GovernorId>, _>>()?;
    Ok(ids)
}

fn join_ids(ids: &[GovernorId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

fn table_exists(conn: &Connection, table_name: &str) -> TrackerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table_name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> TrackerResult<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn current_schema_version(conn: &Connection) -> TrackerResult<i64> {
    if !table_exists(conn, "schema_migrations")? {
        return Ok(0);
    }
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn detect_effective_schema_version(conn: &Connection) -> TrackerResult<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }

    if !table_exists(conn, "AccountLinks")? {
        return Ok((0, false));
    }

    if table_has_column(conn, "AccountLinks", "Id")? {
        return Ok((2, true));
    }
    Ok((1, true))
}

fn record_schema_version(conn: &Connection, version: i64) -> TrackerResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        params![version, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
