use std::sync::Arc;
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use crate::error::{is_unique_violation, TrackerError, TrackerResult};
use crate::storage::models::{Account, GovernorId, UpsertOutcome};
use crate::storage::StorageClient;

/// Canonical governor identities. Ids are assigned by the game, never generated here.
pub struct AccountStore {
    storage: Arc<StorageClient>,
}

impl AccountStore {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }

    pub fn create_account(&self, governor_id: GovernorId, governor_name: &str) -> TrackerResult<Account> {
        let governor_name = validate_name(governor_name)?;

        let account = self.storage.write(|tx| {
            if account_exists(tx, governor_id)? {
                return Err(TrackerError::DuplicateId(governor_id));
            }
            tx.execute(
                "INSERT INTO Accounts (GovernorId, GovernorName, OldGovernorNames) VALUES (?1, ?2, '[]')",
                params![governor_id, governor_name],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    TrackerError::DuplicateId(governor_id)
                } else {
                    e.into()
                }
            })?;

            Ok(Account {
                governor_id,
                governor_name: governor_name.to_string(),
                old_governor_names: Vec::new(),
            })
        })?;

        info!("Created governor {} ({})", account.governor_name, governor_id);
        Ok(account)
    }

    pub fn find_account(&self, governor_id: GovernorId) -> TrackerResult<Option<Account>> {
        self.storage.read(|conn| find_account(conn, governor_id))
    }

    pub fn upsert_account(&self, governor_id: GovernorId, governor_name: &str) -> TrackerResult<UpsertOutcome> {
        let governor_name = validate_name(governor_name)?;
        self.storage.write(|tx| upsert_account(tx, governor_id, governor_name))
    }
}

fn validate_name(name: &str) -> TrackerResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::Validation("Governor name must not be empty".to_string()));
    }
    Ok(name)
}

pub(crate) fn account_exists(conn: &Connection, governor_id: GovernorId) -> TrackerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM Accounts WHERE GovernorId = ?1)",
        params![governor_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn find_account(conn: &Connection, governor_id: GovernorId) -> TrackerResult<Option<Account>> {
    let row: Option<(String, String)> = conn
        .prepare_cached("SELECT GovernorName, OldGovernorNames FROM Accounts WHERE GovernorId = ?1")?
        .query_row(params![governor_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;

    match row {
        Some((governor_name, old_names)) => Ok(Some(Account {
            governor_id,
            governor_name,
            old_governor_names: parse_old_names(governor_id, &old_names)?,
        })),
        None => Ok(None),
    }
}

/// Inserts the account, or renames it. A rename keeps the previous name in
/// `OldGovernorNames` unless it is already the most recent entry there.
pub(crate) fn upsert_account(conn: &Connection, governor_id: GovernorId, governor_name: &str) -> TrackerResult<UpsertOutcome> {
    let existing = match find_account(conn, governor_id)? {
        Some(account) => account,
        None => {
            conn.execute(
                "INSERT INTO Accounts (GovernorId, GovernorName, OldGovernorNames) VALUES (?1, ?2, '[]')",
                params![governor_id, governor_name],
            )?;
            debug!("Inserted governor {} ({})", governor_name, governor_id);
            return Ok(UpsertOutcome::Created);
        }
    };

    if existing.governor_name != governor_name {
        let mut old_names = existing.old_governor_names;
        if old_names.last() != Some(&existing.governor_name) {
            old_names.push(existing.governor_name.clone());
        }
        let old_names = serde_json::to_string(&old_names)
            .map_err(|e| TrackerError::StorageUnavailable(e.to_string()))?;

        conn.execute(
            "UPDATE Accounts SET GovernorName = ?2, OldGovernorNames = ?3 WHERE GovernorId = ?1",
            params![governor_id, governor_name, old_names],
        )?;
        info!("Governor {} renamed from {} to {}", governor_id, existing.governor_name, governor_name);
    }

    Ok(UpsertOutcome::Updated)
}

fn parse_old_names(governor_id: GovernorId, raw: &str) -> TrackerResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        TrackerError::StorageUnavailable(format!(
            "OldGovernorNames for governor {} is not a JSON array: {}",
            governor_id, e
        ))
    })
}
