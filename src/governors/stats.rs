use std::sync::Arc;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use crate::error::{TrackerError, TrackerResult};
use crate::governors::accounts::account_exists;
use crate::storage::models::{GovernorId, NewSnapshot, SnapshotFields, StatSnapshot, UpsertOutcome};
use crate::storage::StorageClient;

const SELECT_SNAPSHOT: &str = "SELECT Id, GovernorId, GovernorName, SnapshotTime,
    CH, Domain, Clickable, Alliance, Power, HighestPower, TroopPower, Victory, Defeat,
    Helps, ScoutTimes, Gathered, Assistance, TotalKillPoints, TotalKills,
    T1Kills, T2Kills, T3Kills, T4Kills, T5Kills, RangedKills, Dead, Healed,
    MostUnitsKilled, MostUnitsLost, MostUnitsHealed, Autarch, Participated, Civilization
    FROM AccountStats";

const UPSERT_SNAPSHOT: &str = "INSERT INTO AccountStats (
    GovernorId, GovernorName, SnapshotTime,
    CH, Domain, Clickable, Alliance, Power, HighestPower, TroopPower, Victory, Defeat,
    Helps, ScoutTimes, Gathered, Assistance, TotalKillPoints, TotalKills,
    T1Kills, T2Kills, T3Kills, T4Kills, T5Kills, RangedKills, Dead, Healed,
    MostUnitsKilled, MostUnitsLost, MostUnitsHealed, Autarch, Participated, Civilization
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32
)
ON CONFLICT (GovernorId, SnapshotTime) DO UPDATE SET
    GovernorName = excluded.GovernorName,
    CH = excluded.CH,
    Domain = excluded.Domain,
    Clickable = excluded.Clickable,
    Alliance = excluded.Alliance,
    Power = excluded.Power,
    HighestPower = excluded.HighestPower,
    TroopPower = excluded.TroopPower,
    Victory = excluded.Victory,
    Defeat = excluded.Defeat,
    Helps = excluded.Helps,
    ScoutTimes = excluded.ScoutTimes,
    Gathered = excluded.Gathered,
    Assistance = excluded.Assistance,
    TotalKillPoints = excluded.TotalKillPoints,
    TotalKills = excluded.TotalKills,
    T1Kills = excluded.T1Kills,
    T2Kills = excluded.T2Kills,
    T3Kills = excluded.T3Kills,
    T4Kills = excluded.T4Kills,
    T5Kills = excluded.T5Kills,
    RangedKills = excluded.RangedKills,
    Dead = excluded.Dead,
    Healed = excluded.Healed,
    MostUnitsKilled = excluded.MostUnitsKilled,
    MostUnitsLost = excluded.MostUnitsLost,
    MostUnitsHealed = excluded.MostUnitsHealed,
    Autarch = excluded.Autarch,
    Participated = excluded.Participated,
    Civilization = excluded.Civilization";

/// Point-in-time statistics, one row per (governor, snapshot time).
pub struct StatsStore {
    storage: Arc<StorageClient>,
}

impl StatsStore {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }

    pub fn upsert_snapshot(&self, snapshot: &NewSnapshot) -> TrackerResult<UpsertOutcome> {
        self.storage.write(|tx| upsert_snapshot(tx, snapshot))
    }

    /// Snapshot with the greatest `SnapshotTime`; the later row wins a tie.
    pub fn latest_snapshot(&self, governor_id: GovernorId) -> TrackerResult<Option<StatSnapshot>> {
        self.storage.read(|conn| {
            let sql = format!(
                "{} WHERE GovernorId = ?1 ORDER BY SnapshotTime DESC, Id DESC LIMIT 1",
                SELECT_SNAPSHOT
            );
            let snapshot = conn
                .prepare_cached(&sql)?
                .query_row(params![governor_id], snapshot_from_row)
                .optional()?;
            Ok(snapshot)
        })
    }

    /// Every snapshot of a governor, oldest first.
    pub fn history(&self, governor_id: GovernorId) -> TrackerResult<Vec<StatSnapshot>> {
        self.storage.read(|conn| {
            let sql = format!("{} WHERE GovernorId = ?1 ORDER BY SnapshotTime, Id", SELECT_SNAPSHOT);
            let mut stmt = conn.prepare_cached(&sql)?;
            let snapshots = stmt
                .query_map(params![governor_id], snapshot_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(snapshots)
        })
    }
}

/// The account must already exist: imports upsert the account first, in the same transaction.
pub(crate) fn upsert_snapshot(conn: &Connection, snapshot: &NewSnapshot) -> TrackerResult<UpsertOutcome> {
    if !account_exists(conn, snapshot.governor_id)? {
        return Err(TrackerError::UnknownAccount(snapshot.governor_id));
    }

    let existed: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM AccountStats WHERE GovernorId = ?1 AND SnapshotTime = ?2)",
        params![snapshot.governor_id, snapshot.snapshot_time],
        |row| row.get(0),
    )?;

    let f = &snapshot.fields;
    conn.prepare_cached(UPSERT_SNAPSHOT)?.execute(params![
        snapshot.governor_id,
        snapshot.governor_name,
        snapshot.snapshot_time,
        f.ch,
        f.domain,
        f.clickable,
        f.alliance,
        f.power,
        f.highest_power,
        f.troop_power,
        f.victory,
        f.defeat,
        f.helps,
        f.scout_times,
        f.gathered,
        f.assistance,
        f.total_kill_points,
        f.total_kills,
        f.t1_kills,
        f.t2_kills,
        f.t3_kills,
        f.t4_kills,
        f.t5_kills,
        f.ranged_kills,
        f.dead,
        f.healed,
        f.most_units_killed,
        f.most_units_lost,
        f.most_units_healed,
        f.autarch,
        f.participated,
        f.civilization,
    ])?;

    debug!(
        "Stored snapshot for governor {} at {}",
        snapshot.governor_id, snapshot.snapshot_time
    );
    Ok(if existed == 1 { UpsertOutcome::Updated } else { UpsertOutcome::Created })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<StatSnapshot> {
    Ok(StatSnapshot {
        id: row.get("Id")?,
        governor_id: row.get("GovernorId")?,
        governor_name: row.get("GovernorName")?,
        snapshot_time: row.get("SnapshotTime")?,
        fields: SnapshotFields {
            ch: row.get("CH")?,
            domain: row.get("Domain")?,
            clickable: row.get("Clickable")?,
            alliance: row.get("Alliance")?,
            power: row.get("Power")?,
            highest_power: row.get("HighestPower")?,
            troop_power: row.get("TroopPower")?,
            victory: row.get("Victory")?,
            defeat: row.get("Defeat")?,
            helps: row.get("Helps")?,
            scout_times: row.get("ScoutTimes")?,
            gathered: row.get("Gathered")?,
            assistance: row.get("Assistance")?,
            total_kill_points: row.get("TotalKillPoints")?,
            total_kills: row.get("TotalKills")?,
            t1_kills: row.get("T1Kills")?,
            t2_kills: row.get("T2Kills")?,
            t3_kills: row.get("T3Kills")?,
            t4_kills: row.get("T4Kills")?,
            t5_kills: row.get("T5Kills")?,
            ranged_kills: row.get("RangedKills")?,
            dead: row.get("Dead")?,
            healed: row.get("Healed")?,
            most_units_killed: row.get("MostUnitsKilled")?,
            most_units_lost: row.get("MostUnitsLost")?,
            most_units_healed: row.get("MostUnitsHealed")?,
            autarch: row.get("Autarch")?,
            participated: row.get("Participated")?,
            civilization: row.get("Civilization")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governors::accounts::AccountStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn stores() -> (AccountStore, StatsStore) {
        let storage = Arc::new(StorageClient::open_in_memory().unwrap());
        (AccountStore::new(Arc::clone(&storage)), StatsStore::new(storage))
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn snapshot(governor_id: GovernorId, time: DateTime<Utc>, power: i64) -> NewSnapshot {
        NewSnapshot {
            governor_id,
            governor_name: "Kingslayer".to_string(),
            snapshot_time: time,
            fields: SnapshotFields {
                power: Some(power),
                t4_kills: Some(1_200_000),
                dead: Some(35_000.0),
                clickable: Some(true),
                alliance: Some("ABC".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn upsert_round_trips_fields() {
        let (accounts, stats) = stores();
        accounts.create_account(1, "Kingslayer").unwrap();

        let written = snapshot(1, at(10), 55_000_000);
        assert_eq!(stats.upsert_snapshot(&written).unwrap(), UpsertOutcome::Created);

        let read = stats.latest_snapshot(1).unwrap().unwrap();
        assert_eq!(read.governor_id, 1);
        assert_eq!(read.snapshot_time, written.snapshot_time);
        assert_eq!(read.fields, written.fields);
    }

    #[test]
    fn second_upsert_overwrites_instead_of_duplicating() {
        let (accounts, stats) = stores();
        accounts.create_account(1, "Kingslayer").unwrap();

        stats.upsert_snapshot(&snapshot(1, at(10), 1)).unwrap();
        let mut again = snapshot(1, at(10), 2);
        again.fields.alliance = None;
        assert_eq!(stats.upsert_snapshot(&again).unwrap(), UpsertOutcome::Updated);

        let history = stats.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fields.power, Some(2));
        assert_eq!(history[0].fields.alliance, None);
    }

    #[test]
    fn latest_snapshot_uses_snapshot_time_not_insert_order() {
        let (accounts, stats) = stores();
        accounts.create_account(1, "Kingslayer").unwrap();

        stats.upsert_snapshot(&snapshot(1, at(12), 300)).unwrap();
        stats.upsert_snapshot(&snapshot(1, at(8), 100)).unwrap();

        assert_eq!(stats.latest_snapshot(1).unwrap().unwrap().fields.power, Some(300));
        let powers: Vec<_> = stats.history(1).unwrap().iter().map(|s| s.fields.power).collect();
        assert_eq!(powers, vec![Some(100), Some(300)]);
    }

    #[test]
    fn snapshot_requires_account() {
        let (_, stats) = stores();
        assert_eq!(
            stats.upsert_snapshot(&snapshot(5, at(1), 1)).unwrap_err(),
            TrackerError::UnknownAccount(5)
        );
        assert_eq!(stats.latest_snapshot(5).unwrap(), None);
    }
}
