use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GovernorId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub governor_id: GovernorId,
    pub governor_name: String,
    pub old_governor_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: i64,
    pub main_governor_id: GovernorId,
    pub farm_governor_id: GovernorId,
}

/// The other side of a link: a farm when listing a main's farms, a main when looking up owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub governor_id: GovernorId,
    pub governor_name: String,
}

/// Everything a snapshot records besides its key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFields {
    pub ch: Option<i64>,
    pub domain: Option<f64>,
    pub clickable: Option<bool>,
    pub alliance: Option<String>,
    pub power: Option<i64>,
    pub highest_power: Option<f64>,
    pub troop_power: Option<f64>,
    pub victory: Option<f64>,
    pub defeat: Option<f64>,
    pub helps: Option<f64>,
    pub scout_times: Option<f64>,
    pub gathered: Option<f64>,
    pub assistance: Option<f64>,
    pub total_kill_points: Option<f64>,
    pub total_kills: Option<f64>,
    pub t1_kills: Option<i64>,
    pub t2_kills: Option<i64>,
    pub t3_kills: Option<i64>,
    pub t4_kills: Option<i64>,
    pub t5_kills: Option<i64>,
    pub ranged_kills: Option<f64>,
    pub dead: Option<f64>,
    pub healed: Option<f64>,
    pub most_units_killed: Option<f64>,
    pub most_units_lost: Option<f64>,
    pub most_units_healed: Option<f64>,
    pub autarch: Option<f64>,
    pub participated: Option<f64>,
    pub civilization: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub governor_id: GovernorId,
    pub governor_name: String,
    pub snapshot_time: DateTime<Utc>,
    pub fields: SnapshotFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatSnapshot {
    pub id: i64,
    pub governor_id: GovernorId,
    pub governor_name: String,
    pub snapshot_time: DateTime<Utc>,
    pub fields: SnapshotFields,
}
