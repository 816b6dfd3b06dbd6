use std::fmt;
use std::io::Read;
use std::sync::Arc;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{info, warn};
use serde::Deserialize;
use crate::error::{TrackerError, TrackerResult};
use crate::governors::accounts::upsert_account;
use crate::governors::stats::upsert_snapshot;
use crate::storage::models::{NewSnapshot, SnapshotFields, UpsertOutcome};
use crate::storage::StorageClient;

pub const REQUIRED_COLUMNS: [&str; 3] = ["Governor ID", "Governor Name", "Snapshot Time (UTC)"];

const NAIVE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// One CSV line as exported by the scanning tool. Everything stays text until
/// [`ImportRow::validate`] checks it column by column.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ImportRow {
    #[serde(rename = "Governor ID")]
    pub governor_id: Option<String>,
    #[serde(rename = "Governor Name")]
    pub governor_name: Option<String>,
    #[serde(rename = "Snapshot Time (UTC)")]
    pub snapshot_time: Option<String>,
    #[serde(rename = "CH")]
    pub ch: Option<String>,
    #[serde(rename = "Domain")]
    pub domain: Option<String>,
    #[serde(rename = "Clickable")]
    pub clickable: Option<String>,
    #[serde(rename = "Alliance")]
    pub alliance: Option<String>,
    #[serde(rename = "Power")]
    pub power: Option<String>,
    #[serde(rename = "Highest Power")]
    pub highest_power: Option<String>,
    #[serde(rename = "Troop Power")]
    pub troop_power: Option<String>,
    #[serde(rename = "Victory")]
    pub victory: Option<String>,
    #[serde(rename = "Defeat")]
    pub defeat: Option<String>,
    #[serde(rename = "Helps")]
    pub helps: Option<String>,
    #[serde(rename = "Scout Times")]
    pub scout_times: Option<String>,
    #[serde(rename = "Gathered")]
    pub gathered: Option<String>,
    #[serde(rename = "Assistance")]
    pub assistance: Option<String>,
    #[serde(rename = "Total Kill Points")]
    pub total_kill_points: Option<String>,
    #[serde(rename = "Total Kills")]
    pub total_kills: Option<String>,
    #[serde(rename = "T1")]
    pub t1: Option<String>,
    #[serde(rename = "T2")]
    pub t2: Option<String>,
    #[serde(rename = "T3")]
    pub t3: Option<String>,
    #[serde(rename = "T4")]
    pub t4: Option<String>,
    #[serde(rename = "T5")]
    pub t5: Option<String>,
    #[serde(rename = "Ranged")]
    pub ranged: Option<String>,
    #[serde(rename = "Dead")]
    pub dead: Option<String>,
    #[serde(rename = "Healed")]
    pub healed: Option<String>,
    #[serde(rename = "Most Units Killed")]
    pub most_units_killed: Option<String>,
    #[serde(rename = "Most Units Lost")]
    pub most_units_lost: Option<String>,
    #[serde(rename = "Most Units Healed")]
    pub most_units_healed: Option<String>,
    #[serde(rename = "Autarch")]
    pub autarch: Option<String>,
    #[serde(rename = "Participated")]
    pub participated: Option<String>,
    #[serde(rename = "Civilization")]
    pub civilization: Option<String>,
}

impl ImportRow {
    /// Converts the raw columns into a snapshot. A blank snapshot time means "now".
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NewSnapshot, String> {
        let governor_id = match parse_int("Governor ID", &self.governor_id)? {
            Some(id) if id > 0 => id,
            Some(id) => return Err(format!("Governor ID: {} is not a valid governor ID", id)),
            None => return Err("Governor ID: value is missing".to_string()),
        };
        let governor_name = parse_text(&self.governor_name)
            .ok_or_else(|| "Governor Name: value is missing".to_string())?;
        let snapshot_time = parse_time("Snapshot Time (UTC)", &self.snapshot_time)?.unwrap_or(now);

        let fields = SnapshotFields {
            ch: parse_int("CH", &self.ch)?,
            domain: parse_float("Domain", &self.domain)?,
            clickable: parse_bool("Clickable", &self.clickable)?,
            alliance: parse_text(&self.alliance),
            power: parse_int("Power", &self.power)?,
            highest_power: parse_float("Highest Power", &self.highest_power)?,
            troop_power: parse_float("Troop Power", &self.troop_power)?,
            victory: parse_float("Victory", &self.victory)?,
            defeat: parse_float("Defeat", &self.defeat)?,
            helps: parse_float("Helps", &self.helps)?,
            scout_times: parse_float("Scout Times", &self.scout_times)?,
            gathered: parse_float("Gathered", &self.gathered)?,
            assistance: parse_float("Assistance", &self.assistance)?,
            total_kill_points: parse_float("Total Kill Points", &self.total_kill_points)?,
            total_kills: parse_float("Total Kills", &self.total_kills)?,
            t1_kills: parse_int("T1", &self.t1)?,
            t2_kills: parse_int("T2", &self.t2)?,
            t3_kills: parse_int("T3", &self.t3)?,
            t4_kills: parse_int("T4", &self.t4)?,
            t5_kills: parse_int("T5", &self.t5)?,
            ranged_kills: parse_float("Ranged", &self.ranged)?,
            dead: parse_float("Dead", &self.dead)?,
            healed: parse_float("Healed", &self.healed)?,
            most_units_killed: parse_float("Most Units Killed", &self.most_units_killed)?,
            most_units_lost: parse_float("Most Units Lost", &self.most_units_lost)?,
            most_units_healed: parse_float("Most Units Healed", &self.most_units_healed)?,
            autarch: parse_float("Autarch", &self.autarch)?,
            participated: parse_float("Participated", &self.participated)?,
            civilization: parse_text(&self.civilization),
        };

        Ok(NewSnapshot {
            governor_id,
            governor_name,
            snapshot_time,
            fields,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line in the file, header included.
    pub line: u64,
    pub governor_id: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.governor_id {
            Some(id) => write!(f, "Governor ID {} (line {}): {}", id, self.line, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn fail(&mut self, line: u64, governor_id: Option<String>, message: String) {
        self.failed += 1;
        self.errors.push(RowError { line, governor_id, message });
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "CSV Import Results:")?;
        writeln!(f, "- Total Governors: {}", self.total)?;
        writeln!(f, "- Added: {}", self.added)?;
        writeln!(f, "- Updated: {}", self.updated)?;
        write!(f, "- Failed: {}", self.failed)?;
        if !self.errors.is_empty() {
            write!(f, "\n\nErrors:")?;
            for error in &self.errors {
                write!(f, "\n- {}", error)?;
            }
        }
        Ok(())
    }
}

/// Bulk upsert of accounts and their snapshots. Rows are independent: one bad row
/// is recorded in the report and the rest still go in.
pub struct CsvImporter {
    storage: Arc<StorageClient>,
}

impl CsvImporter {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }

    pub fn import_csv<R: Read>(&self, reader: R, now: DateTime<Utc>) -> TrackerResult<ImportReport> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !headers.iter().any(|h| h == *column))
            .collect();
        if !missing.is_empty() {
            return Err(TrackerError::Validation(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        let mut report = ImportReport::default();
        let mut record = csv::StringRecord::new();
        loop {
            match rdr.read_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    report.total += 1;
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    report.fail(line, None, format!("could not read row: {}", e));
                    continue;
                }
            }
            report.total += 1;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let row: ImportRow = match record.deserialize(Some(&headers)) {
                Ok(row) => row,
                Err(e) => {
                    report.fail(line, None, format!("could not read row: {}", e));
                    continue;
                }
            };

            let snapshot = match row.validate(now) {
                Ok(snapshot) => snapshot,
                Err(message) => {
                    report.fail(line, row.governor_id.clone(), message);
                    continue;
                }
            };

            match self.import_row(&snapshot) {
                Ok(UpsertOutcome::Created) => report.added += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!("Import of governor {} failed: {}", snapshot.governor_id, e);
                    report.fail(line, Some(snapshot.governor_id.to_string()), e.to_string());
                }
            }
        }

        info!(
            "CSV import finished: {} rows, {} added, {} updated, {} failed",
            report.total, report.added, report.updated, report.failed
        );
        Ok(report)
    }

    /// Account first, then its snapshot, in one transaction.
    fn import_row(&self, snapshot: &NewSnapshot) -> TrackerResult<UpsertOutcome> {
        self.storage.write(|tx| {
            let outcome = upsert_account(tx, snapshot.governor_id, &snapshot.governor_name)?;
            upsert_snapshot(tx, snapshot)?;
            Ok(outcome)
        })
    }
}

fn clean(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn parse_text(raw: &Option<String>) -> Option<String> {
    clean(raw).map(str::to_string)
}

fn strip_separators(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, ',' | '_' | ' ')).collect()
}

pub(crate) fn parse_int(column: &str, raw: &Option<String>) -> Result<Option<i64>, String> {
    let Some(value) = clean(raw) else {
        return Ok(None);
    };
    let digits = strip_separators(value);
    if let Ok(parsed) = digits.parse::<i64>() {
        return Ok(Some(parsed));
    }
    // spreadsheets like to write whole numbers as "1200.0"
    match digits.parse::<f64>() {
        Ok(parsed) if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 => Ok(Some(parsed as i64)),
        _ => Err(format!("{}: '{}' is not a whole number", column, value)),
    }
}

pub(crate) fn parse_float(column: &str, raw: &Option<String>) -> Result<Option<f64>, String> {
    let Some(value) = clean(raw) else {
        return Ok(None);
    };
    match strip_separators(value).parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(Some(parsed)),
        _ => Err(format!("{}: '{}' is not a number", column, value)),
    }
}

pub(crate) fn parse_bool(column: &str, raw: &Option<String>) -> Result<Option<bool>, String> {
    let Some(value) = clean(raw) else {
        return Ok(None);
    };
    match value.to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(Some(true)),
        "false" | "no" | "n" | "0" => Ok(Some(false)),
        _ => Err(format!("{}: '{}' is not true or false", column, value)),
    }
}

pub(crate) fn parse_time(column: &str, raw: &Option<String>) -> Result<Option<DateTime<Utc>>, String> {
    let Some(value) = clean(raw) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    for format in NAIVE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Some(parsed.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Some(midnight.and_utc()));
        }
    }
    Err(format!("{}: '{}' is not a recognised date/time", column, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::governors::accounts::AccountStore;
    use crate::governors::stats::StatsStore;

    struct Fixture {
        accounts: AccountStore,
        stats: StatsStore,
        importer: CsvImporter,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(StorageClient::open_in_memory().unwrap());
        Fixture {
            accounts: AccountStore::new(Arc::clone(&storage)),
            stats: StatsStore::new(Arc::clone(&storage)),
            importer: CsvImporter::new(storage),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 9, 15, 0).unwrap()
    }

    #[test]
    fn missing_required_columns_abort_before_writing() {
        let f = fixture();
        let csv = "Governor ID,Power\n1,100\n";

        let err = f.importer.import_csv(csv.as_bytes(), now()).unwrap_err();
        assert_eq!(
            err,
            TrackerError::Validation("Missing required columns: Governor Name, Snapshot Time (UTC)".to_string())
        );
        assert_eq!(f.accounts.find_account(1).unwrap(), None);
    }

    #[test]
    fn bad_rows_do_not_stop_the_rest() {
        let f = fixture();
        f.accounts.create_account(2, "Old Name").unwrap();
        let csv = "\
Governor ID,Governor Name,Snapshot Time (UTC),Power,T4,Clickable,Alliance
1,Alpha,2025-03-01 10:00:00,\"55,000,000\",1200,true,ABC
2,Bravo,2025-03-01 10:00:00,42000000,,no,
3,Charlie,2025-03-01 10:00:00,lots,,,
,Nobody,2025-03-01 10:00:00,1,,,
4,Delta,2025-03-01 10:00:00,1,,,
";

        let report = f.importer.import_csv(csv.as_bytes(), now()).unwrap();

        assert_eq!(report.total, 5);
        assert_eq!(report.added, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors[0].governor_id.as_deref(), Some("3"));
        assert_eq!(report.errors[0].line, 4);
        assert!(report.errors[0].message.starts_with("Power:"));
        assert_eq!(report.errors[1].to_string(), "Line 5: Governor ID: value is missing");

        let alpha = f.stats.latest_snapshot(1).unwrap().unwrap();
        assert_eq!(alpha.fields.power, Some(55_000_000));
        assert_eq!(alpha.fields.t4_kills, Some(1200));
        assert_eq!(alpha.fields.clickable, Some(true));
        assert_eq!(alpha.fields.alliance.as_deref(), Some("ABC"));

        let bravo = f.accounts.find_account(2).unwrap().unwrap();
        assert_eq!(bravo.governor_name, "Bravo");
        assert_eq!(bravo.old_governor_names, vec!["Old Name".to_string()]);
        assert_eq!(f.accounts.find_account(3).unwrap(), None);
        assert!(f.accounts.find_account(4).unwrap().is_some());

        let summary = report.to_string();
        assert!(summary.starts_with("CSV Import Results:\n- Total Governors: 5\n- Added: 2"));
        assert!(summary.contains("\n\nErrors:\n- Governor ID 3 (line 4): Power:"));
    }

    #[test]
    fn reimporting_overwrites_snapshots() {
        let f = fixture();
        let first = "Governor ID,Governor Name,Snapshot Time (UTC),Power\n1,Alpha,2025-03-01T10:00:00Z,100\n";
        let second = "Governor ID,Governor Name,Snapshot Time (UTC),Power\n1,Alpha,2025-03-01 10:00:00,200\n";

        assert_eq!(f.importer.import_csv(first.as_bytes(), now()).unwrap().added, 1);
        assert_eq!(f.importer.import_csv(second.as_bytes(), now()).unwrap().updated, 1);

        let history = f.stats.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fields.power, Some(200));
    }

    #[test]
    fn blank_snapshot_time_uses_import_time() {
        let f = fixture();
        let csv = "Governor ID,Governor Name,Snapshot Time (UTC)\n9,Echo,\n";

        f.importer.import_csv(csv.as_bytes(), now()).unwrap();
        assert_eq!(f.stats.latest_snapshot(9).unwrap().unwrap().snapshot_time, now());
    }

    #[test]
    fn value_parsers() {
        let some = |s: &str| Some(s.to_string());

        assert_eq!(parse_int("T1", &some("1,234")), Ok(Some(1234)));
        assert_eq!(parse_int("T1", &some("1200.0")), Ok(Some(1200)));
        assert_eq!(parse_int("T1", &some("  ")), Ok(None));
        assert!(parse_int("T1", &some("12.5")).is_err());
        assert_eq!(parse_float("Dead", &some("3.5")), Ok(Some(3.5)));
        assert!(parse_float("Dead", &some("NaN")).is_err());
        assert_eq!(parse_bool("Clickable", &some("YES")), Ok(Some(true)));
        assert!(parse_bool("Clickable", &some("maybe")).is_err());
        assert_eq!(
            parse_time("t", &some("03/01/2025 10:30")),
            Ok(Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap()))
        );
        assert_eq!(
            parse_time("t", &some("2025-03-01")),
            Ok(Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()))
        );
        assert!(parse_time("t", &some("yesterday")).is_err());
    }
}
