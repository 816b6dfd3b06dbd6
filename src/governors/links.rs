use std::collections::HashSet;
use std::sync::Arc;
use log::{debug, info, warn};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use crate::error::{is_unique_violation, TrackerError, TrackerResult};
use crate::governors::accounts::{account_exists, find_account};
use crate::storage::models::{GovernorId, Link, LinkedAccount};
use crate::storage::StorageClient;

/// Result of linking several farms to one main. Candidates are evaluated and
/// committed one at a time, so a report can mix successes and failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkBatchReport {
    pub main: Option<LinkedAccount>,
    pub linked: Vec<LinkedAccount>,
    /// `(farm, current main)` pairs left untouched.
    pub already_linked: Vec<(GovernorId, GovernorId)>,
    pub unknown: Vec<GovernorId>,
    pub rejected: Vec<(GovernorId, TrackerError)>,
}

/// Keeps the main/farm relationship two-level: a farm has at most one main,
/// and no governor is ever both a main and a farm.
pub struct LinkEngine {
    storage: Arc<StorageClient>,
}

impl LinkEngine {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self { storage }
    }

    pub fn create_link(&self, main: GovernorId, farm: GovernorId) -> TrackerResult<Link> {
        let link = self.storage.write(|tx| insert_link(tx, main, farm))?;
        info!("Linked farm {} to main {}", farm, main);
        Ok(link)
    }

    pub fn link_farms(&self, main: GovernorId, farms: &[GovernorId]) -> TrackerResult<LinkBatchReport> {
        let main_account = self
            .storage
            .read(|conn| find_account(conn, main))?
            .ok_or(TrackerError::UnknownAccount(main))?;

        let mut report = LinkBatchReport {
            main: Some(LinkedAccount {
                governor_id: main_account.governor_id,
                governor_name: main_account.governor_name,
            }),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        for &farm in farms {
            if !seen.insert(farm) {
                continue;
            }
            let outcome = self.storage.write(|tx| {
                let link = insert_link(tx, main, farm)?;
                let name = find_account(tx, farm)?
                    .map(|account| account.governor_name)
                    .unwrap_or_default();
                Ok((link, name))
            });

            match outcome {
                Ok((_, governor_name)) => report.linked.push(LinkedAccount {
                    governor_id: farm,
                    governor_name,
                }),
                Err(TrackerError::UnknownAccount(id)) if id == farm => report.unknown.push(farm),
                Err(TrackerError::FarmAlreadyLinked { farm, main: owner }) => {
                    report.already_linked.push((farm, owner))
                }
                Err(err) if err.is_link_violation() => report.rejected.push((farm, err)),
                Err(err) => {
                    warn!("Linking farm {} to main {} failed: {}", farm, main, err);
                    return Err(err);
                }
            }
        }

        info!(
            "Batch link for main {}: {} linked, {} already linked, {} unknown, {} rejected",
            main,
            report.linked.len(),
            report.already_linked.len(),
            report.unknown.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    /// Deletes the listed farms' links to `main`. Farms linked elsewhere, or not at all, are skipped.
    pub fn remove_links(&self, main: GovernorId, farms: &[GovernorId]) -> TrackerResult<usize> {
        if farms.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; farms.len()].join(", ");
        let sql = format!(
            "DELETE FROM AccountLinks WHERE MainGovernorId = ? AND FarmGovernorId IN ({})",
            placeholders
        );

        let removed = self.storage.write(|tx| {
            let values = std::iter::once(main).chain(farms.iter().copied());
            Ok(tx.execute(&sql, params_from_iter(values))?)
        })?;

        info!("Unlinked {} farm account(s) from main {}", removed, main);
        Ok(removed)
    }

    /// Farms of `main`, in the order they were linked.
    pub fn list_farms(&self, main: GovernorId) -> TrackerResult<Vec<LinkedAccount>> {
        self.storage.read(|conn| {
            linked_accounts(
                conn,
                "SELECT a.GovernorId, a.GovernorName FROM AccountLinks l
                 JOIN Accounts a ON a.GovernorId = l.FarmGovernorId
                 WHERE l.MainGovernorId = ?1
                 ORDER BY l.Id",
                main,
            )
        })
    }

    /// Mains owning `farm`. At most one entry while the unique farm constraint holds.
    pub fn find_owners(&self, farm: GovernorId) -> TrackerResult<Vec<LinkedAccount>> {
        self.storage.read(|conn| {
            linked_accounts(
                conn,
                "SELECT a.GovernorId, a.GovernorName FROM AccountLinks l
                 JOIN Accounts a ON a.GovernorId = l.MainGovernorId
                 WHERE l.FarmGovernorId = ?1
                 ORDER BY l.Id",
                farm,
            )
        })
    }
}

/// Validates and inserts one link. Must run inside a write transaction so the
/// checks and the insert see the same state.
fn insert_link(conn: &Connection, main: GovernorId, farm: GovernorId) -> TrackerResult<Link> {
    if main == farm {
        return Err(TrackerError::SelfLink(main));
    }
    if !account_exists(conn, main)? {
        return Err(TrackerError::UnknownAccount(main));
    }
    if !account_exists(conn, farm)? {
        return Err(TrackerError::UnknownAccount(farm));
    }
    if let Some(owner) = owner_of(conn, farm)? {
        return Err(TrackerError::FarmAlreadyLinked { farm, main: owner });
    }
    if is_main(conn, farm)? {
        return Err(TrackerError::CannotFarmAMain(farm));
    }
    if owner_of(conn, main)?.is_some() {
        return Err(TrackerError::CannotMainAFarm(main));
    }

    conn.execute(
        "INSERT INTO AccountLinks (MainGovernorId, FarmGovernorId) VALUES (?1, ?2)",
        params![main, farm],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            TrackerError::FarmAlreadyLinked { farm, main }
        } else {
            e.into()
        }
    })?;

    let link = Link {
        id: conn.last_insert_rowid(),
        main_governor_id: main,
        farm_governor_id: farm,
    };
    debug!("Inserted link {:?}", link);
    Ok(link)
}

fn owner_of(conn: &Connection, farm: GovernorId) -> TrackerResult<Option<GovernorId>> {
    let owner = conn
        .prepare_cached("SELECT MainGovernorId FROM AccountLinks WHERE FarmGovernorId = ?1 ORDER BY Id LIMIT 1")?
        .query_row(params![farm], |row| row.get(0))
        .optional()?;
    Ok(owner)
}

fn is_main(conn: &Connection, governor_id: GovernorId) -> TrackerResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM AccountLinks WHERE MainGovernorId = ?1)",
        params![governor_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn linked_accounts(conn: &Connection, sql: &str, governor_id: GovernorId) -> TrackerResult<Vec<LinkedAccount>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let accounts = stmt
        .query_map(params![governor_id], |row| {
            Ok(LinkedAccount {
                governor_id: row.get(0)?,
                governor_name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governors::accounts::AccountStore;

    fn engine_with_accounts(ids: &[GovernorId]) -> LinkEngine {
        let storage = Arc::new(StorageClient::open_in_memory().unwrap());
        let accounts = AccountStore::new(Arc::clone(&storage));
        for id in ids {
            accounts.create_account(*id, &format!("Gov{}", id)).unwrap();
        }
        LinkEngine::new(storage)
    }

    fn ids(accounts: &[LinkedAccount]) -> Vec<GovernorId> {
        accounts.iter().map(|a| a.governor_id).collect()
    }

    #[test]
    fn create_link_records_both_sides() {
        let engine = engine_with_accounts(&[1, 2]);
        let link = engine.create_link(1, 2).unwrap();

        assert_eq!(link.main_governor_id, 1);
        assert_eq!(link.farm_governor_id, 2);
        assert_eq!(engine.list_farms(1).unwrap(), vec![LinkedAccount { governor_id: 2, governor_name: "Gov2".into() }]);
        assert_eq!(engine.find_owners(2).unwrap(), vec![LinkedAccount { governor_id: 1, governor_name: "Gov1".into() }]);
    }

    #[test]
    fn unknown_accounts_are_rejected() {
        let engine = engine_with_accounts(&[1]);
        assert_eq!(engine.create_link(9, 1).unwrap_err(), TrackerError::UnknownAccount(9));
        assert_eq!(engine.create_link(1, 9).unwrap_err(), TrackerError::UnknownAccount(9));
    }

    #[test]
    fn self_link_is_rejected() {
        let engine = engine_with_accounts(&[1]);
        assert_eq!(engine.create_link(1, 1).unwrap_err(), TrackerError::SelfLink(1));
    }

    #[test]
    fn farm_keeps_its_first_main() {
        let engine = engine_with_accounts(&[1, 2, 3]);
        engine.create_link(1, 2).unwrap();

        assert_eq!(
            engine.create_link(3, 2).unwrap_err(),
            TrackerError::FarmAlreadyLinked { farm: 2, main: 1 }
        );
        assert_eq!(
            engine.create_link(1, 2).unwrap_err(),
            TrackerError::FarmAlreadyLinked { farm: 2, main: 1 }
        );
        assert_eq!(ids(&engine.find_owners(2).unwrap()), vec![1]);
    }

    #[test]
    fn mains_and_farms_stay_disjoint() {
        let engine = engine_with_accounts(&[1, 2, 3]);
        engine.create_link(1, 2).unwrap();

        // 2 is a farm, so it cannot take farms of its own
        assert_eq!(engine.create_link(2, 3).unwrap_err(), TrackerError::CannotMainAFarm(2));
        // 1 is a main, so it cannot become someone's farm
        assert_eq!(engine.create_link(3, 1).unwrap_err(), TrackerError::CannotFarmAMain(1));
        assert!(engine.list_farms(3).unwrap().is_empty());
    }

    #[test]
    fn batch_reports_every_bucket() {
        let engine = engine_with_accounts(&[1, 2, 3, 9]);
        engine.create_link(9, 3).unwrap();

        let report = engine.link_farms(1, &[2, 3, 4]).unwrap();

        assert_eq!(report.main.as_ref().map(|m| m.governor_id), Some(1));
        assert_eq!(ids(&report.linked), vec![2]);
        assert_eq!(report.already_linked, vec![(3, 9)]);
        assert_eq!(report.unknown, vec![4]);
        assert!(report.rejected.is_empty());
        assert_eq!(ids(&engine.find_owners(3).unwrap()), vec![9]);
    }

    #[test]
    fn batch_collects_invariant_rejections() {
        let engine = engine_with_accounts(&[1, 2, 5, 6]);
        engine.create_link(5, 6).unwrap();

        let report = engine.link_farms(1, &[1, 5, 2, 2]).unwrap();

        assert_eq!(ids(&report.linked), vec![2]);
        assert_eq!(
            report.rejected,
            vec![(1, TrackerError::SelfLink(1)), (5, TrackerError::CannotFarmAMain(5))]
        );
    }

    #[test]
    fn batch_requires_existing_main() {
        let engine = engine_with_accounts(&[2]);
        assert_eq!(engine.link_farms(1, &[2]).unwrap_err(), TrackerError::UnknownAccount(1));
        assert!(engine.find_owners(2).unwrap().is_empty());
    }

    #[test]
    fn remove_links_only_touches_matching_pairs() {
        let engine = engine_with_accounts(&[1, 2, 3, 4, 5]);
        engine.link_farms(1, &[2, 3]).unwrap();
        engine.create_link(4, 5).unwrap();

        assert_eq!(engine.remove_links(1, &[2, 5]).unwrap(), 1);
        assert_eq!(ids(&engine.list_farms(1).unwrap()), vec![3]);
        assert_eq!(ids(&engine.list_farms(4).unwrap()), vec![5]);

        assert_eq!(engine.remove_links(1, &[2]).unwrap(), 0);
        assert_eq!(engine.remove_links(1, &[]).unwrap(), 0);
    }

    #[test]
    fn unlinked_main_can_become_a_farm() {
        let engine = engine_with_accounts(&[1, 2, 3]);
        engine.create_link(1, 2).unwrap();
        engine.remove_links(1, &[2]).unwrap();

        engine.create_link(3, 1).unwrap();
        assert_eq!(ids(&engine.find_owners(1).unwrap()), vec![3]);
    }

    #[test]
    fn list_farms_follows_link_order() {
        let engine = engine_with_accounts(&[1, 5, 3, 8]);
        engine.link_farms(1, &[8, 3, 5]).unwrap();

        let first = engine.list_farms(1).unwrap();
        assert_eq!(ids(&first), vec![8, 3, 5]);
        assert_eq!(engine.list_farms(1).unwrap(), first);
    }

    #[test]
    fn find_owners_of_unlinked_account_is_empty() {
        let engine = engine_with_accounts(&[1]);
        assert!(engine.find_owners(1).unwrap().is_empty());
    }
}
