//! PostgreSQL-backed stores.
//!
//! One `PgStore` serves run records, the observation archive and cooldown
//! state. Schema lives in `sql/001_monitor_schema.sql`.
//!
//! Cooldown claims run inside a transaction holding a row lock
//! (`SELECT ... FOR UPDATE`), so concurrent monitors sharing a database
//! cannot both dispatch for the same pair.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use postgres::{Client, NoTls, Row, Transaction};

use crate::alert::cooldown::{Claim, CooldownKey, CooldownState, CooldownStore, decide};
use crate::model::{MonitorError, Observation, RunRecord, RunStatus};
use crate::store::{ObservationStore, RunQuery, RunStore};

/// Postgres keeps microseconds; anything finer would break equality checks
/// on values read back.
const TIMESTAMP_PRECISION: u16 = 6;

impl From<postgres::Error> for MonitorError {
    fn from(err: postgres::Error) -> Self {
        MonitorError::Persistence(err.to_string())
    }
}

pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    pub fn connect(database_url: &str) -> Result<Self, MonitorError> {
        let client = Client::connect(database_url, NoTls)?;
        Ok(PgStore { client: Mutex::new(client) })
    }

    /// Connect and check that the monitor tables exist.
    pub fn connect_and_verify(database_url: &str) -> Result<Self, MonitorError> {
        let store = Self::connect(database_url)?;
        let row = store.lock().query_one(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_name IN ('run_records', 'observations', 'cooldown_state')",
            &[],
        )?;
        let found: i64 = row.get(0);
        if found < 3 {
            return Err(MonitorError::Configuration(format!(
                "database is missing monitor tables ({} of 3 found); apply sql/001_monitor_schema.sql",
                found
            )));
        }
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Client> {
        self.client.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn run_record_from_row(row: &Row) -> Result<RunRecord, MonitorError> {
    let status: String = row.get("status");
    let status: RunStatus = status.parse().map_err(MonitorError::Persistence)?;
    let count: i32 = row.get("observation_count");
    Ok(RunRecord {
        station_id: row.get("station_id"),
        checked_at: row.get("checked_at"),
        status,
        newest_observation_time: row.get("newest_observation_time"),
        observation_count: u32::try_from(count).unwrap_or(0),
        detail: row.get("detail"),
    })
}

impl RunStore for PgStore {
    fn ping(&self) -> Result<(), MonitorError> {
        self.lock().simple_query("SELECT 1")?;
        Ok(())
    }

    fn upsert(&self, record: &RunRecord) -> Result<(), MonitorError> {
        let count = i32::try_from(record.observation_count).unwrap_or(i32::MAX);
        self.lock().execute(
            "INSERT INTO run_records
                (station_id, checked_at, status, newest_observation_time, observation_count, detail)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (station_id, checked_at) DO UPDATE SET
                status = EXCLUDED.status,
                newest_observation_time = EXCLUDED.newest_observation_time,
                observation_count = EXCLUDED.observation_count,
                detail = EXCLUDED.detail",
            &[
                &record.station_id,
                &record.checked_at,
                &record.status.as_str(),
                &record.newest_observation_time,
                &count,
                &record.detail,
            ],
        )?;
        Ok(())
    }

    fn query(&self, query: &RunQuery) -> Result<Vec<RunRecord>, MonitorError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = self.lock().query(
            "SELECT station_id, checked_at, status, newest_observation_time, observation_count, detail
             FROM run_records
             WHERE ($1::text IS NULL OR station_id = $1)
               AND ($2::timestamptz IS NULL OR checked_at >= $2)
               AND ($3::timestamptz IS NULL OR checked_at < $3)
             ORDER BY checked_at DESC, station_id
             LIMIT $4",
            &[&query.station_id, &query.range.start, &query.range.end, &limit],
        )?;
        rows.iter().map(run_record_from_row).collect()
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let removed = self
            .lock()
            .execute("DELETE FROM run_records WHERE checked_at < $1", &[&older_than])?;
        Ok(removed as usize)
    }

    fn latest_newest_observation(&self, station_id: &str) -> Result<Option<DateTime<Utc>>, MonitorError> {
        let row = self.lock().query_one(
            "SELECT MAX(newest_observation_time) FROM run_records WHERE station_id = $1",
            &[&station_id],
        )?;
        Ok(row.get(0))
    }
}

impl ObservationStore for PgStore {
    fn upsert_observations(
        &self,
        observations: &[Observation],
        collected_at: DateTime<Utc>,
    ) -> Result<usize, MonitorError> {
        if observations.is_empty() {
            return Ok(0);
        }
        let mut client = self.lock();
        let mut tx = client.transaction()?;
        let statement = tx.prepare(
            "INSERT INTO observations (station_id, observation_time, raw_text, collected_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (station_id, observation_time) DO UPDATE SET
                raw_text = EXCLUDED.raw_text,
                collected_at = EXCLUDED.collected_at",
        )?;
        for obs in observations {
            tx.execute(&statement, &[&obs.station_id, &obs.observation_time, &obs.raw_text, &collected_at])?;
        }
        tx.commit()?;
        Ok(observations.len())
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let removed = self
            .lock()
            .execute("DELETE FROM observations WHERE observation_time < $1", &[&older_than])?;
        Ok(removed as usize)
    }
}

fn select_cooldown_for_update(tx: &mut Transaction<'_>, key: &CooldownKey) -> Result<Option<CooldownState>, MonitorError> {
    let row = tx.query_opt(
        "SELECT last_alert_sent_at, last_cycle_at FROM cooldown_state
         WHERE station_id = $1 AND owner_key = $2
         FOR UPDATE",
        &[&key.station_id, &key.owner_key()],
    )?;
    Ok(row.map(|r| CooldownState {
        last_alert_sent_at: r.get(0),
        last_cycle_at: r.get(1),
    }))
}

impl CooldownStore for PgStore {
    fn try_claim(
        &self,
        key: &CooldownKey,
        cycle_at: DateTime<Utc>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Claim, MonitorError> {
        let cycle_at = cycle_at.trunc_subsecs(TIMESTAMP_PRECISION);
        let now = now.trunc_subsecs(TIMESTAMP_PRECISION);

        let mut client = self.lock();
        let mut tx = client.transaction()?;

        let mut current = select_cooldown_for_update(&mut tx, key)?;
        if current.is_none() {
            // No row to lock yet: the insert itself is the claim. Losing the
            // race means another monitor inserted first; decide against its row.
            let inserted = tx.execute(
                "INSERT INTO cooldown_state (station_id, owner_key, last_alert_sent_at, last_cycle_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (station_id, owner_key) DO NOTHING",
                &[&key.station_id, &key.owner_key(), &now, &cycle_at],
            )?;
            if inserted == 1 {
                tx.commit()?;
                return Ok(decide(None, cycle_at, now, window));
            }
            current = select_cooldown_for_update(&mut tx, key)?;
        }

        let claim = decide(current, cycle_at, now, window);
        if let Claim::Granted { claimed, .. } = claim {
            tx.execute(
                "UPDATE cooldown_state SET last_alert_sent_at = $3, last_cycle_at = $4
                 WHERE station_id = $1 AND owner_key = $2",
                &[&key.station_id, &key.owner_key(), &claimed.last_alert_sent_at, &claimed.last_cycle_at],
            )?;
        }
        tx.commit()?;
        Ok(claim)
    }

    fn release(
        &self,
        key: &CooldownKey,
        claimed: &CooldownState,
        previous: Option<CooldownState>,
    ) -> Result<(), MonitorError> {
        let mut client = self.lock();
        match previous {
            Some(state) => client.execute(
                "UPDATE cooldown_state SET last_alert_sent_at = $3, last_cycle_at = $4
                 WHERE station_id = $1 AND owner_key = $2
                   AND last_alert_sent_at = $5 AND last_cycle_at = $6",
                &[
                    &key.station_id,
                    &key.owner_key(),
                    &state.last_alert_sent_at,
                    &state.last_cycle_at,
                    &claimed.last_alert_sent_at,
                    &claimed.last_cycle_at,
                ],
            )?,
            None => client.execute(
                "DELETE FROM cooldown_state
                 WHERE station_id = $1 AND owner_key = $2
                   AND last_alert_sent_at = $3 AND last_cycle_at = $4",
                &[&key.station_id, &key.owner_key(), &claimed.last_alert_sent_at, &claimed.last_cycle_at],
            )?,
        };
        Ok(())
    }

    fn get(&self, key: &CooldownKey) -> Result<Option<CooldownState>, MonitorError> {
        let row = self.lock().query_opt(
            "SELECT last_alert_sent_at, last_cycle_at FROM cooldown_state
             WHERE station_id = $1 AND owner_key = $2",
            &[&key.station_id, &key.owner_key()],
        )?;
        Ok(row.map(|r| CooldownState {
            last_alert_sent_at: r.get(0),
            last_cycle_at: r.get(1),
        }))
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<usize, MonitorError> {
        let removed = self
            .lock()
            .execute("DELETE FROM cooldown_state WHERE last_alert_sent_at < $1", &[&older_than])?;
        Ok(removed as usize)
    }
}
