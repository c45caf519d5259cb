pub mod queries;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Local, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

// Key names shared with the mobile client's local storage.
pub const KV_LIFETIME_STEPS: &str = "user_total_steps";
pub const KV_USER_XP: &str = "user_xp";
pub const KV_LAST_SYNC: &str = "last_sync_at";

#[derive(Debug, Clone, Serialize)]
pub struct DailyStepsRow {
    pub id: i64,
    pub date: String,
    pub steps: i64,
    pub distance_km: f64,
    pub calories: i64,
    pub points: i64,
    pub goal_reached: bool,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedemptionRow {
    pub id: i64,
    pub reward_id: String,
    pub title: String,
    pub cost: i64,
    pub redeemed_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .context("Failed to read kv entry")?;

        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                params![key, value],
            )
            .context("Failed to write kv entry")?;

        Ok(())
    }

    pub fn kv_remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .context("Failed to remove kv entry")?;

        Ok(())
    }

    /// Upserts today's row. Step counts never decrease within a day: a stale
    /// or lower reading leaves the stored row untouched. Returns the stored
    /// step count after the write.
    pub fn upsert_daily_steps(
        &mut self,
        date: NaiveDate,
        steps: u64,
        distance_km: f64,
        calories: u64,
        points: u64,
        goal_reached: bool,
        recorded_at: i64,
    ) -> Result<u64> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let existing: Option<i64> = transaction
            .query_row(
                "SELECT steps FROM daily_steps WHERE date = ?1",
                params![&date_str],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read existing daily steps")?;

        if let Some(existing_steps) = existing {
            if existing_steps >= steps as i64 {
                transaction.commit().context("Failed to commit")?;
                return Ok(existing_steps.max(0) as u64);
            }
        }

        transaction
            .execute(
                "INSERT INTO daily_steps (date, steps, distance_km, calories, points, goal_reached, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(date)
                 DO UPDATE SET steps=excluded.steps, distance_km=excluded.distance_km,
                               calories=excluded.calories, points=excluded.points,
                               goal_reached=excluded.goal_reached, updated_at=excluded.updated_at",
                params![
                    date_str,
                    steps as i64,
                    distance_km,
                    calories as i64,
                    points as i64,
                    goal_reached,
                    recorded_at
                ],
            )
            .context("Failed to upsert daily steps")?;

        transaction.commit().context("Failed to commit daily steps")?;
        Ok(steps)
    }

    pub fn daily_steps_for_date(&self, date: NaiveDate) -> Result<Option<DailyStepsRow>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let row = self
            .conn
            .query_row(
                "SELECT id, date, steps, distance_km, calories, points, goal_reached, updated_at
                 FROM daily_steps WHERE date = ?1",
                params![date_str],
                map_daily_steps_row,
            )
            .optional()
            .context("Failed to read daily steps")?;

        Ok(row)
    }

    pub fn daily_steps_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyStepsRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, date, steps, distance_km, calories, points, goal_reached, updated_at
             FROM daily_steps
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC",
        )?;

        let rows = statement
            .query_map(
                params![
                    from.format("%Y-%m-%d").to_string(),
                    to.format("%Y-%m-%d").to_string()
                ],
                map_daily_steps_row,
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query daily steps")?;

        Ok(rows)
    }

    pub fn latest_daily_steps(&self) -> Result<Option<DailyStepsRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, date, steps, distance_km, calories, points, goal_reached, updated_at
                 FROM daily_steps ORDER BY date DESC LIMIT 1",
                [],
                map_daily_steps_row,
            )
            .optional()
            .context("Failed to read latest daily steps")?;

        Ok(row)
    }

    pub fn latest_update_timestamp(&self) -> Result<Option<i64>> {
        let timestamp = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM daily_steps", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()
            .context("Failed to read latest update timestamp")?
            .flatten();

        Ok(timestamp)
    }

    /// Lifetime progress as (steps, xp). XP equals lifetime steps added, so
    /// the two normally move together; they are stored separately because the
    /// mobile app persisted them as independent key-value pairs.
    pub fn lifetime_progress(&self) -> Result<(u64, u64)> {
        let steps = self.kv_u64(KV_LIFETIME_STEPS)?;
        let xp = self.kv_u64(KV_USER_XP)?;

        Ok((steps, xp))
    }

    pub fn add_lifetime_progress(&mut self, delta: u64) -> Result<(u64, u64)> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let steps = read_kv_u64(&transaction, KV_LIFETIME_STEPS)? + delta;
        let xp = read_kv_u64(&transaction, KV_USER_XP)? + delta;

        write_kv(&transaction, KV_LIFETIME_STEPS, &steps.to_string())?;
        write_kv(&transaction, KV_USER_XP, &xp.to_string())?;

        transaction
            .commit()
            .context("Failed to commit lifetime progress")?;

        Ok((steps, xp))
    }

    pub fn points_spent(&self) -> Result<u64> {
        let spent: i64 = self
            .conn
            .query_row("SELECT COALESCE(SUM(cost), 0) FROM redemptions", [], |row| {
                row.get(0)
            })
            .context("Failed to sum redemptions")?;

        Ok(spent.max(0) as u64)
    }

    /// Checks the balance and records the redemption in one transaction so a
    /// second redeem of the same points cannot slip in between.
    pub fn redeem(
        &mut self,
        reward_id: &str,
        title: &str,
        cost: u64,
        points_earned: u64,
    ) -> Result<u64> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let spent: i64 = transaction
            .query_row("SELECT COALESCE(SUM(cost), 0) FROM redemptions", [], |row| {
                row.get(0)
            })
            .context("Failed to sum redemptions")?;

        let balance = points_earned.saturating_sub(spent.max(0) as u64);
        if balance < cost {
            bail!("Insufficient balance: {balance} points available, {cost} required");
        }

        transaction
            .execute(
                "INSERT INTO redemptions (reward_id, title, cost, redeemed_at) VALUES (?1, ?2, ?3, ?4)",
                params![reward_id, title, cost as i64, Utc::now().timestamp()],
            )
            .context("Failed to record redemption")?;

        transaction.commit().context("Failed to commit redemption")?;
        Ok(balance - cost)
    }

    pub fn redemptions(&self, limit: usize) -> Result<Vec<RedemptionRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, reward_id, title, cost, redeemed_at
             FROM redemptions
             ORDER BY redeemed_at DESC
             LIMIT ?1",
        )?;

        let rows = statement
            .query_map(params![limit as i64], |row| {
                Ok(RedemptionRow {
                    id: row.get(0)?,
                    reward_id: row.get(1)?,
                    title: row.get(2)?,
                    cost: row.get(3)?,
                    redeemed_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list redemptions")?;

        Ok(rows)
    }

    pub fn cleanup_old_days(&self, retention_days: u32) -> Result<usize> {
        let cutoff = (Local::now().date_naive() - Duration::days(i64::from(retention_days)))
            .format("%Y-%m-%d")
            .to_string();

        let deleted = self
            .conn
            .execute(
                "DELETE FROM daily_steps WHERE date < ?1",
                params![cutoff],
            )
            .context("Failed to clean up old daily steps")?;

        Ok(deleted)
    }

    fn kv_u64(&self, key: &str) -> Result<u64> {
        Ok(self
            .kv_get(key)?
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0))
    }
}

fn map_daily_steps_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStepsRow> {
    Ok(DailyStepsRow {
        id: row.get(0)?,
        date: row.get(1)?,
        steps: row.get(2)?,
        distance_km: row.get(3)?,
        calories: row.get(4)?,
        points: row.get(5)?,
        goal_reached: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn read_kv_u64(conn: &Connection, key: &str) -> Result<u64> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .context("Failed to read kv entry")?;

    Ok(value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0))
}

fn write_kv(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )
    .context("Failed to write kv entry")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Database;
    use chrono::NaiveDate;

    fn open_temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("test.db")).expect("open db");
        (dir, database)
    }

    #[test]
    fn kv_roundtrip_and_remove() {
        let (_dir, database) = open_temp_db();

        assert_eq!(database.kv_get("missing").expect("get"), None);
        database.kv_set("setting_lang", "ar").expect("set");
        assert_eq!(
            database.kv_get("setting_lang").expect("get"),
            Some("ar".to_string())
        );
        database.kv_set("setting_lang", "en").expect("overwrite");
        assert_eq!(
            database.kv_get("setting_lang").expect("get"),
            Some("en".to_string())
        );
        database.kv_remove("setting_lang").expect("remove");
        assert_eq!(database.kv_get("setting_lang").expect("get"), None);
    }

    #[test]
    fn daily_steps_never_decrease_within_a_day() {
        let (_dir, mut database) = open_temp_db();
        let date = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");

        let stored = database
            .upsert_daily_steps(date, 5000, 3.81, 200, 100, false, 1_767_571_200)
            .expect("upsert");
        assert_eq!(stored, 5000);

        // A stale lower reading must not shrink the stored count.
        let stored = database
            .upsert_daily_steps(date, 4200, 3.20, 168, 84, false, 1_767_574_800)
            .expect("upsert");
        assert_eq!(stored, 5000);

        let stored = database
            .upsert_daily_steps(date, 10456, 7.97, 418, 209, true, 1_767_578_400)
            .expect("upsert");
        assert_eq!(stored, 10456);

        let row = database
            .daily_steps_for_date(date)
            .expect("query")
            .expect("row");
        assert_eq!(row.steps, 10456);
        assert!(row.goal_reached);
    }

    #[test]
    fn rollover_creates_a_new_row_and_keeps_the_old_one() {
        let (_dir, mut database) = open_temp_db();
        let yesterday = NaiveDate::from_ymd_opt(2026, 1, 25).expect("date");
        let today = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");

        database
            .upsert_daily_steps(yesterday, 6200, 4.72, 248, 124, false, 1_767_484_800)
            .expect("upsert");
        database
            .upsert_daily_steps(today, 0, 0.0, 0, 0, false, 1_767_571_200)
            .expect("upsert");

        let rows = database.daily_steps_between(yesterday, today).expect("range");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].steps, 6200);
        assert_eq!(rows[1].steps, 0);
    }

    #[test]
    fn lifetime_progress_accumulates() {
        let (_dir, mut database) = open_temp_db();

        assert_eq!(database.lifetime_progress().expect("progress"), (0, 0));
        database.add_lifetime_progress(1500).expect("add");
        let (steps, xp) = database.add_lifetime_progress(700).expect("add");
        assert_eq!(steps, 2200);
        assert_eq!(xp, 2200);
    }

    #[test]
    fn redeem_debits_and_rejects_insufficient_balance() {
        let (_dir, mut database) = open_temp_db();

        // balance == cost is redeemable
        let remaining = database
            .redeem("r5", "Free Burger King Meal", 800, 800)
            .expect("redeem");
        assert_eq!(remaining, 0);

        // the ledger row now debits the balance
        assert_eq!(database.points_spent().expect("spent"), 800);
        assert!(database.redeem("r5", "Free Burger King Meal", 800, 800).is_err());

        // balance == cost - 1 is not redeemable
        assert!(database.redeem("r2", "20% Off Starbucks", 1500, 2299).is_err());
        let remaining = database
            .redeem("r2", "20% Off Starbucks", 1500, 2300)
            .expect("redeem");
        assert_eq!(remaining, 0);
    }
}
