pub mod sensor;

use crate::config::{Config, SensorBackend};
use crate::db::Database;
use crate::metrics;
use crate::notify;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info, warn};

/// Polling loop that re-reads the cumulative daily step count and stores the
/// derived snapshot. Reads are absolute, never increments, so an overlapping
/// on-demand refresh cannot double-count.
pub async fn run_step_collector(config: Arc<Config>) -> Result<()> {
    let mut ticker = interval(Duration::from_secs(config.polling_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut simulated = sensor::SimulatedSensor::new(Local::now().date_naive());
    let mut goal_notified_on: Option<NaiveDate> = None;

    info!(
        polling_seconds = config.polling_seconds,
        backend = config.sensor_backend.as_str(),
        "step collector started"
    );

    loop {
        ticker.tick().await;

        // Settings edits (tracking toggle, goal, stride) apply without restart.
        let runtime = Config::load().unwrap_or_else(|_| (*config).clone());

        if !runtime.step_tracking_enabled {
            continue;
        }

        let today = Local::now().date_naive();
        let reading = match runtime.sensor_backend {
            SensorBackend::CounterFile => {
                sensor::read_counter_file(&runtime.counter_file_path, today)
            }
            SensorBackend::Simulated => simulated.read(today, runtime.polling_seconds),
        };

        if reading.status != sensor::SensorStatus::Available {
            warn!(status = reading.status.as_str(), "step sensor unavailable");
            continue;
        }

        match store_sample(&runtime, today, reading) {
            Ok(outcome) => {
                info!(
                    steps = outcome.stored_steps,
                    new_steps = outcome.new_steps,
                    "step sample captured"
                );

                if runtime.notify_on_goal
                    && outcome.goal_crossed
                    && goal_notified_on != Some(today)
                {
                    goal_notified_on = Some(today);
                    notify::send_goal_notification(outcome.stored_steps, runtime.daily_goal_steps);
                }
            }
            Err(error) => {
                error!(error = %error, "failed to store step sample");
            }
        }
    }
}

#[derive(Debug)]
pub struct SampleOutcome {
    pub stored_steps: u64,
    pub new_steps: u64,
    pub goal_crossed: bool,
}

/// Persists one absolute reading: upserts today's row, credits newly observed
/// steps to lifetime progress, and trims rows past retention.
pub fn store_sample(
    config: &Config,
    date: NaiveDate,
    reading: sensor::StepReading,
) -> Result<SampleOutcome> {
    let mut database = Database::open(&config.db_path)?;

    let previous = database
        .daily_steps_for_date(date)?
        .map(|row| row.steps.max(0) as u64)
        .unwrap_or(0);

    let derived = metrics::derive(reading.steps, config);
    let stored_steps = database.upsert_daily_steps(
        date,
        derived.steps,
        derived.distance_km,
        derived.calories,
        derived.points,
        derived.goal_reached,
        reading.recorded_at,
    )?;

    let new_steps = stored_steps.saturating_sub(previous);
    if new_steps > 0 {
        database.add_lifetime_progress(new_steps)?;
    }

    database.cleanup_old_days(config.retention_days)?;

    Ok(SampleOutcome {
        stored_steps,
        new_steps,
        goal_crossed: previous < config.daily_goal_steps && stored_steps >= config.daily_goal_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::{sensor, store_sample};
    use crate::config::Config;
    use crate::db::Database;
    use chrono::NaiveDate;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        Config {
            db_path: dir.path().join("test.db"),
            ..Config::default()
        }
    }

    fn reading(steps: u64) -> sensor::StepReading {
        sensor::StepReading {
            recorded_at: 1_767_571_200,
            steps,
            status: sensor::SensorStatus::Available,
        }
    }

    #[test]
    fn stale_reading_credits_no_lifetime_steps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = temp_config(&dir);
        let date = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");

        let outcome = store_sample(&config, date, reading(5000)).expect("store");
        assert_eq!(outcome.new_steps, 5000);

        // An older absolute reading arrives late: nothing new to credit.
        let outcome = store_sample(&config, date, reading(4200)).expect("store");
        assert_eq!(outcome.stored_steps, 5000);
        assert_eq!(outcome.new_steps, 0);

        let database = Database::open(&config.db_path).expect("open");
        assert_eq!(database.lifetime_progress().expect("progress"), (5000, 5000));
    }

    #[test]
    fn goal_crossing_is_reported_once() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = temp_config(&dir);
        let date = NaiveDate::from_ymd_opt(2026, 1, 26).expect("date");

        let outcome = store_sample(&config, date, reading(9_999)).expect("store");
        assert!(!outcome.goal_crossed);

        let outcome = store_sample(&config, date, reading(10_000)).expect("store");
        assert!(outcome.goal_crossed);

        let outcome = store_sample(&config, date, reading(10_500)).expect("store");
        assert!(!outcome.goal_crossed);
    }
}
