use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorStatus {
    Available,
    NotAvailable,
    SensorError,
}

impl SensorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::NotAvailable => "Not Available",
            Self::SensorError => "Sensor Error",
        }
    }
}

/// A point-in-time read of the cumulative step count since local midnight.
#[derive(Debug, Clone, Copy)]
pub struct StepReading {
    pub recorded_at: i64,
    pub steps: u64,
    pub status: SensorStatus,
}

impl StepReading {
    fn now(steps: u64, status: SensorStatus) -> Self {
        Self {
            recorded_at: Utc::now().timestamp(),
            steps,
            status,
        }
    }
}

/// Reads the cumulative daily count a companion device agent exports to a
/// plain text file. Accepted formats: `{steps}` or `{YYYY-MM-DD} {steps}`.
/// A date-stamped line for a previous day means the agent has not written
/// today yet, which reads as 0 steps so far.
pub fn read_counter_file(path: &Path, today: NaiveDate) -> StepReading {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return StepReading::now(0, SensorStatus::NotAvailable);
        }
        Err(_) => return StepReading::now(0, SensorStatus::SensorError),
    };

    match parse_counter_line(&content, today) {
        Some(steps) => StepReading::now(steps, SensorStatus::Available),
        None => StepReading::now(0, SensorStatus::SensorError),
    }
}

fn parse_counter_line(content: &str, today: NaiveDate) -> Option<u64> {
    let line = content.lines().find(|line| !line.trim().is_empty())?;
    let fields = line.split_whitespace().collect::<Vec<_>>();

    match fields.as_slice() {
        [steps] => steps.parse::<u64>().ok(),
        [date, steps] => {
            let stamped = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let steps = steps.parse::<u64>().ok()?;
            Some(if stamped == today { steps } else { 0 })
        }
        _ => None,
    }
}

// Seed so a fresh demo run shows a day already in progress.
const DEMO_SEED_STEPS: u64 = 10_456;

/// Fallback step source when no real sensor is reachable: a cumulative
/// counter that drifts upward at a slow-stroll pace (1-3 steps per 5s) and
/// resets at day rollover.
#[derive(Debug)]
pub struct SimulatedSensor {
    date: NaiveDate,
    steps: u64,
}

impl SimulatedSensor {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            steps: DEMO_SEED_STEPS,
        }
    }

    pub fn read(&mut self, today: NaiveDate, elapsed_seconds: u64) -> StepReading {
        if today != self.date {
            self.date = today;
            self.steps = 0;
        }

        let mut rng = rand::thread_rng();
        let intervals = (elapsed_seconds / 5).max(1);
        self.steps += (0..intervals).map(|_| rng.gen_range(1..=3)).sum::<u64>();

        StepReading::now(self.steps, SensorStatus::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::{SensorStatus, SimulatedSensor, read_counter_file};
    use chrono::NaiveDate;
    use std::fs;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).expect("date")
    }

    #[test]
    fn missing_counter_file_reports_not_available() {
        let dir = tempfile::tempdir().expect("temp dir");
        let reading = read_counter_file(&dir.path().join("steps.txt"), today());

        assert_eq!(reading.status, SensorStatus::NotAvailable);
        assert_eq!(reading.steps, 0);
    }

    #[test]
    fn unparsable_counter_file_reports_sensor_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("steps.txt");
        fs::write(&path, "not a number").expect("write");

        let reading = read_counter_file(&path, today());
        assert_eq!(reading.status, SensorStatus::SensorError);
    }

    #[test]
    fn bare_count_is_read_as_todays_total() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("steps.txt");
        fs::write(&path, "8421\n").expect("write");

        let reading = read_counter_file(&path, today());
        assert_eq!(reading.status, SensorStatus::Available);
        assert_eq!(reading.steps, 8421);
    }

    #[test]
    fn stale_date_stamp_reads_as_zero_steps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("steps.txt");
        fs::write(&path, "2026-01-25 6200\n").expect("write");

        let reading = read_counter_file(&path, today());
        assert_eq!(reading.status, SensorStatus::Available);
        assert_eq!(reading.steps, 0);

        fs::write(&path, "2026-01-26 6200\n").expect("write");
        let reading = read_counter_file(&path, today());
        assert_eq!(reading.steps, 6200);
    }

    #[test]
    fn simulated_counter_is_monotonic_within_a_day_and_resets_on_rollover() {
        let mut sensor = SimulatedSensor::new(today());

        let first = sensor.read(today(), 30).steps;
        let second = sensor.read(today(), 30).steps;
        assert!(second > first);

        let tomorrow = today().succ_opt().expect("date");
        let after_rollover = sensor.read(tomorrow, 30).steps;
        assert!(after_rollover < first);
    }
}
