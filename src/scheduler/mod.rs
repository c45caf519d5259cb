use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Runs `task` once per day at the time the provider returns. The provider is
/// re-read on every poll so config edits take effect without a restart; task
/// failures are logged and the loop keeps going.
pub async fn run_daily_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<NaiveTime>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged_time: Option<NaiveTime> = None;

    loop {
        let target_time = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load sync schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match seconds_until_next_run(target_time) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, time = %target_time, "failed to resolve next run time");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged_time != Some(target_time) {
            info!(seconds = delay.as_secs(), time = %target_time, "next daily sync scheduled");
            last_logged_time = Some(target_time);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Local::now().date_naive();
        if let Err(error) = task(date).await {
            error!(error = %error, date = %date, "scheduled daily sync failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

pub fn seconds_until_next_run(target_time: NaiveTime) -> Result<Duration> {
    let now = Local::now();
    let today = now.date_naive();

    let candidate_today = match Local.from_local_datetime(&today.and_time(target_time)) {
        LocalResult::Single(datetime) => datetime,
        // DST gap: fall through to the same wall-clock time tomorrow.
        _ => {
            let fallback_day = today + ChronoDuration::days(1);
            Local
                .from_local_datetime(&fallback_day.and_time(target_time))
                .single()
                .context("Failed to convert schedule time")?
        }
    };

    let next_run = if candidate_today > now {
        candidate_today
    } else {
        let tomorrow = today + ChronoDuration::days(1);
        Local
            .from_local_datetime(&tomorrow.and_time(target_time))
            .single()
            .context("Failed to convert next execution time")?
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}

#[cfg(test)]
mod tests {
    use super::seconds_until_next_run;
    use chrono::NaiveTime;

    #[test]
    fn schedule_delay_is_positive() {
        let time = NaiveTime::from_hms_opt(0, 5, 0).expect("time");
        let delay = seconds_until_next_run(time).expect("delay computed");
        assert!(delay.as_secs() > 0);
    }

    #[test]
    fn schedule_delay_is_within_a_day() {
        let time = NaiveTime::from_hms_opt(23, 59, 0).expect("time");
        let delay = seconds_until_next_run(time).expect("delay computed");
        assert!(delay.as_secs() <= 24 * 60 * 60 + 60);
    }
}
