use crate::config::Config;
use crate::db::{DailyStepsRow, Database, KV_LAST_SYNC};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;

const DAILY_STEPS_TABLE: &str = "daily_steps";

pub fn is_configured(config: &Config) -> bool {
    config.sync_enabled
        && !config.sync_base_url.is_empty()
        && config.sync_user_id.is_some()
        && resolve_api_key(config).is_some()
}

/// Pushes the stored row for one date to the backend. One attempt, no retry:
/// callers log failures and move on.
pub fn sync_date(config: &Config, date: NaiveDate) -> Result<()> {
    let database = Database::open(&config.db_path)?;
    let row = database
        .daily_steps_for_date(date)?
        .with_context(|| format!("No step record for date: {date}"))?;

    upsert_daily_row(config, &row)?;
    database.kv_set(KV_LAST_SYNC, &Utc::now().to_rfc3339())?;

    Ok(())
}

/// Upserts one (user, date) row into the remote `daily_steps` table. The
/// conflict target is (user_id, date) with merge-duplicates resolution, so a
/// re-sync of the same day overwrites rather than accumulates.
pub fn upsert_daily_row(config: &Config, row: &DailyStepsRow) -> Result<()> {
    let api_key = resolve_api_key(config).context(
        "Sync API key is missing. Set `StePPay config set sync.api_key <KEY>` or `STEPPAY_SYNC_API_KEY`.",
    )?;
    let user_id = config
        .sync_user_id
        .clone()
        .context("sync_user_id is not set. Run `StePPay onboard` or `StePPay config set sync.user_id <ID>`.")?;

    if config.sync_base_url.is_empty() {
        bail!("sync_base_url is not set");
    }

    let endpoint = upsert_endpoint(&config.sync_base_url);
    let payload = daily_row_payload(&user_id, row);
    let timeout_seconds = config.sync_timeout_seconds.max(5);

    std::thread::spawn(move || {
        post_upsert_blocking(&endpoint, &api_key, timeout_seconds, &payload)
    })
    .join()
    .map_err(|_| anyhow!("Sync worker thread panicked"))?
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = resolve_api_key(config).context(
        "Sync API key is missing. Set `StePPay config set sync.api_key <KEY>` or `STEPPAY_SYNC_API_KEY`.",
    )?;

    if config.sync_base_url.is_empty() {
        bail!("sync_base_url is not set");
    }

    let endpoint = format!(
        "{}/rest/v1/{DAILY_STEPS_TABLE}?select=date&limit=1",
        config.sync_base_url.trim_end_matches('/')
    );
    let timeout_seconds = config.sync_timeout_seconds.max(5);

    std::thread::spawn(move || get_blocking(&endpoint, &api_key, timeout_seconds))
        .join()
        .map_err(|_| anyhow!("Sync worker thread panicked"))?
}

fn upsert_endpoint(base_url: &str) -> String {
    format!(
        "{}/rest/v1/{DAILY_STEPS_TABLE}?on_conflict=user_id,date",
        base_url.trim_end_matches('/')
    )
}

fn daily_row_payload(user_id: &str, row: &DailyStepsRow) -> Value {
    json!([{
        "user_id": user_id,
        "date": row.date,
        "steps": row.steps.max(0),
        "distance_km": row.distance_km.max(0.0),
        "calories": row.calories.max(0),
        "points_earned": row.points.max(0),
        "goal_reached": row.goal_reached,
    }])
}

fn resolve_api_key(config: &Config) -> Option<String> {
    std::env::var("STEPPAY_SYNC_API_KEY")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            config
                .sync_api_key
                .clone()
                .filter(|value| !value.trim().is_empty())
        })
}

fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "apikey",
        HeaderValue::from_str(api_key).context("Failed to build apikey header")?,
    );
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    Ok(headers)
}

fn post_upsert_blocking(
    endpoint: &str,
    api_key: &str,
    timeout_seconds: u64,
    payload: &Value,
) -> Result<()> {
    let mut headers = build_headers(api_key)?;
    headers.insert(
        "Prefer",
        HeaderValue::from_static("resolution=merge-duplicates,return=minimal"),
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create sync HTTP client")?;

    let response = client
        .post(endpoint)
        .json(payload)
        .send()
        .context("Sync request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        bail!("Sync upsert error {}: {}", status, body);
    }

    Ok(())
}

fn get_blocking(endpoint: &str, api_key: &str, timeout_seconds: u64) -> Result<String> {
    let headers = build_headers(api_key)?;

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create sync HTTP client")?;

    let response = client
        .get(endpoint)
        .send()
        .context("Sync request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read sync response body")?;

    if !status.is_success() {
        bail!("Sync check error {}: {}", status, body);
    }

    Ok(format!("daily_steps table reachable ({status})"))
}

#[cfg(test)]
mod tests {
    use super::{daily_row_payload, upsert_endpoint};
    use crate::db::DailyStepsRow;

    #[test]
    fn upsert_endpoint_targets_the_user_date_conflict() {
        assert_eq!(
            upsert_endpoint("https://example.supabase.co/"),
            "https://example.supabase.co/rest/v1/daily_steps?on_conflict=user_id,date"
        );
    }

    #[test]
    fn payload_carries_the_metric_snapshot() {
        let row = DailyStepsRow {
            id: 1,
            date: "2026-01-26".to_string(),
            steps: 10_456,
            distance_km: 7.97,
            calories: 418,
            points: 209,
            goal_reached: true,
            updated_at: 0,
        };

        let payload = daily_row_payload("user-1", &row);
        let entry = &payload[0];

        assert_eq!(entry["user_id"], "user-1");
        assert_eq!(entry["date"], "2026-01-26");
        assert_eq!(entry["steps"], 10_456);
        assert_eq!(entry["points_earned"], 209);
        assert_eq!(entry["goal_reached"], true);
    }
}
