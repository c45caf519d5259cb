use crate::config::{Config, SensorBackend};
use crate::daemon;
use crate::db::{DailyStepsRow, Database, KV_LAST_SYNC};
use crate::metrics::{self, summary::build_period_summary};
use crate::pedometer::sensor;
use crate::rewards::{self, RewardCatalog};
use crate::scheduler;
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/today", get(today))
        .route("/api/v1/history", get(history))
        .route("/api/v1/summary", get(summary))
        .route("/api/v1/progress", get(progress))
        .route("/api/v1/rewards", get(rewards_list))
        .route("/api/v1/rewards/:id/redeem", post(rewards_redeem))
        .route("/api/v1/settings/goal", get(goal_get).put(goal_put))
        .route(
            "/api/v1/settings/sync-schedule",
            get(sync_schedule_get).put(sync_schedule_put),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    days: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    daemon: String,
    daemon_loaded: bool,
    sensor_backend: &'static str,
    sensor_status: &'static str,
    step_tracking_enabled: bool,
    last_recorded_at: Option<i64>,
    last_sync_at: Option<String>,
    sync_enabled: bool,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct TodayPayload {
    date: String,
    steps: u64,
    distance_km: f64,
    calories: u64,
    points: u64,
    goal_steps: u64,
    goal_reached: bool,
    progress: f64,
}

#[derive(Debug, Serialize)]
struct HistoryPayload {
    from: String,
    to: String,
    count: usize,
    days: Vec<DailyStepsRow>,
}

#[derive(Debug, Serialize)]
struct ProgressPayload {
    lifetime_steps: u64,
    xp: u64,
    level: &'static str,
    next_level_xp: Option<u64>,
    badges: Vec<metrics::BadgeStatus>,
}

#[derive(Debug, Serialize)]
struct RewardView {
    id: String,
    title: String,
    subtitle: String,
    cost: u64,
    category: String,
    affordable: bool,
    progress: f64,
}

#[derive(Debug, Serialize)]
struct RewardsPayload {
    balance: u64,
    categories: Vec<String>,
    rewards: Vec<RewardView>,
}

#[derive(Debug, Serialize)]
struct GoalPayload {
    daily_goal_steps: u64,
}

#[derive(Debug, Deserialize)]
struct GoalUpdatePayload {
    daily_goal_steps: u64,
}

#[derive(Debug, Serialize)]
struct SyncSchedulePayload {
    sync_time: String,
    next_run_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct SyncScheduleUpdatePayload {
    sync_time: String,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let config = runtime_config(&state);
    let database = Database::open(&config.db_path)?;
    let daemon_status = daemon::status(&config)?;

    let today = Local::now().date_naive();
    let sensor_status = match config.sensor_backend {
        SensorBackend::CounterFile => {
            sensor::read_counter_file(&config.counter_file_path, today).status
        }
        SensorBackend::Simulated => sensor::SensorStatus::Available,
    };

    let payload = StatusPayload {
        daemon: daemon_status.details,
        daemon_loaded: daemon_status.loaded,
        sensor_backend: config.sensor_backend.as_str(),
        sensor_status: sensor_status.as_str(),
        step_tracking_enabled: config.step_tracking_enabled,
        last_recorded_at: database.latest_update_timestamp()?,
        last_sync_at: database.kv_get(KV_LAST_SYNC)?,
        sync_enabled: config.sync_enabled,
        api_port: config.api_port,
    };

    Ok(Json(payload))
}

async fn today(State(state): State<ApiState>) -> ApiResult<Json<TodayPayload>> {
    let config = runtime_config(&state);
    let database = Database::open(&config.db_path)?;
    let date = Local::now().date_naive();

    let steps = database
        .daily_steps_for_date(date)?
        .map(|row| row.steps.max(0) as u64)
        .unwrap_or(0);
    let derived = metrics::derive(steps, &config);

    let payload = TodayPayload {
        date: date.format("%Y-%m-%d").to_string(),
        steps: derived.steps,
        distance_km: derived.distance_km,
        calories: derived.calories,
        points: derived.points,
        goal_steps: config.daily_goal_steps,
        goal_reached: derived.goal_reached,
        progress: (steps as f64 / config.daily_goal_steps.max(1) as f64).min(1.0),
    };

    Ok(Json(payload))
}

async fn history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryPayload>> {
    let from_date = query
        .from
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| Local::now().date_naive());

    let to_date = query
        .to
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or(from_date);

    let database = Database::open(&state.config.db_path)?;
    let days = database.daily_steps_between(from_date, to_date)?;

    let payload = HistoryPayload {
        from: from_date.format("%Y-%m-%d").to_string(),
        to: to_date.format("%Y-%m-%d").to_string(),
        count: days.len(),
        days,
    };

    Ok(Json(payload))
}

async fn summary(
    State(state): State<ApiState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<metrics::summary::PeriodSummary>> {
    let days = query.days.unwrap_or(7).clamp(1, 90);
    let to = Local::now().date_naive();
    let from = to - Duration::days(days as i64 - 1);

    let database = Database::open(&state.config.db_path)?;
    let rows = database.daily_steps_between(from, to)?;

    Ok(Json(build_period_summary(from, to, &rows)))
}

async fn progress(State(state): State<ApiState>) -> ApiResult<Json<ProgressPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let (lifetime_steps, xp) = database.lifetime_progress()?;
    let level = metrics::Level::from_xp(xp);

    let payload = ProgressPayload {
        lifetime_steps,
        xp,
        level: level.as_str(),
        next_level_xp: match level {
            metrics::Level::Bronze => Some(2000),
            metrics::Level::Silver => Some(5000),
            metrics::Level::Gold => None,
        },
        badges: metrics::badge_statuses(lifetime_steps),
    };

    Ok(Json(payload))
}

async fn rewards_list(State(state): State<ApiState>) -> ApiResult<Json<RewardsPayload>> {
    let config = runtime_config(&state);
    let catalog = RewardCatalog::load(&config.rewards_path)?;
    let database = Database::open(&config.db_path)?;
    let balance = rewards::points_balance(&database, config.steps_per_point)?;

    let reward_views = catalog
        .rewards
        .iter()
        .map(|item| RewardView {
            id: item.id.clone(),
            title: item.title.clone(),
            subtitle: item.subtitle.clone(),
            cost: item.cost,
            category: item.category.clone(),
            affordable: balance >= item.cost,
            progress: (balance as f64 / item.cost.max(1) as f64).min(1.0),
        })
        .collect::<Vec<_>>();

    Ok(Json(RewardsPayload {
        balance,
        categories: catalog.categories(),
        rewards: reward_views,
    }))
}

async fn rewards_redeem(
    State(state): State<ApiState>,
    Path(reward_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let config = runtime_config(&state);
    let catalog = RewardCatalog::load(&config.rewards_path)?;

    if catalog.find(&reward_id).is_none() {
        return Err(ApiError::NotFound(format!("Unknown reward: {reward_id}")));
    }

    let mut database = Database::open(&config.db_path)?;
    let outcome = rewards::redeem(&mut database, &catalog, &reward_id, config.steps_per_point)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    Ok(Json(json!({
        "redeemed": true,
        "reward": outcome.reward,
        "remaining_balance": outcome.remaining_balance
    })))
}

async fn goal_get(State(state): State<ApiState>) -> ApiResult<Json<GoalPayload>> {
    let config = runtime_config(&state);

    Ok(Json(GoalPayload {
        daily_goal_steps: config.daily_goal_steps,
    }))
}

async fn goal_put(
    State(state): State<ApiState>,
    Json(payload): Json<GoalUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let mut config = runtime_config(&state);

    config
        .set_value("daily_goal_steps", &payload.daily_goal_steps.to_string())
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    config.save()?;

    Ok(Json(json!({
        "saved": true,
        "daily_goal_steps": config.daily_goal_steps
    })))
}

async fn sync_schedule_get(State(state): State<ApiState>) -> ApiResult<Json<SyncSchedulePayload>> {
    let config = runtime_config(&state);
    let sync_time = config.parse_sync_time()?;
    let next_run = scheduler::seconds_until_next_run(sync_time)?;

    Ok(Json(SyncSchedulePayload {
        sync_time: config.sync_time,
        next_run_seconds: next_run.as_secs(),
    }))
}

async fn sync_schedule_put(
    State(state): State<ApiState>,
    Json(payload): Json<SyncScheduleUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let mut config = runtime_config(&state);
    let normalized_time = payload.sync_time.trim().to_string();

    config
        .set_value("sync_time", &normalized_time)
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;
    config.save()?;

    Ok(Json(json!({
        "saved": true,
        "sync_time": config.sync_time
    })))
}

fn runtime_config(state: &ApiState) -> Config {
    Config::load().unwrap_or_else(|_| state.config.as_ref().clone())
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {input}. Example: 2026-01-26"))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}
