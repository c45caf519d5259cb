mod api;
mod cli;
mod config;
mod daemon;
mod db;
mod metrics;
mod notify;
mod pedometer;
mod rewards;
mod scheduler;
mod sync;

use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands, NotifyCommands, RewardCommands, SyncCommands};
use crate::config::{Config, SensorBackend};
use crate::db::{Database, KV_LAST_SYNC};
use crate::pedometer::sensor;
use crate::rewards::RewardCatalog;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard { install_daemon } => {
            let _ = run_onboarding(install_daemon)?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Start => handle_start().await,
        Commands::Stop => handle_stop(),
        Commands::Restart => handle_restart(),
        Commands::Today { date, refresh } => handle_today(date, refresh),
        Commands::History { days } => handle_history(days),
        Commands::Sync { command } => handle_sync_command(command),
        Commands::Rewards { command } => handle_reward_command(command),
        Commands::Notify { command } => handle_notify_command(command),
        Commands::Service => {
            let config = load_config()?;
            run_service(config).await
        }
        Commands::Uninstall => handle_uninstall(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let daemon_status = daemon::status(&config)?;

    let today = Local::now().date_naive();
    let today_steps = database
        .daily_steps_for_date(today)?
        .map(|row| row.steps.max(0) as u64)
        .unwrap_or(0);
    let (lifetime_steps, xp) = database.lifetime_progress()?;
    let balance = rewards::points_balance(&database, config.steps_per_point)?;

    println!("StePPay status");
    println!("- daemon_label: {}", config.daemon_label);
    println!("- daemon_installed: {}", daemon_status.installed);
    println!("- daemon_loaded: {}", daemon_status.loaded);
    println!(
        "- today_steps: {today_steps} / {} goal",
        config.daily_goal_steps
    );
    println!("- lifetime_steps: {lifetime_steps}");
    println!("- level: {} ({xp} XP)", metrics::Level::from_xp(xp));
    println!("- points_balance: {balance}");
    println!(
        "- last_recorded_at: {}",
        database
            .latest_update_timestamp()?
            .map(|timestamp| timestamp.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "- latest_recorded_date: {}",
        database
            .latest_daily_steps()?
            .map(|row| row.date)
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "- last_sync_at: {}",
        database
            .kv_get(KV_LAST_SYNC)?
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    match RewardCatalog::load(&config.rewards_path) {
        Ok(catalog) => println!(
            "[OK] rewards catalog valid: {} items ({})",
            catalog.rewards.len(),
            config.rewards_path.display()
        ),
        Err(error) => {
            println!("[WARN] rewards catalog check failed: {error}");
            issues.push("rewards catalog invalid".to_string());
        }
    }

    if let Err(error) = config.parse_sync_time() {
        println!("[WARN] invalid sync_time setting: {error}");
        issues.push("invalid sync_time".to_string());
    } else {
        println!("[OK] sync_time format valid: {}", config.sync_time);
    }

    match config.sensor_backend {
        SensorBackend::Simulated => {
            println!("[OK] step source: simulated counter");
        }
        SensorBackend::CounterFile => {
            let today = Local::now().date_naive();
            let reading = sensor::read_counter_file(&config.counter_file_path, today);
            match reading.status {
                sensor::SensorStatus::Available => println!(
                    "[OK] counter file readable: {} ({} steps today)",
                    config.counter_file_path.display(),
                    reading.steps
                ),
                status => {
                    println!(
                        "[WARN] counter file not readable ({}): {}",
                        status.as_str(),
                        config.counter_file_path.display()
                    );
                    issues.push("step source unavailable".to_string());
                }
            }
        }
    }

    if config.sync_enabled {
        if sync::is_configured(&config) {
            println!("[OK] remote sync configured");
        } else {
            println!("[WARN] sync is enabled but base URL, user id or API key is missing");
            issues.push("sync misconfigured".to_string());
        }
    } else {
        println!("[OK] remote sync disabled");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn handle_start() -> Result<()> {
    let config = load_config()?;
    let daemon_status = daemon::status(&config)?;

    if daemon_status.installed {
        daemon::load(&config)?;
        println!("launchd daemon started");
        Ok(())
    } else {
        println!("launchd daemon is not installed. Running foreground service (Ctrl+C to stop).");
        run_service(config).await
    }
}

fn handle_stop() -> Result<()> {
    let config = load_config()?;
    daemon::unload(&config)?;
    println!("launchd daemon stopped");
    Ok(())
}

fn handle_restart() -> Result<()> {
    let config = load_config()?;
    daemon::restart(&config)?;
    println!("launchd daemon restarted");
    Ok(())
}

fn handle_today(date: Option<String>, refresh: bool) -> Result<()> {
    let config = load_config()?;
    let target_date = parse_optional_date(date)?;

    if refresh {
        refresh_today(&config, target_date)?;
    }

    let database = Database::open(&config.db_path)?;
    let steps = database
        .daily_steps_for_date(target_date)?
        .map(|row| row.steps.max(0) as u64)
        .unwrap_or(0);
    let derived = metrics::derive(steps, &config);

    println!("Steps for {target_date}");
    println!("- steps: {} / {} goal", derived.steps, config.daily_goal_steps);
    println!("- distance_km: {:.2}", derived.distance_km);
    println!("- calories: {}", derived.calories);
    println!("- points: {}", derived.points);
    println!("- goal_reached: {}", derived.goal_reached);

    Ok(())
}

/// On-demand re-read of the step source, stored before the query runs.
fn refresh_today(config: &Config, target_date: NaiveDate) -> Result<()> {
    if target_date != Local::now().date_naive() {
        println!("--refresh only applies to today; showing stored data");
        return Ok(());
    }

    match config.sensor_backend {
        SensorBackend::CounterFile => {
            let reading = sensor::read_counter_file(&config.counter_file_path, target_date);
            if reading.status == sensor::SensorStatus::Available {
                pedometer::store_sample(config, target_date, reading)?;
            } else {
                println!("Step sensor unavailable ({})", reading.status.as_str());
            }
        }
        SensorBackend::Simulated => {
            println!("Simulated steps advance inside the running service; showing stored data");
        }
    }

    Ok(())
}

fn handle_history(days: usize) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    let days = days.clamp(1, 90);
    let to = Local::now().date_naive();
    let from = to - ChronoDuration::days(days as i64 - 1);

    let rows = database.daily_steps_between(from, to)?;
    let summary = metrics::summary::build_period_summary(from, to, &rows);

    println!("History {from} .. {to}");
    for row in &rows {
        println!(
            "- {}: {} steps, {:.2} km, {} kcal, {} pts{}",
            row.date,
            row.steps,
            row.distance_km,
            row.calories,
            row.points,
            if row.goal_reached { " [goal]" } else { "" }
        );
    }
    println!(
        "Total {} steps over {} day(s), avg {} steps/day, goal reached {} day(s)",
        summary.total_steps, summary.days_recorded, summary.average_steps, summary.days_goal_reached
    );

    Ok(())
}

fn handle_sync_command(command: SyncCommands) -> Result<()> {
    match command {
        SyncCommands::Run { date } => {
            let config = load_config()?;
            let target_date = parse_optional_date(date)?;

            sync::sync_date(&config, target_date)?;
            println!("Synced daily steps for {target_date}");
            Ok(())
        }
        SyncCommands::Test => {
            let config = load_config()?;
            let response = sync::test_connection(&config)?;
            println!("Sync backend connection successful");
            println!("{response}");
            Ok(())
        }
    }
}

fn handle_reward_command(command: RewardCommands) -> Result<()> {
    match command {
        RewardCommands::List => {
            let config = load_config()?;
            let catalog = RewardCatalog::load(&config.rewards_path)?;
            let database = Database::open(&config.db_path)?;
            let balance = rewards::points_balance(&database, config.steps_per_point)?;

            println!("Points balance: {balance}");
            for item in &catalog.rewards {
                let note = if balance >= item.cost {
                    "redeemable".to_string()
                } else {
                    format!("need {} more", item.cost - balance)
                };
                println!(
                    "- {}: {} ({}) [{} pts, {note}]",
                    item.id, item.title, item.category, item.cost
                );
            }

            let history = database.redemptions(5)?;
            if !history.is_empty() {
                println!("Recent redemptions:");
                for entry in history {
                    println!("- {}: {} ({} pts)", entry.reward_id, entry.title, entry.cost);
                }
            }
            Ok(())
        }
        RewardCommands::Redeem { id } => {
            let config = load_config()?;
            let catalog = RewardCatalog::load(&config.rewards_path)?;
            let mut database = Database::open(&config.db_path)?;

            let outcome = rewards::redeem(&mut database, &catalog, &id, config.steps_per_point)?;
            println!(
                "Redeemed {} for {} pts. Remaining balance: {}",
                outcome.reward.title, outcome.reward.cost, outcome.remaining_balance
            );
            Ok(())
        }
    }
}

fn handle_notify_command(command: NotifyCommands) -> Result<()> {
    match command {
        NotifyCommands::Test => {
            if notify::send_test_notification() {
                println!("Test notification sent");
            } else {
                println!(
                    "Could not deliver a test notification (terminal-notifier and osascript unavailable)"
                );
            }
            Ok(())
        }
    }
}

fn handle_uninstall() -> Result<()> {
    let config = load_or_default_config()?;

    let _ = daemon::unload(&config);

    if let Some(plist_path) = daemon::remove(&config)? {
        println!("Removed daemon plist: {}", plist_path.display());
    }

    println!("Remove binary: cargo uninstall steppay");
    println!("Remove data (optional): rm -rf ~/.StePPay");

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;
    RewardCatalog::load(&config.rewards_path).with_context(|| {
        format!(
            "Failed to load rewards catalog: {}",
            config.rewards_path.display()
        )
    })?;

    let shared_config = Arc::new(config);
    let collector_config = Arc::clone(&shared_config);
    let scheduler_config = Arc::clone(&shared_config);
    let schedule_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("StePPay service started");

    tokio::select! {
        collector_result = pedometer::run_step_collector(collector_config) => {
            collector_result?;
        }
        scheduler_result = scheduler::run_daily_scheduler(move || {
            Config::load()
                .unwrap_or_else(|_| (*schedule_fallback).clone())
                .parse_sync_time()
        }, move |date| {
            let config = Arc::clone(&scheduler_config);
            async move {
                let runtime_config = Config::load().unwrap_or_else(|_| (*config).clone());
                run_daily_sync(&runtime_config, date)
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

/// Pushes the day completed before `fire_date`. Sync failures are logged by
/// the scheduler and otherwise ignored: the row stays local and the next
/// manual or scheduled sync overwrites the remote state.
fn run_daily_sync(config: &Config, fire_date: NaiveDate) -> Result<()> {
    if !config.sync_enabled {
        return Ok(());
    }

    if !sync::is_configured(config) {
        warn!("sync is enabled but base URL, user id or API key is missing");
        return Ok(());
    }

    let target_date = fire_date - ChronoDuration::days(1);
    let database = Database::open(&config.db_path)?;

    if database.daily_steps_for_date(target_date)?.is_none() {
        info!(date = %target_date, "no step record to sync");
        return Ok(());
    }

    sync::sync_date(config, target_date)?;
    info!(date = %target_date, "daily steps synced");

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-01-26"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| "Config file not found. Run `StePPay onboard` first.".to_string())
}
