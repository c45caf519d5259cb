use crate::config::{Config, SensorBackend, expand_home, parse_hhmm};
use crate::daemon;
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

pub fn run_onboarding(install_daemon_flag: bool) -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to StePPay onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Step source");
    println!("  Pick where daily step counts come from.");

    let backends = ["counter-file (companion device export)", "simulated (demo)"];
    let selected_backend = Select::with_theme(&theme)
        .with_prompt("  Select step source")
        .default(0)
        .items(&backends)
        .interact()
        .context("Failed to select step source")?;

    let sensor_backend = if selected_backend == 0 {
        SensorBackend::CounterFile
    } else {
        SensorBackend::Simulated
    };

    let counter_file_path = if sensor_backend == SensorBackend::CounterFile {
        let default_path = defaults.counter_file_path.display().to_string();
        let input: String = Input::with_theme(&theme)
            .with_prompt("  File the device agent writes the daily count to")
            .default(default_path)
            .interact_text()
            .context("Failed to read counter file path")?;
        expand_home(&input)
    } else {
        defaults.counter_file_path.clone()
    };
    println!("  ✓ Step source: {}", sensor_backend.as_str());

    println!("\n[2/4] Daily step goal");
    let daily_goal_steps: u64 = Input::with_theme(&theme)
        .with_prompt("  Daily step goal")
        .default(defaults.daily_goal_steps)
        .validate_with(|input: &u64| -> std::result::Result<(), &str> {
            if *input > 0 {
                Ok(())
            } else {
                Err("Goal must be greater than zero")
            }
        })
        .interact_text()
        .context("Failed to read daily goal")?;
    println!("  ✓ Daily goal: {daily_goal_steps} steps");

    println!("\n[3/4] Remote sync");
    println!("  Completed days can be pushed to a daily_steps backend table.");

    let sync_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Enable daily remote sync?")
        .default(false)
        .interact()
        .context("Failed to read sync choice")?;

    let mut sync_base_url = String::new();
    let mut sync_user_id = None;
    let mut sync_api_key = None;
    let mut sync_time = defaults.sync_time.clone();

    if sync_enabled {
        let url_input: String = Input::with_theme(&theme)
            .with_prompt("  Backend base URL (e.g. https://project.supabase.co)")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                url::Url::parse(input.trim())
                    .map(|_| ())
                    .map_err(|_| "Enter a valid URL")
            })
            .interact_text()
            .context("Failed to read sync base URL")?;
        sync_base_url = url_input.trim().trim_end_matches('/').to_string();

        let user_input: String = Input::with_theme(&theme)
            .with_prompt("  User id for the daily_steps rows")
            .interact_text()
            .context("Failed to read sync user id")?;
        sync_user_id = (!user_input.trim().is_empty()).then(|| user_input.trim().to_string());

        let key_input: String = Input::with_theme(&theme)
            .with_prompt("  API key (empty to use STEPPAY_SYNC_API_KEY)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read sync API key")?;
        sync_api_key = (!key_input.trim().is_empty()).then_some(key_input);

        let time_input: String = Input::with_theme(&theme)
            .with_prompt("  Time to push the completed day")
            .default(sync_time.clone())
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                parse_hhmm(input)
                    .map(|_| ())
                    .map_err(|_| "Use HH:MM format (example: 00:05)")
            })
            .interact_text()
            .context("Failed to read sync time")?;
        sync_time = time_input;
        println!("  ✓ Sync enabled, daily at {sync_time}");
    } else {
        println!("  ✓ Sync stays off (enable later with `StePPay config set sync.enabled true`)");
    }

    println!("\n[4/4] Install background daemon");
    println!("  Register a launchd service so StePPay keeps counting after reboot.");

    let install_daemon = if install_daemon_flag {
        true
    } else {
        Confirm::with_theme(&theme)
            .with_prompt("  Install daemon now?")
            .default(true)
            .interact()
            .context("Failed to read daemon install input")?
    };

    let config = Config {
        sensor_backend,
        counter_file_path,
        daily_goal_steps,
        sync_enabled,
        sync_base_url,
        sync_user_id,
        sync_api_key,
        sync_time,
        ..Config::default()
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;

    if install_daemon {
        let plist_path = daemon::install(&config)?;
        daemon::load(&config)?;
        println!("  ✓ Daemon installed ({})", plist_path.display());
    } else {
        println!("  ✓ Skipped daemon installation");
    }

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Step tracking has started.");
    println!("  Run StePPay status to check current state.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
