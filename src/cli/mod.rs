pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "StePPay", about = "Step tracking & rewards service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard {
        #[arg(long, default_value_t = false)]
        install_daemon: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    Start,
    Stop,
    Restart,
    Today {
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    History {
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    Rewards {
        #[command(subcommand)]
        command: RewardCommands,
    },
    Notify {
        #[command(subcommand)]
        command: NotifyCommands,
    },
    Service,
    Uninstall,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum SyncCommands {
    Run {
        #[arg(long)]
        date: Option<String>,
    },
    Test,
}

#[derive(Debug, Subcommand)]
pub enum RewardCommands {
    List,
    Redeem { id: String },
}

#[derive(Debug, Subcommand)]
pub enum NotifyCommands {
    Test,
}
