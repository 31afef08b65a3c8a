//! Admin / operator command-line interface.
//!
//! Exit codes: 0 success, 1 validation or config error, 2 runtime
//! error, 3 timeout.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{
    CampaignCommands, DrawCommands, IntentCommands, MetricsCommands, OutboxCommands,
    PricingCommands, PrizeCommands, QuotaCommands,
};

#[derive(Parser)]
#[command(name = "fortuna", about = "Lottery decision engine admin tool", version)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .fortuna/config.yaml merging).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Campaign management.
    #[command(subcommand)]
    Campaign(CampaignCommands),
    /// Versioned pricing management.
    #[command(subcommand)]
    Pricing(PricingCommands),
    /// Prize management.
    #[command(subcommand)]
    Prize(PrizeCommands),
    /// Daily quota rules.
    #[command(subcommand)]
    Quota(QuotaCommands),
    /// Operator-forced outcomes.
    #[command(subcommand)]
    Intent(IntentCommands),
    /// Submit and inspect draws against the local store.
    #[command(subcommand)]
    Draw(DrawCommands),
    /// Hourly metrics.
    #[command(subcommand)]
    Metrics(MetricsCommands),
    /// Deferred prize issuance.
    #[command(subcommand)]
    Outbox(OutboxCommands),
}
