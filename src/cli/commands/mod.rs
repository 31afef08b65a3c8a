//! Command definitions and handlers.

pub mod campaign;
pub mod draw;
pub mod intent;
pub mod metrics;
pub mod outbox;
pub mod pricing;
pub mod prize;
pub mod quota;

pub use campaign::CampaignCommands;
pub use draw::DrawCommands;
pub use intent::IntentCommands;
pub use metrics::MetricsCommands;
pub use outbox::OutboxCommands;
pub use pricing::PricingCommands;
pub use prize::PrizeCommands;
pub use quota::QuotaCommands;

use sqlx::SqlitePool;

use crate::services::EngineConfig;

/// Shared handler context assembled by the binary entry point.
pub struct AppContext {
    pub pool: SqlitePool,
    pub config: EngineConfig,
    pub json: bool,
}

/// Print either a serde value (json mode) or a prebuilt table.
pub(crate) fn emit(json_mode: bool, value: &impl serde::Serialize, table: comfy_table::Table) {
    if json_mode {
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("serialization failed: {err}"),
        }
    } else {
        println!("{table}");
    }
}
