//! Quota rule commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::Table;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteQuotaRuleRepository;
use crate::domain::errors::{DrawError, DrawResult};
use crate::domain::models::{QuotaRule, QuotaScope};
use crate::domain::ports::QuotaRuleRepository;

use super::{emit, AppContext};

#[derive(Subcommand)]
pub enum QuotaCommands {
    /// Create or update a quota rule.
    Upsert {
        #[arg(long)]
        id: Option<Uuid>,
        /// global | campaign | role | user
        #[arg(long)]
        scope: String,
        /// Campaign id, role name, or user id; omit for global.
        #[arg(long)]
        scope_ref: Option<String>,
        #[arg(long)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        #[arg(long)]
        valid_from: Option<DateTime<Utc>>,
        #[arg(long)]
        valid_until: Option<DateTime<Utc>>,
    },
    /// List every quota rule.
    List,
}

pub async fn handle(command: QuotaCommands, app: &AppContext) -> DrawResult<()> {
    let repo = SqliteQuotaRuleRepository::new(app.pool.clone());
    match command {
        QuotaCommands::Upsert { id, scope, scope_ref, limit, priority, valid_from, valid_until } => {
            let scope = QuotaScope::from_str(&scope)
                .ok_or_else(|| DrawError::ConfigViolation(format!("bad scope {scope}")))?;
            if scope != QuotaScope::Global && scope_ref.is_none() {
                return Err(DrawError::ConfigViolation(format!(
                    "{} scope requires --scope-ref",
                    scope.as_str()
                )));
            }
            let rule = QuotaRule {
                id: id.unwrap_or_else(Uuid::new_v4),
                scope,
                scope_ref,
                daily_limit: limit,
                priority,
                valid_from,
                valid_until,
                created_at: Utc::now(),
            };
            repo.upsert(&rule).await?;
            println!("{}", rule.id);
            Ok(())
        }
        QuotaCommands::List => {
            let rules = repo.list_all().await?;
            let mut table = Table::new();
            table.set_header(["id", "scope", "ref", "limit/day", "priority"]);
            for r in &rules {
                table.add_row([
                    r.id.to_string(),
                    r.scope.as_str().to_string(),
                    r.scope_ref.clone().unwrap_or_default(),
                    r.daily_limit.to_string(),
                    r.priority.to_string(),
                ]);
            }
            emit(app.json, &rules, table);
            Ok(())
        }
    }
}
