//! Decision traces.
//!
//! Every committed draw stores the full pipeline trace: budget/pressure
//! classification, each correction's verdict with its inputs and
//! outputs, and the candidate-weight snapshot the sampler saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prize::PrizeTier;
use super::weights::TierWeights;

/// Budget tier from remaining/total ratio: B3 >75%, B2 50-75%,
/// B1 25-50%, B0 <25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetTier {
    B0,
    B1,
    B2,
    B3,
}

impl BudgetTier {
    pub const ALL: [Self; 4] = [Self::B0, Self::B1, Self::B2, Self::B3];

    pub fn from_ratio_ppm(ratio_ppm: u64) -> Self {
        if ratio_ppm > 750_000 {
            Self::B3
        } else if ratio_ppm > 500_000 {
            Self::B2
        } else if ratio_ppm > 250_000 {
            Self::B1
        } else {
            Self::B0
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::B0 => "B0",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::B3 => "B3",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "B0" => Some(Self::B0),
            "B1" => Some(Self::B1),
            "B2" => Some(Self::B2),
            "B3" => Some(Self::B3),
            _ => None,
        }
    }
}

/// Pressure tier from actual/expected spend rate: P0 <0.9, P1 0.9-1.1,
/// P2 >1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PressureTier {
    P0,
    P1,
    P2,
}

impl PressureTier {
    pub const ALL: [Self; 3] = [Self::P0, Self::P1, Self::P2];

    pub fn from_ratio_ppm(ratio_ppm: u64) -> Self {
        if ratio_ppm < 900_000 {
            Self::P0
        } else if ratio_ppm <= 1_100_000 {
            Self::P1
        } else {
            Self::P2
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            _ => None,
        }
    }
}

/// Which path produced the final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineType {
    Normal,
    Guarantee,
    Pity,
    Admin,
}

impl PipelineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Guarantee => "guarantee",
            Self::Pity => "pity",
            Self::Admin => "admin",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "guarantee" => Some(Self::Guarantee),
            "pity" => Some(Self::Pity),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// One correction module's verdict for one draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionTrace {
    /// Stable module name (`guarantee`, `pity`, `anti_empty`,
    /// `anti_high`, `luck_debt`, `admin_intent`).
    pub module: String,
    pub triggered: bool,
    /// Counter values and thresholds the module saw.
    pub inputs: serde_json::Value,
    /// Override target or multiplier set the module produced.
    pub outputs: serde_json::Value,
}

/// Weights before and after correction, as the sampler saw them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub base: TierWeights,
    pub adjusted: TierWeights,
}

/// Full trace of one committed decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawDecision {
    pub id: Uuid,
    pub draw_id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: String,
    pub budget_tier: BudgetTier,
    pub pressure_tier: PressureTier,
    /// Campaign remaining budget observed at decision time.
    pub effective_budget: i64,
    pub pipeline_type: PipelineType,
    pub corrections: Vec<CorrectionTrace>,
    pub selected_tier: PrizeTier,
    pub weights: WeightSnapshot,
    pub created_at: DateTime<Utc>,
}

impl DrawDecision {
    /// Names of the correction modules that fired on this draw.
    pub fn triggered_modules(&self) -> impl Iterator<Item = &str> {
        self.corrections.iter().filter(|c| c.triggered).map(|c| c.module.as_str())
    }
}
