//! Daily draw quota rules.
//!
//! Quotas limit draws per Asia/Shanghai calendar day. Resolution picks
//! the highest-priority matching rule; priority ties break toward the
//! narrowest scope (user > role > campaign > global).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    Global,
    Campaign,
    Role,
    User,
}

impl QuotaScope {
    /// Narrowness rank used for tie-breaks; higher is narrower.
    pub const fn narrowness(&self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Campaign => 1,
            Self::Role => 2,
            Self::User => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Campaign => "campaign",
            Self::Role => "role",
            Self::User => "user",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "campaign" => Some(Self::Campaign),
            "role" => Some(Self::Role),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRule {
    pub id: Uuid,
    pub scope: QuotaScope,
    /// Campaign id, role name, or user id depending on scope; None for
    /// global rules.
    pub scope_ref: Option<String>,
    /// Draws allowed per Asia/Shanghai calendar day.
    pub daily_limit: u32,
    pub priority: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QuotaRule {
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |t| now >= t)
            && self.valid_until.map_or(true, |t| now < t)
    }

    /// Whether this rule applies to the given draw request.
    pub fn matches(&self, campaign_id: Uuid, user_id: &str, role: Option<&str>) -> bool {
        match self.scope {
            QuotaScope::Global => true,
            QuotaScope::Campaign => {
                self.scope_ref.as_deref() == Some(campaign_id.to_string().as_str())
            }
            QuotaScope::Role => match (self.scope_ref.as_deref(), role) {
                (Some(rule_role), Some(user_role)) => rule_role == user_role,
                _ => false,
            },
            QuotaScope::User => self.scope_ref.as_deref() == Some(user_id),
        }
    }
}

/// Resolve the effective rule for a draw request.
pub fn resolve<'a>(
    rules: &'a [QuotaRule],
    campaign_id: Uuid,
    user_id: &str,
    role: Option<&str>,
    now: DateTime<Utc>,
) -> Option<&'a QuotaRule> {
    rules
        .iter()
        .filter(|r| r.in_window(now))
        .filter(|r| r.matches(campaign_id, user_id, role))
        .max_by_key(|r| (r.priority, r.scope.narrowness()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(scope: QuotaScope, scope_ref: Option<&str>, limit: u32, priority: i32) -> QuotaRule {
        QuotaRule {
            id: Uuid::new_v4(),
            scope,
            scope_ref: scope_ref.map(String::from),
            daily_limit: limit,
            priority,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn highest_priority_wins() {
        let c = Uuid::new_v4();
        let rules = vec![
            rule(QuotaScope::Global, None, 50, 0),
            rule(QuotaScope::Campaign, Some(&c.to_string()), 10, 5),
        ];
        let resolved = resolve(&rules, c, "u1", None, Utc::now()).unwrap();
        assert_eq!(resolved.daily_limit, 10);
    }

    #[test]
    fn ties_break_toward_narrowest_scope() {
        let c = Uuid::new_v4();
        let rules = vec![
            rule(QuotaScope::Global, None, 50, 1),
            rule(QuotaScope::User, Some("u1"), 3, 1),
        ];
        let resolved = resolve(&rules, c, "u1", None, Utc::now()).unwrap();
        assert_eq!(resolved.scope, QuotaScope::User);
    }

    #[test]
    fn expired_rules_are_ignored() {
        let c = Uuid::new_v4();
        let mut r = rule(QuotaScope::Global, None, 50, 0);
        r.valid_until = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(resolve(&[r], c, "u1", None, Utc::now()).is_none());
    }
}
