use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Severity;

/// A money transfer between two accounts. Immutable once processed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

impl Transaction {
    pub const STATUS_PENDING: &'static str = "pending";
    pub const STATUS_PROCESSED: &'static str = "processed";
}

/// Account holder with the risk score maintained by the screening engine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub risk_score: f64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Display name assigned when an account is created lazily
    /// on first reference from a transaction.
    pub fn default_name(id: &str) -> String {
        let prefix: String = id.chars().take(4).collect();
        format!("User-{}", prefix)
    }
}

/// Adjacency-list edge between two accounts. One row per unordered pair;
/// `link_strength` counts transactions in either direction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountLink {
    pub id: String,
    pub account_a: String,
    pub account_b: String,
    pub link_strength: i64,
}

/// Alert raised by the rule engine or graph analysis. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: String,
    pub transaction_id: String,
    pub rule_triggered: String,
    pub severity: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in an account's append-only risk-score history.
///
/// Ordered by timestamp per account, each entry's `old_score` equals the
/// preceding entry's `new_score` (0 for the first entry).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RiskAuditEntry {
    pub id: String,
    pub account_id: String,
    pub old_score: f64,
    pub new_score: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable work-queue entry referencing a transaction awaiting screening.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueueItem {
    pub id: String,
    pub txn_id: String,
    pub status: String,
    pub retries: i64,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    pub const STATUS_PENDING: &'static str = "pending";
    pub const STATUS_PROCESSING: &'static str = "processing";
    pub const STATUS_DONE: &'static str = "done";
    pub const STATUS_FAILED: &'static str = "failed";
}

/// A rule that fired during evaluation, with its resolved severity
/// and analyst-facing reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule: String,
    pub severity: Severity,
    pub reason: String,
}

/// Input to the alert generator: either a fully-evaluated rule or a bare
/// rule name (e.g. from the graph-wide money-loop scan) whose severity
/// still needs resolving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleTrigger {
    Evaluated(TriggeredRule),
    Named(String),
}

impl From<TriggeredRule> for RuleTrigger {
    fn from(rule: TriggeredRule) -> Self {
        RuleTrigger::Evaluated(rule)
    }
}

impl From<&str> for RuleTrigger {
    fn from(name: &str) -> Self {
        RuleTrigger::Named(name.to_string())
    }
}
