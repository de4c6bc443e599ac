use serde::{Deserialize, Serialize};

/// Tunable thresholds for the AML rules.
///
/// Passed into the rule engine at construction so tests and deployments
/// can substitute values without touching global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Amount at or above which a single transaction is flagged
    pub large_txn_amount: f64,

    /// Two transactions closer together than this are "rapid"
    pub rapid_txn_window_secs: i64,

    /// Account age window for mule / OTP-scam detection
    pub new_account_age_hours: i64,

    /// Maximum prior transactions for an account to still count as "new"
    pub new_account_max_txns: usize,

    /// Minimum count of small transactions to flag smurfing
    pub smurf_txn_count: usize,

    /// A transaction at or below this amount is "small" for smurfing
    pub smurf_txn_amount: f64,

    /// An account with this many transactions or fewer is considered
    /// a false / temporary account
    pub min_account_activity: i64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            large_txn_amount: 100_000.0,
            rapid_txn_window_secs: 60,
            new_account_age_hours: 24,
            new_account_max_txns: 2,
            smurf_txn_count: 5,
            smurf_txn_amount: 10_000.0,
            min_account_activity: 1,
        }
    }
}
