use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    /// Risk-score increment applied to the sender account per alert
    /// of this severity.
    pub fn risk_increment(&self) -> f64 {
        match self {
            Severity::Low => 5.0,
            Severity::Medium => 15.0,
            Severity::High => 30.0,
        }
    }

    /// Increment for a severity stored as a string; unknown values
    /// contribute nothing.
    pub fn risk_increment_for(severity: &str) -> f64 {
        severity
            .parse::<Severity>()
            .map(|s| s.risk_increment())
            .unwrap_or(0.0)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Canonical rule names shared by the rule engine, the graph analysis
/// and the alert generator.
pub mod rules {
    pub const LARGE_TRANSACTION: &str = "Large Transaction Amount";
    pub const RAPID_TRANSACTIONS: &str = "Rapid Transactions";
    pub const MULE_OTP_SCAM: &str = "Mule / OTP Scam";
    pub const SMURFING: &str = "Smurfing";
    pub const MONEY_LOOP: &str = "Money Loop Detected";
    pub const FALSE_ACCOUNTS: &str = "False / Temporary Accounts";
}

/// Immutable rule-name → severity table.
///
/// Single source of truth: the rule engine stamps severities from this
/// catalog and the alert generator re-resolves bare rule names through it,
/// so the two can never disagree.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    severities: HashMap<String, Severity>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        let mut severities = HashMap::new();
        severities.insert(rules::LARGE_TRANSACTION.to_string(), Severity::High);
        severities.insert(rules::RAPID_TRANSACTIONS.to_string(), Severity::Medium);
        severities.insert(rules::MULE_OTP_SCAM.to_string(), Severity::High);
        severities.insert(rules::SMURFING.to_string(), Severity::Medium);
        severities.insert(rules::MONEY_LOOP.to_string(), Severity::High);
        severities.insert(rules::FALSE_ACCOUNTS.to_string(), Severity::Medium);
        Self { severities }
    }
}

impl RuleCatalog {
    /// Severity for a rule name; unmapped names default to LOW.
    pub fn severity_for(&self, rule_name: &str) -> Severity {
        self.severities
            .get(rule_name)
            .copied()
            .unwrap_or(Severity::Low)
    }

    /// Register or override a rule's severity (used by tests and
    /// deployments that tune the table).
    pub fn with_rule(mut self, rule_name: &str, severity: Severity) -> Self {
        self.severities.insert(rule_name.to_string(), severity);
        self
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.severities.keys().map(|s| s.as_str())
    }
}
