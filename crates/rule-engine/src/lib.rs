//! Pure AML rule evaluation.
//!
//! Evaluates threshold and pattern rules against a transaction and the
//! sender account's history. No I/O: callers gather the history and hand
//! it over in an [`EvaluationContext`]. A rule only fires when its
//! required inputs are present, so cheap callers can evaluate a subset.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use screening_core::{rules, RuleCatalog, RuleThresholds, TriggeredRule};

/// Prior transaction of the sender, as needed by the history rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorTransaction {
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Everything the rules may look at for one evaluation.
///
/// `amount` and `sender_timestamps` are always required; the remaining
/// fields gate the rules that need them.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Amount of the transaction under evaluation
    pub amount: f64,

    /// Timestamps of the sender's transactions, including the current one
    pub sender_timestamps: Vec<DateTime<Utc>>,

    /// Sender account creation time (mule detection)
    pub account_created_at: Option<DateTime<Utc>>,

    /// Sender's transactions before the current one (mule, smurfing)
    pub prior_transactions: Option<Vec<PriorTransaction>>,

    /// All known account-link pairs (local loop detection)
    pub link_pairs: Option<Vec<(String, String)>>,

    /// Per-account total transaction counts (false-account detection)
    pub activity_counts: Option<BTreeMap<String, i64>>,

    /// The (sender, receiver) pair of the current transaction
    pub current_pair: Option<(String, String)>,
}

impl EvaluationContext {
    pub fn new(amount: f64, sender_timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            amount,
            sender_timestamps,
            ..Default::default()
        }
    }
}

/// Evaluates the AML rule set against a single transaction.
pub struct RuleEngine {
    thresholds: RuleThresholds,
    catalog: RuleCatalog,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleThresholds::default(), RuleCatalog::default())
    }
}

impl RuleEngine {
    pub fn new(thresholds: RuleThresholds, catalog: RuleCatalog) -> Self {
        Self {
            thresholds,
            catalog,
        }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Run every rule whose inputs are available. Rules are independent;
    /// any subset may co-fire on one transaction.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Vec<TriggeredRule> {
        let mut triggered = Vec::new();

        if ctx.amount >= self.thresholds.large_txn_amount {
            triggered.push(self.trigger(
                rules::LARGE_TRANSACTION,
                format!(
                    "Transaction amount exceeds safe threshold ({}).",
                    self.thresholds.large_txn_amount
                ),
            ));
        }

        if !ctx.sender_timestamps.is_empty() && self.detect_rapid(&ctx.sender_timestamps) {
            triggered.push(self.trigger(
                rules::RAPID_TRANSACTIONS,
                format!(
                    "Multiple transactions detected from this account within {} seconds.",
                    self.thresholds.rapid_txn_window_secs
                ),
            ));
        }

        if let (Some(created_at), Some(prior), Some(latest)) = (
            ctx.account_created_at,
            ctx.prior_transactions.as_deref(),
            ctx.sender_timestamps.iter().max(),
        ) {
            if self.detect_mule(created_at, *latest, prior) {
                triggered.push(self.trigger(
                    rules::MULE_OTP_SCAM,
                    "New account forwarding received funds quickly \
                     (potential mule or OTP scam)."
                        .to_string(),
                ));
            }
        }

        if let Some(prior) = ctx.prior_transactions.as_deref() {
            if self.detect_smurfing(prior) {
                triggered.push(self.trigger(
                    rules::SMURFING,
                    format!(
                        "Multiple small transactions detected between same accounts (>= {}).",
                        self.thresholds.smurf_txn_count
                    ),
                ));
            }
        }

        if let (Some(pairs), Some(pair)) = (ctx.link_pairs.as_deref(), ctx.current_pair.as_ref()) {
            if detect_circular_flow(pairs, pair) {
                triggered.push(self.trigger(
                    rules::MONEY_LOOP,
                    "Circular money flow detected between linked accounts.".to_string(),
                ));
            }
        }

        if let Some(counts) = ctx.activity_counts.as_ref() {
            let dormant = self.detect_false_accounts(counts);
            if !dormant.is_empty() {
                triggered.push(self.trigger(
                    rules::FALSE_ACCOUNTS,
                    format!("Accounts with minimal activity detected: {:?}.", dormant),
                ));
            }
        }

        triggered
    }

    fn trigger(&self, rule: &str, reason: String) -> TriggeredRule {
        TriggeredRule {
            rule: rule.to_string(),
            severity: self.catalog.severity_for(rule),
            reason,
        }
    }

    /// Any two chronologically consecutive timestamps closer than the
    /// rapid window. Fires at most once no matter how many pairs qualify.
    fn detect_rapid(&self, timestamps: &[DateTime<Utc>]) -> bool {
        let mut sorted: Vec<DateTime<Utc>> = timestamps.to_vec();
        sorted.sort_unstable();
        let window = Duration::seconds(self.thresholds.rapid_txn_window_secs);
        sorted.windows(2).any(|w| w[1] - w[0] < window)
    }

    /// New account with almost no history forwarding funds.
    fn detect_mule(
        &self,
        created_at: DateTime<Utc>,
        txn_time: DateTime<Utc>,
        prior: &[PriorTransaction],
    ) -> bool {
        let age = txn_time - created_at;
        age <= Duration::hours(self.thresholds.new_account_age_hours)
            && prior.len() <= self.thresholds.new_account_max_txns
    }

    /// Repeated small-value transactions below the structuring threshold.
    fn detect_smurfing(&self, prior: &[PriorTransaction]) -> bool {
        let small = prior
            .iter()
            .filter(|t| t.amount <= self.thresholds.smurf_txn_amount)
            .count();
        small >= self.thresholds.smurf_txn_count
    }

    /// Accounts with at most `min_account_activity` transactions total.
    fn detect_false_accounts(&self, counts: &BTreeMap<String, i64>) -> Vec<String> {
        counts
            .iter()
            .filter(|(_, &count)| count <= self.thresholds.min_account_activity)
            .map(|(acc, _)| acc.clone())
            .collect()
    }
}

/// Local circular-flow check: does the receiver of `current_pair` have an
/// outgoing edge to some intermediate account that leads back to the
/// sender (a 3-cycle sender→receiver→X→sender)?
fn detect_circular_flow(link_pairs: &[(String, String)], current_pair: &(String, String)) -> bool {
    let mut graph: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (a, b) in link_pairs {
        graph.entry(a.as_str()).or_default().insert(b.as_str());
    }

    let (sender, receiver) = (current_pair.0.as_str(), current_pair.1.as_str());
    let Some(intermediates) = graph.get(receiver) else {
        return false;
    };
    intermediates
        .iter()
        .any(|x| graph.get(x).is_some_and(|back| back.contains(sender)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_core::Severity;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn rule_names(triggered: &[TriggeredRule]) -> Vec<&str> {
        triggered.iter().map(|t| t.rule.as_str()).collect()
    }

    #[test]
    fn large_amount_fires_at_threshold() {
        let engine = RuleEngine::default();

        let at = engine.evaluate(&EvaluationContext::new(100_000.0, vec![ts(0)]));
        assert_eq!(rule_names(&at), vec![rules::LARGE_TRANSACTION]);
        assert_eq!(at[0].severity, Severity::High);

        let below = engine.evaluate(&EvaluationContext::new(99_999.99, vec![ts(0)]));
        assert!(below.is_empty());
    }

    #[test]
    fn rapid_fires_once_regardless_of_pair_count() {
        let engine = RuleEngine::default();

        // Three qualifying consecutive gaps, deliberately unsorted
        let ctx = EvaluationContext::new(50.0, vec![ts(30), ts(0), ts(90), ts(60)]);
        let triggered = engine.evaluate(&ctx);
        assert_eq!(rule_names(&triggered), vec![rules::RAPID_TRANSACTIONS]);
        assert_eq!(triggered[0].severity, Severity::Medium);
    }

    #[test]
    fn rapid_needs_gap_strictly_under_window() {
        let engine = RuleEngine::default();
        let ctx = EvaluationContext::new(50.0, vec![ts(0), ts(60), ts(120)]);
        assert!(engine.evaluate(&ctx).is_empty());
    }

    #[test]
    fn mule_requires_new_account_and_thin_history() {
        let engine = RuleEngine::default();

        let mut ctx = EvaluationContext::new(500.0, vec![ts(3600)]);
        ctx.account_created_at = Some(ts(0));
        ctx.prior_transactions = Some(vec![
            PriorTransaction { amount: 100.0, timestamp: ts(1000) },
            PriorTransaction { amount: 200.0, timestamp: ts(2000) },
        ]);
        let triggered = engine.evaluate(&ctx);
        assert!(rule_names(&triggered).contains(&rules::MULE_OTP_SCAM));

        // Old account: no fire
        ctx.account_created_at = Some(ts(3600) - Duration::hours(48));
        assert!(!rule_names(&engine.evaluate(&ctx)).contains(&rules::MULE_OTP_SCAM));
    }

    #[test]
    fn mule_silent_without_history_inputs() {
        let engine = RuleEngine::default();
        let mut ctx = EvaluationContext::new(500.0, vec![ts(3600)]);
        ctx.account_created_at = Some(ts(0));
        // prior_transactions missing: rule cannot fire
        assert!(engine.evaluate(&ctx).is_empty());
    }

    #[test]
    fn smurfing_counts_small_transactions() {
        let engine = RuleEngine::default();

        let small = |i: i64| PriorTransaction { amount: 5_000.0, timestamp: ts(i * 600) };
        let mut ctx = EvaluationContext::new(5_000.0, vec![ts(4000)]);
        ctx.prior_transactions = Some((0..5).map(small).collect());
        // created long ago so the mule rule stays out of the way
        ctx.account_created_at = Some(ts(0) - Duration::days(30));

        let triggered = engine.evaluate(&ctx);
        assert!(rule_names(&triggered).contains(&rules::SMURFING));

        ctx.prior_transactions = Some((0..4).map(small).collect());
        assert!(!rule_names(&engine.evaluate(&ctx)).contains(&rules::SMURFING));
    }

    #[test]
    fn local_loop_detects_two_hop_return() {
        let engine = RuleEngine::default();

        let mut ctx = EvaluationContext::new(50.0, vec![ts(0)]);
        ctx.link_pairs = Some(vec![
            ("A".into(), "B".into()),
            ("B".into(), "C".into()),
            ("C".into(), "A".into()),
        ]);
        ctx.current_pair = Some(("A".into(), "B".into()));
        let triggered = engine.evaluate(&ctx);
        assert_eq!(rule_names(&triggered), vec![rules::MONEY_LOOP]);
        assert_eq!(triggered[0].severity, Severity::High);

        // No path back to the sender
        ctx.link_pairs = Some(vec![("A".into(), "B".into()), ("B".into(), "C".into())]);
        assert!(engine.evaluate(&ctx).is_empty());
    }

    #[test]
    fn false_accounts_lists_offenders() {
        let engine = RuleEngine::default();

        let mut ctx = EvaluationContext::new(50.0, vec![ts(0)]);
        let mut counts = BTreeMap::new();
        counts.insert("acc-busy".to_string(), 12_i64);
        counts.insert("acc-dormant".to_string(), 1_i64);
        counts.insert("acc-empty".to_string(), 0_i64);
        ctx.activity_counts = Some(counts);

        let triggered = engine.evaluate(&ctx);
        assert_eq!(rule_names(&triggered), vec![rules::FALSE_ACCOUNTS]);
        assert!(triggered[0].reason.contains("acc-dormant"));
        assert!(triggered[0].reason.contains("acc-empty"));
        assert!(!triggered[0].reason.contains("acc-busy"));
    }

    #[test]
    fn rules_co_fire_independently() {
        let engine = RuleEngine::default();

        let mut ctx = EvaluationContext::new(250_000.0, vec![ts(0), ts(10)]);
        ctx.link_pairs = Some(vec![
            ("A".into(), "B".into()),
            ("B".into(), "C".into()),
            ("C".into(), "A".into()),
        ]);
        ctx.current_pair = Some(("A".into(), "B".into()));

        let triggered = engine.evaluate(&ctx);
        let names = rule_names(&triggered);
        assert!(names.contains(&rules::LARGE_TRANSACTION));
        assert!(names.contains(&rules::RAPID_TRANSACTIONS));
        assert!(names.contains(&rules::MONEY_LOOP));
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let thresholds = RuleThresholds {
            large_txn_amount: 1_000.0,
            ..Default::default()
        };
        let engine = RuleEngine::new(thresholds, RuleCatalog::default());
        let triggered = engine.evaluate(&EvaluationContext::new(1_500.0, vec![ts(0)]));
        assert_eq!(rule_names(&triggered), vec![rules::LARGE_TRANSACTION]);
    }

    #[test]
    fn engine_severity_agrees_with_catalog() {
        let engine = RuleEngine::default();
        let catalog = RuleCatalog::default();

        let mut ctx = EvaluationContext::new(250_000.0, vec![ts(0), ts(5)]);
        ctx.account_created_at = Some(ts(0));
        ctx.prior_transactions = Some(vec![]);
        ctx.link_pairs = Some(vec![
            ("A".into(), "B".into()),
            ("B".into(), "C".into()),
            ("C".into(), "A".into()),
        ]);
        ctx.current_pair = Some(("A".into(), "B".into()));
        let mut counts = BTreeMap::new();
        counts.insert("x".to_string(), 0_i64);
        ctx.activity_counts = Some(counts);

        for rule in engine.evaluate(&ctx) {
            assert_eq!(rule.severity, catalog.severity_for(&rule.rule), "{}", rule.rule);
        }
    }
}
