use chrono::Utc;
use screening_core::{Alert, RuleCatalog, RuleTrigger};
use uuid::Uuid;

/// Turns triggered rules into alert records.
///
/// Rules coming from the rule engine already carry a severity and reason;
/// bare rule names (the graph-wide money-loop scan appends one) are
/// resolved through the shared catalog, which defaults unmapped names
/// to LOW.
pub struct AlertGenerator {
    catalog: RuleCatalog,
}

impl Default for AlertGenerator {
    fn default() -> Self {
        Self::new(RuleCatalog::default())
    }
}

impl AlertGenerator {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn generate(&self, transaction_id: &str, triggered: &[RuleTrigger]) -> Vec<Alert> {
        triggered
            .iter()
            .map(|trigger| {
                let (rule, severity, reason) = match trigger {
                    RuleTrigger::Evaluated(rule) => {
                        (rule.rule.clone(), rule.severity, rule.reason.clone())
                    }
                    RuleTrigger::Named(name) => {
                        (name.clone(), self.catalog.severity_for(name), String::new())
                    }
                };
                Alert {
                    id: Uuid::new_v4().to_string(),
                    transaction_id: transaction_id.to_string(),
                    rule_triggered: rule,
                    severity: severity.to_string(),
                    reason,
                    created_at: Utc::now(),
                }
            })
            .collect()
    }
}
