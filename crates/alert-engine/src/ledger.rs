use chrono::{Duration, Utc};
use screening_core::{Alert, RiskAuditEntry, ScreeningResult, Severity};
use screening_store::{AccountRepo, AuditRepo};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Applies alert-driven risk increments to an account and appends the
/// audit trail. Runs on the caller's connection so the whole ingestion
/// commits as one unit.
pub struct RiskLedger;

impl RiskLedger {
    /// Apply each alert's increment in order. Updates are cumulative
    /// within one call; every alert yields its own audit entry whose
    /// `old_score` is the previous entry's `new_score`.
    pub async fn apply(
        conn: &mut SqliteConnection,
        account_id: &str,
        alerts: &[Alert],
    ) -> ScreeningResult<f64> {
        let account = AccountRepo::get_required(&mut *conn, account_id).await?;
        let mut score = account.risk_score;
        // Audit timestamps within one call are spaced by a microsecond so
        // sorting by timestamp preserves the application order.
        let base = Utc::now();

        for (i, alert) in alerts.iter().enumerate() {
            let old_score = score;
            score += Severity::risk_increment_for(&alert.severity);

            AccountRepo::update_risk_score(&mut *conn, account_id, score).await?;
            AuditRepo::insert(
                &mut *conn,
                &RiskAuditEntry {
                    id: Uuid::new_v4().to_string(),
                    account_id: account_id.to_string(),
                    old_score,
                    new_score: score,
                    reason: alert.reason.clone(),
                    timestamp: base + Duration::microseconds(i as i64),
                },
            )
            .await?;

            tracing::debug!(
                account = account_id,
                rule = %alert.rule_triggered,
                old_score,
                new_score = score,
                "risk score updated"
            );
        }

        Ok(score)
    }
}
