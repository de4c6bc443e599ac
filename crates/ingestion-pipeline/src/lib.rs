//! Orchestrates the screening of a single transaction.
//!
//! Persist → update graph → evaluate rules → detect loops → generate
//! alerts → update the risk ledger. Every step of one ingestion runs on
//! one database transaction and commits once, so a mid-pipeline failure
//! leaves no partial risk or audit state.

#[cfg(test)]
mod tests;

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use alert_engine::{AlertGenerator, RiskLedger};
use queue_coordinator::QueueCoordinator;
use relationship_graph::check_money_loop;
use rule_engine::{EvaluationContext, RuleEngine};
use screening_core::{
    rules, Alert, QueueItem, RuleTrigger, ScreeningError, ScreeningResult, Transaction,
};
use screening_store::{AccountRepo, AlertRepo, LinkRepo, Store, TransactionRepo};

pub struct IngestionPipeline {
    store: Store,
    rule_engine: RuleEngine,
    alert_generator: AlertGenerator,
}

impl IngestionPipeline {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            rule_engine: RuleEngine::default(),
            alert_generator: AlertGenerator::default(),
        }
    }

    /// Construct with substituted thresholds / severity tables.
    pub fn with_engines(
        store: Store,
        rule_engine: RuleEngine,
        alert_generator: AlertGenerator,
    ) -> Self {
        Self {
            store,
            rule_engine,
            alert_generator,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Screen a transaction handed in directly by the request boundary.
    pub async fn ingest(
        &self,
        from_account: &str,
        to_account: &str,
        amount: f64,
    ) -> ScreeningResult<Transaction> {
        let mut tx = self.store.begin().await?;

        AccountRepo::ensure(&mut tx, from_account).await?;
        AccountRepo::ensure(&mut tx, to_account).await?;

        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            from_account: from_account.to_string(),
            to_account: to_account.to_string(),
            amount,
            timestamp: Utc::now(),
            status: Transaction::STATUS_PROCESSED.to_string(),
        };
        TransactionRepo::insert(&mut tx, &txn).await?;

        let alerts = self.screen(&mut tx, &txn).await?;
        tx.commit().await?;

        tracing::info!(
            txn = %txn.id,
            from = %txn.from_account,
            to = %txn.to_account,
            amount = txn.amount,
            alerts = alerts.len(),
            "transaction ingested"
        );
        Ok(txn)
    }

    /// Persist a transaction as `pending` together with its queue item;
    /// a worker finishes it later via [`process_queued`](Self::process_queued).
    pub async fn enqueue(
        &self,
        from_account: &str,
        to_account: &str,
        amount: f64,
    ) -> ScreeningResult<(Transaction, QueueItem)> {
        let mut tx = self.store.begin().await?;

        AccountRepo::ensure(&mut tx, from_account).await?;
        AccountRepo::ensure(&mut tx, to_account).await?;

        let txn = Transaction {
            id: Uuid::new_v4().to_string(),
            from_account: from_account.to_string(),
            to_account: to_account.to_string(),
            amount,
            timestamp: Utc::now(),
            status: Transaction::STATUS_PENDING.to_string(),
        };
        TransactionRepo::insert(&mut tx, &txn).await?;
        let item = QueueCoordinator::enqueue_on(&mut tx, &txn.id).await?;
        tx.commit().await?;

        tracing::info!(txn = %txn.id, item = %item.id, "transaction enqueued");
        Ok((txn, item))
    }

    /// Screen a previously enqueued transaction and mark it processed.
    pub async fn process_queued(&self, txn_id: &str) -> ScreeningResult<Transaction> {
        let mut tx = self.store.begin().await?;

        let mut txn = TransactionRepo::get_by_id(&mut tx, txn_id).await?;
        if txn.status == Transaction::STATUS_PROCESSED {
            return Err(ScreeningError::Configuration(format!(
                "transaction {txn_id} already processed"
            )));
        }

        let alerts = self.screen(&mut tx, &txn).await?;
        TransactionRepo::set_status(&mut tx, &txn.id, Transaction::STATUS_PROCESSED).await?;
        txn.status = Transaction::STATUS_PROCESSED.to_string();
        tx.commit().await?;

        tracing::info!(txn = %txn.id, alerts = alerts.len(), "queued transaction processed");
        Ok(txn)
    }

    /// Steps shared by both entry points: graph update, rule evaluation,
    /// the graph-wide loop scan, alert persistence and the risk update.
    async fn screen(
        &self,
        conn: &mut SqliteConnection,
        txn: &Transaction,
    ) -> ScreeningResult<Vec<Alert>> {
        LinkRepo::upsert_pair(&mut *conn, &txn.from_account, &txn.to_account).await?;

        // Sender history includes the row just inserted
        let timestamps = TransactionRepo::sender_timestamps(&mut *conn, &txn.from_account).await?;
        let ctx = EvaluationContext::new(txn.amount, timestamps);
        let mut triggered: Vec<RuleTrigger> = self
            .rule_engine
            .evaluate(&ctx)
            .into_iter()
            .map(RuleTrigger::from)
            .collect();

        let link_pairs = LinkRepo::all_pairs(&mut *conn).await?;
        if check_money_loop(&link_pairs) {
            triggered.push(RuleTrigger::from(rules::MONEY_LOOP));
        }

        let alerts = self.alert_generator.generate(&txn.id, &triggered);
        for alert in &alerts {
            AlertRepo::insert(&mut *conn, alert).await?;
        }
        if !alerts.is_empty() {
            RiskLedger::apply(&mut *conn, &txn.from_account, &alerts).await?;
        }

        Ok(alerts)
    }
}
