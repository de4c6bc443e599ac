use chrono::{DateTime, Utc};
use screening_core::{
    Account, AccountLink, Alert, RiskAuditEntry, ScreeningError, ScreeningResult, Transaction,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

// ============================================================================
// Accounts
// ============================================================================

pub struct AccountRepo;

impl AccountRepo {
    pub async fn get(conn: &mut SqliteConnection, id: &str) -> ScreeningResult<Option<Account>> {
        let row = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub async fn get_required(conn: &mut SqliteConnection, id: &str) -> ScreeningResult<Account> {
        Self::get(conn, id)
            .await?
            .ok_or_else(|| ScreeningError::not_found("Account", id))
    }

    /// Fetch the account, creating it with a default display name if it
    /// does not exist yet.
    pub async fn ensure(conn: &mut SqliteConnection, id: &str) -> ScreeningResult<Account> {
        if let Some(account) = Self::get(conn, id).await? {
            return Ok(account);
        }

        let account = Account {
            id: id.to_string(),
            name: Account::default_name(id),
            risk_score: 0.0,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO accounts (id, name, risk_score, created_at) VALUES (?, ?, ?, ?)")
            .bind(&account.id)
            .bind(&account.name)
            .bind(account.risk_score)
            .bind(account.created_at)
            .execute(conn)
            .await?;
        Ok(account)
    }

    pub async fn update_risk_score(
        conn: &mut SqliteConnection,
        id: &str,
        risk_score: f64,
    ) -> ScreeningResult<()> {
        let result = sqlx::query("UPDATE accounts SET risk_score = ? WHERE id = ?")
            .bind(risk_score)
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ScreeningError::not_found("Account", id));
        }
        Ok(())
    }

    pub async fn all(conn: &mut SqliteConnection) -> ScreeningResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY created_at ASC")
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Filters for the admin transaction listing consumed by the HTTP boundary.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Match transactions where this account is sender or receiver
    pub account_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Oldest first when true, newest first otherwise
    pub ascending: bool,
    pub limit: i64,
    pub offset: i64,
}

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn insert(conn: &mut SqliteConnection, txn: &Transaction) -> ScreeningResult<()> {
        sqlx::query(
            "INSERT INTO transactions (id, from_account, to_account, amount, timestamp, status)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&txn.id)
        .bind(&txn.from_account)
        .bind(&txn.to_account)
        .bind(txn.amount)
        .bind(txn.timestamp)
        .bind(&txn.status)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> ScreeningResult<Transaction> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ScreeningError::not_found("Transaction", id))
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: &str,
        status: &str,
    ) -> ScreeningResult<()> {
        let result = sqlx::query("UPDATE transactions SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ScreeningError::not_found("Transaction", id));
        }
        Ok(())
    }

    /// Timestamps of every transaction sent by the account, oldest first.
    pub async fn sender_timestamps(
        conn: &mut SqliteConnection,
        account_id: &str,
    ) -> ScreeningResult<Vec<DateTime<Utc>>> {
        let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT timestamp FROM transactions WHERE from_account = ? ORDER BY timestamp ASC",
        )
        .bind(account_id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(ts,)| ts).collect())
    }

    /// The sender's transactions strictly before the given one.
    pub async fn prior_for_sender(
        conn: &mut SqliteConnection,
        account_id: &str,
        before: DateTime<Utc>,
    ) -> ScreeningResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions
             WHERE from_account = ? AND timestamp < ?
             ORDER BY timestamp ASC",
        )
        .bind(account_id)
        .bind(before)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Total transaction count per account, as sender or receiver.
    pub async fn activity_counts(
        conn: &mut SqliteConnection,
    ) -> ScreeningResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT account_id, COUNT(*) FROM (
                 SELECT from_account AS account_id FROM transactions
                 UNION ALL
                 SELECT to_account AS account_id FROM transactions
             ) GROUP BY account_id",
        )
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Admin listing: account / time-range filters, sort, pagination.
    pub async fn list(
        conn: &mut SqliteConnection,
        filter: &TransactionFilter,
    ) -> ScreeningResult<Vec<Transaction>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM transactions WHERE 1=1");

        if let Some(account_id) = &filter.account_id {
            qb.push(" AND (from_account = ")
                .push_bind(account_id.as_str())
                .push(" OR to_account = ")
                .push_bind(account_id.as_str())
                .push(")");
        }
        if let Some(start) = filter.start_time {
            qb.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = filter.end_time {
            qb.push(" AND timestamp <= ").push_bind(end);
        }
        qb.push(if filter.ascending {
            " ORDER BY timestamp ASC"
        } else {
            " ORDER BY timestamp DESC"
        });
        if filter.limit > 0 {
            qb.push(" LIMIT ")
                .push_bind(filter.limit)
                .push(" OFFSET ")
                .push_bind(filter.offset.max(0));
        }

        let rows = qb.build_query_as::<Transaction>().fetch_all(conn).await?;
        Ok(rows)
    }

    pub async fn count(conn: &mut SqliteConnection) -> ScreeningResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Account links
// ============================================================================

pub struct LinkRepo;

impl LinkRepo {
    /// Increment the strength of the link between the unordered pair,
    /// inserting it on first contact. The stored orientation is that of
    /// the first transaction between the pair.
    pub async fn upsert_pair(
        conn: &mut SqliteConnection,
        account_a: &str,
        account_b: &str,
    ) -> ScreeningResult<AccountLink> {
        let updated = sqlx::query(
            "UPDATE account_links SET link_strength = link_strength + 1
             WHERE (account_a = ?1 AND account_b = ?2)
                OR (account_a = ?2 AND account_b = ?1)",
        )
        .bind(account_a)
        .bind(account_b)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            let link = AccountLink {
                id: Uuid::new_v4().to_string(),
                account_a: account_a.to_string(),
                account_b: account_b.to_string(),
                link_strength: 1,
            };
            sqlx::query(
                "INSERT INTO account_links (id, account_a, account_b, link_strength)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&link.id)
            .bind(&link.account_a)
            .bind(&link.account_b)
            .bind(link.link_strength)
            .execute(conn)
            .await?;
            return Ok(link);
        }

        Self::get_pair(conn, account_a, account_b)
            .await?
            .ok_or_else(|| ScreeningError::not_found("AccountLink", account_a))
    }

    pub async fn get_pair(
        conn: &mut SqliteConnection,
        account_a: &str,
        account_b: &str,
    ) -> ScreeningResult<Option<AccountLink>> {
        let row = sqlx::query_as::<_, AccountLink>(
            "SELECT * FROM account_links
             WHERE (account_a = ?1 AND account_b = ?2)
                OR (account_a = ?2 AND account_b = ?1)",
        )
        .bind(account_a)
        .bind(account_b)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// Every link as a directed (a, b) pair, in stored orientation.
    pub async fn all_pairs(conn: &mut SqliteConnection) -> ScreeningResult<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT account_a, account_b FROM account_links")
                .fetch_all(conn)
                .await?;
        Ok(rows)
    }
}

// ============================================================================
// Alerts
// ============================================================================

pub struct AlertRepo;

impl AlertRepo {
    pub async fn insert(conn: &mut SqliteConnection, alert: &Alert) -> ScreeningResult<()> {
        sqlx::query(
            "INSERT INTO alerts (id, transaction_id, rule_triggered, severity, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.transaction_id)
        .bind(&alert.rule_triggered)
        .bind(&alert.severity)
        .bind(&alert.reason)
        .bind(alert.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn by_transaction(
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> ScreeningResult<Vec<Alert>> {
        let rows = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE transaction_id = ? ORDER BY created_at ASC",
        )
        .bind(transaction_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Alerts raised on transactions the account sent.
    pub async fn by_account(
        conn: &mut SqliteConnection,
        account_id: &str,
    ) -> ScreeningResult<Vec<Alert>> {
        let rows = sqlx::query_as::<_, Alert>(
            "SELECT a.* FROM alerts a
             JOIN transactions t ON t.id = a.transaction_id
             WHERE t.from_account = ?
             ORDER BY a.created_at ASC",
        )
        .bind(account_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn recent(conn: &mut SqliteConnection, limit: i64) -> ScreeningResult<Vec<Alert>> {
        let rows =
            sqlx::query_as::<_, Alert>("SELECT * FROM alerts ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(conn)
                .await?;
        Ok(rows)
    }
}

// ============================================================================
// Risk audits
// ============================================================================

pub struct AuditRepo;

impl AuditRepo {
    pub async fn insert(
        conn: &mut SqliteConnection,
        entry: &RiskAuditEntry,
    ) -> ScreeningResult<()> {
        sqlx::query(
            "INSERT INTO risk_audits (id, account_id, old_score, new_score, reason, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.account_id)
        .bind(entry.old_score)
        .bind(entry.new_score)
        .bind(&entry.reason)
        .bind(entry.timestamp)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// The account's full audit chain, oldest first.
    pub async fn by_account(
        conn: &mut SqliteConnection,
        account_id: &str,
    ) -> ScreeningResult<Vec<RiskAuditEntry>> {
        let rows = sqlx::query_as::<_, RiskAuditEntry>(
            "SELECT * FROM risk_audits WHERE account_id = ? ORDER BY timestamp ASC",
        )
        .bind(account_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }
}
