// db/ledgerdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::paymentmodel::{EscrowStatus, LedgerEntry, NewLedgerEntry, TransactionStatus, TransactionType},
    service::error::ServiceError,
};

/// Read side of the ledger. Entries are only ever appended inside the
/// escrow transactions that mint them.
#[async_trait]
pub trait LedgerExt {
    async fn list_user_entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError>;

    async fn list_escrow_entries(&self, escrow_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError>;

    /// Net total of the user's completed entries of one type, optionally
    /// limited to entries completed at or after `since`.
    async fn sum_user_entries(
        &self,
        user_id: Uuid,
        transaction_type: TransactionType,
        since: Option<DateTime<Utc>>,
    ) -> Result<BigDecimal, ServiceError>;

    /// Payouts still held for the freelancer in funded escrows.
    async fn outstanding_for_freelancer(&self, freelancer_id: Uuid) -> Result<BigDecimal, ServiceError>;
}

pub(crate) async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: NewLedgerEntry,
    now: DateTime<Utc>,
) -> Result<LedgerEntry, ServiceError> {
    let net_amount = entry.net_amount();
    let row = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO transactions (
            id, user_id, transaction_type, status, amount, currency, fee, net_amount,
            project_id, proposal_id, escrow_id, description, created_at, completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.transaction_type)
    .bind(TransactionStatus::Completed)
    .bind(entry.amount)
    .bind(entry.currency)
    .bind(entry.fee)
    .bind(net_amount)
    .bind(entry.project_id)
    .bind(entry.proposal_id)
    .bind(entry.escrow_id)
    .bind(entry.description)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

#[async_trait]
impl LedgerExt for DBClient {
    async fn list_user_entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_escrow_entries(&self, escrow_id: Uuid) -> Result<Vec<LedgerEntry>, ServiceError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM transactions WHERE escrow_id = $1 ORDER BY created_at ASC",
        )
        .bind(escrow_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn sum_user_entries(
        &self,
        user_id: Uuid,
        transaction_type: TransactionType,
        since: Option<DateTime<Utc>>,
    ) -> Result<BigDecimal, ServiceError> {
        let total: Option<BigDecimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(net_amount) FROM transactions
            WHERE user_id = $1
              AND transaction_type = $2
              AND status = $3
              AND ($4::timestamptz IS NULL OR completed_at >= $4)
            "#,
        )
        .bind(user_id)
        .bind(transaction_type)
        .bind(TransactionStatus::Completed)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or_default())
    }

    async fn outstanding_for_freelancer(&self, freelancer_id: Uuid) -> Result<BigDecimal, ServiceError> {
        let total: Option<BigDecimal> = sqlx::query_scalar(
            "SELECT SUM(freelancer_amount) FROM escrows WHERE freelancer_id = $1 AND status = $2",
        )
        .bind(freelancer_id)
        .bind(EscrowStatus::Funded)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or_default())
    }
}
