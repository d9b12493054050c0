use cpg_common::{FiatAmount, Sats};
use sqlx::SqliteConnection;

use crate::{
    db_types::{BalanceTransaction, TransactionType, UserBalance},
    traits::LedgerError,
};

/// Append the ledger row for a deposit credit. The before/after snapshots come from the balance reads surrounding
/// the additive update, all inside the same transaction.
#[allow(clippy::too_many_arguments)]
pub async fn insert_deposit_credit(
    user_id: i64,
    deposit_id: i64,
    amount_usd: FiatAmount,
    amount_mxn: FiatAmount,
    amount_sats: Sats,
    before: &UserBalance,
    after: &UserBalance,
    conn: &mut SqliteConnection,
) -> Result<BalanceTransaction, LedgerError> {
    let txn_type = TransactionType::Deposit.to_string();
    let description = format!("Bitcoin deposit: {amount_sats}");
    let txn = sqlx::query_as(
        r#"
            INSERT INTO balance_transactions (
              user_id, txn_type, amount_usd, amount_mxn, currency, deposit_id,
              balance_before_usd, balance_after_usd, balance_before_mxn, balance_after_mxn,
              description
            )
            VALUES ($1, $2, $3, $4, 'BOTH', $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(txn_type)
    .bind(amount_usd)
    .bind(amount_mxn)
    .bind(deposit_id)
    .bind(before.balance_usd)
    .bind(after.balance_usd)
    .bind(before.balance_mxn)
    .bind(after.balance_mxn)
    .bind(description)
    .fetch_one(conn)
    .await?;
    Ok(txn)
}

pub async fn fetch_for_user(
    user_id: i64,
    limit: i64,
    offset: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BalanceTransaction>, LedgerError> {
    let txns = sqlx::query_as(
        r#"SELECT * FROM balance_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(txns)
}
