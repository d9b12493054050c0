use cpg_common::{FiatAmount, Sats};
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::UserBalance, traits::LedgerError};

pub async fn fetch(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserBalance>, LedgerError> {
    let balance = sqlx::query_as(r#"SELECT * FROM user_balances WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

/// Create a zeroed balance row for the user if one does not exist yet. Safe to call concurrently.
pub async fn ensure_exists(user_id: i64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    sqlx::query(r#"INSERT INTO user_balances (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING"#)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_or_create(user_id: i64, conn: &mut SqliteConnection) -> Result<UserBalance, LedgerError> {
    ensure_exists(user_id, &mut *conn).await?;
    fetch(user_id, conn).await?.ok_or(LedgerError::BalanceNotFound(user_id))
}

/// Additively apply a deposit credit to the balance row: both fiat balances and the cumulative deposited totals.
/// Must only be called from inside the crediting transaction, after the before-snapshot has been read.
pub async fn apply_deposit_credit(
    user_id: i64,
    amount_usd: FiatAmount,
    amount_mxn: FiatAmount,
    amount_sats: Sats,
    conn: &mut SqliteConnection,
) -> Result<UserBalance, LedgerError> {
    let balance: UserBalance = sqlx::query_as(
        r#"
            UPDATE user_balances SET
              balance_usd = balance_usd + $1,
              balance_mxn = balance_mxn + $2,
              total_deposited_sats = total_deposited_sats + $3,
              total_deposited_usd = total_deposited_usd + $1,
              total_deposited_mxn = total_deposited_mxn + $2,
              updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $4
            RETURNING *;
        "#,
    )
    .bind(amount_usd)
    .bind(amount_mxn)
    .bind(amount_sats)
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(LedgerError::BalanceNotFound(user_id))?;
    trace!("🗃️ Balance for user #{user_id} is now {} USD / {} MXN", balance.balance_usd, balance.balance_mxn);
    Ok(balance)
}
