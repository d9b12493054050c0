use cpg_common::FiatAmount;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Deposit, NewDeposit, PriceQuote},
    traits::DepositGatewayError,
};

/// Insert a new `Pending` deposit, or return `None` if one already exists for the txid.
///
/// The conflict target makes the insert race-free: of two racing first-sighting deliveries, exactly one gets the
/// row back and the other sees `None` and takes the update path. Callers run this as the first statement of their
/// transaction so that the write lock is taken up front.
pub async fn try_insert(
    deposit: NewDeposit,
    conn: &mut SqliteConnection,
) -> Result<Option<Deposit>, DepositGatewayError> {
    let amount = deposit.amount_sats;
    let row: Option<Deposit> = sqlx::query_as(
        r#"
            INSERT INTO btc_deposits (txid, user_id, address, amount_sats, confirmations, status, invoice_id)
            VALUES ($1, $2, $3, $4, $5, 'Pending', $6)
            ON CONFLICT (txid) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(deposit.txid)
    .bind(deposit.user_id)
    .bind(deposit.address)
    .bind(amount)
    .bind(deposit.confirmations)
    .bind(deposit.invoice_id)
    .fetch_optional(conn)
    .await?;
    if let Some(row) = &row {
        debug!("🗃️ Deposit {} of {amount} saved with id {}", row.txid, row.id);
    }
    Ok(row)
}

pub async fn fetch_by_txid(txid: &str, conn: &mut SqliteConnection) -> Result<Option<Deposit>, DepositGatewayError> {
    let deposit = sqlx::query_as(r#"SELECT * FROM btc_deposits WHERE txid = $1"#)
        .bind(txid)
        .fetch_optional(conn)
        .await?;
    Ok(deposit)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Deposit>, DepositGatewayError> {
    let deposit =
        sqlx::query_as(r#"SELECT * FROM btc_deposits WHERE id = $1"#).bind(id).fetch_optional(conn).await?;
    Ok(deposit)
}

/// Advance an existing deposit with a freshly reported confirmation count.
///
/// The count is clamped to `MAX(stored, incoming)` so that a stale, out-of-order delivery can never wind progress
/// back. The status only moves `Pending → Confirming`; settled and credited deposits keep their status.
pub async fn advance_confirmations(
    txid: &str,
    confirmations: i64,
    conn: &mut SqliteConnection,
) -> Result<Deposit, DepositGatewayError> {
    let deposit: Deposit = sqlx::query_as(
        r#"
            UPDATE btc_deposits SET
              confirmations = MAX(confirmations, $1),
              status = CASE WHEN status = 'Pending' THEN 'Confirming' ELSE status END
            WHERE txid = $2
            RETURNING *;
        "#,
    )
    .bind(confirmations)
    .bind(txid)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DepositGatewayError::DepositNotFound(txid.to_string()))?;
    trace!("🗃️ Deposit {txid} now has {} confirmations ({})", deposit.confirmations, deposit.status);
    Ok(deposit)
}

/// The deposit for the given invoice id, provided it has not been credited yet. Duplicate settlement webhooks find
/// nothing here and become no-ops.
pub async fn fetch_settleable_by_invoice(
    invoice_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Deposit>, DepositGatewayError> {
    let deposit = sqlx::query_as(
        r#"SELECT * FROM btc_deposits WHERE invoice_id = $1 AND status != 'Credited' ORDER BY detected_at LIMIT 1"#,
    )
    .bind(invoice_id)
    .fetch_optional(conn)
    .await?;
    Ok(deposit)
}

/// Store the fiat conversion and the rate snapshot, and move the deposit to `Confirmed`.
///
/// A deposit that a racing delivery already credited is left untouched (its status must never regress) and is
/// returned as-is; the caller's subsequent credit attempt turns into a no-op.
pub async fn mark_confirmed(
    deposit_id: i64,
    quote: &PriceQuote,
    amount_usd: FiatAmount,
    amount_mxn: FiatAmount,
    conn: &mut SqliteConnection,
) -> Result<Deposit, DepositGatewayError> {
    let deposit: Option<Deposit> = sqlx::query_as(
        r#"
            UPDATE btc_deposits SET
              status = 'Confirmed',
              amount_usd = $1,
              amount_mxn = $2,
              rate_usd = $3,
              rate_mxn = $4,
              confirmed_at = CURRENT_TIMESTAMP
            WHERE id = $5 AND status != 'Credited'
            RETURNING *;
        "#,
    )
    .bind(amount_usd)
    .bind(amount_mxn)
    .bind(quote.rate_usd)
    .bind(quote.rate_mxn)
    .bind(deposit_id)
    .fetch_optional(&mut *conn)
    .await?;
    match deposit {
        Some(d) => Ok(d),
        None => fetch_by_id(deposit_id, conn).await?.ok_or(DepositGatewayError::DepositIdNotFound(deposit_id)),
    }
}

pub async fn fetch_for_user(
    user_id: i64,
    limit: i64,
    offset: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Deposit>, DepositGatewayError> {
    let deposits =
        sqlx::query_as(r#"SELECT * FROM btc_deposits WHERE user_id = $1 ORDER BY detected_at DESC LIMIT $2 OFFSET $3"#)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(conn)
            .await?;
    Ok(deposits)
}

pub async fn count_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<i64, DepositGatewayError> {
    let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM btc_deposits WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(conn)
        .await?;
    Ok(count.0)
}
