use sqlx::SqliteConnection;

use crate::{db_types::WebhookEventRecord, traits::DepositGatewayError};

/// Record an inbound webhook before anything acts on it, returning the new row id.
pub async fn insert(
    event_type: &str,
    invoice_id: Option<&str>,
    store_id: Option<&str>,
    payload: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, DepositGatewayError> {
    let row: (i64,) = sqlx::query_as(
        r#"
            INSERT INTO webhook_events (event_type, invoice_id, store_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id;
        "#,
    )
    .bind(event_type)
    .bind(invoice_id)
    .bind(store_id)
    .bind(payload)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}

/// Flip the processed flag, storing the handler error, if any. Set exactly once per event.
pub async fn mark_processed(
    event_id: i64,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), DepositGatewayError> {
    let result =
        sqlx::query(r#"UPDATE webhook_events SET processed = 1, error = $1, processed_at = CURRENT_TIMESTAMP WHERE id = $2"#)
            .bind(error)
            .bind(event_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(DepositGatewayError::WebhookEventNotFound(event_id));
    }
    Ok(())
}

pub async fn fetch_by_id(
    event_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WebhookEventRecord>, DepositGatewayError> {
    let event = sqlx::query_as(r#"SELECT * FROM webhook_events WHERE id = $1"#)
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}
