use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPriceQuote, PriceQuote},
    traits::PriceOracleError,
};

pub async fn fetch_latest(conn: &mut SqliteConnection) -> Result<Option<PriceQuote>, PriceOracleError> {
    let quote = sqlx::query_as(r#"SELECT * FROM price_quotes ORDER BY fetched_at DESC, id DESC LIMIT 1"#)
        .fetch_optional(conn)
        .await?;
    Ok(quote)
}

pub async fn insert(quote: &NewPriceQuote, conn: &mut SqliteConnection) -> Result<PriceQuote, PriceOracleError> {
    let row: PriceQuote =
        sqlx::query_as(r#"INSERT INTO price_quotes (rate_usd, rate_mxn, source) VALUES ($1, $2, $3) RETURNING *"#)
            .bind(quote.rate_usd)
            .bind(quote.rate_mxn)
            .bind(&quote.source)
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Cached price quote #{}: {row}", row.id);
    Ok(row)
}
