use actix_web::http::StatusCode;
use serde_json::json;

use super::helpers::*;

#[actix_web::test]
async fn health_check() {
    let db = new_test_db().await;
    let config = test_config();
    let (status, body) = get_raw(&db, &config, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn price_endpoint_serves_the_feed_quote() {
    let db = new_test_db().await;
    let config = test_config();
    let (status, price) = get_json(&db, &config, "/api/price").await;
    assert_eq!(status, StatusCode::OK);
    // Rates are cents per whole BTC.
    assert_eq!(price["rate_usd"], json!(6_000_000));
    assert_eq!(price["rate_mxn"], json!(108_000_000));
    assert_eq!(price["source"], json!("canned"));
}

#[actix_web::test]
async fn balance_for_a_new_user_is_zeroed() {
    let db = new_test_db().await;
    let config = test_config();
    let (status, balance) = get_json(&db, &config, "/api/balance/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["user_id"], json!(42));
    assert_eq!(balance["balance_usd"], json!(0));
    assert_eq!(balance["balance_mxn"], json!(0));
}

#[actix_web::test]
async fn histories_reflect_a_credited_deposit() {
    let db = new_test_db().await;
    let config = test_config();

    let body = settlement_event_body("inv-10", "tx-10", 9, "0.002", 3);
    let (status, _) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);

    let (status, deposits) = get_json(&db, &config, "/api/deposits/9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deposits["total"], json!(1));
    assert_eq!(deposits["deposits"][0]["txid"], json!("tx-10"));
    assert_eq!(deposits["deposits"][0]["status"], json!("Credited"));

    let (status, txns) = get_json(&db, &config, "/api/transactions/9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(txns[0]["amount_usd"], json!(12_000));
    assert_eq!(txns[0]["txn_type"], json!("Deposit"));
    assert_eq!(txns[0]["deposit_id"], json!(1));
}

#[actix_web::test]
async fn history_pagination_limits_the_page() {
    let db = new_test_db().await;
    let config = test_config();

    for i in 0..3 {
        let body = payment_event_body(&format!("inv-p{i}"), &format!("tx-p{i}"), 5, "0.001", 1);
        post_signed_webhook(&db, &config, &body).await;
    }
    let (status, deposits) = get_json(&db, &config, "/api/deposits/5?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deposits["total"], json!(3));
    assert_eq!(deposits["deposits"].as_array().unwrap().len(), 2);
}
