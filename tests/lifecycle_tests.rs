mod common;

use chrono::Duration;
use common::{authorize_request, harness};
use payment_lifecycle::domain::operation::AuthorizeRequest;
use payment_lifecycle::domain::payment::PaymentStatus;
use payment_lifecycle::domain::ports::{Clock, PaymentStore};
use payment_lifecycle::error::PaymentError;

#[tokio::test]
async fn test_authorize_capture_refund_flow() {
    let h = harness();

    let auth = h
        .engine
        .authorize(authorize_request(5000, "usd", "tok_1"))
        .await
        .unwrap();
    assert_eq!(auth.status, PaymentStatus::Authorized);
    let payment = h.engine.payment(&auth.payment_id).await.unwrap();
    assert_eq!(payment.currency.as_str(), "USD");
    assert_eq!(payment.amount_cents.value(), 5000);

    let capture = h.engine.capture(&auth.payment_id, 5000).await.unwrap();
    assert_eq!(capture.status, PaymentStatus::Captured);
    assert_eq!(capture.captured_amount_cents, 5000);

    let refund = h.engine.refund(&auth.payment_id).await.unwrap();
    assert_eq!(refund.status, PaymentStatus::Refunded);
    assert_eq!(refund.refunded_amount_cents, 5000);
    assert_eq!(refund.payment_id, auth.payment_id);

    let refunds = h.engine.refunds(&auth.payment_id).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].id, refund.refund_id);
    assert_eq!(refunds[0].amount_cents, 5000);
}

#[tokio::test]
async fn test_expiry_is_seven_days_after_authorization() {
    let h = harness();

    for amount in [1, 999, 250_000] {
        h.clock.advance(Duration::minutes(13));
        let auth = h
            .engine
            .authorize(authorize_request(amount, "gbp", "tok"))
            .await
            .unwrap();
        let payment = h.engine.payment(&auth.payment_id).await.unwrap();
        assert_eq!(payment.authorized_at, h.clock.now());
        assert_eq!(
            auth.authorization_expires_at,
            payment.authorized_at + Duration::days(7)
        );
    }
}

#[tokio::test]
async fn test_invalid_authorize_requests_write_nothing() {
    let h = harness();
    let invalid = [
        authorize_request(0, "usd", "tok"),
        authorize_request(-100, "usd", "tok"),
        authorize_request(100, "us", "tok"),
        authorize_request(100, "usdx", "tok"),
        authorize_request(100, "usd", ""),
        authorize_request(100, "usd", "   "),
    ];

    for req in invalid {
        let err = h.engine.authorize(req).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)), "{err}");
        assert!(err.is_client_error());
    }

    assert!(h.bus.messages().await.is_empty());
    // Neither a payment id nor an order number was consumed.
    let auth = h
        .engine
        .authorize(authorize_request(100, "usd", "tok"))
        .await
        .unwrap();
    assert_eq!(auth.payment_id, "pay_1");
    assert!(h.payments.get("pay_1").await.unwrap().is_some());
    assert_eq!(h.engine.payment("pay_1").await.unwrap().order_id, "ORD-1");
}

#[tokio::test]
async fn test_blank_order_ids_get_increasing_sequence_numbers() {
    let h = harness();

    let first = h
        .engine
        .authorize(AuthorizeRequest {
            order_id: Some(String::new()),
            ..authorize_request(100, "usd", "tok")
        })
        .await
        .unwrap();
    let second = h
        .engine
        .authorize(AuthorizeRequest {
            order_id: Some("   ".to_string()),
            ..authorize_request(100, "usd", "tok")
        })
        .await
        .unwrap();

    let first = h.engine.payment(&first.payment_id).await.unwrap();
    let second = h.engine.payment(&second.payment_id).await.unwrap();
    let n: u64 = first.order_id.strip_prefix("ORD-").unwrap().parse().unwrap();
    let m: u64 = second.order_id.strip_prefix("ORD-").unwrap().parse().unwrap();
    assert_eq!(m, n + 1);
}

#[tokio::test]
async fn test_supplied_order_id_does_not_consume_sequence() {
    let h = harness();

    h.engine
        .authorize(AuthorizeRequest {
            order_id: Some("external-9".to_string()),
            ..authorize_request(100, "usd", "tok")
        })
        .await
        .unwrap();
    let auth = h
        .engine
        .authorize(authorize_request(100, "usd", "tok"))
        .await
        .unwrap();

    assert_eq!(h.engine.payment(&auth.payment_id).await.unwrap().order_id, "ORD-1");
}

#[tokio::test]
async fn test_capture_succeeds_exactly_once() {
    let h = harness();
    let auth = h
        .engine
        .authorize(authorize_request(5000, "usd", "tok"))
        .await
        .unwrap();

    h.engine.capture(&auth.payment_id, 3000).await.unwrap();
    let err = h.engine.capture(&auth.payment_id, 4000).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotEligible { .. }));
    assert!(err.is_conflict());

    let payment = h.engine.payment(&auth.payment_id).await.unwrap();
    assert_eq!(payment.captured_amount_cents, 3000);
    assert_eq!(payment.status, PaymentStatus::Captured);
}

#[tokio::test]
async fn test_refund_requires_captured_status() {
    let h = harness();
    let auth = h
        .engine
        .authorize(authorize_request(5000, "usd", "tok"))
        .await
        .unwrap();

    let err = h.engine.refund(&auth.payment_id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotEligible { .. }));

    h.engine.capture(&auth.payment_id, 5000).await.unwrap();
    h.engine.refund(&auth.payment_id).await.unwrap();

    let err = h.engine.refund(&auth.payment_id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotEligible { .. }));
    assert_eq!(h.engine.refunds(&auth.payment_id).await.unwrap().len(), 1);

    // Refunded is terminal.
    let err = h.engine.capture(&auth.payment_id, 5000).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotEligible { .. }));
}

#[tokio::test]
async fn test_unknown_payment_is_not_eligible() {
    let h = harness();

    let err = h.engine.capture("pay_missing", 100).await.unwrap_err();
    assert!(
        matches!(err, PaymentError::NotEligible { ref payment_id, .. } if payment_id == "pay_missing")
    );

    let err = h.engine.refund("pay_missing").await.unwrap_err();
    assert!(matches!(err, PaymentError::NotEligible { .. }));
}

#[tokio::test]
async fn test_refund_amount_is_the_captured_amount() {
    let h = harness();
    let auth = h
        .engine
        .authorize(authorize_request(10_000, "usd", "tok"))
        .await
        .unwrap();

    h.engine.capture(&auth.payment_id, 7_500).await.unwrap();
    let refund = h.engine.refund(&auth.payment_id).await.unwrap();
    assert_eq!(refund.refunded_amount_cents, 7_500);
}

#[tokio::test]
async fn test_updated_at_tracks_transitions() {
    let h = harness();
    let auth = h
        .engine
        .authorize(authorize_request(100, "usd", "tok"))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(1));
    h.engine.capture(&auth.payment_id, 100).await.unwrap();

    let payment = h.engine.payment(&auth.payment_id).await.unwrap();
    assert_eq!(payment.created_at, common::start_time());
    assert_eq!(payment.updated_at, common::start_time() + Duration::hours(1));
}
