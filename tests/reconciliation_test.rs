mod common;

use common::{book, verification, world};
use staybook::application::reconciliation::{ReconcileOutcome, Verification};
use staybook::domain::authorization::Actor;
use staybook::domain::booking::BookingStatus;
use staybook::domain::gateway::GatewayError;
use staybook::domain::payment::{PaymentStatus, PaymentUpdate};
use staybook::error::BookingError;

#[tokio::test]
async fn test_verified_success_confirms_booking() {
    let w = world().await;
    let receipt = book(&w).await;
    let tx_ref = receipt.payment.id.to_string();
    w.gateway
        .push_verification(Ok(verification("success", "4000", "ETB", "APfxl0Cz8Q")));

    let outcome = w.engine.payments().reconcile(&tx_ref).await.unwrap();
    let (payment, booking) = match outcome {
        ReconcileOutcome::Settled { payment, booking } => (payment, booking),
        other => panic!("expected settlement, got {other:?}"),
    };
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.completed_at.is_some());
    assert_eq!(payment.transaction_id.as_deref(), Some("APfxl0Cz8Q"));
    assert_eq!(payment.payment_method.as_deref(), Some("telebirr"));
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(w.gateway.verified(), vec![tx_ref.clone()]);

    let stored = w
        .engine
        .bookings()
        .get_booking(&w.guest, receipt.booking.id)
        .await
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);

    // A repeated callback does not reach the gateway again.
    let repeat = w.engine.payments().reconcile(&tx_ref).await.unwrap();
    assert!(matches!(repeat, ReconcileOutcome::AlreadySettled { .. }));
    assert_eq!(w.gateway.verified().len(), 1);
}

#[tokio::test]
async fn test_second_completion_conflicts_without_side_effects() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();

    let first = payments
        .update_payment_status(
            &Actor::System,
            receipt.payment.id,
            PaymentUpdate::to(PaymentStatus::Completed).transaction_id("chapa-txn-123"),
        )
        .await
        .unwrap();
    assert!(first.applied);
    let transition = first.booking.expect("booking settled");
    assert_eq!(transition.from, BookingStatus::Pending);
    assert_eq!(transition.to, BookingStatus::Confirmed);
    let stamped = first.payment.completed_at;
    assert!(stamped.is_some());

    let second = payments
        .update_payment_status(&Actor::System, receipt.payment.id, PaymentUpdate::to(PaymentStatus::Completed))
        .await;
    assert!(matches!(second, Err(BookingError::Conflict(_))));

    let stored = payments.get_payment(&w.guest, receipt.payment.id).await.unwrap();
    assert_eq!(stored.completed_at, stamped);
    assert_eq!(stored.transaction_id.as_deref(), Some("chapa-txn-123"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settlement_has_one_winner() {
    let w = world().await;
    let receipt = book(&w).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let payments = w.engine.payments().clone();
        let id = receipt.payment.id;
        handles.push(tokio::spawn(async move {
            payments
                .update_payment_status(&Actor::System, id, PaymentUpdate::to(PaymentStatus::Completed))
                .await
        }));
    }

    let mut settled = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(change) => {
                assert!(change.booking.is_some());
                settled += 1;
            }
            Err(BookingError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(settled, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_repeated_failure_is_a_noop() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();

    let failed = payments
        .update_payment_status(
            &Actor::System,
            receipt.payment.id,
            PaymentUpdate::to(PaymentStatus::Failed).error_message("Card declined"),
        )
        .await
        .unwrap();
    assert!(failed.applied);
    assert_eq!(failed.payment.error_message.as_deref(), Some("Card declined"));

    let again = payments
        .update_payment_status(&Actor::System, receipt.payment.id, PaymentUpdate::to(PaymentStatus::Failed))
        .await
        .unwrap();
    assert!(!again.applied);
    assert_eq!(again.payment, failed.payment);

    let booking = w
        .engine
        .bookings()
        .get_booking(&w.guest, receipt.booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_one_completed_payment_per_booking() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();

    let retry = payments
        .create_payment(&w.guest, receipt.booking.id, None)
        .await
        .unwrap();
    assert_eq!(retry.status, PaymentStatus::Pending);
    assert_eq!(retry.amount, receipt.payment.amount);

    payments
        .update_payment_status(&Actor::System, receipt.payment.id, PaymentUpdate::to(PaymentStatus::Completed))
        .await
        .unwrap();

    let double = payments
        .update_payment_status(&Actor::System, retry.id, PaymentUpdate::to(PaymentStatus::Completed))
        .await;
    assert!(matches!(double, Err(BookingError::Conflict(_))));
    let retry_now = payments.get_payment(&w.guest, retry.id).await.unwrap();
    assert_eq!(retry_now.status, PaymentStatus::Pending);

    let another = payments.create_payment(&w.guest, receipt.booking.id, None).await;
    assert!(matches!(another, Err(BookingError::Conflict(_))));
}

#[tokio::test]
async fn test_gateway_identifiers_are_unique() {
    let w = world().await;
    let first = book(&w).await;
    let second = book(&w).await;
    let payments = w.engine.payments();

    payments
        .update_payment_status(
            &Actor::System,
            first.payment.id,
            PaymentUpdate::to(PaymentStatus::Pending).transaction_id("chapa-txn-1"),
        )
        .await
        .unwrap();

    let clash = payments
        .update_payment_status(
            &Actor::System,
            second.payment.id,
            PaymentUpdate::to(PaymentStatus::Completed).transaction_id("chapa-txn-1"),
        )
        .await;
    assert!(matches!(clash, Err(BookingError::Conflict(_))));

    let untouched = payments.get_payment(&w.guest, second.payment.id).await.unwrap();
    assert_eq!(untouched.status, PaymentStatus::Pending);
    assert!(untouched.transaction_id.is_none());
    let booking = w
        .engine
        .bookings()
        .get_booking(&w.guest, second.booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_underpaid_success_is_recorded_as_failure() {
    let w = world().await;
    let receipt = book(&w).await;
    w.gateway
        .push_verification(Ok(verification("success", "400", "ETB", "APshort")));

    let outcome = w
        .engine
        .payments()
        .reconcile(&receipt.payment.id.to_string())
        .await
        .unwrap();
    match outcome {
        ReconcileOutcome::Failed { payment } => {
            assert_eq!(payment.status, PaymentStatus::Failed);
            assert!(payment.completed_at.is_none());
            assert!(payment.error_message.unwrap().contains("4000.00 ETB"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unavailable_and_pending_verdicts_change_nothing() {
    let w = world().await;
    let receipt = book(&w).await;
    let tx_ref = receipt.payment.id.to_string();
    let payments = w.engine.payments();

    w.gateway.push_verification(Err(GatewayError::new(
        "payment verification timed out after 10s",
    )));
    let outcome = payments.reconcile(&tx_ref).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Unavailable { reason } if reason.contains("timed out")));

    w.gateway
        .push_verification(Ok(verification("pending", "4000", "ETB", "APwait")));
    let outcome = payments.reconcile(&tx_ref).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::StillPending { .. }));

    let stored = payments.get_payment(&w.guest, receipt.payment.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(stored.transaction_id.is_none());
}

#[tokio::test]
async fn test_verify_maps_remote_status() {
    let w = world().await;
    w.gateway
        .push_verification(Ok(verification("failed", "4000", "ETB", "APbad")));

    match w.engine.payments().verify_payment("tx-anything").await {
        Verification::Verified { status, details } => {
            assert_eq!(status, PaymentStatus::Failed);
            assert_eq!(details.reference.as_deref(), Some("APbad"));
        }
        other => panic!("expected a verdict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_completion_on_cancelled_booking_rolls_back() {
    let w = world().await;
    let receipt = book(&w).await;
    w.engine
        .lifecycle()
        .cancel(&w.guest, receipt.booking.id)
        .await
        .unwrap();

    let result = w
        .engine
        .payments()
        .update_payment_status(&Actor::System, receipt.payment.id, PaymentUpdate::to(PaymentStatus::Completed))
        .await;
    assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));

    let payment = w
        .engine
        .payments()
        .get_payment(&w.guest, receipt.payment.id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.completed_at.is_none());
}

#[tokio::test]
async fn test_payment_access_control() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();
    let id = receipt.payment.id;

    assert!(payments.get_payment(&w.host, id).await.is_ok());
    assert!(matches!(
        payments.get_payment(&w.stranger, id).await,
        Err(BookingError::Permission(_))
    ));
    assert_eq!(payments.list_payments(&w.host).await.unwrap().len(), 1);
    assert!(payments.list_payments(&w.stranger).await.unwrap().is_empty());

    assert!(matches!(
        payments.cancel_payment(&w.host, id).await,
        Err(BookingError::Permission(_))
    ));
    let cancelled = payments.cancel_payment(&w.guest, id).await.unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);

    let outcome = payments.reconcile(&id.to_string()).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Cancelled { .. }));
    assert!(w.gateway.verified().is_empty());
}

#[tokio::test]
async fn test_users_cannot_write_payment_status() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();
    let id = receipt.payment.id;

    for actor in [&w.guest, &w.host, &w.stranger] {
        let result = payments
            .update_payment_status(actor, id, PaymentUpdate::to(PaymentStatus::Completed))
            .await;
        assert!(matches!(result, Err(BookingError::Permission(_))), "{actor:?}");
    }

    let payment = payments.get_payment(&w.guest, id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let booking = w
        .engine
        .bookings()
        .get_booking(&w.guest, receipt.booking.id)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_completed_payment_cannot_be_deleted() {
    let w = world().await;
    let receipt = book(&w).await;
    let payments = w.engine.payments();

    payments
        .update_payment_status(&Actor::System, receipt.payment.id, PaymentUpdate::to(PaymentStatus::Completed))
        .await
        .unwrap();
    let result = payments.delete_payment(&w.guest, receipt.payment.id).await;
    assert!(matches!(result, Err(BookingError::Conflict(_))));

    let retry = book(&w).await;
    payments.delete_payment(&w.host, retry.payment.id).await.unwrap();
    assert!(matches!(
        payments.get_payment(&w.host, retry.payment.id).await,
        Err(BookingError::NotFound { .. })
    ));
}
