//! Subscription-gated access with exact expiry.

use seal::core::{AccessPolicyRef, TimeProvider};
use seal::keyserver::DenyReason;
use seal::store::LedgerError;
use seal::{ContentMeta, SealError};
use seal_testkit::{wallets, TestNetwork};

#[tokio::test]
async fn test_access_expires_after_duration() {
    let net = TestNetwork::new(2).await;
    let mut w = wallets(2);
    let reader = net.client(w.pop().unwrap()).unwrap();
    let creator = net.client(w.pop().unwrap()).unwrap();

    let service = creator
        .create_subscription_service("hourly", 1000, 3600)
        .await
        .unwrap();
    let record = creator
        .upload(
            b"subscriber content",
            AccessPolicyRef::Subscription(service.id),
            ContentMeta::titled("issue"),
        )
        .await
        .unwrap();

    let t0 = net.clock.now_unix();
    let grant = reader.purchase_subscription(&service.id, 1000).await.unwrap();
    assert_eq!(grant.expires_at, t0 + 3600);

    net.clock.set(t0 + 3599);
    assert_eq!(reader.access(&record.id).await.unwrap(), b"subscriber content");

    net.clock.set(t0 + 3601);
    match reader.access(&record.id).await {
        Err(SealError::AccessDenied { denials, .. }) => {
            assert!(denials
                .iter()
                .all(|(_, r)| *r == DenyReason::PolicyNotSatisfied));
        }
        other => panic!("expected AccessDenied, got {:?}", other.map(|p| p.len())),
    }
}

#[tokio::test]
async fn test_no_grace_at_expiry_instant() {
    let net = TestNetwork::new(2).await;
    let mut w = wallets(2);
    let reader = net.client(w.pop().unwrap()).unwrap();
    let creator = net.client(w.pop().unwrap()).unwrap();

    let service = creator.create_subscription_service("daily", 5, 86_400).await.unwrap();
    let record = creator
        .upload(b"x", AccessPolicyRef::Subscription(service.id), ContentMeta::default())
        .await
        .unwrap();
    let grant = reader.purchase_subscription(&service.id, 5).await.unwrap();

    net.clock.set(grant.expires_at);
    assert!(matches!(
        reader.access(&record.id).await,
        Err(SealError::AccessDenied { .. })
    ));
}

#[tokio::test]
async fn test_renewal_restores_access() {
    let net = TestNetwork::new(2).await;
    let mut w = wallets(2);
    let reader = net.client(w.pop().unwrap()).unwrap();
    let creator = net.client(w.pop().unwrap()).unwrap();

    let service = creator.create_subscription_service("weekly", 10, 600).await.unwrap();
    let record = creator
        .upload(b"renewable", AccessPolicyRef::Subscription(service.id), ContentMeta::default())
        .await
        .unwrap();

    reader.purchase_subscription(&service.id, 10).await.unwrap();
    net.clock.advance(601);
    assert!(reader.access(&record.id).await.is_err());

    reader.purchase_subscription(&service.id, 10).await.unwrap();
    assert_eq!(reader.access(&record.id).await.unwrap(), b"renewable");
}

#[tokio::test]
async fn test_underpayment_rejected() {
    let net = TestNetwork::new(2).await;
    let mut w = wallets(2);
    let reader = net.client(w.pop().unwrap()).unwrap();
    let creator = net.client(w.pop().unwrap()).unwrap();

    let service = creator.create_subscription_service("pricey", 1000, 3600).await.unwrap();
    let err = reader.purchase_subscription(&service.id, 999).await.unwrap_err();
    assert!(matches!(
        err,
        SealError::Ledger(LedgerError::InsufficientPayment { price: 1000, paid: 999 })
    ));
}

#[tokio::test]
async fn test_without_purchase_denied() {
    let net = TestNetwork::new(2).await;
    let mut w = wallets(2);
    let reader = net.client(w.pop().unwrap()).unwrap();
    let creator = net.client(w.pop().unwrap()).unwrap();

    let service = creator.create_subscription_service("paywall", 1, 60).await.unwrap();
    let record = creator
        .upload(b"paid", AccessPolicyRef::Subscription(service.id), ContentMeta::default())
        .await
        .unwrap();

    assert!(matches!(
        reader.access(&record.id).await,
        Err(SealError::AccessDenied { .. })
    ));
}
