//! Cart engine and search over HTTP.

#![allow(clippy::unwrap_used)]

use cartsync_core::{Money, ProductId};
use cartsync_integration_tests::{EMAIL, PASSWORD, StubService};
use cartsync_storefront::{Storefront, ValidationError};

async fn logged_in(stub: &StubService, dir: &tempfile::TempDir) -> Storefront {
    let (store, _rx) = stub.storefront(dir.path()).unwrap();
    store.account().login(EMAIL, PASSWORD).await.unwrap();
    store.bootstrap().await.unwrap();
    store
}

#[tokio::test]
async fn test_add_then_total() {
    let stub = StubService::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = logged_in(&stub, &dir).await;

    store.cart().add(&ProductId::new("p1"), 2).await.unwrap();

    assert_eq!(store.cart().compute_total(), Money::from_minor(1000));
    assert_eq!(store.cart().item_count(), 2);
    assert_eq!(stub.cart().get("p1"), Some(&2));
}

#[tokio::test]
async fn test_duplicate_add_rejected_locally() {
    let stub = StubService::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = logged_in(&stub, &dir).await;
    let p1 = ProductId::new("p1");

    store.cart().add(&p1, 1).await.unwrap();
    let err = store.cart().add(&p1, 1).await.unwrap_err();

    assert_eq!(err.validation(), Some(&ValidationError::AlreadyInCart(p1)));
    assert_eq!(stub.counts().cart_posts, 1);
    assert_eq!(store.cart().view().lines().len(), 1);
}

#[tokio::test]
async fn test_message_in_cart_body_keeps_last_cart() {
    let stub = StubService::start().await.unwrap();
    stub.seed_cart(&[("p1", 2)]);
    let dir = tempfile::tempdir().unwrap();
    let store = logged_in(&stub, &dir).await;
    let p1 = ProductId::new("p1");
    assert_eq!(store.cart().quantity_of(&p1), Some(2));

    stub.fail_softly("Service under maintenance");
    let err = store.cart().refresh().await.unwrap_err();

    assert_eq!(err.user_message(), "Service under maintenance");
    assert_eq!(store.cart().quantity_of(&p1), Some(2));
    assert_eq!(store.cart().compute_total(), Money::from_minor(1000));
}

#[tokio::test]
async fn test_set_quantity_zero_removes_line() {
    let stub = StubService::start().await.unwrap();
    stub.seed_cart(&[("p1", 2), ("p2", 1)]);
    let dir = tempfile::tempdir().unwrap();
    let store = logged_in(&stub, &dir).await;

    store
        .cart()
        .set_quantity(&ProductId::new("p1"), 0)
        .await
        .unwrap();

    let view = store.cart().view();
    assert_eq!(view.lines().len(), 1);
    assert_eq!(view.total(), Money::from_minor(300));
    assert!(!stub.cart().contains_key("p1"));
}

#[tokio::test]
async fn test_lines_for_unlisted_products_are_hidden() {
    let stub = StubService::start().await.unwrap();
    stub.seed_cart(&[("discontinued", 3)]);
    let dir = tempfile::tempdir().unwrap();
    let store = logged_in(&stub, &dir).await;

    assert!(store.cart().view().is_empty());
    assert_eq!(store.cart().compute_total(), Money::ZERO);
}

#[tokio::test]
async fn test_search_over_fetched_catalog() {
    let stub = StubService::start().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let (store, _rx) = stub.storefront(dir.path()).unwrap();

    store.search().load().await.unwrap();
    let shoes = store.search().submit("SHOE");
    let all = store.search().submit("   ");

    assert_eq!(shoes.len(), 1);
    assert_eq!(shoes.first().map(|p| p.name.as_str()), Some("Running Shoe"));
    assert_eq!(all.len(), 3);
}
