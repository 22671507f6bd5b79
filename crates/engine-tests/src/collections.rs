//! Concurrency scenarios for the observable collections and the per-key
//! manager.

use crate::utils;
use futures::future::join_all;
use live_collections::{manager::CollectionManager, observable::CollectionChange};
use model::fleet::Vehicle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn hundred_adds_in_nested_scopes_notify_once() {
    let manager: CollectionManager<&str, Vehicle> = CollectionManager::new();
    let collection = manager.collection(&"line-1");
    let (_sub, mut rx) = collection.subscribe(256);

    let fleet = utils::fleet(100);
    collection.batch_update(|outer| {
        let (front, back) = fleet.split_at(50);
        for vehicle in front {
            outer.push(vehicle.clone());
        }
        outer.batch_update(|inner| {
            for vehicle in back {
                inner.push(vehicle.clone());
            }
        });
    });

    assert_eq!(collection.len(), 100);
    assert_eq!(rx.try_recv(), Ok(CollectionChange::Reset));
    assert!(rx.try_recv().is_err(), "exactly one notification expected");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_add_unique_of_the_same_vehicle_adds_it_once() {
    let manager: CollectionManager<&str, Vehicle> = CollectionManager::new();
    let vehicle = utils::fleet(1).remove(0);
    let cancel = CancellationToken::new();

    let tasks = (0..50).map(|_| {
        let manager = manager.clone();
        let vehicle = vehicle.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            manager
                .add_unique(&"line-0", vec![vehicle], &cancel)
                .await
                .unwrap()
        })
    });

    let added: usize = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .sum();

    assert_eq!(added, 1, "uniqueness must hold under concurrency");
    assert_eq!(manager.collection(&"line-0").len(), 1);
}

#[tokio::test]
async fn a_busy_key_never_delays_another_key() {
    let manager: CollectionManager<&str, Vehicle> = CollectionManager::new();
    let cancel = CancellationToken::new();

    // park an artificial long-running mutation on key A
    let guard = manager.lock(&"A", &cancel).await.unwrap();

    let other = manager.clone();
    let other_cancel = cancel.clone();
    let b_update = tokio::time::timeout(Duration::from_millis(100), async move {
        other
            .update(&"B", utils::fleet(10), false, &other_cancel)
            .await
    })
    .await;

    assert!(b_update.is_ok(), "key B blocked behind key A");
    assert_eq!(manager.collection(&"B").len(), 10);

    drop(guard);
}

#[tokio::test]
async fn same_key_compound_sequences_are_serialized() {
    let manager: CollectionManager<&str, Vehicle> = CollectionManager::new();
    let cancel = CancellationToken::new();
    manager
        .update(&"A", utils::fleet(10), false, &cancel)
        .await
        .unwrap();

    // remove-then-add under one guard must not interleave with the
    // contending writer below
    let guard = manager.lock(&"A", &cancel).await.unwrap();

    let contender = manager.clone();
    let contender_cancel = cancel.clone();
    let contending = tokio::spawn(async move {
        contender
            .remove_where(&"A", |_| true, &contender_cancel)
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!contending.is_finished(), "contender entered a held section");

    let replacement = utils::fleet(3);
    guard.collection().batch_update(|collection| {
        collection.remove_where(|v| v.kind == model::fleet::VehicleKind::Bus);
        for vehicle in &replacement {
            collection.push(vehicle.clone());
        }
    });
    drop(guard);

    // once the guard drops, the queued remove_where clears everything:
    // the original 10 minus 3 buses, plus the 3 replacements
    let removed = contending.await.unwrap().unwrap();
    assert_eq!(removed, 10);
    assert!(manager.collection(&"A").is_empty());
}

#[tokio::test]
async fn eviction_drops_key_state_atomically() {
    let manager: CollectionManager<&str, Vehicle> = CollectionManager::new();
    let cancel = CancellationToken::new();
    manager
        .update(&"gone", utils::fleet(5), false, &cancel)
        .await
        .unwrap();

    assert!(manager.remove_collection(&"gone"));
    assert!(manager.try_collection(&"gone").is_none());

    // a fresh access starts from scratch and works normally
    manager
        .add_unique(&"gone", utils::fleet(2), &cancel)
        .await
        .unwrap();
    assert_eq!(manager.collection(&"gone").len(), 2);
}
