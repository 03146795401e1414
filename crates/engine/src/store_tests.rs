// SPDX-License-Identifier: MIT

use super::*;
use chrono::TimeZone;
use tempfile::TempDir;
use warden_core::{CardRenderer, FakeClock, MemoryMessaging};

const CHANNEL: ChannelId = ChannelId(42);

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn record(name: &str) -> Record {
    Record::new(
        name,
        format!("https://profiles.example/{name}"),
        format!("https://avatars.example/{name}.jpg"),
        "operator",
        day(2026, 3, 14),
    )
}

fn open(
    dir: &TempDir,
    messaging: &MemoryMessaging,
    clock: &FakeClock,
) -> Store<MemoryMessaging, FakeClock> {
    Store::load_or_init(
        StateFile::new(dir.path().join("state.json"), dir.path().join("backups")),
        AuditFile::new(dir.path().join("unblocked.json")),
        messaging.clone(),
        Arc::new(CardRenderer),
        clock.clone(),
    )
    .unwrap()
}

fn fresh() -> (TempDir, MemoryMessaging, Store<MemoryMessaging, FakeClock>) {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let store = open(&dir, &messaging, &FakeClock::new());
    (dir, messaging, store)
}

fn g1() -> GroupId {
    GroupId::new("g1")
}

#[tokio::test]
async fn add_then_get_round_trips_the_fields() {
    let (_dir, _messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();

    let inserted = record("Alice");
    let location = store
        .add_record(&g1(), ProfileId::new("p1"), inserted.clone())
        .await
        .unwrap();
    assert!(location.is_some());

    let got = store.get_record(&g1(), &ProfileId::new("p1")).unwrap();
    assert_eq!(got.name, inserted.name);
    assert_eq!(got.old_names, inserted.old_names);
    assert_eq!(got.url, inserted.url);
    assert_eq!(got.avatar, inserted.avatar);
    assert_eq!(got.initiator, inserted.initiator);
    assert_eq!(got.date, inserted.date);
    assert_eq!(got.representation, location.map(|l| l.id));
}

#[tokio::test]
async fn precondition_violations_are_rejected() {
    let (_dir, _messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    assert!(matches!(
        store.add_group(g1(), CHANNEL),
        Err(StoreError::GroupExists(_))
    ));

    store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap();
    assert!(matches!(
        store.add_record(&g1(), ProfileId::new("p1"), record("Alice")).await,
        Err(StoreError::RecordExists(_))
    ));
    assert!(matches!(
        store.get_record(&g1(), &ProfileId::new("nope")),
        Err(StoreError::RecordNotFound(_))
    ));
    assert!(matches!(
        store
            .update_record(&g1(), &ProfileId::new("nope"), RecordPatch::default())
            .await,
        Err(StoreError::RecordNotFound(_))
    ));
    assert!(matches!(
        store.list_ids(&GroupId::new("nope")),
        Err(StoreError::GroupNotFound(_))
    ));
}

#[tokio::test]
async fn list_ids_keeps_insertion_order() {
    let (_dir, _messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    for name in ["zeta", "alpha", "mid"] {
        store
            .add_record(&g1(), ProfileId::new(name), record(name))
            .await
            .unwrap();
    }
    assert_eq!(
        store.list_ids(&g1()).unwrap(),
        vec![
            ProfileId::new("zeta"),
            ProfileId::new("alpha"),
            ProfileId::new("mid")
        ]
    );
}

#[tokio::test]
async fn visibility_toggle_recreates_every_record_in_last_date_order() {
    let (_dir, messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    for name in ["late", "none", "early"] {
        store
            .add_record(&g1(), ProfileId::new(name), record(name))
            .await
            .unwrap();
    }
    for (name, date) in [("late", day(2026, 3, 10)), ("early", day(2026, 3, 1))] {
        store
            .update_record(
                &g1(),
                &ProfileId::new(name),
                RecordPatch {
                    last_date: Some(date),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let creates_before = messaging.create_count();
    let deletes_before = messaging.delete_count();

    store.set_visibility(&g1(), Visibility::Public).await.unwrap();

    assert_eq!(messaging.create_count(), creates_before + 3);
    assert_eq!(messaging.delete_count(), deletes_before + 3);

    // Creation ids ascend, so live order reflects processing order: unset
    // last_date first, then ascending dates
    let order: Vec<String> = messaging
        .live_in(CHANNEL)
        .iter()
        .map(|id| messaging.content_of(CHANNEL, *id).unwrap().footer)
        .collect();
    assert!(order[0].ends_with("- none"));
    assert!(order[1].ends_with("- early"));
    assert!(order[2].ends_with("- late"));
}

#[tokio::test]
async fn delete_record_audits_the_snapshot_once() {
    let (dir, messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    let location = store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap()
        .unwrap();

    store
        .delete_record(&g1(), &ProfileId::new("p1"), "mod#1")
        .await
        .unwrap();

    assert!(!store.record_exists(&g1(), &ProfileId::new("p1")));
    assert!(store.list_ids(&g1()).unwrap().is_empty());
    assert_eq!(messaging.delete_count(), 1);
    assert!(matches!(
        store.delete_record(&g1(), &ProfileId::new("p1"), "mod#1").await,
        Err(StoreError::RecordNotFound(_))
    ));

    let audit = AuditFile::new(dir.path().join("unblocked.json"));
    let entries = audit.entries_for(&g1()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor(), "mod#1");
    assert_eq!(entries[0].record().name, "Alice");
    assert_eq!(entries[0].record().representation, Some(location.id));
}

#[tokio::test]
async fn counter_is_monotonic_and_survives_restart() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let clock = FakeClock::new();

    let store = open(&dir, &messaging, &clock);
    store.add_group(g1(), CHANNEL).unwrap();
    store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap();
    assert_eq!(store.counter(&g1()).unwrap(), 1);
    store
        .update_record(
            &g1(),
            &ProfileId::new("p1"),
            RecordPatch {
                name: Some("Alicia".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(store.counter(&g1()).unwrap(), 2);
    store.save().await.unwrap();
    drop(store);

    let reloaded = open(&dir, &messaging, &clock);
    assert_eq!(reloaded.counter(&g1()).unwrap(), 2);
    reloaded
        .add_record(&g1(), ProfileId::new("p2"), record("Bob"))
        .await
        .unwrap();
    assert_eq!(reloaded.counter(&g1()).unwrap(), 3);
}

#[tokio::test]
async fn restart_preserves_records_and_bindings() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let clock = FakeClock::new();

    let store = open(&dir, &messaging, &clock);
    store.add_group(g1(), CHANNEL).unwrap();
    let location = store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap()
        .unwrap();
    store.save().await.unwrap();
    drop(store);

    let reloaded = open(&dir, &messaging, &clock);
    let creates_before = messaging.create_count();
    let found = reloaded
        .representation_location(&g1(), &ProfileId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, location.id);
    assert_eq!(messaging.create_count(), creates_before);
}

#[tokio::test]
async fn concurrent_updates_on_the_same_record_serialize() {
    let (_dir, messaging, store) = fresh();
    let store = Arc::new(store);
    store.add_group(g1(), CHANNEL).unwrap();
    store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap();

    let group = g1();
    let p1 = ProfileId::new("p1");
    let a = store.clone();
    let b = store.clone();
    let (first, second) = tokio::join!(
        a.update_record(
            &group,
            &p1,
            RecordPatch {
                name: Some("Alicia".to_string()),
                ..Default::default()
            },
        ),
        b.update_record(
            &group,
            &p1,
            RecordPatch {
                encounters: Some(5),
                ..Default::default()
            },
        ),
    );
    first.unwrap();
    second.unwrap();

    let got = store.get_record(&group, &p1).unwrap();
    assert_eq!(got.name, "Alicia");
    assert_eq!(got.encounters, 5);
    assert_eq!(messaging.create_count(), 3);
}

#[tokio::test]
async fn concurrent_updates_on_different_records_both_succeed() {
    let (_dir, _messaging, store) = fresh();
    let store = Arc::new(store);
    store.add_group(g1(), CHANNEL).unwrap();
    for name in ["p1", "p2"] {
        store
            .add_record(&g1(), ProfileId::new(name), record(name))
            .await
            .unwrap();
    }

    let group = g1();
    let p1 = ProfileId::new("p1");
    let p2 = ProfileId::new("p2");
    let a = store.clone();
    let b = store.clone();
    let (first, second) = tokio::join!(
        a.update_record(
            &group,
            &p1,
            RecordPatch {
                encounters: Some(1),
                ..Default::default()
            },
        ),
        b.update_record(
            &group,
            &p2,
            RecordPatch {
                encounters: Some(2),
                ..Default::default()
            },
        ),
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(store.get_record(&group, &p1).unwrap().encounters, 1);
    assert_eq!(store.get_record(&group, &p2).unwrap().encounters, 2);
}

#[tokio::test]
async fn drift_appends_name_history_and_recreates() {
    let (_dir, messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap();

    let mut updates = HashMap::new();
    updates.insert(
        ProfileId::new("p1"),
        Some(ProfileSummary {
            name: "Alicia".to_string(),
            avatar: "https://avatars.example/Alice.jpg".to_string(),
            url: "https://profiles.example/Alice".to_string(),
        }),
    );
    store.reconcile_drift(&g1(), &updates).await.unwrap();

    let got = store.get_record(&g1(), &ProfileId::new("p1")).unwrap();
    assert_eq!(got.name, "Alicia");
    assert_eq!(got.old_names, vec!["Alice".to_string(), "Alicia".to_string()]);
    assert_eq!(messaging.create_count(), 2);

    // Unchanged data on a live representation is left alone
    store.reconcile_drift(&g1(), &updates).await.unwrap();
    assert_eq!(messaging.create_count(), 2);

    // A null datum is skipped entirely
    updates.insert(ProfileId::new("p1"), None);
    store.reconcile_drift(&g1(), &updates).await.unwrap();
    assert_eq!(messaging.create_count(), 2);
}

#[tokio::test]
async fn drift_forces_resync_when_representation_is_missing() {
    let (_dir, messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    messaging.set_create_denied(true);
    store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap();
    assert!(store.get_record(&g1(), &ProfileId::new("p1")).unwrap().representation.is_none());

    messaging.set_create_denied(false);
    let mut updates = HashMap::new();
    updates.insert(
        ProfileId::new("p1"),
        Some(ProfileSummary {
            name: "Alice".to_string(),
            avatar: "https://avatars.example/Alice.jpg".to_string(),
            url: "https://profiles.example/Alice".to_string(),
        }),
    );
    store.reconcile_drift(&g1(), &updates).await.unwrap();
    assert!(store.get_record(&g1(), &ProfileId::new("p1")).unwrap().representation.is_some());
}

#[tokio::test]
async fn sweep_repairs_and_continues_past_per_record_failures() {
    let (_dir, messaging, store) = fresh();
    store.add_group(g1(), CHANNEL).unwrap();
    let p1_location = store
        .add_record(&g1(), ProfileId::new("p1"), record("Alice"))
        .await
        .unwrap()
        .unwrap();
    let p2_location = store
        .add_record(&g1(), ProfileId::new("p2"), record("Bob"))
        .await
        .unwrap()
        .unwrap();

    messaging.delete_out_of_band(CHANNEL, p2_location.id);
    messaging.fail_next_fetch("shard outage");

    store.sweep_group(&g1()).await.unwrap();

    // p1's fetch hit the outage and was skipped; p2 was still repaired
    assert_eq!(
        store.get_record(&g1(), &ProfileId::new("p1")).unwrap().representation,
        Some(p1_location.id)
    );
    let p2 = store.get_record(&g1(), &ProfileId::new("p2")).unwrap();
    assert!(p2.representation.is_some());
    assert_ne!(p2.representation, Some(p2_location.id));
    assert_eq!(messaging.create_count(), 3);
}

#[tokio::test]
async fn save_stamps_the_time_and_backup_writes_a_copy() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let clock = FakeClock::new();
    clock.set_wall(chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap());
    let store = open(&dir, &messaging, &clock);
    store.add_group(g1(), CHANNEL).unwrap();

    store.save().await.unwrap();
    let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["time"], "2026-03-14-09:30:00");
    assert!(value["guilds"]["g1"].is_object());

    let path = store.backup().await.unwrap();
    assert!(path.starts_with(dir.path().join("backups")));
    assert!(path.exists());
}
