// SPDX-License-Identifier: MIT

//! End-to-end lifecycle: track a profile, absorb a rename, toggle visibility

use crate::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;
use warden_core::{
    FakeClock, GroupId, MemoryMessaging, ProfileId, ProfileSummary, Visibility,
};

#[tokio::test]
async fn track_rename_and_visibility_toggle() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let store = open_store(&dir, &messaging, &FakeClock::new());
    let group = GroupId::new("G1");
    let profile = ProfileId::new("P1");

    // Fresh group, first record: one representation, counter at 1
    store.add_group(group.clone(), CHANNEL).unwrap();
    let first = store
        .add_record(&group, profile.clone(), record("Alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.counter(&group).unwrap(), 1);
    assert_eq!(
        store.get_record(&group, &profile).unwrap().representation,
        Some(first.id)
    );
    assert_eq!(messaging.live_in(CHANNEL).len(), 1);

    // External rename: history grows, representation is replaced, counter at 2
    let mut updates = HashMap::new();
    updates.insert(
        profile.clone(),
        Some(ProfileSummary {
            name: "Alicia".to_string(),
            avatar: "https://avatars.example/Alice.jpg".to_string(),
            url: "https://profiles.example/Alice".to_string(),
        }),
    );
    store.reconcile_drift(&group, &updates).await.unwrap();

    let renamed = store.get_record(&group, &profile).unwrap();
    assert_eq!(renamed.name, "Alicia");
    assert_eq!(
        renamed.old_names,
        vec!["Alice".to_string(), "Alicia".to_string()]
    );
    assert_ne!(renamed.representation, Some(first.id));
    assert_eq!(store.counter(&group).unwrap(), 2);
    assert_eq!(messaging.live_in(CHANNEL).len(), 1);

    // Visibility toggle: one more delete+recreate, counter at 3
    store
        .set_visibility(&group, Visibility::Public)
        .await
        .unwrap();
    assert_eq!(store.counter(&group).unwrap(), 3);

    let live = messaging.live_in(CHANNEL);
    assert_eq!(live.len(), 1);
    let content = messaging.content_of(CHANNEL, live[0]).unwrap();
    assert!(content.footer.ends_with("- P1"));
    assert!(content.footer.starts_with('3'));
    // Public cards carry no initiator field
    assert!(!content.fields.iter().any(|f| f.name == "Initiator"));
}

#[tokio::test]
async fn deleting_a_tracked_record_leaves_an_audit_trail() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let store = open_store(&dir, &messaging, &FakeClock::new());
    let group = GroupId::new("G1");
    let profile = ProfileId::new("P1");

    store.add_group(group.clone(), CHANNEL).unwrap();
    store
        .add_record(&group, profile.clone(), record("Alice"))
        .await
        .unwrap();
    store
        .delete_record(&group, &profile, "mod#1")
        .await
        .unwrap();

    assert!(messaging.live_in(CHANNEL).is_empty());
    assert!(!store.record_exists(&group, &profile));

    let raw = std::fs::read_to_string(dir.path().join("unblocked.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["G1"][0][0], "mod#1");
    assert_eq!(value["G1"][0][1], "P1");
    assert_eq!(value["G1"][0][2]["name"], "Alice");
}
