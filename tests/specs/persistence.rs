// SPDX-License-Identifier: MIT

//! Restart behavior: the durable file round-trips records and counters

use crate::prelude::*;
use chrono::TimeZone;
use tempfile::TempDir;
use warden_core::{FakeClock, GroupId, MemoryMessaging, ProfileId, RecordPatch};

#[tokio::test]
async fn a_restart_resumes_from_the_saved_file() {
    let dir = TempDir::new().unwrap();
    let messaging = MemoryMessaging::new();
    messaging.add_channel(CHANNEL);
    let clock = FakeClock::new();
    clock.set_wall(chrono::Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap());
    let group = GroupId::new("G1");

    {
        let store = open_store(&dir, &messaging, &clock);
        store.add_group(group.clone(), CHANNEL).unwrap();
        store
            .add_record(&group, ProfileId::new("P1"), record("Alice"))
            .await
            .unwrap();
        store
            .add_record(&group, ProfileId::new("P2"), record("Bob"))
            .await
            .unwrap();
        store
            .update_record(
                &group,
                &ProfileId::new("P2"),
                RecordPatch {
                    encounters: Some(4),
                    last_date: Some(day(2026, 3, 20)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.save().await.unwrap();
    }

    // Wire shape of the saved file
    let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["time"], "2026-03-14-09:30:00");
    let g = &value["guilds"]["G1"];
    assert_eq!(g["channel"], 42);
    assert_eq!(g["private"], true);
    assert_eq!(g["counter"], 3);
    assert_eq!(g["data"]["P2"]["encounters"], 4);
    assert_eq!(g["data"]["P2"]["last_date"], "20/03/2026");
    assert!(g["data"]["P1"]["message"].as_u64().unwrap() > 0);

    // Reload: everything is still there and the counter keeps climbing
    let store = open_store(&dir, &messaging, &clock);
    assert_eq!(store.counter(&group).unwrap(), 3);
    assert_eq!(
        store.list_ids(&group).unwrap(),
        vec![ProfileId::new("P1"), ProfileId::new("P2")]
    );
    assert_eq!(
        store.get_record(&group, &ProfileId::new("P2")).unwrap().encounters,
        4
    );

    store
        .add_record(&group, ProfileId::new("P3"), record("Cleo"))
        .await
        .unwrap();
    assert_eq!(store.counter(&group).unwrap(), 4);
}
