// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use gleaner_core::{CollectedItem, CommitSink, ConfigSource, SinkError};
use gleaner_data::{PublicBin, Settings, SharedSettings, SWEEPER_OWNER};
use std::fs;

fn sweeper_item(kind: &str, quantity: u32) -> CollectedItem {
    CollectedItem {
        item_type: kind.to_string(),
        quantity,
        source: SWEEPER_OWNER.to_string(),
    }
}

#[test]
fn public_bin_survives_reopen() {
    // --- 1. ARRANGE ---
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bin.json");

    // --- 2. ACT ---
    {
        let bin = PublicBin::open(&path).expect("missing file should open as empty");
        assert_eq!(bin.size(), 0);
        bin.add_all(vec![sweeper_item("STONE", 64), sweeper_item("DIRT", 3)])
            .unwrap();
        bin.add(sweeper_item("SAND", 1)).unwrap();
        bin.remove_at(1).unwrap();
    }

    // --- 3. ASSERT ---
    let reopened = PublicBin::open(&path).unwrap();
    let types: Vec<_> = reopened
        .entries()
        .into_iter()
        .map(|e| e.item.item_type)
        .collect();
    assert_eq!(types, vec!["STONE", "SAND"]);
    assert!(reopened.entries().iter().all(|e| e.discarded_at > 0));
}

#[test]
fn public_bin_reload_picks_up_external_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin.json");
    let writer = PublicBin::open(&path).unwrap();
    let reader = PublicBin::open(&path).unwrap();

    writer.add(sweeper_item("GRAVEL", 2)).unwrap();
    assert_eq!(reader.size(), 0);
    assert_eq!(reader.reload().unwrap(), 1);
    assert_eq!(reader.size(), 1);
}

#[test]
fn corrupt_bin_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(PublicBin::open(&path), Err(SinkError::Encoding(_))));
}

#[test]
fn failed_write_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin.json");
    let bin = PublicBin::open(&path).unwrap();
    // A directory now sits where the data file goes, so every save fails.
    fs::create_dir(&path).unwrap();

    assert!(bin.add_all(vec![sweeper_item("STONE", 1)]).is_err());
    assert_eq!(bin.size(), 0);
}

#[test]
fn settings_file_is_created_then_reloaded() {
    // --- 1. ARRANGE ---
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gleaner.ron");
    let shared = SharedSettings::from_file(&path).unwrap();
    assert!(path.exists());
    assert_eq!(shared.sweep().interval_secs, 300);

    // --- 2. ACT ---
    let mut edited = Settings::default();
    edited.sweeper.interval = 2;
    edited.sweeper.blacklist = vec!["netherite_ingot".to_string()];
    edited.public_bin.auto_refresh = 0;
    edited.save(&path).unwrap();
    shared.reload().unwrap();

    // --- 3. ASSERT ---
    let sweep = shared.sweep();
    assert_eq!(sweep.interval_secs, 300, "too-small interval falls back");
    assert!(sweep.is_excluded("NETHERITE_INGOT"));
    assert!(!shared.refresh().enabled());
}

#[test]
fn broken_settings_reload_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gleaner.ron");
    let shared = SharedSettings::from_file(&path).unwrap();

    fs::write(&path, "(sweeper: (interval: ").unwrap();
    assert!(shared.reload().is_err());
    assert_eq!(shared.sweep().interval_secs, 300);
}
