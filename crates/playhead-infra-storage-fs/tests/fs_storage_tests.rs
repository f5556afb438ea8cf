use playhead_infra_storage_fs::FsStorage;
use playhead_ports::storage::{OutcomeRecord, SessionSummary, SettingsDto, StoragePort};
use playhead_ports::types::{BeatState, DeviceId, Generation, Volume01};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("playhead-fs-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn record(global_index: u64, state: BeatState) -> OutcomeRecord {
    OutcomeRecord {
        generation: Generation(1),
        global_index,
        pass_index: 0,
        measure: 1,
        beat_ordinal: global_index as u32 + 1,
        expected: vec![60],
        played: vec![60],
        state,
        timing_error_ms: Some(-5.0),
    }
}

#[test]
fn missing_settings_load_as_defaults() {
    let storage = FsStorage::new(scratch_dir("defaults"));
    assert_eq!(storage.load_settings().expect("load"), SettingsDto::default());
}

#[test]
fn settings_survive_a_round_trip_on_disk() {
    let dir = scratch_dir("settings");
    let storage = FsStorage::new(dir.clone());
    let settings = SettingsDto {
        selected_midi_in: Some(DeviceId("midir:0:Keys".to_string())),
        metronome_volume: Volume01::new(0.25),
        input_offset_ms: -12,
        ..SettingsDto::default()
    };
    storage.save_settings(&settings).expect("save");

    assert_eq!(FsStorage::new(dir.clone()).load_settings().expect("load"), settings);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn partial_settings_file_fills_in_defaults() {
    let dir = scratch_dir("partial");
    fs::create_dir_all(&dir).expect("dir");
    fs::write(dir.join("settings.json"), br#"{ "input_offset_ms": 7 }"#).expect("write");

    let loaded = FsStorage::new(dir.clone()).load_settings().expect("load");
    assert_eq!(loaded.input_offset_ms, 7);
    assert_eq!(loaded.metronome_volume, Volume01::new(0.6));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn outcomes_and_summaries_append_as_json_lines() {
    let dir = scratch_dir("lines");
    let storage = FsStorage::new(dir.clone());
    storage
        .append_outcomes(&[record(0, BeatState::Hit), record(1, BeatState::Missed)])
        .expect("append");
    storage
        .append_outcomes(&[record(2, BeatState::Partial)])
        .expect("append");
    storage.append_outcomes(&[]).expect("empty append");
    storage
        .save_summary(&SessionSummary {
            generation: Generation(1),
            hit: 1,
            ..SessionSummary::default()
        })
        .expect("summary");

    let text = fs::read_to_string(storage.outcomes_path()).expect("outcomes");
    let records: Vec<OutcomeRecord> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(
        records.iter().map(|r| r.state).collect::<Vec<_>>(),
        vec![BeatState::Hit, BeatState::Missed, BeatState::Partial]
    );

    let summaries = fs::read_to_string(storage.summaries_path()).expect("summaries");
    assert_eq!(summaries.lines().count(), 1);
    let _ = fs::remove_dir_all(dir);
}
