use playhead_ports::storage::{OutcomeRecord, SessionSummary, SettingsDto, StorageError, StoragePort};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Settings as pretty JSON; outcomes and summaries as JSON lines, one record per line.
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("Playhead"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    pub fn outcomes_path(&self) -> PathBuf {
        self.base_dir.join("outcomes.jsonl")
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.base_dir.join("summaries.jsonl")
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        ensure_parent(path)?;
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
    }

    fn append_lines<T: serde::Serialize>(path: &Path, values: &[T]) -> Result<(), StorageError> {
        ensure_parent(path)?;
        let mut buf = Vec::new();
        for value in values {
            serde_json::to_writer(&mut buf, value)
                .map_err(|e| StorageError::Serde(e.to_string()))?;
            buf.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(&buf)
            .map_err(|e| StorageError::Io(e.to_string()))
    }
}

fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
    }
    Ok(())
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_dir }
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(SettingsDto::default());
        }
        Self::read_json(&path)
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        Self::write_json(&self.settings_path(), s)
    }

    fn append_outcomes(&self, records: &[OutcomeRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        Self::append_lines(&self.outcomes_path(), records)
    }

    fn save_summary(&self, summary: &SessionSummary) -> Result<(), StorageError> {
        Self::append_lines(&self.summaries_path(), std::slice::from_ref(summary))
    }
}
