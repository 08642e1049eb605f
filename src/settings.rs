use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const CAMERA_CONFIG_KEY: &str = "snake3d_camera_config";
pub const BLOOM_CONFIG_KEY: &str = "snake3d_bloom_config";
pub const AUDIO_CONFIG_KEY: &str = "snake3d_audio_config";

const STORE_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    #[serde(rename = "distanceUp")]
    pub distance_up: f32,
    #[serde(rename = "distanceBack")]
    pub distance_back: f32,
    #[serde(rename = "lerpSpeed")]
    pub lerp_speed: f32,
    #[serde(rename = "horizonOffset")]
    pub horizon_offset: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 115.0,
            distance_up: 2.1,
            distance_back: 3.1,
            lerp_speed: 4.5,
            horizon_offset: 1.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            strength: 0.15,
            radius: 0.6,
            threshold: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Hum audibility radius in cells.
    #[serde(rename = "foodSoundRadius")]
    pub food_sound_radius: f32,
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            food_sound_radius: 1.5,
            volume: 0.8,
        }
    }
}

/// String-keyed persistence, one JSON document per key.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore {
    values: BTreeMap<String, String>,
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    version: u8,
    values: BTreeMap<String, String>,
}

/// All keys in a single JSON file, rewritten on every `set`.
#[derive(Debug)]
pub struct FileSettingsStore {
    file_path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSettingsStore {
    pub fn open(file_path: PathBuf) -> Self {
        let values = load_values(&file_path);
        Self { file_path, values }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = SettingsFile {
            version: STORE_VERSION,
            values: self.values.clone(),
        };
        fs::write(&self.file_path, serde_json::to_string_pretty(&payload)?)?;
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        self.save()
    }
}

fn load_values(path: &Path) -> BTreeMap<String, String> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to read settings");
            }
            return BTreeMap::new();
        }
    };
    match serde_json::from_str::<SettingsFile>(&text) {
        Ok(file) if file.version == STORE_VERSION => file.values,
        Ok(file) => {
            warn!(path = %path.display(), version = file.version, "unsupported settings version");
            BTreeMap::new()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to parse settings");
            BTreeMap::new()
        }
    }
}

/// Camera, bloom and audio tunables with their persisted overrides.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettingsManager {
    pub camera: CameraConfig,
    pub bloom: BloomConfig,
    pub audio: AudioConfig,
}

impl SettingsManager {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let mut settings = Self::default();
        settings.reload(store);
        settings
    }

    /// Stored fields override the current values; absent fields keep them.
    /// A malformed entry is logged and leaves its group untouched.
    pub fn reload(&mut self, store: &dyn SettingsStore) {
        self.camera = merge_entry(store, CAMERA_CONFIG_KEY, self.camera);
        self.bloom = merge_entry(store, BLOOM_CONFIG_KEY, self.bloom);
        self.audio = merge_entry(store, AUDIO_CONFIG_KEY, self.audio);
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.set(CAMERA_CONFIG_KEY, serde_json::to_string(&self.camera)?)?;
        store.set(BLOOM_CONFIG_KEY, serde_json::to_string(&self.bloom)?)?;
        store.set(AUDIO_CONFIG_KEY, serde_json::to_string(&self.audio)?)?;
        Ok(())
    }
}

fn merge_entry<T>(store: &dyn SettingsStore, key: &str, current: T) -> T
where
    T: Serialize + DeserializeOwned,
{
    let Some(raw) = store.get(key) else {
        return current;
    };
    let overrides = match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => {
            warn!(key, "settings entry is not an object");
            return current;
        }
        Err(error) => {
            warn!(key, %error, "failed to parse settings entry");
            return current;
        }
    };
    let mut base = match serde_json::to_value(&current) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return current,
    };
    base.extend(overrides);
    match serde_json::from_value(serde_json::Value::Object(base)) {
        Ok(merged) => merged,
        Err(error) => {
            warn!(key, %error, "settings entry has invalid fields");
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let settings = SettingsManager::load(&MemorySettingsStore::default());
        assert_eq!(settings, SettingsManager::default());
        assert_eq!(settings.camera.fov, 115.0);
        assert_eq!(settings.audio.volume, 0.8);
    }

    #[test]
    fn partial_entry_merges_over_defaults() {
        let mut store = MemorySettingsStore::default();
        store
            .set(CAMERA_CONFIG_KEY, r#"{"fov": 90, "lerpSpeed": 2}"#.to_string())
            .expect("set");
        let settings = SettingsManager::load(&store);
        assert_eq!(settings.camera.fov, 90.0);
        assert_eq!(settings.camera.lerp_speed, 2.0);
        assert_eq!(settings.camera.distance_up, 2.1);
    }

    #[test]
    fn malformed_entry_is_ignored() {
        let mut store = MemorySettingsStore::default();
        store.set(BLOOM_CONFIG_KEY, "{not json".to_string()).expect("set");
        store
            .set(AUDIO_CONFIG_KEY, r#"{"volume": "loud"}"#.to_string())
            .expect("set");
        let settings = SettingsManager::load(&store);
        assert_eq!(settings.bloom, BloomConfig::default());
        assert_eq!(settings.audio, AudioConfig::default());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let mut store = MemorySettingsStore::default();
        store
            .set(AUDIO_CONFIG_KEY, r#"{"volume": 0.25, "legacy": true}"#.to_string())
            .expect("set");
        let settings = SettingsManager::load(&store);
        assert_eq!(settings.audio.volume, 0.25);
    }

    #[test]
    fn file_store_round_trips_and_survives_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = SettingsManager::default();
        settings.camera.distance_back = 5.0;
        settings.bloom.strength = 0.4;
        let mut store = FileSettingsStore::open(path.clone());
        settings.save(&mut store).expect("save");

        let reopened = FileSettingsStore::open(path.clone());
        assert_eq!(SettingsManager::load(&reopened), settings);

        fs::write(&path, "garbage").expect("write");
        let broken = FileSettingsStore::open(path);
        assert_eq!(SettingsManager::load(&broken), SettingsManager::default());
    }
}
