use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::replay::validate;
use crate::spawn::SPAWN_COUNT;
use crate::types::{ReplayData, RoomData};

const STORE_VERSION: u8 = 1;
pub const DEFAULT_KEEP_PER_SEED: usize = 10;
const MAX_NAME_LEN: usize = 16;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ReplayStoreFile {
    version: u8,
    seeds: BTreeMap<String, Vec<ReplayData>>,
}

#[derive(Clone, Debug, Deserialize)]
struct ReplayStoreFileRaw {
    version: u8,
    seeds: BTreeMap<String, Vec<serde_json::Value>>,
}

/// Best replays per seed, persisted as one JSON file.
pub struct ReplayStore {
    file_path: PathBuf,
    keep_per_seed: usize,
    seeds: BTreeMap<u32, Vec<ReplayData>>,
}

impl ReplayStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self::with_capacity(file_path, DEFAULT_KEEP_PER_SEED)
    }

    pub fn with_capacity(file_path: PathBuf, keep_per_seed: usize) -> Self {
        let mut seeds = load_seeds(&file_path);
        for replays in seeds.values_mut() {
            rank(replays, keep_per_seed);
        }
        Self {
            file_path,
            keep_per_seed: keep_per_seed.max(1),
            seeds,
        }
    }

    /// Inserts and persists. Returns false when the replay did not make the
    /// cut for its seed.
    pub fn record(&mut self, replay: ReplayData) -> bool {
        let Some(replay) = sanitize_replay(replay) else {
            return false;
        };
        let seed = replay.start_params.seed;
        let id = replay.id.clone();
        let replays = self.seeds.entry(seed).or_default();
        replays.retain(|existing| existing.id != id);
        replays.push(replay);
        rank(replays, self.keep_per_seed);
        let kept = replays.iter().any(|existing| existing.id == id);
        self.save();
        kept
    }

    pub fn replays_for_seed(&self, seed: u32) -> &[ReplayData] {
        self.seeds.get(&seed).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn seeds(&self) -> impl Iterator<Item = u32> + '_ {
        self.seeds.keys().copied()
    }

    /// Phantom line-up for a new session on `seed`. The player gets the
    /// least crowded spawn; ties go to the lowest index.
    pub fn room_for_seed(&self, seed: u32, max_phantoms: usize) -> RoomData {
        let phantoms: Vec<ReplayData> = self
            .replays_for_seed(seed)
            .iter()
            .take(max_phantoms)
            .cloned()
            .collect();
        let mut crowd = [0usize; SPAWN_COUNT];
        for replay in &phantoms {
            crowd[replay.start_params.spawn_index % SPAWN_COUNT] += 1;
        }
        let player_spawn_index = (0..SPAWN_COUNT)
            .min_by_key(|&index| (crowd[index], index))
            .unwrap_or(0);
        RoomData {
            seed,
            phantoms,
            player_spawn_index,
        }
    }

    fn save(&self) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), %error, "failed to create replay store dir");
                return;
            }
        }
        let payload = ReplayStoreFile {
            version: STORE_VERSION,
            seeds: self
                .seeds
                .iter()
                .map(|(seed, replays)| (seed.to_string(), replays.clone()))
                .collect(),
        };
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    warn!(path = %self.file_path.display(), %error, "failed to write replay store");
                }
            }
            Err(error) => {
                warn!(path = %self.file_path.display(), %error, "failed to serialize replay store");
            }
        }
    }
}

/// Highest score first, then the earlier run.
fn rank(replays: &mut Vec<ReplayData>, keep: usize) {
    replays.sort_by(|a, b| {
        b.final_score
            .cmp(&a.final_score)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.id.cmp(&b.id))
    });
    replays.truncate(keep.max(1));
}

fn load_seeds(path: &Path) -> BTreeMap<u32, Vec<ReplayData>> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to read replay store");
            }
            return BTreeMap::new();
        }
    };
    let parsed = match serde_json::from_str::<ReplayStoreFileRaw>(&text) {
        Ok(value) if value.version == STORE_VERSION => value,
        Ok(value) => {
            warn!(path = %path.display(), version = value.version, "unsupported replay store version");
            return BTreeMap::new();
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to parse replay store");
            return BTreeMap::new();
        }
    };

    let mut seeds = BTreeMap::<u32, Vec<ReplayData>>::new();
    for (seed_key, raw_replays) in parsed.seeds {
        for raw in raw_replays {
            let replay: ReplayData = match serde_json::from_value(raw) {
                Ok(replay) => replay,
                Err(error) => {
                    warn!(seed = %seed_key, %error, "skipping unreadable replay");
                    continue;
                }
            };
            let Some(replay) = sanitize_replay(replay) else {
                continue;
            };
            let replays = seeds.entry(replay.start_params.seed).or_default();
            if replays.iter().all(|existing| existing.id != replay.id) {
                replays.push(replay);
            }
        }
    }
    seeds
}

fn sanitize_replay(mut replay: ReplayData) -> Option<ReplayData> {
    if replay.id.trim().is_empty() {
        return None;
    }
    if let Err(error) = validate(&replay) {
        warn!(id = %replay.id, %error, "dropping invalid replay");
        return None;
    }
    replay.player_name = sanitize_name(&replay.player_name);
    Some(replay)
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Unknown".to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}
