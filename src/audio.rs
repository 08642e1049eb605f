use std::cmp::Ordering;

use glam::IVec3;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::{
    get_hum_index, HUM_POOL_SIZE, LOW_PASS_MUFFLED_HZ, LOW_PASS_OPEN_HZ, LOW_PASS_RAMP_SECS,
};
use crate::pool::SlotPool;
use crate::settings::AudioConfig;
use crate::world::World;

#[derive(Debug, Error)]
pub enum AudioInitError {
    #[error("audio device unavailable: {0}")]
    Unavailable(String),
    #[error("failed to load {name}: {reason}")]
    Load { name: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Pick,
    Step,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumParams {
    pub position: IVec3,
    /// Pre-decoded hum buffer, 1..=3.
    pub hum: u8,
    pub ref_distance: f32,
    pub volume: f32,
    /// Start offset into the looping buffer, in seconds.
    pub offset: f32,
}

/// Playback device seam. Voices are numbered `0..HUM_POOL_SIZE`.
pub trait AudioBackend {
    fn init(&mut self) -> Result<(), AudioInitError>;

    /// Restarts the cue from the beginning.
    fn play_cue(&mut self, cue: Cue, volume: f32, rate: f32);

    fn hum_duration(&self, hum: u8) -> f32;

    fn start_hum(&mut self, voice: usize, params: &HumParams);

    fn update_hum(&mut self, voice: usize, ref_distance: f32, volume: f32);

    fn stop_hum(&mut self, voice: usize);

    fn ramp_low_pass(&mut self, voice: usize, hz: f32, ramp_secs: f32);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn init(&mut self) -> Result<(), AudioInitError> {
        Ok(())
    }

    fn play_cue(&mut self, _cue: Cue, _volume: f32, _rate: f32) {}

    fn hum_duration(&self, _hum: u8) -> f32 {
        0.0
    }

    fn start_hum(&mut self, _voice: usize, _params: &HumParams) {}

    fn update_hum(&mut self, _voice: usize, _ref_distance: f32, _volume: f32) {}

    fn stop_hum(&mut self, _voice: usize) {}

    fn ramp_low_pass(&mut self, _voice: usize, _hz: f32, _ramp_secs: f32) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HumVoice {
    food_index: usize,
    position: IVec3,
}

/// Event cues plus a fixed pool of positional hums for the foods nearest
/// the head. Until `init` succeeds every call is a no-op.
pub struct SoundManager {
    backend: Box<dyn AudioBackend>,
    config: AudioConfig,
    initialized: bool,
    voices: SlotPool<HumVoice>,
    rng: SmallRng,
}

impl SoundManager {
    pub fn new(backend: Box<dyn AudioBackend>, config: AudioConfig) -> Self {
        Self {
            backend,
            config,
            initialized: false,
            voices: SlotPool::new(HUM_POOL_SIZE),
            rng: SmallRng::from_rng(&mut rand::rng()),
        }
    }

    pub fn silent(config: AudioConfig) -> Self {
        Self::new(Box::new(SilentBackend), config)
    }

    /// Returns false when the backend refused; the session goes on silent.
    pub fn init(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        match self.backend.init() {
            Ok(()) => {
                self.initialized = true;
                info!("audio initialized");
                true
            }
            Err(error) => {
                warn!(%error, "audio disabled");
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_config(&mut self, config: AudioConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn play_pick(&mut self) {
        self.play(Cue::Pick, 1.0);
    }

    pub fn play_step(&mut self, rate: f32) {
        self.play(Cue::Step, rate);
    }

    pub fn play_game_over(&mut self) {
        self.play(Cue::GameOver, 1.0);
    }

    fn play(&mut self, cue: Cue, rate: f32) {
        if !self.initialized {
            return;
        }
        self.backend.play_cue(cue, self.config.volume, rate);
    }

    pub fn set_ambient_low_pass(&mut self, enabled: bool) {
        if !self.initialized {
            return;
        }
        let hz = if enabled {
            LOW_PASS_MUFFLED_HZ
        } else {
            LOW_PASS_OPEN_HZ
        };
        for voice in 0..self.voices.capacity() {
            self.backend.ramp_low_pass(voice, hz, LOW_PASS_RAMP_SECS);
        }
    }

    /// Foods currently assigned a hum voice.
    pub fn active_hums(&self) -> Vec<usize> {
        self.voices.iter().map(|(_, voice)| voice.food_index).collect()
    }

    /// Re-targets the pool at the nearest foods. Voices whose food is still
    /// among them keep playing untouched apart from settings.
    pub fn update(&mut self, head: IVec3, world: &World) {
        if !self.initialized {
            return;
        }

        let mut nearby: Vec<(i32, HumVoice, u8)> = world
            .foods()
            .map(|(food_index, food)| {
                let d = food.position - head;
                let voice = HumVoice {
                    food_index,
                    position: food.position,
                };
                (d.dot(d), voice, get_hum_index(food.category))
            })
            .collect();
        nearby.sort_by(|a, b| match a.0.cmp(&b.0) {
            Ordering::Equal => a.1.food_index.cmp(&b.1.food_index),
            other => other,
        });
        nearby.truncate(self.voices.capacity());

        let stale: Vec<usize> = self
            .voices
            .iter()
            .filter(|(_, voice)| !nearby.iter().any(|(_, wanted, _)| wanted == *voice))
            .map(|(slot, _)| slot)
            .collect();
        for slot in stale {
            self.voices.release(slot);
            self.backend.stop_hum(slot);
        }

        for (_, wanted, hum) in nearby {
            let existing = self
                .voices
                .iter()
                .find(|(_, voice)| **voice == wanted)
                .map(|(slot, _)| slot);
            if let Some(slot) = existing {
                self.backend
                    .update_hum(slot, self.config.food_sound_radius, self.config.volume);
                continue;
            }
            let Some(slot) = self.voices.claim(wanted) else {
                continue;
            };
            let duration = self.backend.hum_duration(hum);
            let offset = if duration > 0.0 {
                self.rng.random_range(0.0..duration)
            } else {
                0.0
            };
            let params = HumParams {
                position: wanted.position,
                hum,
                ref_distance: self.config.food_sound_radius,
                volume: self.config.volume,
                offset,
            };
            self.backend.start_hum(slot, &params);
        }
    }

    pub fn stop_all_hums(&mut self) {
        let active: Vec<usize> = self.voices.iter().map(|(slot, _)| slot).collect();
        for slot in active {
            self.voices.release(slot);
            if self.initialized {
                self.backend.stop_hum(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::IVec3;

    use super::{AudioBackend, AudioInitError, Cue, HumParams, SoundManager};
    use crate::settings::AudioConfig;
    use crate::world::World;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Cue(Cue, f32),
        Start(usize, IVec3),
        Update(usize),
        Stop(usize),
        LowPass(usize, f32),
    }

    struct RecordingBackend {
        events: Rc<RefCell<Vec<Event>>>,
        fail: bool,
    }

    impl AudioBackend for RecordingBackend {
        fn init(&mut self) -> Result<(), AudioInitError> {
            if self.fail {
                return Err(AudioInitError::Unavailable("no device".to_string()));
            }
            Ok(())
        }

        fn play_cue(&mut self, cue: Cue, _volume: f32, rate: f32) {
            self.events.borrow_mut().push(Event::Cue(cue, rate));
        }

        fn hum_duration(&self, _hum: u8) -> f32 {
            2.0
        }

        fn start_hum(&mut self, voice: usize, params: &HumParams) {
            assert!((0.0..2.0).contains(&params.offset));
            self.events.borrow_mut().push(Event::Start(voice, params.position));
        }

        fn update_hum(&mut self, voice: usize, _ref_distance: f32, _volume: f32) {
            self.events.borrow_mut().push(Event::Update(voice));
        }

        fn stop_hum(&mut self, voice: usize) {
            self.events.borrow_mut().push(Event::Stop(voice));
        }

        fn ramp_low_pass(&mut self, voice: usize, hz: f32, _ramp_secs: f32) {
            self.events.borrow_mut().push(Event::LowPass(voice, hz));
        }
    }

    fn manager(fail: bool) -> (SoundManager, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let backend = RecordingBackend {
            events: Rc::clone(&events),
            fail,
        };
        (SoundManager::new(Box::new(backend), AudioConfig::default()), events)
    }

    #[test]
    fn failed_init_degrades_to_silence() {
        let (mut sound, events) = manager(true);
        assert!(!sound.init());
        sound.play_pick();
        sound.play_step(1.2);
        sound.update(IVec3::new(25, 25, 25), &World::new(50, 1));
        sound.set_ambient_low_pass(true);
        assert!(events.borrow().is_empty());
        assert!(sound.active_hums().is_empty());
    }

    #[test]
    fn cues_reach_backend_after_init() {
        let (mut sound, events) = manager(false);
        assert!(sound.init());
        assert!(sound.init());
        sound.play_step(1.5);
        sound.play_game_over();
        assert_eq!(
            *events.borrow(),
            vec![Event::Cue(Cue::Step, 1.5), Event::Cue(Cue::GameOver, 1.0)]
        );
    }

    #[test]
    fn pool_tracks_sixteen_nearest_and_keeps_stable_assignments() {
        let (mut sound, events) = manager(false);
        sound.init();
        let world = World::new(50, 42);
        let head = IVec3::new(25, 25, 25);

        sound.update(head, &world);
        let first = sound.active_hums();
        assert_eq!(first.len(), 16);
        let starts = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Start(..)))
            .count();
        assert_eq!(starts, 16);

        let mut distances: Vec<i32> = world
            .foods()
            .map(|(_, food)| {
                let d = food.position - head;
                d.dot(d)
            })
            .collect();
        distances.sort_unstable();
        let cutoff = distances[15];
        for index in &first {
            let food = world.food(*index).expect("food");
            let d = food.position - head;
            assert!(d.dot(d) <= cutoff);
        }

        events.borrow_mut().clear();
        sound.update(head, &world);
        assert_eq!(sound.active_hums(), first);
        assert!(events.borrow().iter().all(|e| matches!(e, Event::Update(_))));
    }

    #[test]
    fn moving_head_frees_far_voices() {
        let (mut sound, events) = manager(false);
        sound.init();
        let world = World::new(50, 7);
        sound.update(IVec3::new(2, 2, 2), &world);
        events.borrow_mut().clear();
        sound.update(IVec3::new(48, 48, 48), &world);
        let stops = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Stop(_)))
            .count();
        let starts = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Start(..)))
            .count();
        assert_eq!(stops, starts);
        assert!(stops > 0);
        assert_eq!(sound.active_hums().len(), 16);
    }

    #[test]
    fn low_pass_ramps_every_voice() {
        let (mut sound, events) = manager(false);
        sound.init();
        sound.set_ambient_low_pass(true);
        assert_eq!(events.borrow().len(), 16);
        assert!(events
            .borrow()
            .iter()
            .all(|e| matches!(e, Event::LowPass(_, hz) if *hz == 500.0)));
    }
}
