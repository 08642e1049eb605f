use std::f32::consts::FRAC_PI_2;

use glam::{IVec3, Quat, Vec3};
use serde::Serialize;
use tracing::info;

use crate::audio::SoundManager;
use crate::camera::{CameraController, CameraPose, DEFAULT_SHAKE_DECAY, MANUAL_SENSITIVITY};
use crate::constants::{
    get_food_color, get_food_score, get_food_speed_delta, DEFAULT_SPM, FOOD_COUNT,
    GAME_OVER_PARTICLES, GAME_OVER_SHAKE, PICKUP_PARTICLES, WORLD_SIZE,
};
use crate::entity::{GridEntity, Phantom, Snake};
use crate::input::InputManager;
use crate::particles::ParticleSystem;
use crate::pathfinder::{GuidePath, Pathfinder};
use crate::replay::ReplayRecorder;
use crate::settings::SettingsManager;
use crate::types::{
    Action, FoodCategory, FoodCounts, GameOverReason, GameStats, PlayerIdentity, ReplayData,
    SessionState,
};
use crate::world::{SlotRespawnPolicy, World};

mod autopilot;
mod pickup_system;
mod utils;

use self::utils::now_ms;

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub world_size: i32,
    pub food_count: usize,
    pub initial_spm: f32,
    pub player: PlayerIdentity,
    pub slot_respawn: SlotRespawnPolicy,
    /// Restrict guidance to the snake's local plane.
    pub planar_guidance: bool,
    pub settings: SettingsManager,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            world_size: WORLD_SIZE,
            food_count: FOOD_COUNT,
            initial_spm: DEFAULT_SPM,
            player: PlayerIdentity::default(),
            slot_respawn: SlotRespawnPolicy::default(),
            planar_guidance: true,
            settings: SettingsManager::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Stepped { head: IVec3 },
    FoodEaten { index: usize, category: FoodCategory },
    PhantomAte { phantom: usize, category: FoodCategory },
    PhantomDied { phantom: usize },
    Paused,
    Resumed,
    GameOver { reason: GameOverReason },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickOutcome {
    pub stepped: bool,
    pub events: Vec<GameEvent>,
    #[serde(rename = "gameOver")]
    pub game_over: Option<GameOverReason>,
}

#[derive(Clone, Debug, Default)]
struct StatsTracker {
    time: f32,
    distance: u32,
    speed_sum: f64,
    max_speed: f32,
    food_count: FoodCounts,
}

/// One play session: the player snake, its recorder, the phantoms it races
/// and every presentation subsystem, ticked in a fixed order.
pub struct GameEngine {
    options: GameEngineOptions,
    state: SessionState,
    seed: u32,
    spawn_index: usize,
    world: World,
    snake: Snake,
    phantoms: Vec<Phantom>,
    recorder: ReplayRecorder,
    pathfinder: Pathfinder,
    guides: Vec<GuidePath>,
    camera: CameraController,
    input: InputManager,
    sound: SoundManager,
    particles: ParticleSystem,
    score: u32,
    stats: StatsTracker,
    game_over: Option<GameOverReason>,
    replay: Option<ReplayData>,
}

impl GameEngine {
    pub fn new(options: GameEngineOptions, seed: u32, spawn_index: usize) -> Self {
        let sound = SoundManager::silent(options.settings.audio);
        Self::with_sound(options, seed, spawn_index, sound)
    }

    pub fn with_sound(
        options: GameEngineOptions,
        seed: u32,
        spawn_index: usize,
        sound: SoundManager,
    ) -> Self {
        let mut world = World::with_food_count(options.world_size, seed, options.food_count);
        world.set_slot_policy(options.slot_respawn);
        let snake = Snake::from_spawn(spawn_index, options.world_size);
        let camera = CameraController::new(options.settings.camera);

        let mut engine = Self {
            state: SessionState::Playing,
            seed,
            spawn_index,
            world,
            snake,
            phantoms: Vec::new(),
            recorder: ReplayRecorder::new(seed, spawn_index, options.initial_spm),
            pathfinder: Pathfinder::default(),
            guides: Vec::new(),
            camera,
            input: InputManager::new(),
            sound,
            particles: ParticleSystem::default(),
            score: 0,
            stats: StatsTracker::default(),
            game_over: None,
            replay: None,
            options,
        };
        engine.begin_session();
        engine
    }

    fn begin_session(&mut self) {
        self.snake.set_speed(self.options.initial_spm);
        let occupied = self.occupied_cells();
        self.world.respawn_food(occupied, None);
        self.recorder
            .reset(self.seed, self.spawn_index, self.options.initial_spm);
        self.recorder.start(self.snake.forward(), self.snake.head());
        self.camera.reset();
        self.camera
            .snap_to(self.snake.head().as_vec3(), self.snake.body().orientation());
        self.particles.clear();
        self.score = 0;
        self.stats = StatsTracker::default();
        self.game_over = None;
        self.replay = None;
        self.state = SessionState::Playing;
        self.refresh_guides();
        info!(seed = self.seed, spawn = self.spawn_index, "session started");
    }

    /// New session on `seed` from `spawn_index`. Phantoms are kept and sent
    /// back to their own starts.
    pub fn restart(&mut self, seed: u32, spawn_index: usize) {
        self.seed = seed;
        self.spawn_index = spawn_index;
        self.world.set_seed(seed);
        self.snake = Snake::from_spawn(spawn_index, self.options.world_size);
        for phantom in &mut self.phantoms {
            phantom.reset();
        }
        self.sound.set_ambient_low_pass(false);
        self.begin_session();
    }

    pub fn add_phantom(&mut self, replay: ReplayData) -> usize {
        let index = self.phantoms.len();
        self.phantoms
            .push(Phantom::new(replay, index, self.options.world_size));
        index
    }

    pub fn init_audio(&mut self) -> bool {
        self.sound.init()
    }

    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    /// Queues an action for the next tick, as if its key had been pressed.
    pub fn handle_action(&mut self, action: Action) {
        self.input.trigger(action);
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        self.state = SessionState::Paused;
        self.camera.set_orbit_mode();
        self.sound.set_ambient_low_pass(true);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != SessionState::Paused {
            return false;
        }
        self.state = SessionState::Playing;
        self.camera.stop_orbit_mode();
        self.sound.set_ambient_low_pass(false);
        true
    }

    /// Advances one frame. `delta` is expected to be clamped already.
    pub fn tick(&mut self, delta: f32) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.apply_input(&mut outcome);

        if self.state == SessionState::Playing {
            self.stats.time += delta;
            self.update_snake(delta, &mut outcome);
            if self.state == SessionState::Playing {
                self.update_phantoms(delta, &mut outcome);
            }
        }

        self.update_presentation(delta, outcome.stepped);
        outcome
    }

    fn apply_input(&mut self, outcome: &mut TickOutcome) {
        let delta = self.input.take_mouse_delta();
        let manual = self.input.is_left_mouse_down();
        self.camera.set_manual_control_active(manual);
        if manual {
            self.camera
                .apply_manual_movement(delta.x, delta.y, MANUAL_SENSITIVITY);
        }

        for action in self.input.drain_actions() {
            match (self.state, action) {
                (SessionState::Playing, Action::Pause) => {
                    if self.pause() {
                        outcome.events.push(GameEvent::Paused);
                    }
                }
                (SessionState::Paused, Action::Pause) => {
                    if self.resume() {
                        outcome.events.push(GameEvent::Resumed);
                    }
                }
                (SessionState::Playing, Action::Left) => {
                    self.snake.rotate(FRAC_PI_2);
                }
                (SessionState::Playing, Action::Right) => {
                    self.snake.rotate(-FRAC_PI_2);
                }
                (SessionState::Playing, Action::RollLeft) => self.snake.roll(-FRAC_PI_2),
                (SessionState::Playing, Action::RollRight) => self.snake.roll(FRAC_PI_2),
                (SessionState::Playing, Action::Boost) => self.snake.body_mut().hurry(),
                _ => {}
            }
        }
    }

    fn update_snake(&mut self, delta: f32, outcome: &mut TickOutcome) {
        let before = self.snake.head();
        if !self.snake.update(delta) {
            return;
        }
        let head = self.snake.head();
        let spm = self.snake.body().steps_per_minute();
        self.recorder
            .record_direction_change(before, self.snake.body().last_step());
        self.stats.distance += 1;
        self.stats.speed_sum += f64::from(spm);
        self.stats.max_speed = self.stats.max_speed.max(spm);
        self.sound.play_step(spm / DEFAULT_SPM);
        outcome.stepped = true;
        outcome.events.push(GameEvent::Stepped { head });

        if self.world.is_out_of_bounds(head) {
            self.end_session(GameOverReason::Wall, outcome);
            return;
        }
        if self.world.check_self_collision(self.snake.segments()) {
            self.end_session(GameOverReason::SelfCollision, outcome);
            return;
        }
        self.try_player_pickup(outcome);
    }

    fn update_phantoms(&mut self, delta: f32, outcome: &mut TickOutcome) {
        for index in 0..self.phantoms.len() {
            let was_dead = self.phantoms[index].is_dead();
            let stepped = self.phantoms[index].update(delta);
            if stepped && self.world.is_out_of_bounds(self.phantoms[index].head()) {
                self.phantoms[index].kill();
            }
            if !was_dead && self.phantoms[index].is_dead() {
                outcome.events.push(GameEvent::PhantomDied { phantom: index });
                continue;
            }
            if stepped {
                self.try_phantom_pickup(index, outcome);
            }
        }
    }

    fn update_presentation(&mut self, delta: f32, stepped: bool) {
        let head = self.snake.head().as_vec3();
        let orientation = self.snake.body().orientation();
        let progress = if self.state == SessionState::Playing {
            self.snake.step_progress()
        } else {
            0.0
        };
        self.camera.update(delta, head, orientation, progress);
        if stepped && self.state == SessionState::Playing {
            self.refresh_guides();
        }
        self.sound.update(self.snake.head(), &self.world);
        self.particles.update(delta);
    }

    fn refresh_guides(&mut self) {
        let segments = self.snake.segments();
        self.guides = self.pathfinder.find_guides(
            &self.world,
            self.snake.head(),
            segments.iter().skip(1),
            self.snake.body().orientation(),
            self.options.planar_guidance,
        );
    }

    fn end_session(&mut self, reason: GameOverReason, outcome: &mut TickOutcome) {
        let head = self.snake.head();
        let timestamp = now_ms();
        self.recorder.stop();
        self.replay = Some(self.recorder.replay_data(
            format!("replay-{}-{timestamp}", self.seed),
            &self.options.player,
            self.score,
            head,
            timestamp,
        ));
        self.state = SessionState::GameOver;
        self.game_over = Some(reason);
        self.guides.clear();

        self.camera.set_orbit_mode();
        self.camera.trigger_shake(GAME_OVER_SHAKE, DEFAULT_SHAKE_DECAY);
        self.sound.play_game_over();
        self.sound.set_ambient_low_pass(true);
        let burst = self.snake.body().orientation();
        self.particles.emit(
            head.as_vec3(),
            burst,
            GAME_OVER_PARTICLES,
            get_food_color(FoodCategory::Pink),
        );
        self.particles.stop_time();

        outcome.game_over = Some(reason);
        outcome.events.push(GameEvent::GameOver { reason });
        info!(
            ?reason,
            score = self.score,
            steps = self.stats.distance,
            changes = self.recorder.change_count(),
            "game over"
        );
    }

    fn occupied_cells(&self) -> Vec<IVec3> {
        let mut cells: Vec<IVec3> = self.snake.segments().iter().copied().collect();
        for phantom in &self.phantoms {
            if !phantom.is_dead() {
                cells.extend(phantom.segments().iter().copied());
            }
        }
        cells
    }

    fn emit_pickup(&mut self, at: IVec3, orientation: Quat, category: FoodCategory) {
        self.particles.emit(
            at.as_vec3(),
            orientation,
            PICKUP_PARTICLES,
            get_food_color(category),
        );
    }

    fn apply_food(&mut self, category: FoodCategory) {
        let spm = self.snake.body().steps_per_minute() + get_food_speed_delta(category);
        self.snake.set_speed(spm);
        self.snake.grow();
        self.score += get_food_score(category);
        self.stats.food_count.add(category);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn spawn_index(&self) -> usize {
        self.spawn_index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.game_over
    }

    /// Finalized replay, available once the session is over.
    pub fn replay(&self) -> Option<&ReplayData> {
        self.replay.as_ref()
    }

    pub fn recorder(&self) -> &ReplayRecorder {
        &self.recorder
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn phantoms(&self) -> &[Phantom] {
        &self.phantoms
    }

    pub fn guides(&self) -> &[GuidePath] {
        &self.guides
    }

    pub fn camera_pose(&self) -> CameraPose {
        self.camera.pose()
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn stats(&self) -> GameStats {
        let avg_speed = if self.stats.distance > 0 {
            (self.stats.speed_sum / f64::from(self.stats.distance)) as f32
        } else {
            self.snake.body().steps_per_minute()
        };
        GameStats {
            score: self.score,
            length: self.snake.segments().len(),
            time: self.stats.time,
            distance: self.stats.distance,
            avg_speed,
            max_speed: self.stats.max_speed,
            food_count: self.stats.food_count,
        }
    }

    /// Heading of the live snake, for renderers that draw the head.
    pub fn heading(&self) -> Vec3 {
        self.snake.body().orientation() * Vec3::NEG_Z
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec3;

    use crate::engine::{GameEngine, GameEngineOptions, GameEvent};
    use crate::entity::GridEntity;
    use crate::types::{Action, GameOverReason, SessionState};

    const TICK: f32 = 1.0 / 60.0;

    fn quiet_options() -> GameEngineOptions {
        GameEngineOptions {
            food_count: 0,
            ..GameEngineOptions::default()
        }
    }

    fn run_until_over(engine: &mut GameEngine, max_ticks: usize) {
        for _ in 0..max_ticks {
            if engine.tick(TICK).game_over.is_some() {
                return;
            }
        }
    }

    #[test]
    fn straight_run_hits_the_wall() {
        let mut engine = GameEngine::new(quiet_options(), 42, 0);
        run_until_over(&mut engine, 100_000);

        assert_eq!(engine.state(), SessionState::GameOver);
        assert_eq!(engine.game_over_reason(), Some(GameOverReason::Wall));
        assert_eq!(engine.snake().head(), IVec3::new(5, 5, 51));
        let replay = engine.replay().expect("replay");
        assert!(replay.trajectory_log.is_empty());
        assert_eq!(replay.death_position.to_cell(), IVec3::new(5, 5, 51));
        assert_eq!(engine.stats().distance, 46);
        assert!(engine.camera_pose().fov > 0.0);
    }

    #[test]
    fn turns_are_recorded_at_the_pre_step_head() {
        let mut engine = GameEngine::new(quiet_options(), 42, 0);
        let mut steps = 0;
        while steps < 2 {
            if engine.tick(TICK).stepped {
                steps += 1;
            }
        }
        assert_eq!(engine.snake().head(), IVec3::new(5, 5, 7));
        engine.handle_action(Action::Right);
        while !engine.tick(TICK).stepped {}
        assert_eq!(engine.snake().head(), IVec3::new(4, 5, 7));

        let log = engine.recorder().log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].position.to_cell(), IVec3::new(5, 5, 7));
        assert_eq!(log[0].direction.to_cell(), IVec3::NEG_X);
    }

    #[test]
    fn pause_freezes_stepping_until_resumed() {
        let mut engine = GameEngine::new(quiet_options(), 1, 0);
        engine.handle_action(Action::Pause);
        let outcome = engine.tick(TICK);
        assert_eq!(outcome.events, vec![GameEvent::Paused]);
        let head = engine.snake().head();
        for _ in 0..120 {
            assert!(!engine.tick(TICK).stepped);
        }
        assert_eq!(engine.snake().head(), head);
        assert_eq!(engine.stats().time, 0.0);

        engine.handle_action(Action::Pause);
        assert_eq!(engine.tick(TICK).events, vec![GameEvent::Resumed]);
        assert_eq!(engine.state(), SessionState::Playing);
    }

    #[test]
    fn boost_steps_on_next_tick() {
        let mut engine = GameEngine::new(quiet_options(), 1, 0);
        engine.handle_action(Action::Boost);
        assert!(engine.tick(0.001).stepped);
    }

    #[test]
    fn restart_resets_session_and_keeps_phantoms() {
        let mut engine = GameEngine::new(quiet_options(), 42, 0);
        run_until_over(&mut engine, 100_000);
        let replay = engine.replay().cloned().expect("replay");
        engine.add_phantom(replay);

        engine.restart(42, 3);
        assert_eq!(engine.state(), SessionState::Playing);
        assert!(engine.replay().is_none());
        assert_eq!(engine.snake().head(), IVec3::new(45, 5, 45));
        assert_eq!(engine.phantoms().len(), 1);
        assert_eq!(engine.phantoms()[0].head(), IVec3::new(5, 5, 5));
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn guides_start_at_head() {
        let options = GameEngineOptions {
            planar_guidance: false,
            ..GameEngineOptions::default()
        };
        let engine = GameEngine::new(options, 42, 0);
        for guide in engine.guides() {
            assert_eq!(guide.waypoints.first(), Some(&engine.snake().head()));
        }
    }
}
