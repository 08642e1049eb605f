use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use glam::IVec3;
use serde::Serialize;
use snake3d_sim::engine::{GameEngine, GameEngineOptions, GameEvent};
use snake3d_sim::entity::{GridEntity, Phantom};
use snake3d_sim::frame_loop::clamp_delta;
use snake3d_sim::replay::{from_json, to_json, to_json_pretty};
use snake3d_sim::replay_store::ReplayStore;
use snake3d_sim::spawn::{random_spawn_index, SPAWN_COUNT};
use snake3d_sim::types::{GameOverReason, PlayerIdentity, ReplayData};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    spawn: Option<usize>,
    /// Number of sessions; session `i` runs on `seed + i`.
    #[arg(long, default_value_t = 1)]
    runs: u32,
    /// Autopilot step budget. Past it the snake coasts into a wall.
    #[arg(long, default_value_t = 600)]
    steps: usize,
    #[arg(long, default_value_t = 1.0 / 30.0)]
    delta: f32,
    /// Global guidance instead of the local plane.
    #[arg(long)]
    global_guidance: bool,
    #[arg(long, default_value = "Sim")]
    player_name: String,
    /// Directory that receives one JSON file per finished replay.
    #[arg(long)]
    replay_out: Option<PathBuf>,
    /// Verify an existing replay file instead of running sessions.
    #[arg(long)]
    replay_in: Option<PathBuf>,
    /// Replay store to record into and load phantoms from.
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long, default_value_t = 0)]
    phantoms: usize,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    #[serde(rename = "spawnIndex")]
    spawn_index: usize,
    reason: Option<GameOverReason>,
    steps: usize,
    score: u32,
    length: usize,
    #[serde(rename = "foodEaten")]
    food_eaten: u32,
    #[serde(rename = "phantomCount")]
    phantom_count: usize,
    #[serde(rename = "phantomFood")]
    phantom_food: u32,
    #[serde(rename = "phantomDeaths")]
    phantom_deaths: u32,
    changes: usize,
    #[serde(rename = "replayId")]
    replay_id: Option<String>,
    #[serde(rename = "divergedAt")]
    diverged_at: Option<usize>,
    /// The phantom parted ways on a cell the live snake visited more than
    /// once, which position-keyed playback cannot tell apart.
    #[serde(rename = "divergenceAmbiguous")]
    ambiguous: bool,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct VerifyResultLine {
    mode: &'static str,
    id: String,
    seed: u32,
    #[serde(rename = "spawnIndex")]
    spawn_index: usize,
    steps: usize,
    changes: usize,
    #[serde(rename = "reachedDeath")]
    reached_death: bool,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "startedAtMs")]
    started_at_ms: i64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: i64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageSteps")]
    average_steps: usize,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

struct Scenario {
    name: String,
    seed: u32,
    spawn_index: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(path) = cli.replay_in.as_ref() {
        let line = verify_replay_file(path, cli.steps)?;
        let failed = !line.anomalies.is_empty();
        println!("{}", serde_json::to_string(&line)?);
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let started_at_ms = Utc::now().timestamp_millis();
    let mut store = cli.store.clone().map(ReplayStore::new);
    let mut results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();

    for scenario in resolve_scenarios(&cli) {
        info!(scenario = %scenario.name, seed = scenario.seed, "scenario started");
        let room = match store.as_ref() {
            Some(store) if cli.phantoms > 0 => Some(store.room_for_seed(scenario.seed, cli.phantoms)),
            _ => None,
        };
        let spawn_index = scenario.spawn_index.unwrap_or_else(|| {
            room.as_ref()
                .filter(|room| !room.phantoms.is_empty())
                .map_or_else(random_spawn_index, |room| room.player_spawn_index)
        });
        let phantoms = room.map(|room| room.phantoms).unwrap_or_default();

        let (result, replay) = run_scenario(&cli, &scenario, spawn_index, phantoms);
        for anomaly in &result.anomalies {
            warn!(scenario = %scenario.name, seed = scenario.seed, %anomaly, "anomaly detected");
        }
        if let Some(replay) = replay {
            if let Some(dir) = cli.replay_out.as_ref() {
                write_replay(dir, &replay)?;
            }
            if let Some(store) = store.as_mut() {
                let kept = store.record(replay);
                info!(scenario = %scenario.name, kept, "replay offered to store");
            }
        }

        *reason_counts.entry(reason_key(result.reason)).or_insert(0) += 1;
        info!(
            scenario = %scenario.name,
            steps = result.steps,
            score = result.score,
            anomalies = result.anomalies.len(),
            "scenario finished"
        );
        println!("{}", serde_json::to_string(&result)?);
        results.push(result);
    }

    let anomaly_count: usize = results.iter().map(|result| result.anomalies.len()).sum();
    let summary = RunSummary {
        started_at_ms,
        finished_at_ms: Utc::now().timestamp_millis(),
        scenario_count: results.len(),
        anomaly_count,
        average_steps: if results.is_empty() {
            0
        } else {
            results.iter().map(|result| result.steps).sum::<usize>() / results.len()
        },
        reason_counts,
        scenarios: results,
    };
    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary)?;
    }
    info!(
        scenarios = summary.scenario_count,
        anomalies = anomaly_count,
        "run finished"
    );

    if anomaly_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = cli
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u32);
    (0..cli.runs.max(1))
        .map(|offset| {
            let seed = seed.wrapping_add(offset);
            Scenario {
                name: format!("autopilot-{seed}"),
                seed,
                spawn_index: cli
                    .spawn
                    .map(|spawn| (spawn + offset as usize) % SPAWN_COUNT),
            }
        })
        .collect()
}

fn run_scenario(
    cli: &Cli,
    scenario: &Scenario,
    spawn_index: usize,
    phantoms: Vec<ReplayData>,
) -> (ScenarioResultLine, Option<ReplayData>) {
    let options = GameEngineOptions {
        planar_guidance: !cli.global_guidance,
        player: PlayerIdentity {
            id: format!("sim-{}", scenario.seed),
            name: cli.player_name.clone(),
        },
        ..GameEngineOptions::default()
    };
    let world_size = options.world_size;
    let mut engine = GameEngine::new(options, scenario.seed, spawn_index);
    let phantom_count = phantoms.len();
    for replay in phantoms {
        engine.add_phantom(replay);
    }

    let mut anomalies = Vec::new();
    let mut seen = HashSet::new();
    let mut live = Vec::new();
    let mut food_eaten = 0;
    let mut phantom_food = 0;
    let mut phantom_deaths = 0;
    let mut previous_step: Option<IVec3> = None;
    let tick_limit = (cli.steps + 4 * world_size as usize) * 120;
    let delta = clamp_delta(cli.delta);
    let mut reason = None;

    for _ in 0..tick_limit {
        if live.len() < cli.steps {
            if let Some(action) = engine.autopilot_action() {
                engine.handle_action(action);
            }
        }
        let outcome = engine.tick(delta);
        for event in &outcome.events {
            match event {
                GameEvent::FoodEaten { .. } => food_eaten += 1,
                GameEvent::PhantomAte { .. } => phantom_food += 1,
                GameEvent::PhantomDied { .. } => phantom_deaths += 1,
                _ => {}
            }
        }
        if outcome.stepped {
            live.push(engine.snake().head());
            let step = engine.snake().body().last_step();
            if previous_step == Some(-step) {
                push_anomaly(&mut anomalies, &mut seen, "snake reversed into itself".to_string());
            }
            previous_step = Some(step);
            for message in collect_anomalies(&engine) {
                push_anomaly(&mut anomalies, &mut seen, message);
            }
        }
        if outcome.game_over.is_some() {
            reason = outcome.game_over;
            break;
        }
    }
    if reason.is_none() {
        push_anomaly(&mut anomalies, &mut seen, "tick safety limit exceeded".to_string());
    }

    let replay = engine.replay().cloned();
    let mut diverged_at = None;
    let mut ambiguous = false;
    if let Some(replay) = replay.as_ref() {
        match check_round_trip(replay, world_size, &live) {
            Ok(None) => {}
            Ok(Some(index)) => {
                diverged_at = Some(index);
                ambiguous = is_revisited_cell(&live, index);
                if !ambiguous {
                    push_anomaly(
                        &mut anomalies,
                        &mut seen,
                        format!("replay diverged from live run at step {index}"),
                    );
                }
            }
            Err(error) => {
                push_anomaly(&mut anomalies, &mut seen, format!("replay round trip failed: {error:#}"));
            }
        }
    }

    let stats = engine.stats();
    let line = ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        spawn_index,
        reason,
        steps: live.len(),
        score: stats.score,
        length: stats.length,
        food_eaten,
        phantom_count,
        phantom_food,
        phantom_deaths,
        changes: engine.recorder().change_count(),
        replay_id: replay.as_ref().map(|replay| replay.id.clone()),
        diverged_at,
        ambiguous,
        anomalies,
    };
    (line, replay)
}

/// Serializes, reloads and replays `replay` as a lone phantom. Returns the
/// first step where its head departs from `live`.
fn check_round_trip(replay: &ReplayData, world_size: i32, live: &[IVec3]) -> Result<Option<usize>> {
    let text = to_json(replay).context("serialize replay")?;
    let decoded = from_json(&text).context("reload replay")?;
    let mut phantom = Phantom::new(decoded, 0, world_size);
    let trace = phantom.trace(live.len() + 1);
    let first_mismatch = trace
        .iter()
        .zip(live)
        .position(|(ghost, head)| ghost != head);
    Ok(match first_mismatch {
        Some(index) => Some(index),
        None if trace.len() != live.len() => Some(trace.len().min(live.len())),
        None => None,
    })
}

/// Whether the cell the phantom stood on before step `index` was visited
/// more than once by the live snake.
fn is_revisited_cell(live: &[IVec3], index: usize) -> bool {
    let Some(cell) = index.checked_sub(1).and_then(|prior| live.get(prior)) else {
        return false;
    };
    live.iter().filter(|head| *head == cell).count() > 1
}

fn collect_anomalies(engine: &GameEngine) -> Vec<String> {
    let mut anomalies = Vec::new();
    let segments = engine.snake().segments();
    let aligned = segments
        .iter()
        .zip(segments.iter().skip(1))
        .all(|(a, b)| is_unit_step(*a - *b));
    if !aligned {
        anomalies.push("snake segments left the grid".to_string());
    }

    let mut cells = HashSet::new();
    for (_, food) in engine.world().foods() {
        if !cells.insert(food.position) {
            anomalies.push("two foods share a cell".to_string());
            break;
        }
    }
    if segments.iter().skip(1).any(|cell| cells.contains(cell)) {
        anomalies.push("food placed on the snake".to_string());
    }

    for guide in engine.guides() {
        if guide
            .waypoints
            .iter()
            .any(|cell| engine.world().is_out_of_bounds(*cell))
        {
            anomalies.push("guide path left the world".to_string());
            break;
        }
    }
    anomalies
}

fn verify_replay_file(path: &Path, max_steps: usize) -> Result<VerifyResultLine> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let replay = from_json(&text).with_context(|| format!("parse {}", path.display()))?;
    let death = replay.death_position.to_cell();
    let mut phantom = Phantom::new(replay.clone(), 0, snake3d_sim::constants::WORLD_SIZE);
    let start = phantom.head();
    let trace = phantom.trace(max_steps.max(1) * 10);

    let mut anomalies = Vec::new();
    let mut previous = start;
    for head in &trace {
        if !is_unit_step(*head - previous) {
            anomalies.push(format!("phantom jumped from {previous} to {head}"));
            break;
        }
        previous = *head;
    }
    let reached_death = phantom.is_dead() && trace.last().copied().unwrap_or(start) == death;
    if !reached_death {
        anomalies.push(format!("phantom never reached death position {death}"));
    }
    info!(id = %replay.id, steps = trace.len(), reached_death, "replay verified");

    Ok(VerifyResultLine {
        mode: "verify",
        id: replay.id.clone(),
        seed: replay.start_params.seed,
        spawn_index: replay.start_params.spawn_index,
        steps: trace.len(),
        changes: replay.trajectory_log.len(),
        reached_death,
        anomalies,
    })
}

fn is_unit_step(delta: IVec3) -> bool {
    delta.abs().element_sum() == 1
}

fn push_anomaly(anomalies: &mut Vec<String>, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn reason_key(reason: Option<GameOverReason>) -> String {
    match reason {
        Some(GameOverReason::Wall) => "wall".to_string(),
        Some(GameOverReason::SelfCollision) => "self_collision".to_string(),
        None => "unfinished".to_string(),
    }
}

fn write_replay(dir: &Path, replay: &ReplayData) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", replay.id));
    fs::write(&path, to_json_pretty(replay)?).with_context(|| format!("write {}", path.display()))
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let text = serde_json::to_string_pretty(summary)?;
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}
