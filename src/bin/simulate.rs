use clap::Parser;
use orb_arena_server::constants::TICK_MS;
use orb_arena_server::engine::{ArenaEngine, ArenaEngineOptions};
use orb_arena_server::remote_sync::MoveGate;
use orb_arena_server::types::{RuntimeEvent, Snapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    bots: Option<i32>,
    #[arg(long)]
    minutes: Option<i32>,
    #[arg(long)]
    pellets: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    bots: usize,
    minutes: i32,
    #[serde(rename = "pelletPool")]
    pellet_pool: usize,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    bots: usize,
    minutes: i32,
    #[serde(rename = "pelletPool")]
    pellet_pool: usize,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    ticks: u64,
    #[serde(rename = "pelletsEaten")]
    pellets_eaten: i32,
    #[serde(rename = "pelletsRespawned")]
    pellets_respawned: i32,
    #[serde(rename = "actorsEaten")]
    actors_eaten: i32,
    #[serde(rename = "actorsRespawned")]
    actors_respawned: i32,
    splits: i32,
    merges: i32,
    #[serde(rename = "topMass")]
    top_mass: f32,
    #[serde(rename = "moveMessages")]
    move_messages: u64,
    #[serde(rename = "moveSuppressed")]
    move_suppressed: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "bots": scenario.bots,
                "minutes": scenario.minutes,
                "pelletPool": scenario.pellet_pool,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;

        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "durationMs": scenario_run.result.duration_ms,
                "topMass": scenario_run.result.top_mass,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        run_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut engine = ArenaEngine::new(
        scenario.bots,
        scenario.seed,
        ArenaEngineOptions {
            time_limit_ms: Some((scenario.minutes as u64) * 60_000),
            bot_count: Some(scenario.bots),
            pellet_pool: Some(scenario.pellet_pool),
        },
    );

    let mut pellets_eaten = 0;
    let mut pellets_respawned = 0;
    let mut actors_eaten = 0;
    let mut actors_respawned = 0;
    let mut splits = 0;
    let mut merges = 0;
    let mut top_mass = 0.0f32;
    let mut move_messages = 0u64;
    let mut move_suppressed = 0u64;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut tick_safety = 0usize;
    let mut last_tick = 0u64;

    // One observed actor stands in for a connected client; the gate measures
    // how many outbound move messages that client would have sent.
    let mut move_gate = MoveGate::new(engine.config.move_epsilon);
    let observed_actor: Option<String> = engine
        .build_snapshot(false)
        .actors
        .first()
        .map(|actor| actor.id.clone());

    while !engine.is_ended() {
        engine.step(TICK_MS);
        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;
        for message in collect_snapshot_anomalies(&snapshot, scenario.pellet_pool, engine.config.half_extent) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        tick_safety += 1;
        if tick_safety > 20 * 60 * 60 {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }

        if let Some(entry) = snapshot.leaderboard.first() {
            top_mass = top_mass.max(entry.mass);
        }

        if let Some(observed_id) = observed_actor.as_deref() {
            if let Some(actor) = snapshot.actors.iter().find(|actor| actor.id == observed_id) {
                if move_gate.should_send(&actor.position, actor.radius) {
                    move_messages += 1;
                } else {
                    move_suppressed += 1;
                }
            }
        }

        for event in &snapshot.events {
            match event {
                RuntimeEvent::PelletEaten { .. } => pellets_eaten += 1,
                RuntimeEvent::PelletRespawned { .. } => pellets_respawned += 1,
                RuntimeEvent::ActorEaten { .. } => actors_eaten += 1,
                RuntimeEvent::ActorRespawned { .. } => actors_respawned += 1,
                RuntimeEvent::ActorSplit { .. } => splits += 1,
                RuntimeEvent::CellsMerged { .. } => merges += 1,
            }
        }
    }

    if pellets_eaten != pellets_respawned {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            last_tick,
            format!(
                "pellet recycle mismatch: {pellets_eaten} eaten vs {pellets_respawned} respawned"
            ),
        );
    }

    let summary = engine.build_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            bots: scenario.bots,
            minutes: scenario.minutes,
            pellet_pool: scenario.pellet_pool,
            duration_ms: summary.duration_ms,
            ticks: summary.ticks,
            pellets_eaten,
            pellets_respawned,
            actors_eaten,
            actors_respawned,
            splits,
            merges,
            top_mass,
            move_messages,
            move_suppressed,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

fn collect_snapshot_anomalies(
    snapshot: &Snapshot,
    pellet_pool: usize,
    half_extent: f32,
) -> Vec<String> {
    let mut anomalies = Vec::new();

    if snapshot.active_consumables as usize != pellet_pool {
        anomalies.push(format!(
            "consumable pool drift: {} active of {pellet_pool}",
            snapshot.active_consumables
        ));
    }

    for actor in &snapshot.actors {
        if !actor.radius.is_finite() || actor.radius <= 0.0 {
            anomalies.push(format!("invalid radius for {}: {}", actor.id, actor.radius));
        }
        if !actor.position.is_finite() {
            anomalies.push(format!("non-finite position for {}", actor.id));
        } else if actor.position.x.abs() > half_extent
            || actor.position.y.abs() > half_extent
            || actor.position.z.abs() > half_extent
        {
            anomalies.push(format!("actor escaped the arena: {}", actor.id));
        }
    }

    for pair in snapshot.leaderboard.windows(2) {
        if pair[0].mass < pair[1].mass {
            anomalies.push("leaderboard not sorted by mass".to_string());
            break;
        }
    }

    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }));

    if cli.single || cli.bots.is_some() || cli.minutes.is_some() || cli.pellets.is_some() {
        let bots = cli.bots.unwrap_or(8).clamp(1, 100) as usize;
        return vec![Scenario {
            name: format!("custom-bots{bots}"),
            bots,
            minutes: cli.minutes.unwrap_or(3).clamp(1, 30),
            pellet_pool: cli.pellets.unwrap_or(5_000).clamp(100, 50_000),
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check-bots4".to_string(),
            bots: 4,
            minutes: 2,
            pellet_pool: 3_000,
            seed,
        },
        Scenario {
            name: "balance-check-bots12".to_string(),
            bots: 12,
            minutes: 5,
            pellet_pool: 8_000,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        run_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}
