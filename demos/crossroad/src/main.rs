//! crossroad — smallest demo for the mts cellular traffic simulator.
//!
//! Drives a few hundred vehicles through a single plus-shaped intersection
//! with two-lane arms, then prints throughput and driver statistics.
//!
//! ```bash
//! # 2000 ticks on every core, per-tick vehicle positions to trace.csv
//! crossroad --ticks 2000 --trace trace.csv
//!
//! # Free-running at 20 ticks per second for five seconds
//! RUST_LOG=mts_sim=debug crossroad --realtime 5 --speedup 20
//! ```

mod network;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use csv::Writer;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mts_core::{MultiThreadingConfig, SimRng, SimulationConfig, Tick, VehicleConfig};
use mts_sim::{Scenario, Simulation, StepListener, VehicleView};
use mts_vehicle::VehicleState;

use network::{ARM_LENGTH_M, build_network};

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:              u64 = 42;
const SPAWN_WINDOW:      u64 = 400;  // trips start within the first N ticks
const TICKS_PER_BATCH:   u64 = 100;
const PROGRESS_INTERVAL: u64 = 500;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "crossroad")]
#[command(version, about = "Cellular traffic simulation of a single crossroad", long_about = None)]
struct Args {
    /// Number of trips between the arm ends
    #[arg(short = 'n', long, default_value = "200")]
    vehicles: u32,

    /// Upper bound on simulated ticks
    #[arg(short = 't', long, default_value = "2000")]
    ticks: u64,

    /// Step worker threads; 1 selects the single-threaded executor
    #[arg(long)]
    threads: Option<usize>,

    /// Probability of dawdling per tick
    #[arg(long, default_value = "0.2")]
    dawdle: f64,

    /// Write every vehicle's position after every tick to this CSV file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Free-run in real time for this many seconds instead of stepping
    #[arg(long)]
    realtime: Option<u64>,

    /// Ticks per real second when free-running
    #[arg(long, default_value = "10")]
    speedup: i32,
}

// ── Trace listener ────────────────────────────────────────────────────────────

#[derive(Default)]
struct TraceSummary {
    rows:  u64,
    error: Option<csv::Error>,
}

/// Appends one row per spawned vehicle after every tick.
struct TraceWriter {
    out:     Writer<File>,
    summary: Arc<Mutex<TraceSummary>>,
}

impl TraceWriter {
    fn new(path: &Path, summary: Arc<Mutex<TraceSummary>>) -> Result<Self> {
        let mut out = Writer::from_path(path)?;
        out.write_record(["tick", "vehicle_id", "edge_id", "lane", "cell", "velocity", "anger"])?;
        Ok(Self { out, summary })
    }

    fn write_rows(&mut self, age: Tick, scenario: &Scenario) -> csv::Result<u64> {
        let mut rows = 0;
        for v in scenario.vehicles() {
            let (Some(edge), Some(lane), Some(cell)) = (v.edge, v.lane, v.cell) else {
                continue;
            };
            self.out.write_record(&[
                age.0.to_string(),
                v.id.0.to_string(),
                edge.0.to_string(),
                lane.to_string(),
                cell.to_string(),
                v.velocity.to_string(),
                v.anger.to_string(),
            ])?;
            rows += 1;
        }
        Ok(rows)
    }
}

impl StepListener for TraceWriter {
    fn did_one_step(&mut self, age: Tick, scenario: &Scenario) {
        if self.summary.lock().error.is_some() {
            return;
        }
        let result = self.write_rows(age, scenario);
        let mut summary = self.summary.lock();
        match result {
            Ok(rows) => summary.rows += rows,
            Err(e) => summary.error = Some(e),
        }
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            warn!(error = %e, "trace flush failed");
        }
    }
}

// ── Progress listener ─────────────────────────────────────────────────────────

struct Progress;

impl StepListener for Progress {
    fn did_one_step(&mut self, age: Tick, scenario: &Scenario) {
        if age.0 % PROGRESS_INTERVAL == 0 {
            info!(
                age = age.0,
                on_road  = scenario.spawned_count(),
                waiting  = scenario.not_spawned_count(),
                finished = scenario.despawned_count(),
                "progress"
            );
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,crossroad=info")),
        )
        .init();

    let args = Args::parse();

    println!("=== crossroad — mts cellular traffic simulator ===");
    println!("Trips: {}  |  Max ticks: {}  |  Seed: {SEED}", args.vehicles, args.ticks);
    println!();

    // 1. Configuration.
    let mut multi_threading = MultiThreadingConfig::default();
    if let Some(n) = args.threads {
        multi_threading.n_threads = n;
    }
    let config = SimulationConfig {
        seed:              SEED,
        speedup:           args.speedup,
        max_vehicle_count: args.vehicles as usize,
        multi_threading,
        vehicles: VehicleConfig { dawdle_factor: args.dawdle, ..VehicleConfig::default() },
        ..SimulationConfig::default()
    };
    config.validate()?;

    // 2. Road network.
    let (graph, arms) = build_network(&config)?;
    println!(
        "Road network: {} nodes, {} edges, arms of {ARM_LENGTH_M} m ({} cells)",
        graph.node_count(),
        graph.edge_count(),
        config.cell_count(ARM_LENGTH_M),
    );

    // 3. Trips from a random arm end to a different random arm end.
    let mut scenario = Scenario::new(graph, config.clone())?;
    // Delays come from their own stream so routes do not depend on them.
    let mut routes = SimRng::new(SEED);
    let mut delays = routes.child(1);
    for _ in 0..args.vehicles {
        let from = routes.gen_range(0..arms.len());
        let to = (from + routes.gen_range(1..arms.len())) % arms.len();
        scenario.add_trip(arms[from], arms[to], delays.gen_range(0..SPAWN_WINDOW))?;
    }
    println!("Scenario: {} vehicles", scenario.vehicle_count());

    // 4. Driver and listeners.
    let mut sim = Simulation::new(config)?;
    sim.set_and_init_prepared_scenario(scenario)?;
    sim.add_step_listener(Box::new(Progress));

    let trace_summary = Arc::new(Mutex::new(TraceSummary::default()));
    if let Some(path) = &args.trace {
        sim.add_step_listener(Box::new(TraceWriter::new(path, Arc::clone(&trace_summary))?));
    }
    println!();

    // 5. Run.
    let t0 = Instant::now();
    match args.realtime {
        Some(secs) => {
            sim.run()?;
            std::thread::sleep(Duration::from_secs(secs));
            sim.cancel();
            if let Some(e) = sim.take_error() {
                return Err(e.into());
            }
        }
        None => {
            let end = Tick(args.ticks);
            while sim.age() < end && sim.with_scenario(|s| !s.is_finished()).unwrap_or(false) {
                let batch = TICKS_PER_BATCH.min(end - sim.age());
                sim.run_ticks(batch)?;
            }
        }
    }
    let elapsed = t0.elapsed();
    // Drops the trace writer, which flushes it.
    sim.remove_step_listeners();

    // 6. Summary.
    let ticks = sim.age().0;
    println!(
        "Simulated {ticks} ticks in {:.3} s ({:.0} ticks/s)",
        elapsed.as_secs_f64(),
        ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    );

    let views: Vec<VehicleView> = sim.with_scenario(|s| s.vehicles()).unwrap_or_default();
    print_summary(&views, ticks);

    if args.trace.is_some() {
        let summary = trace_summary.lock();
        match &summary.error {
            Some(e) => eprintln!("trace error: {e}"),
            None => println!("  trace rows         : {}", summary.rows),
        }
    }

    Ok(())
}

fn print_summary(views: &[VehicleView], ticks: u64) {
    let finished: Vec<&VehicleView> = views.iter().filter(|v| v.state == VehicleState::Despawned).collect();
    let on_road = views.iter().filter(|v| v.state == VehicleState::Spawned).count();
    let waiting = views.len() - finished.len() - on_road;

    println!("  finished trips     : {}", finished.len());
    println!("  still on the road  : {on_road}");
    println!("  still waiting      : {waiting}");
    if ticks > 0 {
        println!("  throughput         : {:.2} trips/min simulated", finished.len() as f64 * 60.0 / ticks as f64);
    }
    if !finished.is_empty() {
        let n = finished.len() as f64;
        let mean_age = finished.iter().map(|v| v.age as f64).sum::<f64>() / n;
        let mean_anger = finished.iter().map(|v| v.total_anger as f64).sum::<f64>() / n;
        let worst = finished.iter().max_by_key(|v| v.total_anger).map(|v| v.id);
        println!("  mean ticks to exit : {mean_age:.1}");
        println!("  mean total anger   : {mean_anger:.1}");
        if let Some(id) = worst {
            println!("  angriest driver    : {id}");
        }
    }
}
