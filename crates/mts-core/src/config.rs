//! Simulation configuration.
//!
//! One `SimulationConfig` is shared (read-only) by the graph builder, every
//! node arbiter, every vehicle and the step executor.  All fields are public
//! so applications can tweak a `Default` and hand it over; call
//! [`SimulationConfig::validate`] before building a scenario.

use crate::{CoreError, CoreResult};

// ── SimulationConfig ──────────────────────────────────────────────────────────

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Length of one cell in metres.  7.5 m is the classic NaSch value.
    pub meters_per_cell: f64,

    /// Upper bound on any edge's velocity in cells per tick (6 ≈ 160 km/h).
    pub global_max_velocity: u32,

    /// Real-time pacing: one tick every `1000 / speedup` ms.  `<= 0` disables
    /// free-running; single steps are still possible.
    pub speedup: i32,

    /// Master seed.  The same seed always produces identical runs.
    pub seed: u64,

    /// Capacity hint for scenario vehicle containers.
    pub max_vehicle_count: usize,

    pub crossing_logic: CrossingLogicConfig,
    pub multi_threading: MultiThreadingConfig,
    pub vehicles: VehicleConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            meters_per_cell:     7.5,
            global_max_velocity: 6,
            speedup:             1,
            seed:                0,
            max_vehicle_count:   100,
            crossing_logic:      CrossingLogicConfig::default(),
            multi_threading:     MultiThreadingConfig::default(),
            vehicles:            VehicleConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.meters_per_cell.is_nan() || self.meters_per_cell <= 0.0 {
            return Err(CoreError::Config(format!(
                "meters_per_cell must be positive, got {}",
                self.meters_per_cell
            )));
        }
        if self.global_max_velocity == 0 {
            return Err(CoreError::Config("global_max_velocity must be at least 1".into()));
        }
        self.multi_threading.validate()?;
        self.vehicles.validate()
    }

    /// Convert a speed limit to cells per tick:
    /// `max(1, round(kmh / 3.6 / meters_per_cell))`, capped at
    /// `global_max_velocity`.
    pub fn cells_per_tick(&self, kmh: f64) -> u32 {
        let cells = (kmh / 3.6 / self.meters_per_cell).round();
        let cells = if cells.is_finite() && cells >= 1.0 { cells as u32 } else { 1 };
        cells.min(self.global_max_velocity).max(1)
    }

    /// Convert a length to a cell count: `max(1, ceil(length / meters_per_cell))`.
    pub fn cell_count(&self, length_m: f64) -> u32 {
        let cells = (length_m / self.meters_per_cell).ceil();
        if cells.is_finite() && cells >= 1.0 { cells as u32 } else { 1 }
    }
}

// ── CrossingLogicConfig ───────────────────────────────────────────────────────

/// Switches for the intersection arbiter's tie-break rules.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossingLogicConfig {
    /// Number edges counter-clockwise (right-hand traffic) or clockwise.
    pub driving_on_the_right: bool,
    /// Compare the priority level of origin and destination edges.
    pub edge_priority: bool,
    /// Resolve remaining ties right-before-left instead of by coin flip.
    pub priority_to_the_right: bool,
    /// At most one vehicle may cross a node per tick.
    pub only_one_vehicle: bool,
    /// Without any change since the last update, don't grant permission to a
    /// vehicle whose next lane is full.
    pub friendly_standing_in_jam: bool,
}

impl Default for CrossingLogicConfig {
    fn default() -> Self {
        Self {
            driving_on_the_right:     true,
            edge_priority:            true,
            priority_to_the_right:    true,
            only_one_vehicle:         false,
            friendly_standing_in_jam: true,
        }
    }
}

// ── MultiThreadingConfig ──────────────────────────────────────────────────────

/// Worker-pool sizing for the step executor.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiThreadingConfig {
    /// Worker threads.  `1` selects the single-threaded executor.
    pub n_threads: usize,
    /// Vehicles per task in every vehicle phase.
    pub vehicles_per_runnable: usize,
    /// Nodes per task in the node-update phase.
    pub nodes_per_thread: usize,
}

impl Default for MultiThreadingConfig {
    fn default() -> Self {
        let n_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            n_threads,
            vehicles_per_runnable: 200,
            nodes_per_thread:      800,
        }
    }
}

impl MultiThreadingConfig {
    pub fn single_threaded() -> Self {
        Self { n_threads: 1, ..Self::default() }
    }

    fn validate(&self) -> CoreResult<()> {
        if self.n_threads == 0 || self.vehicles_per_runnable == 0 || self.nodes_per_thread == 0 {
            return Err(CoreError::Config(format!(
                "multi-threading sizes must be positive: {self:?}"
            )));
        }
        Ok(())
    }
}

// ── VehicleConfig ─────────────────────────────────────────────────────────────

/// Nagel–Schreckenberg parameters shared by all vehicles of a scenario.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleConfig {
    /// The vehicle's own top speed in cells per tick.
    pub max_velocity: u32,
    /// Probability of slowing down by one cell in a tick.
    pub dawdle_factor: f64,
    /// Probability of accelerating twice in a tick.
    pub dash_factor: f64,
    /// Probability that a driver considers a lane change in a tick.
    pub lane_change_factor: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            max_velocity:       5,
            dawdle_factor:      0.2,
            dash_factor:        0.0,
            lane_change_factor: 1.0,
        }
    }
}

impl VehicleConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.max_velocity == 0 {
            return Err(CoreError::Config("vehicle max_velocity must be at least 1".into()));
        }
        for (name, p) in [
            ("dawdle_factor", self.dawdle_factor),
            ("dash_factor", self.dash_factor),
            ("lane_change_factor", self.lane_change_factor),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CoreError::Config(format!("{name} must lie in [0, 1], got {p}")));
            }
        }
        if self.dash_factor + self.dawdle_factor > 1.0 {
            return Err(CoreError::Config(format!(
                "dash_factor + dawdle_factor must be <= 1, got {}",
                self.dash_factor + self.dawdle_factor
            )));
        }
        Ok(())
    }

    /// Dawdle probability for a vehicle that did not dash this tick:
    /// P[dawdle | ¬dash] = P[dawdle] / (1 − P[dash]).
    pub fn conditional_dawdle(&self) -> f64 {
        if self.dash_factor >= 1.0 {
            return 0.0;
        }
        self.dawdle_factor / (1.0 - self.dash_factor)
    }
}

// ── Street priority ───────────────────────────────────────────────────────────

/// Functional road class of a street, most important first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    LivingStreet,
    Service,
    Track,
    Road,
}

/// Maps a street's class to the priority level stored on its edges.
///
/// Smaller levels win at intersections.  Each class occupies two levels so a
/// link road (`*_link`) sits just behind its main class; roundabouts beat
/// everything.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreetPriority {
    pub class:      RoadClass,
    pub link:       bool,
    pub roundabout: bool,
}

impl StreetPriority {
    pub fn new(class: RoadClass) -> Self {
        Self { class, link: false, roundabout: false }
    }

    pub fn link(mut self) -> Self {
        self.link = true;
        self
    }

    pub fn roundabout(mut self) -> Self {
        self.roundabout = true;
        self
    }

    pub fn level(self) -> u8 {
        if self.roundabout {
            return 0;
        }
        let rank = self.class as u8 + 1;
        rank * 2 - 1 + u8::from(self.link)
    }
}
