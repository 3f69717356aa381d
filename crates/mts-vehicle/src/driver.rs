//! The stochastic half of a vehicle: random draws, mood, and travel time.

use mts_core::{EntityRng, VehicleConfig, VehicleId};

/// Per-vehicle behaviour parameters and their private RNG.
///
/// | Draw                | Probability                         |
/// |---------------------|-------------------------------------|
/// | dash                | `dash_factor`                       |
/// | dawdle (no dash)    | `dawdle_factor / (1 - dash_factor)` |
/// | consider lane change| `lane_change_factor`                |
#[derive(Clone, Debug)]
pub struct Driver {
    max_velocity:       u32,
    dash:               f64,
    dawdle:             f64,
    lane_change_factor: f64,
    rng:                EntityRng,

    /// Ticks since the vehicle was created.
    age:         u64,
    anger:       u32,
    total_anger: u64,
}

impl Driver {
    pub fn new(config: &VehicleConfig, seed: u64, vehicle: VehicleId) -> Self {
        Self {
            max_velocity:       config.max_velocity.max(1),
            dash:               config.dash_factor,
            dawdle:             config.conditional_dawdle(),
            lane_change_factor: config.lane_change_factor,
            rng:                EntityRng::for_vehicle(seed, vehicle),
            age:         0,
            anger:       0,
            total_anger: 0,
        }
    }

    /// The vehicle's own top speed in cells per tick.
    #[inline]
    pub fn max_velocity(&self) -> u32 {
        self.max_velocity
    }

    #[inline]
    pub fn age(&self) -> u64 {
        self.age
    }

    #[inline]
    pub fn anger(&self) -> u32 {
        self.anger
    }

    #[inline]
    pub fn total_anger(&self) -> u64 {
        self.total_anger
    }

    #[inline]
    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen_bool(p)
    }

    pub(crate) fn dashes(&mut self) -> bool {
        let p = self.dash;
        self.chance(p)
    }

    pub(crate) fn dawdles(&mut self) -> bool {
        let p = self.dawdle;
        self.chance(p)
    }

    pub(crate) fn tends_to_change_lane(&mut self) -> bool {
        let p = self.lane_change_factor;
        self.chance(p)
    }

    /// End-of-tick bookkeeping.  Standing still twice in a row makes the
    /// driver angrier; moving twice in a row calms them down.
    pub(crate) fn did_one_step(&mut self, stands: bool, stood_still: bool) {
        match (stands, stood_still) {
            (true, true) => {
                self.anger = self.anger.saturating_add(1);
                self.total_anger += 1;
            }
            (false, false) => self.anger = self.anger.saturating_sub(1),
            _ => {}
        }
        self.age += 1;
    }

    pub(crate) fn reset(&mut self) {
        self.rng.reset();
        self.age = 0;
        self.anger = 0;
        self.total_anger = 0;
    }
}
