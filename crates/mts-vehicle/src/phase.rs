//! The fixed phase order of one simulation tick.

use std::fmt;

/// One step of the per-tick pipeline.  Every phase finishes for all
/// vehicles (or nodes) before the next one starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    Accelerate,
    WillChangeLane,
    ChangeLane,
    Brake,
    Move,
    DidMove,
    Spawn,
    UpdateNodes,
}

impl Phase {
    /// All phases in execution order.
    pub const ORDER: [Phase; 8] = [
        Phase::Accelerate,
        Phase::WillChangeLane,
        Phase::ChangeLane,
        Phase::Brake,
        Phase::Move,
        Phase::DidMove,
        Phase::Spawn,
        Phase::UpdateNodes,
    ];

    /// Phases run over spawned vehicles.
    pub const SPAWNED: [Phase; 6] = [
        Phase::Accelerate,
        Phase::WillChangeLane,
        Phase::ChangeLane,
        Phase::Brake,
        Phase::Move,
        Phase::DidMove,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Accelerate     => "accelerate",
            Phase::WillChangeLane => "will_change_lane",
            Phase::ChangeLane     => "change_lane",
            Phase::Brake          => "brake",
            Phase::Move           => "move",
            Phase::DidMove        => "did_move",
            Phase::Spawn          => "spawn",
            Phase::UpdateNodes    => "update_nodes",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
