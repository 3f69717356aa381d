//! Step listener trait for renderers, telemetry, and trace writers.

use mts_core::Tick;

use crate::Scenario;

/// Callbacks invoked by the [`Simulation`](crate::Simulation) driver around
/// every tick.
///
/// Listeners see the scenario read-only, between ticks, while the driver
/// holds its step lock.  All methods have no-op defaults.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct Progress { every: u64 }
///
/// impl StepListener for Progress {
///     fn did_one_step(&mut self, age: Tick, scenario: &Scenario) {
///         if age.0 % self.every == 0 {
///             println!("tick {age}: {} vehicles on the road", scenario.spawned_count());
///         }
///     }
/// }
/// ```
pub trait StepListener: Send {
    /// Called before the phases of tick `age` run.
    fn will_do_one_step(&mut self, _age: Tick, _scenario: &Scenario) {}

    /// Called after tick `age` completed; `age` is the number of completed
    /// ticks including this one.
    fn did_one_step(&mut self, _age: Tick, _scenario: &Scenario) {}
}

/// A [`StepListener`] that does nothing.
pub struct NoopListener;

impl StepListener for NoopListener {}
