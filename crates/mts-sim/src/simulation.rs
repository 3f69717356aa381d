//! The simulation driver: prepared scenario, step lock, and the
//! free-running timer thread.
//!
//! # States
//!
//! ```text
//! not prepared ──set_and_init_prepared_scenario──▶ paused ◀──cancel── running
//!                                                    │                   ▲
//!                                                    └──────run──────────┘
//! ```
//!
//! Every tick runs under one fair lock.  [`Simulation::cancel`] takes the
//! same lock before reporting the driver paused, so an in-flight tick
//! always completes first and no tick is ever left half-applied by a
//! cancel.  [`Simulation::interrupt`] is the stronger request: the executor
//! stops the in-flight tick at its next phase boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use mts_core::{SimulationConfig, Tick};
use parking_lot::{FairMutex, Mutex};
use tracing::{debug, error, warn};

use crate::executor::{self, StepExecutor};
use crate::scheduler::{CancelToken, Pacing, Scheduler};
use crate::{Scenario, SimError, SimResult, StepListener};

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything a tick touches.  Guarded by the step lock.
struct Core {
    scenario:  Option<Scenario>,
    executor:  Box<dyn StepExecutor>,
    listeners: Vec<Box<dyn StepListener>>,
    age:       Tick,
}

impl Core {
    fn do_run_one_step(&mut self, interrupt: &CancelToken) -> SimResult<()> {
        let Core { scenario, executor, listeners, age } = self;
        let scenario = scenario.as_mut().ok_or(SimError::NotPrepared)?;

        for listener in listeners.iter_mut() {
            listener.will_do_one_step(*age, scenario);
        }
        match executor::do_one_step(&**executor, scenario) {
            Ok(()) => {}
            Err(SimError::Interrupted) => {
                interrupt.reset();
                debug!(%age, "tick interrupted");
                return Err(SimError::Interrupted);
            }
            Err(e) => return Err(e),
        }
        *age = age.next();
        for listener in listeners.iter_mut() {
            listener.did_one_step(*age, scenario);
        }
        Ok(())
    }
}

struct Shared {
    core:       FairMutex<Core>,
    interrupt:  CancelToken,
    running:    AtomicBool,
    last_error: Mutex<Option<SimError>>,
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// Drives a [`Scenario`] tick by tick, either on demand or free-running on
/// a background thread at `1000 / speedup` ms per tick.
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = Simulation::new(config.clone())?;
/// sim.set_and_init_prepared_scenario(scenario)?;
/// sim.run_ticks(100)?;
/// let done = sim.with_scenario(|s| s.despawned_count());
/// ```
pub struct Simulation {
    config: SimulationConfig,
    shared: Arc<Shared>,
    timer:  Option<(CancelToken, JoinHandle<()>)>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let interrupt = CancelToken::new();
        let executor = executor::for_config(&config.multi_threading, interrupt.clone())?;
        Ok(Self::with_executor(config, executor, interrupt))
    }

    /// A driver using `executor`.  `interrupt` must be the token the
    /// executor checks.
    pub fn with_executor(
        config:    SimulationConfig,
        executor:  Box<dyn StepExecutor>,
        interrupt: CancelToken,
    ) -> Self {
        let core = Core { scenario: None, executor, listeners: Vec::new(), age: Tick::ZERO };
        Self {
            config,
            shared: Arc::new(Shared {
                core: FairMutex::new(core),
                interrupt,
                running: AtomicBool::new(false),
                last_error: Mutex::new(None),
            }),
            timer: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // ── State queries ─────────────────────────────────────────────────────

    pub fn is_paused(&self) -> bool {
        !self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_prepared(&self) -> bool {
        self.shared.core.lock().scenario.is_some()
    }

    /// Completed ticks since the scenario was set.
    pub fn age(&self) -> Tick {
        self.shared.core.lock().age
    }

    /// Read the scenario between ticks.  `None` if none is prepared.
    pub fn with_scenario<R>(&self, f: impl FnOnce(&Scenario) -> R) -> Option<R> {
        self.shared.core.lock().scenario.as_ref().map(f)
    }

    /// The error that stopped free-running, if any.
    pub fn take_error(&self) -> Option<SimError> {
        self.shared.last_error.lock().take()
    }

    // ── Scenario & listeners ──────────────────────────────────────────────

    /// Make `scenario` the active one and return the previous one.
    ///
    /// Resets the age to zero and runs a full node update so the first tick
    /// already sees crossing permissions.
    pub fn set_and_init_prepared_scenario(&mut self, scenario: Scenario) -> SimResult<Option<Scenario>> {
        if !self.is_paused() {
            return Err(SimError::NotPaused("replace the scenario"));
        }
        let mut core = self.shared.core.lock();
        executor::update_all_nodes(&*core.executor, &scenario)?;
        core.age = Tick::ZERO;
        debug!(
            vehicles = scenario.vehicle_count(),
            executor = core.executor.name(),
            "scenario prepared"
        );
        Ok(core.scenario.replace(scenario))
    }

    pub fn add_step_listener(&self, listener: Box<dyn StepListener>) {
        self.shared.core.lock().listeners.push(listener);
    }

    pub fn remove_step_listeners(&self) {
        self.shared.core.lock().listeners.clear();
    }

    // ── Stepping ──────────────────────────────────────────────────────────

    /// Run exactly one tick.  Does nothing while free-running.
    pub fn run_one_step(&self) -> SimResult<()> {
        if !self.is_paused() {
            return Ok(());
        }
        self.shared.core.lock().do_run_one_step(&self.shared.interrupt)
    }

    /// Run `n` ticks back to back on the calling thread and return how many
    /// completed.
    pub fn run_ticks(&self, n: u64) -> SimResult<u64> {
        if !self.is_paused() {
            return Err(SimError::NotPaused("run ticks on demand"));
        }
        let shared = &self.shared;
        Scheduler::new(CancelToken::new()).drive(Pacing::Unpaced, Some(n), || {
            shared.core.lock().do_run_one_step(&shared.interrupt)
        })
    }

    /// Start free-running on a background thread.
    ///
    /// A `speedup <= 0` disables free-running; the call then only logs a
    /// warning.
    pub fn run(&mut self) -> SimResult<()> {
        if !self.is_paused() {
            return Ok(());
        }
        if !self.is_prepared() {
            return Err(SimError::NotPrepared);
        }
        let Some(pacing) = Pacing::from_speedup(self.config.speedup) else {
            warn!(speedup = self.config.speedup, "free-running disabled");
            return Ok(());
        };
        self.join_timer();

        let cancel = CancelToken::new();
        let scheduler = Scheduler::new(cancel.clone());
        let shared = Arc::clone(&self.shared);
        shared.running.store(true, Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name("mts-timer".into())
            .spawn(move || {
                let token = scheduler.cancel_token().clone();
                let result = scheduler.drive(pacing, None, || {
                    let mut core = shared.core.lock();
                    // A cancel may have won the lock while this tick waited.
                    if token.is_cancelled() {
                        return Ok(());
                    }
                    core.do_run_one_step(&shared.interrupt)
                });
                if let Err(e) = result {
                    error!(error = %e, "free-running stopped");
                    *shared.last_error.lock() = Some(e);
                }
                shared.running.store(false, Ordering::SeqCst);
            });
        match spawned {
            Ok(handle) => {
                self.timer = Some((cancel, handle));
                debug!(?pacing, "free-running started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(SimError::ThreadPool(e.to_string()))
            }
        }
    }

    /// Stop free-running.  Waits for an in-flight tick to complete.
    pub fn cancel(&mut self) {
        if let Some((cancel, _)) = &self.timer {
            cancel.cancel();
        }
        {
            let _core = self.shared.core.lock();
            self.shared.running.store(false, Ordering::SeqCst);
        }
        self.join_timer();
    }

    /// Ask the executor to abandon the in-flight tick at its next phase
    /// boundary.  The tick fails with [`SimError::Interrupted`] and the
    /// driver pauses.
    pub fn interrupt(&mut self) {
        self.shared.interrupt.cancel();
        self.cancel();
        // Nothing observed it if no tick was running.
        self.shared.interrupt.reset();
    }

    fn join_timer(&mut self) {
        if let Some((cancel, handle)) = self.timer.take() {
            cancel.cancel();
            if handle.join().is_err() {
                error!("timer thread panicked");
            }
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.cancel();
    }
}
