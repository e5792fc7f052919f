//! Per-invocation coordination of one unit
//!
//! A coordinator owns everything one build invocation needs for one unit:
//! the declaration, the work function, the stamp store, and the execution
//! gate. Every consumer of the unit's outputs calls `ensure_run` (or
//! `ensure_target`) and proceeds only once it returns; the gate guarantees
//! at most one physical work execution per coordinator regardless of how
//! many consumers race.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{UnitError, UnitResult};
use crate::gate::RunGate;
use crate::staleness;
use crate::stamp::StampStore;
use crate::unit::{RunOutcome, UnitSpec};
use crate::work::{UnitWork, WorkContext};

/// Default state directory for run stamps
const DEFAULT_STATE_DIR: &str = "target/units";

/// Counters over one coordinator's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// `ensure_run`/`ensure_target` calls observed
    pub requests: u64,
    /// Staleness evaluations performed (at most one)
    pub evaluations: u64,
    /// Work function executions (zero or one)
    pub work_runs: u64,
}

/// Coordinates one multi-output unit for one build invocation.
///
/// Construct one coordinator per build invocation; its gate caches the
/// invocation's outcome, so a fresh invocation gets a fresh evaluation
/// while calls within one invocation coalesce.
pub struct UnitCoordinator<W> {
    spec: UnitSpec,
    work: W,
    stamps: StampStore,
    gate: RunGate,
    requests: AtomicU64,
    evaluations: AtomicU64,
    work_runs: AtomicU64,
    verbose: bool,
}

impl<W: UnitWork> UnitCoordinator<W> {
    /// Create a coordinator for the given unit and work function
    pub fn new(spec: UnitSpec, work: W) -> UnitResult<Self> {
        spec.validate().map_err(UnitError::InvalidUnit)?;

        Ok(Self {
            spec,
            work,
            stamps: StampStore::new(DEFAULT_STATE_DIR),
            gate: RunGate::new(),
            requests: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            work_runs: AtomicU64::new(0),
            verbose: false,
        })
    }

    /// Set the state directory holding run stamps
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.stamps = StampStore::new(state_dir);
        self
    }

    /// Enable/disable progress output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the unit declaration
    pub fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    /// Ensure the unit's outputs are current.
    ///
    /// Idempotent and side-effect-free when the outputs are already
    /// current. When the unit is stale, the work function executes exactly
    /// once for this coordinator; concurrent callers block until it
    /// finishes and share the outcome, success or failure. On success the
    /// stamp advances; on failure it is left untouched, so the unit stays
    /// stale for the next invocation.
    pub fn ensure_run(&self) -> UnitResult<RunOutcome> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.gate.coalesce(|| self.evaluate_and_run())
    }

    /// Ensure the unit's outputs are current, requested via one target.
    ///
    /// Any single output being requested means the whole unit must be
    /// current; this is `ensure_run` plus a check that the path is
    /// actually declared by the unit.
    pub fn ensure_target(&self, target: impl AsRef<Path>) -> UnitResult<RunOutcome> {
        let target = target.as_ref();
        if !self.spec.declares_target(target) {
            return Err(UnitError::undeclared_target(&self.spec.name, target));
        }
        self.ensure_run()
    }

    fn evaluate_and_run(&self) -> UnitResult<RunOutcome> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let stamp = self.stamps.load(&self.spec.name)?;
        let Some(reason) = staleness::check_staleness(&self.spec, stamp.as_ref())? else {
            if self.verbose {
                println!("{} is up to date", self.spec.name);
            }
            return Ok(RunOutcome::Fresh);
        };

        if self.verbose {
            println!("Rebuilding {}: {}", self.spec.name, reason);
        }

        self.work_runs.fetch_add(1, Ordering::Relaxed);
        let ctx = WorkContext::new(&self.spec);
        self.work.run(&ctx)?;

        self.stamps.record(&self.spec.name, self.spec.digest())?;
        Ok(RunOutcome::Ran)
    }

    /// Remove every declared target and the stamp, returning the unit to
    /// never-ran state. The reset counterpart of `ensure_run`.
    pub fn clean(&self) -> UnitResult<()> {
        for target in &self.spec.targets {
            match fs::remove_file(target) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(UnitError::io(target, e)),
            }
        }
        self.stamps.clear(&self.spec.name)
    }

    /// Get run statistics for this coordinator
    pub fn stats(&self) -> RunStats {
        RunStats {
            requests: self.requests.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            work_runs: self.work_runs.load(Ordering::Relaxed),
        }
    }
}
