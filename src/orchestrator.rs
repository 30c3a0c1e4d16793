use core::fmt;

use faer_core::Parallelism;

use crate::adjustable::AdjustableSet;
use crate::config::ConfigError;
use crate::evaluator::ResidualEvaluator;
use crate::goal::GoalSet;
use crate::host::{BenchHost, Dimensions, Host};
use crate::nudger::ParameterNudger;
use crate::report::{Reporter, SolveStatus, SolverStats, StdoutReporter, TickReport};
use crate::session::{OptimizationSession, RunGuard};
use crate::solver::{LmSolver, Outer, SolverOptions};
use crate::step::{RayGeometry, StepSizePolicy};
use crate::table::{Domain, OpticalBench};

/// Reasons an adjustment run could not be set up.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// Another run holds the session.
    Busy,
    NoAdjustables,
    /// No goals, hence no residual rows.
    NoGoals,
    NoGoodRays,
    /// An adjustable names a record outside its table.
    RecordOutOfRange {
        domain: Domain,
        record: usize,
        records: usize,
    },
    /// An adjustable cell holds malformed text.
    InvalidCell {
        domain: Domain,
        record: usize,
        field: usize,
    },
    Config(ConfigError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "an adjustment run is already in progress"),
            Self::NoAdjustables => write!(f, "no adjustable parameters"),
            Self::NoGoals => write!(f, "no goals"),
            Self::NoGoodRays => write!(f, "no rays trace successfully"),
            Self::RecordOutOfRange {
                domain,
                record,
                records,
            } => write!(f, "{domain:?} record {record} out of range ({records} records)"),
            Self::InvalidCell {
                domain,
                record,
                field,
            } => write!(f, "{domain:?} record {record} field {field} is not a number"),
            Self::Config(err) => write!(f, "invalid options: {err}"),
        }
    }
}

impl std::error::Error for SetupError {}

impl From<ConfigError> for SetupError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// What a tick left behind.
#[derive(Debug, Clone)]
pub enum Progress {
    Running(TickReport),
    Done(SolverStats),
}

enum ReporterSlot<'a, 'r> {
    External(&'a mut (dyn Reporter + 'r)),
    Local(&'a mut StdoutReporter),
    None,
}

impl<'a, 'r> ReporterSlot<'a, 'r> {
    fn new(
        reporter: Option<&'a mut (dyn Reporter + 'r)>,
        local: &'a mut Option<StdoutReporter>,
    ) -> Self {
        match (reporter, local) {
            (Some(r), _) => Self::External(r),
            (None, Some(r)) => Self::Local(r),
            (None, None) => Self::None,
        }
    }

    fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(&mut **r),
            Self::Local(r) => Some(&mut **r),
            Self::None => None,
        }
    }
}

/// Drives the solver against a host, one outer iteration per tick.
///
/// The session stays busy from setup until a terminal state is reached or
/// the orchestrator is dropped.
pub struct Orchestrator<H> {
    host: H,
    solver: LmSolver,
    nadj: usize,
    npts: usize,
    session: OptimizationSession,
    guard: Option<RunGuard>,
    iterations: usize,
    finished: Option<SolverStats>,
    local: Option<StdoutReporter>,
}

fn reject<T>(err: SetupError) -> Result<T, SetupError> {
    log::warn!("adjustment setup rejected: {err}");
    Err(err)
}

impl<H: Host> Orchestrator<H> {
    /// Wrap a host, taking the parameter and residual counts from it.
    pub fn new(
        session: &OptimizationSession,
        host: H,
        options: SolverOptions,
    ) -> Result<Self, SetupError>
    where
        H: Dimensions,
    {
        let (nadj, npts) = (host.nadj(), host.npts());
        if let Err(err) = options.validate() {
            return reject(err.into());
        }
        if nadj == 0 {
            return reject(SetupError::NoAdjustables);
        }
        if npts == 0 {
            return reject(SetupError::NoGoals);
        }
        let guard = match session.begin() {
            Ok(guard) => guard,
            Err(_) => return reject(SetupError::Busy),
        };
        let local = options.verbose.then(StdoutReporter::new);
        log::debug!("adjustment set up: {nadj} parameters, {npts} residuals");
        Ok(Self {
            host,
            solver: LmSolver::new(nadj, npts, options, Parallelism::None),
            nadj,
            npts,
            session: session.clone(),
            guard: Some(guard),
            iterations: 0,
            finished: None,
            local,
        })
    }

    /// Use `parallelism` for the dense products of the normal equations.
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        let options = self.solver.options().clone();
        self.solver = LmSolver::new(self.nadj, self.npts, options, parallelism);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn nadj(&self) -> usize {
        self.nadj
    }

    pub fn npts(&self) -> usize {
        self.npts
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn lambda(&self) -> f64 {
        self.solver.lambda()
    }

    /// Terminal statistics, once the run has stopped.
    pub fn finished(&self) -> Option<&SolverStats> {
        self.finished.as_ref()
    }

    /// Run one outer iteration, or report the terminal state if already stopped.
    pub fn tick<'r>(&mut self, reporter: Option<&mut (dyn Reporter + 'r)>) -> Progress {
        if let Some(stats) = &self.finished {
            return Progress::Done(stats.clone());
        }
        let mut slot = ReporterSlot::new(reporter, &mut self.local);

        if self.session.cancel_requested() {
            return Progress::Done(Self::finish(
                &mut self.finished,
                &mut self.guard,
                &self.solver,
                self.iterations,
                SolveStatus::Cancelled,
                &mut slot,
            ));
        }
        if self.iterations >= self.solver.options().max_iters {
            return Progress::Done(Self::finish(
                &mut self.finished,
                &mut self.guard,
                &self.solver,
                self.iterations,
                SolveStatus::MaxIterations,
                &mut slot,
            ));
        }

        let outer = self.solver.iterate(&mut self.host, self.iterations, slot.as_mut());
        self.iterations += 1;

        let status = match outer {
            Outer::Level => SolveStatus::Level,
            Outer::Bad => SolveStatus::Bad,
            Outer::Downhill if self.iterations >= self.solver.options().max_iters => {
                SolveStatus::MaxIterations
            }
            Outer::Downhill => {
                let tick = TickReport {
                    iteration: self.iterations,
                    sos: self.solver.sos(),
                    lambda: self.solver.lambda(),
                };
                if let Some(reporter) = slot.as_mut() {
                    reporter.on_tick(&tick);
                }
                return Progress::Running(tick);
            }
        };
        Progress::Done(Self::finish(
            &mut self.finished,
            &mut self.guard,
            &self.solver,
            self.iterations,
            status,
            &mut slot,
        ))
    }

    /// Tick until a terminal state.
    pub fn run(&mut self, mut reporter: Option<&mut dyn Reporter>) -> SolverStats {
        loop {
            if let Progress::Done(stats) = self.tick(reporter.as_deref_mut()) {
                return stats;
            }
        }
    }

    fn finish(
        finished: &mut Option<SolverStats>,
        guard: &mut Option<RunGuard>,
        solver: &LmSolver,
        iterations: usize,
        status: SolveStatus,
        slot: &mut ReporterSlot<'_, '_>,
    ) -> SolverStats {
        let stats = SolverStats {
            status,
            iterations,
            sos: solver.sos(),
            lambda: solver.lambda(),
        };
        if let Some(reporter) = slot.as_mut() {
            reporter.on_tick(&TickReport {
                iteration: iterations,
                sos: stats.sos,
                lambda: stats.lambda,
            });
            reporter.on_finish(&stats);
        }
        log::info!(
            "adjustment finished: {status:?} after {iterations} iterations, sos {:.6e}",
            stats.sos
        );
        *finished = Some(stats.clone());
        *guard = None;
        stats
    }
}

impl<B: OpticalBench> Orchestrator<BenchHost<B>> {
    /// Discover counts and steps from the bench and prepare a run.
    ///
    /// Rejects, without nudging anything, when there is nothing to adjust,
    /// nothing to aim for, no ray traces, or the session is busy.
    ///
    /// The bench is consumed and dropped on rejection. Pass `&mut bench` to
    /// keep the tables; `OpticalBench` is implemented for mutable references.
    pub fn setup(
        session: &OptimizationSession,
        mut bench: B,
        adjustables: AdjustableSet,
        goals: GoalSet,
        options: SolverOptions,
    ) -> Result<Self, SetupError> {
        if let Err(err) = options.validate() {
            return reject(err.into());
        }
        if session.is_busy() {
            return reject(SetupError::Busy);
        }
        if adjustables.is_empty() {
            return reject(SetupError::NoAdjustables);
        }
        if goals.is_empty() {
            return reject(SetupError::NoGoals);
        }
        for adj in adjustables.iter() {
            let records = bench.record_count(adj.domain);
            let cells = std::iter::once(adj.record).chain(adj.slaves.iter().map(|s| s.record));
            for record in cells {
                if record >= records {
                    return reject(SetupError::RecordOutOfRange {
                        domain: adj.domain,
                        record,
                        records,
                    });
                }
                if bench.cell(adj.domain, record, adj.field).is_invalid() {
                    return reject(SetupError::InvalidCell {
                        domain: adj.domain,
                        record,
                        field: adj.field,
                    });
                }
            }
        }

        let good = bench.retrace(false);
        if good == 0 {
            return reject(SetupError::NoGoodRays);
        }

        let geometry = RayGeometry::capture(&bench);
        let steps = StepSizePolicy::new(options.base_step).steps(adjustables.iter(), &geometry);
        let nudger = ParameterNudger::new(adjustables, &bench);
        let evaluator = ResidualEvaluator::new(goals, good);
        let host = BenchHost::new(bench, nudger, evaluator, steps);
        Self::new(session, host, options)
    }
}
