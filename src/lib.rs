//! Damped least-squares adjustment of an optical bench with a Levenberg-Marquardt (LM) step.
//!
//! The adjuster tunes tagged table cells (surface prescriptions and ray
//! starting conditions) so that the traced rays meet their goals, minimizing
//! the sum of squared residuals `sum r_i(x)^2`.
//!
//! How it works (high level):
//! - Discover adjustables from single-character tags; cells sharing a letter
//!   follow their master, and opposite case follows it with opposite sign.
//! - Estimate the Jacobian with three-nudge central differences.
//! - Solve `(J^T J + lambda I) delta = -J^T r` by full-pivot Gauss-Jordan.
//! - Keep the step if the relative rise is negative, otherwise undo it
//!   exactly and boost `lambda`.
//!
//! Calling it:
//! - Implement `OpticalBench` over your tables and ray tracer, then call
//!   `Orchestrator::setup` with an `AdjustableSet` and a `GoalSet`.
//! - Or wrap a plain merit function in `FnHost` and call `Orchestrator::new`.
//! - Call `tick` once per outer iteration, or `run` to completion, and
//!   inspect `SolverStats`.
//!
//! Example:
//! ```rust,no_run
//! use ray_adjust::{FnHost, OptimizationSession, Orchestrator, SolveStatus, SolverOptions};
//!
//! let host = FnHost::new(vec![0.0], 1, |x: &[f64], r: &mut [f64]| {
//!     r[0] = x[0] - 1.0;
//!     true
//! });
//! let session = OptimizationSession::new();
//! let mut adjuster = Orchestrator::new(&session, host, SolverOptions::default()).unwrap();
//! let stats = adjuster.run(None);
//! assert_eq!(stats.status, SolveStatus::Level);
//! ```

mod adjustable;
mod config;
mod evaluator;
mod goal;
mod host;
mod jacobian;
mod linalg;
mod merit;
mod nudger;
mod orchestrator;
mod report;
mod session;
mod solver;
mod step;
mod table;

pub use adjustable::{
    AdjustableSet, Adjustment, AttributeKind, DomainTags, FieldSpec, Sense, Slave, TagGrid,
};
pub use config::ConfigError;
pub use evaluator::{Evaluation, ResidualEvaluator};
pub use goal::{Goal, GoalSet, GoalTarget};
pub use host::{BenchHost, Dimensions, Host};
pub use jacobian::{Jacobian, Perturb};
pub use merit::FnHost;
pub use nudger::ParameterNudger;
pub use orchestrator::{Orchestrator, Progress, SetupError};
pub use report::{
    IterationReport, Reporter, SolveStatus, SolverStats, StdoutReporter, TickReport, Verdict,
};
pub use session::{OptimizationSession, RunGuard, SessionError};
pub use solver::{LmSolver, Outer, SolverOptions};
pub use step::{RayGeometry, StepSizePolicy, ANGLE_STEP_FACTOR, MIN_STEP};
pub use table::{CellValue, Domain, OpticalBench};
