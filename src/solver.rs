use faer_core::mul::matmul;
use faer_core::{Mat, Parallelism};

use crate::host::Host;
use crate::linalg::{invert_full_pivot, PivotWork};
use crate::report::{IterationReport, Reporter, Verdict};

/// Options controlling the damped least-squares iteration.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Maximum number of outer iterations.
    pub max_iters: usize,
    /// Relative SOS rise below which a step counts as level.
    pub tolerance: f64,
    /// Initial damping parameter.
    pub lambda_init: f64,
    /// Floor for the damping parameter after an accepted step.
    pub lambda_min: f64,
    /// Damping at which the inner loop gives up.
    pub lambda_max: f64,
    /// Damping factor applied after an accepted step.
    pub shrink: f64,
    /// Damping factor applied after a rejected step.
    pub boost: f64,
    /// Base finite-difference step for Jacobian estimation.
    pub base_step: f64,
    /// Emit per-iteration diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iters: 50,
            tolerance: 1e-12,
            lambda_init: 100.0,
            lambda_min: 1e-12,
            lambda_max: 1e12,
            shrink: 0.1,
            boost: 2.0,
            base_step: 1e-6,
            verbose: false,
        }
    }
}

/// Result of one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outer {
    /// A downhill step was accepted; iterate again.
    Downhill,
    /// Converged: level step accepted, or a sub-tolerance rise reverted.
    Level,
    /// Ray or Jacobian failure, or damping exhausted.
    Bad,
}

/// Levenberg-Marquardt solver over `nadj` parameters and `npts` residuals.
///
/// The damping state persists across outer iterations of one solver.
pub struct LmSolver {
    nadj: usize,
    npts: usize,
    options: SolverOptions,
    parallelism: Parallelism,
    lambda: f64,
    sos: f64,
    jacobian: Mat<f64>,
    residual: Mat<f64>,
    alpha: Mat<f64>,
    beta: Mat<f64>,
    damped: Mat<f64>,
    step: Mat<f64>,
    delta: Vec<f64>,
    pivots: PivotWork,
}

impl LmSolver {
    pub fn new(nadj: usize, npts: usize, options: SolverOptions, parallelism: Parallelism) -> Self {
        let lambda = clamp_lambda(options.lambda_init.abs(), &options);
        Self {
            nadj,
            npts,
            options,
            parallelism,
            lambda,
            sos: f64::NAN,
            jacobian: Mat::zeros(npts, nadj),
            residual: Mat::zeros(npts, 1),
            alpha: Mat::zeros(nadj, nadj),
            beta: Mat::zeros(nadj, 1),
            damped: Mat::zeros(nadj, nadj),
            step: Mat::zeros(nadj, 1),
            delta: vec![0.0; nadj],
            pivots: PivotWork::new(nadj),
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// SOS at the current accepted point.
    pub fn sos(&self) -> f64 {
        self.sos
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Run one outer iteration against `host`.
    pub fn iterate<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        iteration: usize,
        mut reporter: Option<&mut dyn Reporter>,
    ) -> Outer {
        let Some(sos0) = host.perform_residual().sos() else {
            log::debug!("baseline evaluation failed at iteration {iteration}");
            return Outer::Bad;
        };
        self.sos = sos0;
        for row in 0..self.npts {
            self.residual.write(row, 0, host.residual(row));
        }

        if !host.build_jacobian() {
            log::debug!("jacobian build failed at iteration {iteration}");
            return Outer::Bad;
        }
        for col in 0..self.nadj {
            for row in 0..self.npts {
                self.jacobian.write(row, col, host.jacobian(row, col));
            }
        }

        // alpha = J^T J, beta = -J^T r
        matmul(
            self.alpha.as_mut(),
            self.jacobian.as_ref().transpose(),
            self.jacobian.as_ref(),
            None,
            1.0,
            self.parallelism,
        );
        matmul(
            self.beta.as_mut(),
            self.jacobian.as_ref().transpose(),
            self.residual.as_ref(),
            None,
            -1.0,
            self.parallelism,
        );

        let tol = self.options.tolerance;
        while self.lambda < self.options.lambda_max {
            let lambda = self.lambda;
            let mut row = IterationReport {
                iteration,
                sos: sos0,
                trial_sos: f64::NAN,
                rise: f64::NAN,
                lambda,
                step_norm: 0.0,
                verdict: Verdict::Singular,
            };

            // A = alpha + lambda I
            for i in 0..self.nadj {
                for j in 0..self.nadj {
                    let diag = if i == j { lambda } else { 0.0 };
                    self.damped.write(i, j, self.alpha.read(i, j) + diag);
                }
            }
            if invert_full_pivot(&mut self.damped, &mut self.pivots).is_none() {
                self.boost();
                notify(&mut reporter, &row);
                continue;
            }

            matmul(
                self.step.as_mut(),
                self.damped.as_ref(),
                self.beta.as_ref(),
                None,
                1.0,
                self.parallelism,
            );
            for (i, d) in self.delta.iter_mut().enumerate() {
                *d = self.step.read(i, 0);
            }
            row.step_norm = self.delta.iter().map(|d| d * d).sum::<f64>().sqrt();

            let Some(sos1) = host.nudge(&self.delta).sos() else {
                row.rise = f64::INFINITY;
                row.verdict = Verdict::TraceFailure;
                notify(&mut reporter, &row);
                if !self.reverse(host) {
                    log::debug!("reversal of a failed trial failed at iteration {iteration}");
                    return Outer::Bad;
                }
                self.boost();
                continue;
            };
            let rise = (sos1 - sos0) / (1.0 + sos0);
            row.trial_sos = sos1;
            row.rise = rise;

            if rise <= 0.0 {
                let (verdict, outcome) = if rise <= -tol {
                    (Verdict::Downhill, Outer::Downhill)
                } else {
                    (Verdict::Level, Outer::Level)
                };
                self.lambda = clamp_lambda(self.lambda * self.options.shrink, &self.options);
                self.sos = sos1;
                row.verdict = verdict;
                notify(&mut reporter, &row);
                return outcome;
            }

            if !self.reverse(host) {
                log::debug!("reversal of a rejected trial failed at iteration {iteration}");
                return Outer::Bad;
            }
            if rise < tol {
                row.verdict = Verdict::Reverted;
                notify(&mut reporter, &row);
                return Outer::Level;
            }
            self.boost();
            row.verdict = Verdict::Rejected;
            notify(&mut reporter, &row);
        }

        log::debug!(
            "damping exhausted at iteration {iteration}: lambda {:.3e}",
            self.lambda
        );
        Outer::Bad
    }

    fn boost(&mut self) {
        self.lambda = clamp_lambda(self.lambda * self.options.boost, &self.options);
    }

    /// Undo the last trial with the exact negation of its delta.
    fn reverse<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        for d in &mut self.delta {
            *d = -*d;
        }
        !host.nudge(&self.delta).is_failure()
    }
}

fn clamp_lambda(lambda: f64, options: &SolverOptions) -> f64 {
    lambda
        .max(options.lambda_min)
        .min(options.lambda_max)
        .max(f64::MIN_POSITIVE)
}

fn notify(reporter: &mut Option<&mut dyn Reporter>, row: &IterationReport) {
    if let Some(reporter) = reporter.as_deref_mut() {
        reporter.on_iteration(row);
    }
}
