use crate::evaluator::{Evaluation, ResidualEvaluator};
use crate::jacobian::{Jacobian, Perturb};
use crate::nudger::ParameterNudger;
use crate::table::OpticalBench;

/// The five operations the solver drives.
///
/// All operate on state owned by the host; the solver holds no parameter
/// values of its own.
pub trait Host {
    /// Retrace and rebuild residuals without changing parameters.
    fn perform_residual(&mut self) -> Evaluation;
    /// Add `delta` to the parameters, retrace and rebuild residuals.
    fn nudge(&mut self, delta: &[f64]) -> Evaluation;
    /// Rebuild the Jacobian around the current point.
    fn build_jacobian(&mut self) -> bool;
    fn jacobian(&self, row: usize, col: usize) -> f64;
    fn residual(&self, row: usize) -> f64;
}

/// Problem size a host was built for.
pub trait Dimensions {
    /// Number of adjustable parameters.
    fn nadj(&self) -> usize;
    /// Number of residual rows.
    fn npts(&self) -> usize;
}

pub(crate) struct BenchCore<B> {
    pub(crate) bench: B,
    pub(crate) nudger: ParameterNudger,
    pub(crate) evaluator: ResidualEvaluator,
}

impl<B: OpticalBench> Perturb for BenchCore<B> {
    fn nudge(&mut self, delta: &[f64]) -> Evaluation {
        self.nudger.nudge(&mut self.bench, &mut self.evaluator, delta)
    }

    fn residuals(&self) -> &[f64] {
        self.evaluator.residuals()
    }
}

/// Host backed by an optical bench and its discovered adjustables.
pub struct BenchHost<B> {
    core: BenchCore<B>,
    jacobian: Jacobian,
    steps: Vec<f64>,
}

impl<B: OpticalBench> BenchHost<B> {
    pub(crate) fn new(
        bench: B,
        nudger: ParameterNudger,
        evaluator: ResidualEvaluator,
        steps: Vec<f64>,
    ) -> Self {
        let jacobian = Jacobian::new(evaluator.npts(), nudger.len());
        Self {
            core: BenchCore {
                bench,
                nudger,
                evaluator,
            },
            jacobian,
            steps,
        }
    }

    pub fn bench(&self) -> &B {
        &self.core.bench
    }

    pub fn into_bench(self) -> B {
        self.core.bench
    }

    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    /// Current master values in parameter-vector order.
    pub fn parameters(&self) -> Vec<f64> {
        self.core.nudger.values()
    }

    pub fn residuals(&self) -> &[f64] {
        self.core.evaluator.residuals()
    }
}

impl<B> Dimensions for BenchHost<B> {
    fn nadj(&self) -> usize {
        self.core.nudger.len()
    }

    fn npts(&self) -> usize {
        self.core.evaluator.npts()
    }
}

impl<B: OpticalBench> Host for BenchHost<B> {
    fn perform_residual(&mut self) -> Evaluation {
        self.core.nudger.checkpoint(&self.core.bench);
        self.core.evaluator.evaluate(&mut self.core.bench)
    }

    fn nudge(&mut self, delta: &[f64]) -> Evaluation {
        Perturb::nudge(&mut self.core, delta)
    }

    fn build_jacobian(&mut self) -> bool {
        self.jacobian.build(&mut self.core, &self.steps)
    }

    fn jacobian(&self, row: usize, col: usize) -> f64 {
        self.jacobian.get(row, col)
    }

    fn residual(&self, row: usize) -> f64 {
        self.core.evaluator.residuals()[row]
    }
}
