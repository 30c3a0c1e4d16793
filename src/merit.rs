use crate::evaluator::Evaluation;
use crate::host::{Dimensions, Host};
use crate::jacobian::{Jacobian, Perturb};
use crate::nudger::Displacement;
use crate::step::StepSizePolicy;

struct FnCore<F> {
    anchor: Vec<f64>,
    displacement: Displacement,
    params: Vec<f64>,
    residuals: Vec<f64>,
    residual_fn: F,
}

impl<F> FnCore<F>
where
    F: FnMut(&[f64], &mut [f64]) -> bool,
{
    fn evaluate(&mut self) -> Evaluation {
        if !(self.residual_fn)(&self.params, &mut self.residuals) {
            return Evaluation::Failure;
        }
        Evaluation::from_residuals(&self.residuals)
    }
}

impl<F> Perturb for FnCore<F>
where
    F: FnMut(&[f64], &mut [f64]) -> bool,
{
    fn nudge(&mut self, delta: &[f64]) -> Evaluation {
        self.displacement.accumulate(delta);
        for (i, (p, a)) in self.params.iter_mut().zip(&self.anchor).enumerate() {
            *p = a + self.displacement.get(i);
        }
        self.evaluate()
    }

    fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}

/// Host over a plain merit function.
///
/// The closure fills the residual vector for a parameter vector and returns
/// `false` when it cannot be evaluated there.
pub struct FnHost<F> {
    core: FnCore<F>,
    jacobian: Jacobian,
    steps: Vec<f64>,
}

impl<F> FnHost<F>
where
    F: FnMut(&[f64], &mut [f64]) -> bool,
{
    /// `npts` is the residual length; every step defaults to the base step.
    pub fn new(params: Vec<f64>, npts: usize, residual_fn: F) -> Self {
        let n = params.len();
        let step = StepSizePolicy::default().plain_step();
        Self {
            core: FnCore {
                anchor: params.clone(),
                displacement: Displacement::new(n),
                params,
                residuals: vec![0.0; npts],
                residual_fn,
            },
            jacobian: Jacobian::new(npts, n),
            steps: vec![step; n],
        }
    }

    /// Override the differencing steps; zero or non-finite entries keep the default.
    pub fn with_steps(mut self, steps: &[f64]) -> Self {
        for (dst, &s) in self.steps.iter_mut().zip(steps) {
            if s.is_finite() && s != 0.0 {
                *dst = s.abs();
            }
        }
        self
    }

    pub fn params(&self) -> &[f64] {
        &self.core.params
    }

    pub fn residuals(&self) -> &[f64] {
        &self.core.residuals
    }

    pub fn jacobian_matrix(&self) -> &Jacobian {
        &self.jacobian
    }
}

impl<F> Dimensions for FnHost<F> {
    fn nadj(&self) -> usize {
        self.core.params.len()
    }

    fn npts(&self) -> usize {
        self.core.residuals.len()
    }
}

impl<F> Host for FnHost<F>
where
    F: FnMut(&[f64], &mut [f64]) -> bool,
{
    fn perform_residual(&mut self) -> Evaluation {
        self.core.anchor.copy_from_slice(&self.core.params);
        self.core.displacement.reset();
        self.core.evaluate()
    }

    fn nudge(&mut self, delta: &[f64]) -> Evaluation {
        self.core.nudge(delta)
    }

    fn build_jacobian(&mut self) -> bool {
        self.jacobian.build(&mut self.core, &self.steps)
    }

    fn jacobian(&self, row: usize, col: usize) -> f64 {
        self.jacobian.get(row, col)
    }

    fn residual(&self, row: usize) -> f64 {
        self.core.residuals[row]
    }
}
