use crate::evaluator::Evaluation;

/// Something whose parameters can be displaced and re-evaluated.
pub trait Perturb {
    /// Add `delta` to the parameters and re-evaluate.
    fn nudge(&mut self, delta: &[f64]) -> Evaluation;
    /// Residuals of the last evaluation.
    fn residuals(&self) -> &[f64];
}

/// Dense central-difference Jacobian, stored column-major (`nrows x ncols`).
#[derive(Debug, Clone)]
pub struct Jacobian {
    nrows: usize,
    ncols: usize,
    values: Vec<f64>,
    delta: Vec<f64>,
    plus: Vec<f64>,
}

impl Jacobian {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            values: vec![0.0; nrows * ncols],
            delta: vec![0.0; ncols],
            plus: vec![0.0; nrows],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[col * self.nrows + row]
    }

    /// Rebuild every column around the current point.
    ///
    /// Each column costs three nudges (`+s`, `-2s`, `+s`) with net zero
    /// displacement. Returns `false` as soon as any nudge fails; the
    /// displacement applied so far is backed out before returning.
    pub fn build<P: Perturb + ?Sized>(&mut self, target: &mut P, steps: &[f64]) -> bool {
        debug_assert_eq!(steps.len(), self.ncols);
        self.delta.fill(0.0);
        for (col, &step) in steps.iter().enumerate() {
            self.delta[col] = step;
            if target.nudge(&self.delta).is_failure() {
                return self.back_out(target, col, step);
            }
            self.plus.copy_from_slice(target.residuals());

            self.delta[col] = -2.0 * step;
            if target.nudge(&self.delta).is_failure() {
                return self.back_out(target, col, -step);
            }
            let denom = 2.0 * step;
            let start = col * self.nrows;
            for (row, (&p, &m)) in self.plus.iter().zip(target.residuals()).enumerate() {
                self.values[start + row] = (p - m) / denom;
            }

            self.delta[col] = step;
            if target.nudge(&self.delta).is_failure() {
                self.delta[col] = 0.0;
                return false;
            }
            self.delta[col] = 0.0;
        }
        true
    }

    fn back_out<P: Perturb + ?Sized>(&mut self, target: &mut P, col: usize, applied: f64) -> bool {
        log::debug!("jacobian column {col} aborted by a failed retrace");
        self.delta[col] = -applied;
        if target.nudge(&self.delta).is_failure() {
            log::debug!("jacobian column {col} back-out retrace failed too");
        }
        self.delta[col] = 0.0;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic {
        p: Vec<f64>,
        r: Vec<f64>,
        nudges: usize,
        fail_at: Vec<usize>,
    }

    impl Quadratic {
        fn new(p: Vec<f64>) -> Self {
            Self {
                p,
                r: vec![0.0; 3],
                nudges: 0,
                fail_at: Vec::new(),
            }
        }
    }

    impl Perturb for Quadratic {
        fn nudge(&mut self, delta: &[f64]) -> Evaluation {
            for (p, d) in self.p.iter_mut().zip(delta) {
                *p += d;
            }
            self.nudges += 1;
            if self.fail_at.contains(&self.nudges) {
                return Evaluation::Failure;
            }
            let (x, y) = (self.p[0], self.p[1]);
            self.r[0] = x * x - 2.0 * y;
            self.r[1] = x * y;
            self.r[2] = 3.0 * y * y + x;
            Evaluation::from_residuals(&self.r)
        }

        fn residuals(&self) -> &[f64] {
            &self.r
        }
    }

    #[test]
    fn central_difference_matches_analytic_derivative() {
        let mut q = Quadratic::new(vec![1.5, -0.5]);
        let mut jac = Jacobian::new(3, 2);
        assert!(jac.build(&mut q, &[1e-4, 1e-4]));
        let (x, y) = (1.5, -0.5);
        let expected = [[2.0 * x, -2.0], [y, x], [1.0, 6.0 * y]];
        for (row, exp) in expected.iter().enumerate() {
            for (col, &e) in exp.iter().enumerate() {
                assert!((jac.get(row, col) - e).abs() < 1e-7, "({row},{col})");
            }
        }
        assert_eq!(q.nudges, 6);
        assert!((q.p[0] - 1.5).abs() < 1e-15);
        assert!((q.p[1] + 0.5).abs() < 1e-15);
    }

    #[test]
    fn failure_aborts_and_backs_out() {
        let mut q = Quadratic::new(vec![1.0, 1.0]);
        q.fail_at = vec![5];
        let mut jac = Jacobian::new(3, 2);
        assert!(!jac.build(&mut q, &[0.25, 0.25]));
        // fifth nudge applied -2s to column 1; the back-out restored it.
        assert_eq!(q.nudges, 6);
        assert_eq!(q.p, vec![1.0, 1.0]);
    }

    #[test]
    fn failed_back_out_still_reports_failure() {
        let mut q = Quadratic::new(vec![1.0, 1.0]);
        q.fail_at = vec![2, 3];
        let mut jac = Jacobian::new(3, 2);
        assert!(!jac.build(&mut q, &[0.5, 0.5]));
        // -2s on column 0 failed, then the +s back-out failed as well.
        assert_eq!(q.nudges, 3);
        assert_eq!(q.p, vec![1.0, 1.0]);
        assert!(jac.delta.iter().all(|d| *d == 0.0));
    }
}
