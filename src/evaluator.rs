use crate::goal::{GoalSet, ResolvedTargets};
use crate::table::{Domain, OpticalBench};

/// Outcome of a retrace-and-residual pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// Sum of squared residuals.
    Sos(f64),
    /// The retrace lost rays or produced non-finite residuals.
    Failure,
}

impl Evaluation {
    pub(crate) fn from_residuals(residuals: &[f64]) -> Self {
        let sos: f64 = residuals.iter().map(|r| r * r).sum();
        if sos.is_finite() {
            Self::Sos(sos)
        } else {
            Self::Failure
        }
    }

    pub fn sos(self) -> Option<f64> {
        match self {
            Self::Sos(sos) => Some(sos),
            Self::Failure => None,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// Builds the residual vector from the bench after each retrace.
#[derive(Debug, Clone)]
pub struct ResidualEvaluator {
    goals: GoalSet,
    expected_good: usize,
    residuals: Vec<f64>,
    resolved: Vec<ResolvedTargets>,
}

impl ResidualEvaluator {
    /// `expected_good` is the good-ray count recorded at setup.
    pub fn new(goals: GoalSet, expected_good: usize) -> Self {
        let npts = expected_good * goals.rows_per_ray();
        let resolved = vec![ResolvedTargets::default(); goals.goals.len()];
        Self {
            goals,
            expected_good,
            residuals: vec![0.0; npts],
            resolved,
        }
    }

    /// Residual vector length.
    pub fn npts(&self) -> usize {
        self.residuals.len()
    }

    pub fn expected_good(&self) -> usize {
        self.expected_good
    }

    pub fn goals(&self) -> &GoalSet {
        &self.goals
    }

    /// Residuals of the last successful evaluation.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Retrace the previously good rays and rebuild the residual vector.
    pub fn evaluate<B: OpticalBench + ?Sized>(&mut self, bench: &mut B) -> Evaluation {
        let good = bench.retrace(true);
        if good != self.expected_good {
            log::debug!(
                "retrace kept {good} of {} rays; evaluation failed",
                self.expected_good
            );
            return Evaluation::Failure;
        }

        let nrays = bench.record_count(Domain::Rays);
        for (goal, resolved) in self.goals.goals.iter().zip(self.resolved.iter_mut()) {
            let view: &B = bench;
            resolved.resolve(
                goal,
                nrays,
                |ray| view.is_good(ray),
                |ray| view.observed(ray, goal.field),
            );
            for (ray, mean) in resolved.ganged(goal) {
                bench.show_goal(ray, goal.field, mean);
            }
        }

        let mut row = 0;
        for ray in 0..nrays {
            if !bench.is_good(ray) {
                continue;
            }
            if row + self.goals.rows_per_ray() > self.residuals.len() {
                log::debug!("more good rays than recorded at setup; evaluation failed");
                return Evaluation::Failure;
            }
            for (goal, resolved) in self.goals.goals.iter().zip(&self.resolved) {
                self.residuals[row] = match resolved.get(ray) {
                    Some(target) => bench.observed(ray, goal.field) - target,
                    None => 0.0,
                };
                row += 1;
            }
            if self.goals.system_goal {
                self.residuals[row] = bench.system_metric(ray);
                row += 1;
            }
        }
        if row != self.residuals.len() {
            log::debug!("good-ray flags disagree with retrace count; evaluation failed");
            return Evaluation::Failure;
        }

        let evaluation = Evaluation::from_residuals(&self.residuals);
        if evaluation.is_failure() {
            log::debug!("non-finite residual; evaluation failed");
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{Goal, GoalTarget};
    use crate::table::memory::MemoryBench;

    fn bench() -> MemoryBench {
        MemoryBench::new(
            vec![vec![1.0]],
            vec![vec![1.0, 5.0], vec![2.0, 7.0], vec![3.0, 9.0]],
        )
    }

    #[test]
    fn rows_are_ray_major_with_system_goal_last() {
        let mut bench = bench();
        let goals = GoalSet::new(vec![Goal::new(
            1,
            vec![GoalTarget::Fixed(4.0), GoalTarget::Unused, GoalTarget::Fixed(10.0)],
        )])
        .with_system_goal(true);
        let good = bench.retrace(false);
        let mut evaluator = ResidualEvaluator::new(goals, good);
        assert_eq!(evaluator.npts(), 6);
        assert_eq!(evaluator.evaluate(&mut bench), Evaluation::Sos(5.5));
        assert_eq!(evaluator.residuals(), &[1.0, 0.5, 0.0, 1.0, -1.0, 1.5]);
    }

    #[test]
    fn ganged_targets_are_shown_and_shared() {
        let mut bench = bench();
        let goals = GoalSet::new(vec![Goal::new(
            1,
            vec![GoalTarget::Ganged('a'), GoalTarget::Ganged('a'), GoalTarget::Fixed(9.0)],
        )]);
        let mut evaluator = ResidualEvaluator::new(goals, bench.retrace(false));
        assert_eq!(evaluator.evaluate(&mut bench), Evaluation::Sos(2.0));
        assert_eq!(evaluator.residuals(), &[-1.0, 1.0, 0.0]);
        assert_eq!(bench.shown, vec![(0, 1, 6.0), (1, 1, 6.0)]);
    }

    #[test]
    fn losing_a_ray_fails_the_evaluation() {
        let mut bench = bench();
        let goals = GoalSet::new(vec![Goal::new(1, vec![GoalTarget::Fixed(0.0); 3])]);
        let mut evaluator = ResidualEvaluator::new(goals, bench.retrace(false));
        assert!(!evaluator.evaluate(&mut bench).is_failure());
        bench.lost[1] = true;
        assert_eq!(evaluator.evaluate(&mut bench), Evaluation::Failure);
        bench.lost[1] = false;
        // a ray lost once stays lost
        assert_eq!(evaluator.evaluate(&mut bench), Evaluation::Failure);
    }

    #[test]
    fn rays_bad_at_setup_contribute_no_rows() {
        let mut bench = bench();
        bench.lost[2] = true;
        let goals = GoalSet::new(vec![Goal::new(1, vec![GoalTarget::Fixed(5.0); 3])]);
        let mut evaluator = ResidualEvaluator::new(goals, bench.retrace(false));
        assert_eq!(evaluator.npts(), 2);
        assert_eq!(evaluator.evaluate(&mut bench), Evaluation::Sos(4.0));
    }
}
