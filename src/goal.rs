/// Target for one ray in a goal column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoalTarget {
    Fixed(f64),
    /// Replaced by the mean observed value of the good rays sharing the tag.
    Ganged(char),
    /// No goal for this ray; contributes a zero residual.
    Unused,
}

/// A goal column of the ray table.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub field: usize,
    /// One target per ray record.
    pub targets: Vec<GoalTarget>,
}

impl Goal {
    pub fn new(field: usize, targets: Vec<GoalTarget>) -> Self {
        Self { field, targets }
    }

    pub fn target(&self, ray: usize) -> GoalTarget {
        self.targets.get(ray).copied().unwrap_or(GoalTarget::Unused)
    }

    fn tags(&self) -> Vec<char> {
        let mut tags: Vec<char> = self
            .targets
            .iter()
            .filter_map(|t| match t {
                GoalTarget::Ganged(tag) => Some(*tag),
                _ => None,
            })
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}

/// Explicit goal columns plus the optional implicit whole-system goal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalSet {
    pub goals: Vec<Goal>,
    pub system_goal: bool,
}

impl GoalSet {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self {
            goals,
            system_goal: false,
        }
    }

    pub fn with_system_goal(mut self, enabled: bool) -> Self {
        self.system_goal = enabled;
        self
    }

    /// Residual rows contributed by every good ray.
    pub fn rows_per_ray(&self) -> usize {
        self.goals.len() + usize::from(self.system_goal)
    }

    pub fn is_empty(&self) -> bool {
        self.rows_per_ray() == 0
    }
}

/// Resolved per-ray targets for one goal after ganged averaging.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedTargets {
    values: Vec<Option<f64>>,
}

impl ResolvedTargets {
    /// Resolve `goal` against the observed values of the good rays.
    ///
    /// `observed(ray)` is only called for good rays. Each ganged tag is
    /// collapsed to the mean of its good rays' observations.
    pub(crate) fn resolve(
        &mut self,
        goal: &Goal,
        nrays: usize,
        is_good: impl Fn(usize) -> bool,
        observed: impl Fn(usize) -> f64,
    ) {
        self.values.clear();
        self.values.extend((0..nrays).map(|ray| match goal.target(ray) {
            GoalTarget::Fixed(v) => Some(v),
            GoalTarget::Ganged(_) | GoalTarget::Unused => None,
        }));

        for tag in goal.tags() {
            let mut sum = 0.0;
            let mut n = 0usize;
            for ray in 0..nrays {
                if goal.target(ray) == GoalTarget::Ganged(tag) && is_good(ray) {
                    sum += observed(ray);
                    n += 1;
                }
            }
            if n == 0 {
                continue;
            }
            let mean = sum / n as f64;
            for ray in 0..nrays {
                if goal.target(ray) == GoalTarget::Ganged(tag) {
                    self.values[ray] = Some(mean);
                }
            }
        }
    }

    pub(crate) fn get(&self, ray: usize) -> Option<f64> {
        self.values.get(ray).copied().flatten()
    }

    /// Rays whose target came from ganged averaging.
    pub(crate) fn ganged<'a>(&'a self, goal: &'a Goal) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.values
            .iter()
            .enumerate()
            .filter(move |(ray, _)| matches!(goal.target(*ray), GoalTarget::Ganged(_)))
            .filter_map(|(ray, v)| v.map(|v| (ray, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ganged_rays_share_the_mean() {
        let goal = Goal::new(
            2,
            vec![
                GoalTarget::Ganged('g'),
                GoalTarget::Ganged('g'),
                GoalTarget::Ganged('g'),
                GoalTarget::Fixed(7.0),
            ],
        );
        let observed = [1.0, 2.0, 3.0, 0.0];
        let mut resolved = ResolvedTargets::default();
        resolved.resolve(&goal, 4, |_| true, |ray| observed[ray]);
        for ray in 0..3 {
            assert_eq!(resolved.get(ray), Some(2.0));
        }
        assert_eq!(resolved.get(3), Some(7.0));
        assert_eq!(resolved.ganged(&goal).count(), 3);
    }

    #[test]
    fn failed_rays_do_not_vote() {
        let goal = Goal::new(0, vec![GoalTarget::Ganged('a'); 3]);
        let observed = [1.0, 100.0, 3.0];
        let mut resolved = ResolvedTargets::default();
        resolved.resolve(&goal, 3, |ray| ray != 1, |ray| observed[ray]);
        assert_eq!(resolved.get(0), Some(2.0));
    }

    #[test]
    fn distinct_tags_average_separately() {
        let goal = Goal::new(
            0,
            vec![
                GoalTarget::Ganged('a'),
                GoalTarget::Ganged('b'),
                GoalTarget::Ganged('a'),
                GoalTarget::Unused,
            ],
        );
        let observed = [0.0, 5.0, 4.0, 9.0];
        let mut resolved = ResolvedTargets::default();
        resolved.resolve(&goal, 4, |_| true, |ray| observed[ray]);
        assert_eq!(resolved.get(0), Some(2.0));
        assert_eq!(resolved.get(1), Some(5.0));
        assert_eq!(resolved.get(3), None);
    }

    #[test]
    fn rows_per_ray_counts_system_goal() {
        let set = GoalSet::new(vec![Goal::new(0, Vec::new())]).with_system_goal(true);
        assert_eq!(set.rows_per_ray(), 2);
        assert!(GoalSet::default().is_empty());
    }
}
