use crate::adjustable::{AdjustableSet, Adjustment};
use crate::evaluator::{Evaluation, ResidualEvaluator};
use crate::table::OpticalBench;

/// Per-parameter displacement accumulated since the last checkpoint.
///
/// Values are written as `anchor + displacement`, so any sequence of nudges
/// whose deltas cancel exactly writes the anchors back bit-for-bit.
#[derive(Debug, Clone)]
pub(crate) struct Displacement {
    offsets: Vec<f64>,
}

impl Displacement {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            offsets: vec![0.0; n],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.offsets.fill(0.0);
    }

    pub(crate) fn accumulate(&mut self, delta: &[f64]) {
        for (offset, d) in self.offsets.iter_mut().zip(delta) {
            *offset += d;
        }
    }

    pub(crate) fn get(&self, i: usize) -> f64 {
        self.offsets[i]
    }
}

/// Anchored cell values of one adjustable.
#[derive(Debug, Clone)]
struct Anchor {
    master: f64,
    slaves: Vec<f64>,
}

/// Applies parameter deltas to masters and their slaves in the bench tables.
#[derive(Debug, Clone)]
pub struct ParameterNudger {
    adjustables: AdjustableSet,
    anchors: Vec<Anchor>,
    displacement: Displacement,
}

fn read<B: OpticalBench + ?Sized>(bench: &B, adj: &Adjustment, record: usize) -> f64 {
    bench.cell(adj.domain, record, adj.field).value().unwrap_or(0.0)
}

impl ParameterNudger {
    pub fn new<B: OpticalBench + ?Sized>(adjustables: AdjustableSet, bench: &B) -> Self {
        let n = adjustables.len();
        let mut nudger = Self {
            adjustables,
            anchors: Vec::with_capacity(n),
            displacement: Displacement::new(n),
        };
        nudger.checkpoint(bench);
        nudger
    }

    pub fn len(&self) -> usize {
        self.adjustables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjustables.is_empty()
    }

    pub fn adjustables(&self) -> &AdjustableSet {
        &self.adjustables
    }

    /// Re-read the current table values as the new anchors.
    pub fn checkpoint<B: OpticalBench + ?Sized>(&mut self, bench: &B) {
        self.anchors.clear();
        for adj in self.adjustables.iter() {
            self.anchors.push(Anchor {
                master: read(bench, adj, adj.record),
                slaves: adj.slaves.iter().map(|s| read(bench, adj, s.record)).collect(),
            });
        }
        self.displacement.reset();
    }

    /// Current value of every master, in parameter-vector order.
    pub fn values(&self) -> Vec<f64> {
        self.anchors
            .iter()
            .enumerate()
            .map(|(i, a)| a.master + self.displacement.get(i))
            .collect()
    }

    /// Apply `delta` to the tables without retracing.
    pub fn apply<B: OpticalBench + ?Sized>(&mut self, bench: &mut B, delta: &[f64]) {
        debug_assert_eq!(delta.len(), self.len());
        self.displacement.accumulate(delta);
        for (i, (adj, anchor)) in self.adjustables.iter().zip(&self.anchors).enumerate() {
            let d = self.displacement.get(i);
            bench.set_cell(adj.domain, adj.record, adj.field, anchor.master + d);
            for (slave, value) in adj.slaves.iter().zip(&anchor.slaves) {
                bench.set_cell(adj.domain, slave.record, adj.field, value + slave.sense.sign() * d);
            }
        }
    }

    /// Apply `delta`, retrace, and return the new evaluation.
    pub fn nudge<B: OpticalBench + ?Sized>(
        &mut self,
        bench: &mut B,
        evaluator: &mut ResidualEvaluator,
        delta: &[f64],
    ) -> Evaluation {
        self.apply(bench, delta);
        evaluator.evaluate(bench)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustable::{AttributeKind, Sense, Slave};
    use crate::table::memory::MemoryBench;
    use crate::table::Domain;

    fn ganged() -> AdjustableSet {
        AdjustableSet::from_adjustments(vec![Adjustment {
            domain: Domain::Optics,
            record: 0,
            field: 0,
            kind: AttributeKind::Position,
            slaves: vec![
                Slave {
                    record: 1,
                    sense: Sense::Same,
                },
                Slave {
                    record: 2,
                    sense: Sense::Opposite,
                },
            ],
        }])
    }

    fn column(bench: &MemoryBench) -> Vec<f64> {
        bench.optics.iter().map(|r| r[0]).collect()
    }

    #[test]
    fn slaves_follow_with_their_sense() {
        let mut bench = MemoryBench::new(vec![vec![1.0], vec![2.0], vec![3.0]], vec![]);
        let mut nudger = ParameterNudger::new(ganged(), &bench);
        nudger.apply(&mut bench, &[0.5]);
        assert_eq!(column(&bench), vec![1.5, 2.5, 2.5]);
        assert_eq!(bench.writes, 3);
        nudger.apply(&mut bench, &[-0.5]);
        assert_eq!(column(&bench), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cancelling_nudges_restore_bits_exactly() {
        let start = vec![vec![0.1], vec![0.7], vec![-3.3]];
        let mut bench = MemoryBench::new(start.clone(), vec![]);
        let mut nudger = ParameterNudger::new(ganged(), &bench);
        for d in [1e-7, 1.0 / 3.0, 123.456] {
            nudger.apply(&mut bench, &[d]);
            nudger.apply(&mut bench, &[-2.0 * d]);
            nudger.apply(&mut bench, &[d]);
        }
        assert_eq!(bench.optics, start);
    }

    #[test]
    fn checkpoint_moves_the_anchor() {
        let mut bench = MemoryBench::new(vec![vec![1.0], vec![2.0], vec![3.0]], vec![]);
        let mut nudger = ParameterNudger::new(ganged(), &bench);
        nudger.apply(&mut bench, &[0.25]);
        nudger.checkpoint(&bench);
        assert_eq!(nudger.values(), vec![1.25]);
        nudger.apply(&mut bench, &[-0.25]);
        assert_eq!(column(&bench), vec![1.0, 2.0, 3.0]);
    }
}
