use crate::adjustable::{Adjustment, AttributeKind};
use crate::table::{Domain, OpticalBench};

/// Multiple of the base step used for angular attributes.
pub const ANGLE_STEP_FACTOR: f64 = 10.0;
/// Smallest step magnitude ever returned.
pub const MIN_STEP: f64 = 1e-15;

const NEGLIGIBLE_RADIUS: f64 = 1e-12;

/// Ray geometry captured once at setup from the initial good-ray set.
#[derive(Debug, Clone, Default)]
pub struct RayGeometry {
    pub system_size: f64,
    /// Largest good-ray radius per optics record.
    pub radii: Vec<f64>,
}

impl RayGeometry {
    pub fn capture(bench: &impl OpticalBench) -> Self {
        let radii = (0..bench.record_count(Domain::Optics))
            .map(|surface| bench.max_ray_radius(surface))
            .collect();
        Self {
            system_size: bench.system_size(),
            radii,
        }
    }

    /// Radius used for curvature-like steps, falling back to half the system size.
    fn radius_at(&self, adj: &Adjustment) -> f64 {
        let r = match adj.domain {
            Domain::Optics => self.radii.get(adj.record).copied().unwrap_or(0.0),
            Domain::Rays => 0.0,
        };
        if r.abs() > NEGLIGIBLE_RADIUS {
            r.abs()
        } else {
            0.5 * self.system_size.abs()
        }
    }
}

/// Finite-difference step heuristic for Jacobian estimation.
#[derive(Debug, Clone, Copy)]
pub struct StepSizePolicy {
    pub base_step: f64,
}

impl Default for StepSizePolicy {
    fn default() -> Self {
        Self { base_step: 1e-6 }
    }
}

impl StepSizePolicy {
    pub fn new(base_step: f64) -> Self {
        Self { base_step }
    }

    /// Differencing step for one adjustable; finite and never zero.
    pub fn step(&self, adj: &Adjustment, geometry: &RayGeometry) -> f64 {
        let raw = match adj.kind {
            AttributeKind::Position => self.base_step * geometry.system_size.abs(),
            AttributeKind::Angle => ANGLE_STEP_FACTOR * self.base_step,
            AttributeKind::Curvature => self.base_step / geometry.radius_at(adj),
            AttributeKind::Polynomial(order) if order > 0 => {
                let r = geometry.radius_at(adj);
                self.base_step / (order as f64 * r.powi(order as i32 - 1))
            }
            AttributeKind::Polynomial(_) | AttributeKind::Conic | AttributeKind::Other => {
                self.base_step
            }
        };
        self.clamp(raw)
    }

    /// Step for a parameter with no physical kind.
    pub fn plain_step(&self) -> f64 {
        self.clamp(self.base_step)
    }

    fn clamp(&self, raw: f64) -> f64 {
        let step = if raw.is_finite() { raw } else { self.base_step };
        if step.is_finite() {
            step.abs().max(MIN_STEP)
        } else {
            MIN_STEP
        }
    }

    /// Steps for every adjustable, in parameter-vector order.
    pub fn steps<'a>(
        &self,
        adjustments: impl IntoIterator<Item = &'a Adjustment>,
        geometry: &RayGeometry,
    ) -> Vec<f64> {
        adjustments
            .into_iter()
            .map(|adj| self.step(adj, geometry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(kind: AttributeKind, record: usize) -> Adjustment {
        Adjustment {
            domain: Domain::Optics,
            record,
            field: 0,
            kind,
            slaves: Vec::new(),
        }
    }

    fn geometry() -> RayGeometry {
        RayGeometry {
            system_size: 40.0,
            radii: vec![5.0, 0.0],
        }
    }

    #[test]
    fn kinds_scale_as_documented() {
        let policy = StepSizePolicy::new(1e-6);
        let g = geometry();
        assert!((policy.step(&adj(AttributeKind::Position, 0), &g) - 4e-5).abs() < 1e-18);
        assert!((policy.step(&adj(AttributeKind::Angle, 0), &g) - 1e-5).abs() < 1e-18);
        assert!((policy.step(&adj(AttributeKind::Curvature, 0), &g) - 2e-7).abs() < 1e-18);
        let quartic = policy.step(&adj(AttributeKind::Polynomial(4), 0), &g);
        assert!((quartic - 1e-6 / (4.0 * 125.0)).abs() < 1e-20);
        assert_eq!(policy.step(&adj(AttributeKind::Conic, 0), &g), 1e-6);
    }

    #[test]
    fn negligible_radius_falls_back_to_half_size() {
        let policy = StepSizePolicy::new(1e-6);
        let step = policy.step(&adj(AttributeKind::Curvature, 1), &geometry());
        assert!((step - 1e-6 / 20.0).abs() < 1e-20);
    }

    #[test]
    fn step_is_never_zero() {
        let policy = StepSizePolicy::new(1e-6);
        let flat = RayGeometry {
            system_size: 0.0,
            radii: vec![0.0],
        };
        assert!(policy.step(&adj(AttributeKind::Position, 0), &flat) > 0.0);
        assert!(policy.step(&adj(AttributeKind::Curvature, 0), &flat) > 0.0);
        assert!(StepSizePolicy::new(0.0).plain_step() > 0.0);
    }
}
