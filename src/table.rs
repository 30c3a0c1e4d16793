/// Table that owns a kind of tunable record.
///
/// Parameter vectors are laid out in this order: every optics adjustable
/// comes before every ray adjustable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    /// Surface prescriptions, one record per surface.
    Optics,
    /// Ray starting conditions and goals, one record per ray.
    Rays,
}

/// Value of a table cell as seen at the bench boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Value(f64),
    /// Blank cell.
    Unused,
    /// Cell text that did not parse as a number.
    Invalid,
}

impl CellValue {
    /// Convert a legacy raw cell where `-0.0` marks an unused cell and
    /// `NaN` a malformed one.
    pub fn from_raw(raw: f64) -> Self {
        if raw.is_nan() {
            Self::Invalid
        } else if raw == 0.0 && raw.is_sign_negative() {
            Self::Unused
        } else {
            Self::Value(raw)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unused | Self::Invalid => None,
        }
    }

    pub fn is_invalid(self) -> bool {
        matches!(self, Self::Invalid)
    }
}

/// The optical bench the adjuster drives: table storage plus the ray tracer.
///
/// Table accessors are only called by the nudger and the evaluator; the
/// solver itself never touches the bench.
pub trait OpticalBench {
    /// Number of records in a table.
    fn record_count(&self, domain: Domain) -> usize;

    /// Read a table cell.
    fn cell(&self, domain: Domain, record: usize, field: usize) -> CellValue;

    /// Write a table cell. Called for every value touched by a nudge.
    fn set_cell(&mut self, domain: Domain, record: usize, field: usize, value: f64);

    /// Trace the rays and return how many still trace successfully.
    ///
    /// With `only_previously_good` set, rays that failed earlier must not be
    /// attempted again.
    fn retrace(&mut self, only_previously_good: bool) -> usize;

    /// Whether `ray` traced successfully on the last retrace.
    fn is_good(&self, ray: usize) -> bool;

    /// Observed value of the goal column `field` for `ray` after the last retrace.
    fn observed(&self, ray: usize, field: usize) -> f64;

    /// Observed value of the implicit whole-system goal for `ray`.
    fn system_metric(&self, _ray: usize) -> f64 {
        0.0
    }

    /// Display the averaged target of a ganged goal.
    fn show_goal(&mut self, _ray: usize, _field: usize, _value: f64) {}

    /// Characteristic size of the system, used to scale linear steps.
    fn system_size(&self) -> f64;

    /// Largest radius among the good rays at optics record `surface`.
    fn max_ray_radius(&self, surface: usize) -> f64;
}

impl<B: OpticalBench + ?Sized> OpticalBench for &mut B {
    fn record_count(&self, domain: Domain) -> usize {
        (**self).record_count(domain)
    }

    fn cell(&self, domain: Domain, record: usize, field: usize) -> CellValue {
        (**self).cell(domain, record, field)
    }

    fn set_cell(&mut self, domain: Domain, record: usize, field: usize, value: f64) {
        (**self).set_cell(domain, record, field, value)
    }

    fn retrace(&mut self, only_previously_good: bool) -> usize {
        (**self).retrace(only_previously_good)
    }

    fn is_good(&self, ray: usize) -> bool {
        (**self).is_good(ray)
    }

    fn observed(&self, ray: usize, field: usize) -> f64 {
        (**self).observed(ray, field)
    }

    fn system_metric(&self, ray: usize) -> f64 {
        (**self).system_metric(ray)
    }

    fn show_goal(&mut self, ray: usize, field: usize, value: f64) {
        (**self).show_goal(ray, field, value)
    }

    fn system_size(&self) -> f64 {
        (**self).system_size()
    }

    fn max_ray_radius(&self, surface: usize) -> f64 {
        (**self).max_ray_radius(surface)
    }
}
