use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};
use std::time::{Duration, Instant};

/// Terminal state of an adjustment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// No further improvement within tolerance. Callers treat this as success.
    Level,
    /// A ray or Jacobian failure, or damping exhausted.
    Bad,
    MaxIterations,
    /// Stopped between outer iterations at the session's request.
    Cancelled,
}

/// How the solver classified one trial step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Accepted, SOS dropped by more than the tolerance.
    Downhill,
    /// Accepted, SOS within tolerance of the baseline.
    Level,
    /// Rejected and reversed; damping boosted.
    Rejected,
    /// Rejected and reversed, but the rise was below tolerance.
    Reverted,
    /// Damped curvature matrix could not be inverted.
    Singular,
    /// The trial retrace failed.
    TraceFailure,
}

impl Verdict {
    pub fn accepted(self) -> bool {
        matches!(self, Self::Downhill | Self::Level)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Downhill => "downhill",
            Self::Level => "level",
            Self::Rejected => "rejected",
            Self::Reverted => "reverted",
            Self::Singular => "singular",
            Self::TraceFailure => "trace failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverStats {
    pub status: SolveStatus,
    pub iterations: usize,
    pub sos: f64,
    pub lambda: f64,
}

/// One inner-loop trial.
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: usize,
    pub sos: f64,
    /// NaN when no trial was evaluated.
    pub trial_sos: f64,
    pub rise: f64,
    /// Damping used for this trial.
    pub lambda: f64,
    pub step_norm: f64,
    pub verdict: Verdict,
}

/// State after one orchestrator tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub iteration: usize,
    pub sos: f64,
    pub lambda: f64,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

/// Observer of a run.
pub trait Reporter {
    fn on_iteration(&mut self, report: &IterationReport);
    fn on_tick(&mut self, _report: &TickReport) {}
    fn on_finish(&mut self, _stats: &SolverStats) {}
}

pub struct StdoutReporter {
    rows: Vec<IterationReport>,
    started: Option<Instant>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            started: None,
        }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_iteration(&mut self, report: &IterationReport) {
        self.started.get_or_insert_with(Instant::now);
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self, stats: &SolverStats) {
        if !self.rows.is_empty() {
            if !log::log_enabled!(log::Level::Info) {
                println!();
            }
            let mut table = Table::new();
            table.load_preset(presets::UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("iter").set_alignment(CellAlignment::Right),
                Cell::new("sos").set_alignment(CellAlignment::Right),
                Cell::new("trial").set_alignment(CellAlignment::Right),
                Cell::new("rise").set_alignment(CellAlignment::Right),
                Cell::new("lambda").set_alignment(CellAlignment::Right),
                Cell::new("step").set_alignment(CellAlignment::Right),
                Cell::new("verdict"),
            ]);
            for row in &self.rows {
                table.add_row(vec![
                    Cell::new(row.iteration).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.4e}", row.sos)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.4e}", row.trial_sos)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.2e}", row.rise)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.1e}", row.lambda)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.1e}", row.step_norm)).set_alignment(CellAlignment::Right),
                    Cell::new(row.verdict.label()),
                ]);
            }
            for line in table.to_string().lines() {
                emit_line(line);
            }
            self.rows.clear();
        }
        emit_line(&format!(
            "status: {:?} after {} iterations, sos {:.6e}",
            stats.status, stats.iterations, stats.sos
        ));
        if let Some(start) = self.started.take() {
            emit_line(&format!("time: {}", format_duration(start.elapsed())));
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{:.3} s", secs)
    } else if secs >= 1e-3 {
        format!("{:.3} ms", secs * 1e3)
    } else {
        format!("{:.0} us", secs * 1e6)
    }
}
