//! Receding-horizon driver.
//!
//! Each horizon runs
//!
//! ```text
//! BUILD → SOLVE → CHECK_VOLTAGE ─┬─ converged ──────────────→ ROLL_FORWARD
//!   ↑                            └─ gap > tol, below cap ─┐
//!   └─────────────────────── ITERATE ←─────────────────────┘
//! ```
//!
//! The voltage estimate and the initial conditions are the only state carried
//! from one solve to the next and are owned here. A non-optimal solve marks
//! the horizon failed and skips result extraction, but dates and the voltage
//! estimate still advance. Hitting the iteration cap is a warning; the last
//! iterate is accepted.

use chrono::{Duration, NaiveDateTime};
use mgopt_core::DispatchConfig;
use serde::Serialize;

use crate::assemble::{HorizonContext, HorizonModel};
use crate::error::{DispatchError, DispatchResult};
use crate::forecast::{Forecast, HorizonInputs};
use crate::preprocess::PreparedPlant;
use crate::solver::{SolveStatus, Solution, SolverBackend};
use crate::state::{HorizonState, VoltageEstimate};
use crate::topology::Topology;

/// Summary of one horizon, as written to the result stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonReport {
    pub index: usize,
    pub start: NaiveDateTime,
    pub status: SolveStatus,
    /// Fixed-point iterations, equal to solver calls
    pub iterations: usize,
    pub converged: bool,
    /// Largest `|solved − estimate|` of the last iteration
    pub max_gap: f64,
    /// Objective in dollars, when optimal
    pub objective: Option<f64>,
}

impl HorizonReport {
    pub fn is_failed(&self) -> bool {
        self.status != SolveStatus::Optimal
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub horizons: Vec<HorizonReport>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.horizons.iter().filter(|h| h.is_failed()).count()
    }

    pub fn non_converged(&self) -> usize {
        self.horizons
            .iter()
            .filter(|h| !h.is_failed() && !h.converged)
            .count()
    }

    pub fn total_cost(&self) -> f64 {
        self.horizons.iter().filter_map(|h| h.objective).sum()
    }
}

/// Receives `(time, name, value)` triples in time order, bracketed per
/// horizon. A failed horizon gets `begin_horizon` and `end_horizon` only.
pub trait ResultSink {
    fn begin_horizon(&mut self, index: usize, start: NaiveDateTime) -> DispatchResult<()>;

    fn record(&mut self, time: NaiveDateTime, name: &str, value: f64) -> DispatchResult<()>;

    fn end_horizon(&mut self, report: &HorizonReport) -> DispatchResult<()>;
}

/// In-memory sink, mostly for tests and small runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub rows: Vec<(usize, NaiveDateTime, String, f64)>,
    pub reports: Vec<HorizonReport>,
    current: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values recorded for `name`, across all horizons.
    pub fn series(&self, name: &str) -> Vec<(NaiveDateTime, f64)> {
        self.rows
            .iter()
            .filter(|r| r.2 == name)
            .map(|r| (r.1, r.3))
            .collect()
    }
}

impl ResultSink for MemorySink {
    fn begin_horizon(&mut self, index: usize, _start: NaiveDateTime) -> DispatchResult<()> {
        self.current = index;
        Ok(())
    }

    fn record(&mut self, time: NaiveDateTime, name: &str, value: f64) -> DispatchResult<()> {
        self.rows.push((self.current, time, name.to_string(), value));
        Ok(())
    }

    fn end_horizon(&mut self, report: &HorizonReport) -> DispatchResult<()> {
        self.reports.push(report.clone());
        Ok(())
    }
}

/// Internal phase, logged at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Build,
    Solve,
    CheckVoltage,
    Iterate,
    Converged,
    RollForward,
}

/// Outcome of the fixed-point loop for one horizon.
struct HorizonOutcome {
    model: HorizonModel,
    solution: Solution,
    report: HorizonReport,
}

/// Sequential build/solve/check/roll loop over a prepared plant.
pub struct RecedingHorizon<'a> {
    prepared: &'a PreparedPlant,
    topology: &'a Topology,
    config: &'a DispatchConfig,
    forecast: &'a dyn Forecast,
    backend: &'a dyn SolverBackend,
    voltage: VoltageEstimate,
    state: HorizonState,
    start: NaiveDateTime,
    index: usize,
}

impl<'a> RecedingHorizon<'a> {
    pub fn new(
        prepared: &'a PreparedPlant,
        topology: &'a Topology,
        config: &'a DispatchConfig,
        forecast: &'a dyn Forecast,
        backend: &'a dyn SolverBackend,
        start: NaiveDateTime,
    ) -> Self {
        Self {
            prepared,
            topology,
            config,
            forecast,
            backend,
            voltage: VoltageEstimate::uniform(
                topology.electric_nodes.len(),
                config.horizon.steps,
                config.voltage.upper_squared(),
            ),
            state: HorizonState::initial(prepared),
            start,
            index: 0,
        }
    }

    pub fn voltage(&self) -> &VoltageEstimate {
        &self.voltage
    }

    pub fn state(&self) -> &HorizonState {
        &self.state
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    fn step(&self) -> Duration {
        Duration::minutes(self.config.horizon.step_minutes)
    }

    fn dates(&self) -> Vec<NaiveDateTime> {
        (0..self.config.horizon.steps as i32)
            .map(|t| self.start + self.step() * t)
            .collect()
    }

    /// Runs `horizons` consecutive horizons, streaming results into `sink`.
    pub fn run(&mut self, horizons: usize, sink: &mut dyn ResultSink) -> DispatchResult<RunReport> {
        let mut run = RunReport::default();
        for _ in 0..horizons {
            let report = self.run_horizon(sink)?;
            run.horizons.push(report);
        }
        tracing::info!(
            horizons = run.horizons.len(),
            failed = run.failed(),
            non_converged = run.non_converged(),
            total_cost = run.total_cost(),
            "run finished"
        );
        Ok(run)
    }

    /// One full horizon including roll-forward.
    pub fn run_horizon(&mut self, sink: &mut dyn ResultSink) -> DispatchResult<HorizonReport> {
        let dates = self.dates();
        sink.begin_horizon(self.index, self.start)?;
        let renewable_nodes: Vec<usize> = self
            .prepared
            .renewables
            .iter()
            .map(|r| r.node.value())
            .collect();
        let inputs = HorizonInputs::gather(self.forecast, self.topology, &renewable_nodes, &dates)?;

        let outcome = self.fixed_point(&inputs)?;
        let report = &outcome.report;
        if report.is_failed() {
            tracing::warn!(
                horizon = report.index,
                start = %report.start,
                status = %report.status,
                "horizon failed, no schedule recorded"
            );
        } else {
            for (t, name, value) in outcome.model.rows(&outcome.solution) {
                sink.record(dates[t], name, value)?;
            }
            tracing::info!(
                horizon = report.index,
                start = %report.start,
                iterations = report.iterations,
                converged = report.converged,
                max_gap = report.max_gap,
                objective = report.objective.unwrap_or(f64::NAN),
                "horizon solved"
            );
        }
        sink.end_horizon(report)?;

        tracing::trace!(phase = ?Phase::RollForward, horizon = self.index);
        if !report.is_failed() {
            self.state = outcome.model.carried_state(&outcome.solution);
        }
        self.voltage.shift();
        self.start += self.step();
        self.index += 1;
        Ok(outcome.report)
    }

    fn fixed_point(&mut self, inputs: &HorizonInputs) -> DispatchResult<HorizonOutcome> {
        let cap = self.config.voltage.max_iterations;
        let mut iteration = 0;
        loop {
            iteration += 1;
            tracing::trace!(phase = ?Phase::Build, horizon = self.index, iteration);
            let ctx = HorizonContext {
                prepared: self.prepared,
                topology: self.topology,
                config: self.config,
                inputs,
                voltage: &self.voltage,
                state: &self.state,
            };
            let model = HorizonModel::build(&ctx)?;

            tracing::trace!(phase = ?Phase::Solve, backend = self.backend.id());
            let solution = self.backend.solve(model.problem())?;
            if !solution.is_optimal() {
                let report = HorizonReport {
                    index: self.index,
                    start: self.start,
                    status: solution.status,
                    iterations: iteration,
                    converged: false,
                    max_gap: f64::NAN,
                    objective: None,
                };
                return Ok(HorizonOutcome {
                    model,
                    solution,
                    report,
                });
            }
            if solution.values.len() != model.problem().num_vars() {
                return Err(DispatchError::Solver(format!(
                    "{} returned {} values for {} variables",
                    self.backend.id(),
                    solution.values.len(),
                    model.problem().num_vars()
                )));
            }

            tracing::trace!(phase = ?Phase::CheckVoltage, iteration);
            let solved = model.solved_voltage(&solution);
            let check = self.voltage.update(
                &solved,
                self.config.voltage.tolerance,
                self.config.voltage.nudge,
            );
            tracing::debug!(
                horizon = self.index,
                iteration,
                max_gap = check.max_gap,
                "voltage fixed-point step"
            );

            let done = check.converged || iteration >= cap;
            if !done {
                tracing::trace!(phase = ?Phase::Iterate, iteration);
                continue;
            }
            if check.converged {
                tracing::trace!(phase = ?Phase::Converged, iteration);
            } else {
                tracing::warn!(
                    horizon = self.index,
                    iterations = iteration,
                    max_gap = check.max_gap,
                    "voltage iteration limit exceeded, continuing with best approximation"
                );
            }
            let report = HorizonReport {
                index: self.index,
                start: self.start,
                status: SolveStatus::Optimal,
                iterations: iteration,
                converged: check.converged,
                max_gap: check.max_gap,
                objective: Some(solution.objective),
            };
            return Ok(HorizonOutcome {
                model,
                solution,
                report,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn memory_sink_keeps_horizon_index() {
        let t0 = NaiveDate::from_ymd_opt(2011, 7, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let mut sink = MemorySink::new();
        sink.begin_horizon(3, t0).unwrap();
        sink.record(t0, "gt1.output_kw", 10.0).unwrap();
        assert_eq!(sink.rows[0].0, 3);
        assert_eq!(sink.series("gt1.output_kw"), vec![(t0, 10.0)]);
    }

    #[test]
    fn run_report_counts() {
        let t0 = NaiveDate::from_ymd_opt(2011, 7, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let base = HorizonReport {
            index: 0,
            start: t0,
            status: SolveStatus::Optimal,
            iterations: 2,
            converged: true,
            max_gap: 0.0,
            objective: Some(5.0),
        };
        let run = RunReport {
            horizons: vec![
                base.clone(),
                HorizonReport {
                    converged: false,
                    objective: Some(1.5),
                    ..base.clone()
                },
                HorizonReport {
                    status: SolveStatus::Infeasible,
                    objective: None,
                    converged: false,
                    ..base
                },
            ],
        };
        assert_eq!(run.failed(), 1);
        assert_eq!(run.non_converged(), 1);
        assert_eq!(run.total_cost(), 6.5);
    }
}
