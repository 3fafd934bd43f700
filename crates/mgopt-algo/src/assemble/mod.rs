//! Per-horizon model assembly.
//!
//! [`HorizonModel::build`] turns the prepared plant, the topology, one
//! horizon of forecast values, the current voltage estimate and the carried
//! initial conditions into a fresh [`Problem`]. Nothing in here mutates its
//! inputs. The model is dropped once its solution has been read back.
//!
//! Constraint families, each generated over (node or unit) × step:
//!
//! | Family | Module |
//! |--------|--------|
//! | electric P/Q balance, heat and cooling balance | [`network`] |
//! | slack pinning, voltage bounds, current limits | [`network`] |
//! | line pairing, voltage product surrogate | [`network`] |
//! | piecewise commitment, fuel cones, ramps | [`units`] |
//! | storage state | [`storage`] |
//! | cost | [`objective`] |

pub mod network;
pub mod objective;
pub mod storage;
pub mod units;
pub mod variables;

use mgopt_core::{DispatchConfig, EnergyCarrier};

use crate::error::DispatchResult;
use crate::forecast::HorizonInputs;
use crate::model::{Problem, VarId, VariableCollection};
use crate::preprocess::PreparedPlant;
use crate::solver::Solution;
use crate::state::{HorizonState, VoltageEstimate};
use crate::topology::Topology;

pub use variables::Families;

/// Read-only inputs of one build.
#[derive(Debug, Clone, Copy)]
pub struct HorizonContext<'a> {
    pub prepared: &'a PreparedPlant,
    pub topology: &'a Topology,
    pub config: &'a DispatchConfig,
    pub inputs: &'a HorizonInputs,
    pub voltage: &'a VoltageEstimate,
    pub state: &'a HorizonState,
}

impl HorizonContext<'_> {
    pub fn steps(&self) -> usize {
        self.inputs.steps()
    }
}

/// One reported quantity at one step, in physical units after `scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportVar {
    pub label: String,
    pub t: usize,
    pub var: VarId,
    pub scale: f64,
}

/// Problem plus the variable families needed to read its solution.
#[derive(Debug, Clone)]
pub struct HorizonModel {
    problem: Problem,
    vars: Families,
    report: Vec<ReportVar>,
}

impl HorizonModel {
    pub fn build(ctx: &HorizonContext<'_>) -> DispatchResult<Self> {
        let mut problem = Problem::new();
        let vars = Families::create(&mut problem, ctx)?;
        let state = ctx.state;
        let prepared = ctx.prepared;

        network::electric_balance(&mut problem, ctx, &vars)?;
        network::thermal_balance(&mut problem, ctx, &vars, EnergyCarrier::Heat)?;
        network::thermal_balance(&mut problem, ctx, &vars, EnergyCarrier::Cooling)?;
        network::slack_limits(&mut problem, ctx, &vars);
        network::voltage_bounds(&mut problem, ctx, &vars)?;
        network::current_limits(&mut problem, ctx, &vars)?;
        network::line_pairing(&mut problem, ctx, &vars)?;
        network::voltage_surrogate(&mut problem, ctx, &vars)?;

        units::generators(&mut problem, ctx, &prepared.turbines, &vars.turbines, &state.turbines)?;
        units::generators(&mut problem, ctx, &prepared.diesels, &vars.diesels, &state.diesels)?;
        units::converters(
            &mut problem,
            ctx,
            &prepared.boilers,
            &vars.boilers,
            None,
            &state.boilers,
        )?;
        units::converters(
            &mut problem,
            ctx,
            &prepared.chillers,
            &vars.chillers,
            Some(&vars.chiller_reactive),
            &state.chillers,
        )?;

        let steps = ctx.steps();
        storage::dynamics(
            &mut problem,
            &prepared.electric_storage,
            &vars.electric_storage,
            &state.electric_storage,
            steps,
        )?;
        storage::dynamics(
            &mut problem,
            &prepared.heat_storage,
            &vars.heat_storage,
            &state.heat_storage,
            steps,
        )?;
        storage::dynamics(
            &mut problem,
            &prepared.cooling_storage,
            &vars.cooling_storage,
            &state.cooling_storage,
            steps,
        )?;

        problem.set_objective(objective::build(ctx, &vars));
        let report = report_vars(ctx, &vars)?;

        tracing::debug!(
            vars = problem.num_vars(),
            binaries = problem.binaries().count(),
            constraints = problem.constraints().len(),
            steps,
            "horizon model built"
        );
        Ok(Self {
            problem,
            vars,
            report,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn families(&self) -> &Families {
        &self.vars
    }

    pub fn report(&self) -> &[ReportVar] {
        &self.report
    }

    /// Column labels, in report order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.report
            .iter()
            .filter(|r| r.t == 0)
            .map(|r| r.label.as_str())
    }

    /// `(t, label, physical value)` in time order.
    pub fn rows<'a>(
        &'a self,
        solution: &'a Solution,
    ) -> impl Iterator<Item = (usize, &'a str, f64)> + 'a {
        self.report
            .iter()
            .map(move |r| (r.t, r.label.as_str(), solution.value(r.var) * r.scale))
    }

    /// Solved squared voltage, `[electric node position][t]`.
    pub fn solved_voltage(&self, solution: &Solution) -> Vec<Vec<f64>> {
        let voltage = &self.vars.network.voltage;
        let nodes = voltage.iter().map(|(k, _)| k[0] + 1).max().unwrap_or(0);
        (0..nodes)
            .map(|pos| {
                voltage
                    .series(1, &[pos])
                    .iter()
                    .map(|&v| solution.value(v))
                    .collect()
            })
            .collect()
    }

    /// Initial conditions for the next horizon: first-step outputs and
    /// storage states.
    pub fn carried_state(&self, solution: &Solution) -> HorizonState {
        let first = |c: &VariableCollection| -> Vec<f64> {
            c.series(0, &[0]).iter().map(|&v| solution.value(v)).collect()
        };
        HorizonState {
            turbines: first(&self.vars.turbines.output),
            diesels: first(&self.vars.diesels.output),
            boilers: first(&self.vars.boilers.output),
            chillers: first(&self.vars.chillers.output),
            electric_storage: first(&self.vars.electric_storage.state),
            heat_storage: first(&self.vars.heat_storage.state),
            cooling_storage: first(&self.vars.cooling_storage.state),
        }
    }
}

fn report_vars(ctx: &HorizonContext<'_>, vars: &Families) -> DispatchResult<Vec<ReportVar>> {
    let bases = &ctx.config.bases;
    let (pe, ph, pc) = (
        bases.electric.value(),
        bases.heat.value(),
        bases.cooling.value(),
    );
    let prepared = ctx.prepared;
    let topo = ctx.topology;
    let mut report = Vec::new();

    for t in 0..ctx.steps() {
        let mut push = |label: String, collection: &VariableCollection, unit: usize, scale: f64| {
            collection.var(&[unit, t]).map(|var| {
                report.push(ReportVar {
                    label,
                    t,
                    var,
                    scale,
                })
            })
        };

        for (units, family) in [
            (&prepared.turbines, &vars.turbines),
            (&prepared.diesels, &vars.diesels),
        ] {
            for (g, unit) in units.iter().enumerate() {
                push(format!("{}.output_kw", unit.name), &family.output, g, pe)?;
                push(format!("{}.reactive_kvar", unit.name), &family.reactive, g, pe)?;
                push(format!("{}.fuel_kw", unit.name), &family.fuel, g, pe)?;
            }
        }
        for (b, unit) in prepared.boilers.iter().enumerate() {
            push(format!("{}.output_kw", unit.name), &vars.boilers.output, b, ph)?;
            push(format!("{}.fuel_kw", unit.name), &vars.boilers.input, b, ph)?;
        }
        for (c, unit) in prepared.chillers.iter().enumerate() {
            push(format!("{}.output_kw", unit.name), &vars.chillers.output, c, pc)?;
            push(format!("{}.electric_kw", unit.name), &vars.chillers.input, c, pe)?;
        }
        for (units, family, scale) in [
            (&prepared.electric_storage, &vars.electric_storage, pe),
            (&prepared.heat_storage, &vars.heat_storage, ph),
            (&prepared.cooling_storage, &vars.cooling_storage, pc),
        ] {
            for (i, unit) in units.iter().enumerate() {
                push(format!("{}.charge_kw", unit.name), &family.charge, i, scale)?;
                push(format!("{}.discharge_kw", unit.name), &family.discharge, i, scale)?;
                push(format!("{}.state_kw", unit.name), &family.state, i, scale)?;
            }
        }
        for (g, unit) in prepared.grids.iter().enumerate() {
            push(format!("{}.import_kw", unit.name), &vars.grids.import_p, g, pe)?;
            push(format!("{}.export_kw", unit.name), &vars.grids.export_p, g, pe)?;
            push(format!("{}.import_kvar", unit.name), &vars.grids.import_q, g, pe)?;
        }
        for (pos, &m) in topo.electric_nodes.iter().enumerate() {
            let node = &topo.node_names[m];
            push(format!("{node}.voltage_sq_pu"), &vars.network.voltage, pos, 1.0)?;
        }
        if ctx.config.slack.allow_unserved {
            for (nodes, collection, label, scale) in [
                (&topo.electric_nodes, &vars.slack.unserved_electric, "electric", pe),
                (&topo.heat_nodes, &vars.slack.unserved_heat, "heat", ph),
                (&topo.cooling_nodes, &vars.slack.unserved_cooling, "cooling", pc),
            ] {
                for (pos, &m) in nodes.iter().enumerate() {
                    let node = &topo.node_names[m];
                    push(format!("{node}.unserved_{label}_kw"), collection, pos, scale)?;
                }
            }
        }
    }
    Ok(report)
}
