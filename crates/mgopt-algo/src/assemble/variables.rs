//! Decision variable families of one horizon.
//!
//! | Family | Key | Policy |
//! |--------|-----|--------|
//! | `x` squared voltage | `[electric node, t]` | non-negative |
//! | `y` / `z` voltage cross terms | `[electric line, t]` | non-negative / free |
//! | `heat_flow`, `cool_flow` | `[line, t]` | non-negative |
//! | generator output, reactive, fuel | `[unit, t]` | non-negative |
//! | segment output and reactive | `[unit, t, k]` | non-negative |
//! | segment commitment | `[unit, t, k]` | binary |
//! | storage charge / discharge / state | `[unit, t]` | bounded by unit data |
//! | grid import / export | `[grid, t]` | bounded by size and sellback |
//! | unserved / dump | `[balance node, t]` | non-negative |

use crate::error::DispatchResult;
use crate::model::collection::grid;
use crate::model::{BoundPolicy, Problem, VariableCollection};
use crate::preprocess::{PreparedConverter, PreparedGenerator, PreparedGrid, PreparedStorage};
use crate::topology::Topology;

use super::HorizonContext;

fn segment_keys(segments: &[usize], steps: usize) -> Vec<[usize; 3]> {
    let mut keys = Vec::new();
    for (unit, &count) in segments.iter().enumerate() {
        for t in 0..steps {
            for k in 0..count {
                keys.push([unit, t, k]);
            }
        }
    }
    keys
}

/// Turbine or diesel generator variables.
#[derive(Debug, Clone)]
pub struct GeneratorVars {
    pub output: VariableCollection,
    pub reactive: VariableCollection,
    pub fuel: VariableCollection,
    pub segment: VariableCollection,
    pub segment_reactive: VariableCollection,
    pub on: VariableCollection,
}

impl GeneratorVars {
    fn create(
        problem: &mut Problem,
        prefix: &str,
        units: &[PreparedGenerator],
        steps: usize,
    ) -> DispatchResult<Self> {
        let unit_t = grid(&[units.len(), steps]);
        let segments: Vec<usize> = units.iter().map(|g| g.real.len()).collect();
        let seg_keys = segment_keys(&segments, steps);
        Ok(Self {
            output: VariableCollection::create(
                problem,
                &format!("{prefix}_p"),
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            reactive: VariableCollection::create(
                problem,
                &format!("{prefix}_q"),
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            fuel: VariableCollection::create(
                problem,
                &format!("{prefix}_fuel"),
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            segment: VariableCollection::create(
                problem,
                &format!("{prefix}_seg_p"),
                &seg_keys,
                BoundPolicy::NonNegative,
            )?,
            segment_reactive: VariableCollection::create(
                problem,
                &format!("{prefix}_seg_q"),
                &seg_keys,
                BoundPolicy::NonNegative,
            )?,
            on: VariableCollection::create(
                problem,
                &format!("{prefix}_on"),
                &seg_keys,
                BoundPolicy::Binary,
            )?,
        })
    }
}

/// Boiler or chiller variables. `input` is fuel for boilers and electricity
/// for chillers.
#[derive(Debug, Clone)]
pub struct ConverterVars {
    pub output: VariableCollection,
    pub input: VariableCollection,
    pub segment: VariableCollection,
    pub on: VariableCollection,
}

impl ConverterVars {
    fn create(
        problem: &mut Problem,
        prefix: &str,
        input_name: &str,
        units: &[PreparedConverter],
        steps: usize,
    ) -> DispatchResult<Self> {
        let unit_t = grid(&[units.len(), steps]);
        let segments: Vec<usize> = units.iter().map(|c| c.curve.len()).collect();
        let seg_keys = segment_keys(&segments, steps);
        Ok(Self {
            output: VariableCollection::create(
                problem,
                &format!("{prefix}_out"),
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            input: VariableCollection::create(
                problem,
                &format!("{prefix}_{input_name}"),
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            segment: VariableCollection::create(
                problem,
                &format!("{prefix}_seg"),
                &seg_keys,
                BoundPolicy::NonNegative,
            )?,
            on: VariableCollection::create(
                problem,
                &format!("{prefix}_on"),
                &seg_keys,
                BoundPolicy::Binary,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorageVars {
    pub charge: VariableCollection,
    pub discharge: VariableCollection,
    pub state: VariableCollection,
}

impl StorageVars {
    fn create(
        problem: &mut Problem,
        prefix: &str,
        units: &[PreparedStorage],
        steps: usize,
    ) -> DispatchResult<Self> {
        let unit_t = grid(&[units.len(), steps]);
        let max_charge: Vec<f64> = units.iter().map(|s| s.max_charge).collect();
        let max_discharge: Vec<f64> = units.iter().map(|s| s.max_discharge).collect();
        let min_state: Vec<f64> = units.iter().map(|s| s.min_state).collect();
        let size: Vec<f64> = units.iter().map(|s| s.size).collect();
        Ok(Self {
            charge: VariableCollection::create(
                problem,
                &format!("{prefix}_charge"),
                &unit_t,
                BoundPolicy::between(|_| 0.0, move |k| max_charge[k[0]]),
            )?,
            discharge: VariableCollection::create(
                problem,
                &format!("{prefix}_discharge"),
                &unit_t,
                BoundPolicy::between(|_| 0.0, move |k| max_discharge[k[0]]),
            )?,
            state: VariableCollection::create(
                problem,
                &format!("{prefix}_state"),
                &unit_t,
                BoundPolicy::between(move |k| min_state[k[0]], move |k| size[k[0]]),
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GridVars {
    pub import_p: VariableCollection,
    pub export_p: VariableCollection,
    pub import_q: VariableCollection,
    pub export_q: VariableCollection,
}

impl GridVars {
    fn create(problem: &mut Problem, grids: &[PreparedGrid], steps: usize) -> DispatchResult<Self> {
        let unit_t = grid(&[grids.len(), steps]);
        let size: Vec<f64> = grids.iter().map(|g| g.size).collect();
        let export_cap: Vec<f64> = grids
            .iter()
            .map(|g| if g.sellback { g.size } else { 0.0 })
            .collect();
        let export_q_cap = export_cap.clone();
        Ok(Self {
            import_p: VariableCollection::create(
                problem,
                "grid_import_p",
                &unit_t,
                BoundPolicy::between(|_| 0.0, move |k| size[k[0]]),
            )?,
            export_p: VariableCollection::create(
                problem,
                "grid_export_p",
                &unit_t,
                BoundPolicy::between(|_| 0.0, move |k| export_cap[k[0]]),
            )?,
            import_q: VariableCollection::create(
                problem,
                "grid_import_q",
                &unit_t,
                BoundPolicy::NonNegative,
            )?,
            export_q: VariableCollection::create(
                problem,
                "grid_export_q",
                &unit_t,
                BoundPolicy::between(|_| 0.0, move |k| export_q_cap[k[0]]),
            )?,
        })
    }
}

/// Squared voltage and line cross terms of the electrical network.
#[derive(Debug, Clone)]
pub struct NetworkVars {
    /// `[electric node position, t]`
    pub voltage: VariableCollection,
    pub cross_real: VariableCollection,
    pub cross_imag: VariableCollection,
}

#[derive(Debug, Clone)]
pub struct SlackVars {
    /// `[electric node position, t]`
    pub unserved_electric: VariableCollection,
    /// `[heat node position, t]`
    pub unserved_heat: VariableCollection,
    pub dump_heat: VariableCollection,
    /// `[cooling node position, t]`
    pub unserved_cooling: VariableCollection,
    pub dump_cooling: VariableCollection,
}

/// Every variable family of one horizon.
#[derive(Debug, Clone)]
pub struct Families {
    pub turbines: GeneratorVars,
    pub diesels: GeneratorVars,
    pub boilers: ConverterVars,
    pub chillers: ConverterVars,
    pub chiller_reactive: VariableCollection,
    pub electric_storage: StorageVars,
    pub heat_storage: StorageVars,
    pub cooling_storage: StorageVars,
    pub grids: GridVars,
    pub network: NetworkVars,
    pub heat_flow: VariableCollection,
    pub cooling_flow: VariableCollection,
    pub slack: SlackVars,
}

impl Families {
    pub(crate) fn create(problem: &mut Problem, ctx: &HorizonContext<'_>) -> DispatchResult<Self> {
        let steps = ctx.steps();
        let prepared = ctx.prepared;
        let topo: &Topology = ctx.topology;

        let network = NetworkVars {
            voltage: VariableCollection::create(
                problem,
                "x",
                grid(&[topo.electric_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            cross_real: VariableCollection::create(
                problem,
                "y",
                grid(&[topo.electric.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            cross_imag: VariableCollection::create(
                problem,
                "z",
                grid(&[topo.electric.len(), steps]),
                BoundPolicy::Free,
            )?,
        };

        let slack = SlackVars {
            unserved_electric: VariableCollection::create(
                problem,
                "unserved_e",
                grid(&[topo.electric_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            unserved_heat: VariableCollection::create(
                problem,
                "unserved_h",
                grid(&[topo.heat_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            dump_heat: VariableCollection::create(
                problem,
                "dump_h",
                grid(&[topo.heat_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            unserved_cooling: VariableCollection::create(
                problem,
                "unserved_c",
                grid(&[topo.cooling_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            dump_cooling: VariableCollection::create(
                problem,
                "dump_c",
                grid(&[topo.cooling_nodes.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
        };

        Ok(Self {
            turbines: GeneratorVars::create(problem, "gt", &prepared.turbines, steps)?,
            diesels: GeneratorVars::create(problem, "dg", &prepared.diesels, steps)?,
            boilers: ConverterVars::create(problem, "boiler", "fuel", &prepared.boilers, steps)?,
            chillers: ConverterVars::create(problem, "chiller", "p", &prepared.chillers, steps)?,
            chiller_reactive: VariableCollection::create(
                problem,
                "chiller_q",
                grid(&[prepared.chillers.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            electric_storage: StorageVars::create(problem, "es", &prepared.electric_storage, steps)?,
            heat_storage: StorageVars::create(problem, "hs", &prepared.heat_storage, steps)?,
            cooling_storage: StorageVars::create(problem, "cs", &prepared.cooling_storage, steps)?,
            grids: GridVars::create(problem, &prepared.grids, steps)?,
            network,
            heat_flow: VariableCollection::create(
                problem,
                "heat_flow",
                grid(&[topo.heat.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            cooling_flow: VariableCollection::create(
                problem,
                "cool_flow",
                grid(&[topo.cooling.len(), steps]),
                BoundPolicy::NonNegative,
            )?,
            slack,
        })
    }
}
