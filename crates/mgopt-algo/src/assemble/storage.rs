//! Storage state of charge.
//!
//! `state(t) = state(t−1) + η_c·charge(t) − discharge(t)/η_d`, starting from
//! the carried initial state and returning to it at the last step.

use crate::error::DispatchResult;
use crate::model::{LinExpr, Problem};
use crate::preprocess::PreparedStorage;

use super::variables::StorageVars;

pub(crate) fn dynamics(
    problem: &mut Problem,
    units: &[PreparedStorage],
    vars: &StorageVars,
    initial: &[f64],
    steps: usize,
) -> DispatchResult<()> {
    for (i, unit) in units.iter().enumerate() {
        let name = &unit.name;
        for t in 0..steps {
            let previous = if t == 0 {
                LinExpr::constant(initial[i])
            } else {
                LinExpr::from(vars.state.var(&[i, t - 1])?)
            };
            let mut next = previous;
            next.add_term(vars.charge.var(&[i, t])?, unit.charge_efficiency);
            next.add_term(vars.discharge.var(&[i, t])?, -1.0 / unit.discharge_efficiency);
            problem.add_eq(
                format!("soc_{name}_{t}"),
                LinExpr::from(vars.state.var(&[i, t])?),
                next,
            );
        }
        if steps > 0 {
            problem.add_eq(
                format!("soc_cycle_{name}"),
                LinExpr::from(vars.state.var(&[i, steps - 1])?),
                LinExpr::constant(initial[i]),
            );
        }
    }
    Ok(())
}
