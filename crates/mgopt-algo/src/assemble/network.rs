//! Nodal balances and electrical network constraints.
//!
//! Electrical balance at node `m`, with `x` the squared voltage and `y`, `z`
//! the real and imaginary voltage cross terms of each line `m→n`:
//!
//! ```text
//! P:  gen − chiller + grid + storage + renewable − demand + unserved
//!       = G_mm·x_m + Σ (G_mn·y + B_mn·z)
//! Q:  gen_q − chiller_q + grid_q − ratio·demand
//!       = Σ (G_mn·z − B_mn·y) − B_mm·x_m
//! ```
//!
//! Heat and cooling balances use the loop loss coefficients in place of the
//! admittance terms.

use mgopt_core::EnergyCarrier;

use crate::error::{DispatchError, DispatchResult};
use crate::model::{LinExpr, Problem, VariableCollection};

use super::variables::{Families, StorageVars};
use super::HorizonContext;

/// `Σ coef · vars[unit, t]` over the units hosted at one node.
fn hosted(
    collection: &VariableCollection,
    units: &[usize],
    t: usize,
    coef: f64,
) -> DispatchResult<LinExpr> {
    let mut e = LinExpr::new();
    for &u in units {
        e.add_term(collection.var(&[u, t])?, coef);
    }
    Ok(e)
}

/// `Σ (discharge − charge)` for the storage units at one node.
fn storage_net(vars: &StorageVars, units: &[usize], t: usize) -> DispatchResult<LinExpr> {
    Ok(hosted(&vars.discharge, units, t, 1.0)? - hosted(&vars.charge, units, t, 1.0)?)
}

pub(crate) fn electric_balance(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) -> DispatchResult<()> {
    let topo = ctx.topology;
    let at = &topo.components;
    let ratio = ctx.config.reactive.demand_ratio;

    for (pos, &m) in topo.electric_nodes.iter().enumerate() {
        let node = &topo.node_names[m];
        for t in 0..ctx.steps() {
            let demand = ctx.inputs.electric_demand[m][t];

            let mut p = hosted(&vars.turbines.output, &at.turbines[m], t, 1.0)?
                + hosted(&vars.diesels.output, &at.diesels[m], t, 1.0)?
                + hosted(&vars.grids.import_p, &at.grids[m], t, 1.0)?
                - hosted(&vars.grids.export_p, &at.grids[m], t, 1.0)?
                - hosted(&vars.chillers.input, &at.chillers[m], t, 1.0)?
                + storage_net(&vars.electric_storage, &at.electric_storage[m], t)?;
            for &r in &at.renewables[m] {
                p.add_constant(ctx.prepared.renewables[r].size * ctx.inputs.solar[r][t]);
            }
            p.add_constant(-demand);
            p.add_term(vars.slack.unserved_electric.var(&[pos, t])?, 1.0);

            let mut q = hosted(&vars.turbines.reactive, &at.turbines[m], t, 1.0)?
                + hosted(&vars.diesels.reactive, &at.diesels[m], t, 1.0)?
                + hosted(&vars.grids.import_q, &at.grids[m], t, 1.0)?
                - hosted(&vars.grids.export_q, &at.grids[m], t, 1.0)?
                - hosted(&vars.chiller_reactive, &at.chillers[m], t, 1.0)?;
            q.add_constant(-ratio * demand);

            let x = vars.network.voltage.var(&[pos, t])?;
            let mut p_net = LinExpr::term(x, topo.g[m][m]);
            let mut q_net = LinExpr::term(x, -topo.b[m][m]);
            for &l in &topo.electric.by_node[m] {
                let n = topo.electric.lines[l].to;
                let y = vars.network.cross_real.var(&[l, t])?;
                let z = vars.network.cross_imag.var(&[l, t])?;
                p_net.add_term(y, topo.g[m][n]);
                p_net.add_term(z, topo.b[m][n]);
                q_net.add_term(z, topo.g[m][n]);
                q_net.add_term(y, -topo.b[m][n]);
            }

            problem.add_eq(format!("p_balance_{node}_{t}"), p, p_net);
            problem.add_eq(format!("q_balance_{node}_{t}"), q, q_net);
        }
    }
    Ok(())
}

pub(crate) fn thermal_balance(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
    carrier: EnergyCarrier,
) -> DispatchResult<()> {
    let topo = ctx.topology;
    let at = &topo.components;
    let (nodes, flow, unserved, dump, label) = match carrier {
        EnergyCarrier::Heat => (
            &topo.heat_nodes,
            &vars.heat_flow,
            &vars.slack.unserved_heat,
            &vars.slack.dump_heat,
            "h",
        ),
        EnergyCarrier::Cooling => (
            &topo.cooling_nodes,
            &vars.cooling_flow,
            &vars.slack.unserved_cooling,
            &vars.slack.dump_cooling,
            "c",
        ),
        EnergyCarrier::Electric => {
            return Err(DispatchError::Config(
                "thermal balance requested for the electric network".into(),
            ))
        }
    };
    let lines = topo.lines(carrier);
    let loss = topo.loss(carrier).ok_or_else(|| {
        DispatchError::Config(format!("no loop loss data for the {carrier} network"))
    })?;
    let demand = ctx.inputs.demand(carrier);

    for (pos, &m) in nodes.iter().enumerate() {
        let node = &topo.node_names[m];
        for t in 0..ctx.steps() {
            let mut e = match carrier {
                EnergyCarrier::Cooling => {
                    hosted(&vars.chillers.output, &at.chillers[m], t, 1.0)?
                        + storage_net(&vars.cooling_storage, &at.cooling_storage[m], t)?
                }
                _ => {
                    let mut heat = hosted(&vars.boilers.output, &at.boilers[m], t, 1.0)?
                        + storage_net(&vars.heat_storage, &at.heat_storage[m], t)?;
                    for &g in &at.turbines[m] {
                        heat.add_term(
                            vars.turbines.output.var(&[g, t])?,
                            ctx.prepared.turbines[g].heat_slope,
                        );
                    }
                    heat
                }
            };
            e.add_constant(-demand[m][t]);
            e.add_term(dump.var(&[pos, t])?, -1.0);
            e.add_term(unserved.var(&[pos, t])?, 1.0);
            for &l in &lines.by_node[m] {
                let to = lines.lines[l].to;
                e.add_term(flow.var(&[l, t])?, -loss[m][to]);
            }
            problem.add_eq(format!("{label}_balance_{node}_{t}"), e, LinExpr::new());
        }
    }
    Ok(())
}

/// Pins unserved and dump variables to zero when the configuration does not
/// allow them, so infeasibility surfaces as a solver status.
pub(crate) fn slack_limits(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) {
    let slack = &ctx.config.slack;
    let mut pin = |collection: &VariableCollection| {
        for (key, v) in collection.iter() {
            let name = format!("no_{}_{}_{}", collection.family(), key[0], key[1]);
            problem.add_eq(name, LinExpr::from(v), LinExpr::new());
        }
    };
    if !slack.allow_unserved {
        pin(&vars.slack.unserved_electric);
        pin(&vars.slack.unserved_heat);
        pin(&vars.slack.unserved_cooling);
    }
    if !slack.allow_dumping {
        pin(&vars.slack.dump_heat);
        pin(&vars.slack.dump_cooling);
    }
}

/// `lower² ≤ x_m ≤ upper²`
pub(crate) fn voltage_bounds(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) -> DispatchResult<()> {
    let lower = ctx.config.voltage.lower_squared();
    let upper = ctx.config.voltage.upper_squared();
    for (pos, &m) in ctx.topology.electric_nodes.iter().enumerate() {
        let node = &ctx.topology.node_names[m];
        for t in 0..ctx.steps() {
            let x = LinExpr::from(vars.network.voltage.var(&[pos, t])?);
            problem.add_ge(format!("v_min_{node}_{t}"), x.clone(), LinExpr::constant(lower));
            problem.add_le(format!("v_max_{node}_{t}"), x, LinExpr::constant(upper));
        }
    }
    Ok(())
}

fn position(ctx: &HorizonContext<'_>, node: usize) -> DispatchResult<usize> {
    ctx.topology.electric_position[node].ok_or_else(|| {
        DispatchError::Config(format!(
            "node '{}' has electric lines but no electric balance",
            ctx.topology.node_names[node]
        ))
    })
}

/// `(G_mm² + B_mn²)(x_m + x_n − 2y) ≤ I²` per line, a thermal limit
/// surrogate.
pub(crate) fn current_limits(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) -> DispatchResult<()> {
    let topo = ctx.topology;
    let limit = ctx.config.voltage.current_limit / ctx.config.bases.current();
    let limit_sq = limit * limit;
    for (l, line) in topo.electric.lines.iter().enumerate() {
        let (m, n) = (line.from, line.to);
        let weight = topo.g[m][m].powi(2) + topo.b[m][n].powi(2);
        let (pm, pn) = (position(ctx, m)?, position(ctx, n)?);
        for t in 0..ctx.steps() {
            let mut e = LinExpr::new();
            e.add_term(vars.network.voltage.var(&[pm, t])?, weight);
            e.add_term(vars.network.voltage.var(&[pn, t])?, weight);
            e.add_term(vars.network.cross_real.var(&[l, t])?, -2.0 * weight);
            problem.add_le(format!("current_{l}_{t}"), e, LinExpr::constant(limit_sq));
        }
    }
    Ok(())
}

/// One physical flow seen from both ends. Electric: `y` equal, `z` negated.
/// Heat and cooling loops: equal.
pub(crate) fn line_pairing(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) -> DispatchResult<()> {
    let topo = ctx.topology;
    for t in 0..ctx.steps() {
        for (l, r) in topo.electric.pairs() {
            let net = &vars.network;
            problem.add_eq(
                format!("pair_y_{l}_{t}"),
                LinExpr::from(net.cross_real.var(&[l, t])?),
                LinExpr::from(net.cross_real.var(&[r, t])?),
            );
            problem.add_eq(
                format!("pair_z_{l}_{t}"),
                LinExpr::from(net.cross_imag.var(&[l, t])?),
                -LinExpr::from(net.cross_imag.var(&[r, t])?),
            );
        }
        for (l, r) in topo.heat.pairs() {
            problem.add_eq(
                format!("pair_heat_{l}_{t}"),
                LinExpr::from(vars.heat_flow.var(&[l, t])?),
                LinExpr::from(vars.heat_flow.var(&[r, t])?),
            );
        }
        for (l, r) in topo.cooling.pairs() {
            problem.add_eq(
                format!("pair_cool_{l}_{t}"),
                LinExpr::from(vars.cooling_flow.var(&[l, t])?),
                LinExpr::from(vars.cooling_flow.var(&[r, t])?),
            );
        }
    }
    Ok(())
}

/// `y² + z² ≤ x̂_n · x_m`, with `x̂` the current voltage estimate.
pub(crate) fn voltage_surrogate(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    vars: &Families,
) -> DispatchResult<()> {
    let topo = ctx.topology;
    for (l, line) in topo.electric.lines.iter().enumerate() {
        let (pm, pn) = (position(ctx, line.from)?, position(ctx, line.to)?);
        for t in 0..ctx.steps() {
            let estimate = ctx.voltage.get(pn, t);
            problem.add_cone(
                format!("vprod_{l}_{t}"),
                vec![
                    LinExpr::from(vars.network.cross_real.var(&[l, t])?),
                    LinExpr::from(vars.network.cross_imag.var(&[l, t])?),
                ],
                LinExpr::term(vars.network.voltage.var(&[pm, t])?, estimate),
            );
        }
    }
    Ok(())
}
