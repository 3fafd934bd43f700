//! Operating cost in dollars over the horizon.
//!
//! Per step, with `h` the step length in hours and per-unit quantities
//! scaled back by their carrier base:
//!
//! ```text
//! utility · (import_p + mult · import_q − sellback · export_p)
//! + gas · turbine fuel + diesel · diesel fuel + gas · boiler fuel
//! + penalty · unserved            (only when unserved demand is allowed)
//! ```

use mgopt_core::{EnergyCarrier, FuelKind};

use crate::model::{LinExpr, VariableCollection};
use crate::preprocess::PreparedGenerator;

use super::variables::{Families, GeneratorVars};
use super::HorizonContext;

/// `coef(unit) · var[unit, t]` for every unit of a `[unit, t]` family.
fn add_series(
    objective: &mut LinExpr,
    collection: &VariableCollection,
    t: usize,
    coef: impl Fn(usize) -> f64,
) {
    for (unit, &v) in collection.series(0, &[t]).iter().enumerate() {
        objective.add_term(v, coef(unit));
    }
}

fn fuel_cost(
    objective: &mut LinExpr,
    ctx: &HorizonContext<'_>,
    units: &[PreparedGenerator],
    vars: &GeneratorVars,
    t: usize,
    scale: f64,
) {
    let inputs = ctx.inputs;
    add_series(objective, &vars.fuel, t, |g| {
        let price = match units[g].fuel {
            FuelKind::NaturalGas => inputs.gas_price[t],
            FuelKind::Diesel => inputs.diesel_price[t],
        };
        price * scale
    });
}

pub(crate) fn build(ctx: &HorizonContext<'_>, vars: &Families) -> LinExpr {
    let bases = &ctx.config.bases;
    let hours = ctx.config.horizon.step_minutes as f64 / 60.0;
    let electric = bases.electric.value() * hours;
    let heat = bases.heat.value() * hours;
    let reactive = &ctx.config.reactive;
    let slack = &ctx.config.slack;
    let inputs = ctx.inputs;

    let mut objective = LinExpr::new();
    for t in 0..ctx.steps() {
        let utility = inputs.utility_price[t];
        add_series(&mut objective, &vars.grids.import_p, t, |_| utility * electric);
        add_series(&mut objective, &vars.grids.import_q, t, |_| {
            reactive.import_price_multiplier * utility * electric
        });
        add_series(&mut objective, &vars.grids.export_p, t, |_| {
            -slack.sellback_fraction * utility * electric
        });

        fuel_cost(&mut objective, ctx, &ctx.prepared.turbines, &vars.turbines, t, electric);
        fuel_cost(&mut objective, ctx, &ctx.prepared.diesels, &vars.diesels, t, electric);
        let gas = inputs.gas_price[t];
        add_series(&mut objective, &vars.boilers.input, t, |_| gas * heat);

        if slack.allow_unserved {
            for (collection, carrier) in [
                (&vars.slack.unserved_electric, EnergyCarrier::Electric),
                (&vars.slack.unserved_heat, EnergyCarrier::Heat),
                (&vars.slack.unserved_cooling, EnergyCarrier::Cooling),
            ] {
                let base = bases.capacity(carrier).value() * hours;
                add_series(&mut objective, collection, t, |_| slack.unserved_penalty * base);
            }
        }
    }
    objective
}
