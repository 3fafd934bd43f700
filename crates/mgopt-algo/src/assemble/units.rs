//! Piecewise unit commitment and ramp limits.
//!
//! For unit `g`, step `t` and segment `k` with commitment binary `s_k`:
//!
//! ```text
//! lower_k·s_k ≤ x_k ≤ upper_k·s_k        Σ_k s_k ≤ 1        output = Σ_k x_k
//! (b·x_k + o·s_k)² + e·x_k + d·s_k ≤ input
//! ```
//!
//! The fuel relation is an inequality; minimizing cost makes it tight at the
//! optimum. Generators add a reactive term inside the same cone.

use crate::error::DispatchResult;
use crate::model::{LinExpr, Problem, VarId, VariableCollection};
use crate::preprocess::{PiecewiseCurve, PreparedConverter, PreparedGenerator};

use super::variables::{ConverterVars, GeneratorVars};
use super::HorizonContext;

/// Segment bounds, at-most-one commitment and the output sum.
fn commitment(
    problem: &mut Problem,
    name: &str,
    t: usize,
    curve: &PiecewiseCurve,
    output: VarId,
    segment: &[VarId],
    on: &[VarId],
) {
    for (k, seg) in curve.segments.iter().enumerate() {
        problem.add_ge(
            format!("seg_lo_{name}_{t}_{k}"),
            LinExpr::from(segment[k]),
            LinExpr::term(on[k], seg.lower),
        );
        problem.add_le(
            format!("seg_hi_{name}_{t}_{k}"),
            LinExpr::from(segment[k]),
            LinExpr::term(on[k], seg.upper),
        );
    }
    problem.add_le(
        format!("commit_{name}_{t}"),
        LinExpr::sum(on, 1.0),
        LinExpr::constant(1.0),
    );
    problem.add_eq(
        format!("output_{name}_{t}"),
        LinExpr::from(output),
        LinExpr::sum(segment, 1.0),
    );
}

/// First step against the initial condition, later steps against `t − 1`.
fn ramp(
    problem: &mut Problem,
    name: &str,
    output: &VariableCollection,
    unit: usize,
    steps: usize,
    rate: f64,
    initial: f64,
) -> DispatchResult<()> {
    let first = LinExpr::from(output.var(&[unit, 0])?);
    problem.add_le(
        format!("ramp_first_up_{name}"),
        first.clone(),
        LinExpr::constant(initial + rate),
    );
    problem.add_ge(
        format!("ramp_first_down_{name}"),
        first,
        LinExpr::constant(initial - rate),
    );
    for t in 1..steps {
        let step = LinExpr::from(output.var(&[unit, t])?) - LinExpr::from(output.var(&[unit, t - 1])?);
        problem.add_le(format!("ramp_up_{name}_{t}"), step.clone(), LinExpr::constant(rate));
        problem.add_ge(format!("ramp_down_{name}_{t}"), step, LinExpr::constant(-rate));
    }
    Ok(())
}

pub(crate) fn generators(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    units: &[PreparedGenerator],
    vars: &GeneratorVars,
    initial: &[f64],
) -> DispatchResult<()> {
    let pf = ctx.config.reactive.power_factor_limit;
    for (g, unit) in units.iter().enumerate() {
        let name = &unit.name;
        for t in 0..ctx.steps() {
            let on = vars.on.series(2, &[g, t]);
            let seg_p = vars.segment.series(2, &[g, t]);
            let seg_q = vars.segment_reactive.series(2, &[g, t]);
            let p = vars.output.var(&[g, t])?;
            let q = vars.reactive.var(&[g, t])?;
            let fuel = vars.fuel.var(&[g, t])?;

            commitment(problem, name, t, &unit.real, p, seg_p, on);
            problem.add_eq(
                format!("output_q_{name}_{t}"),
                LinExpr::from(q),
                LinExpr::sum(seg_q, 1.0),
            );
            problem.add_le(
                format!("power_factor_{name}_{t}"),
                LinExpr::from(q),
                LinExpr::term(p, pf),
            );

            for (k, (real, reactive)) in unit
                .real
                .segments
                .iter()
                .zip(&unit.reactive.segments)
                .enumerate()
            {
                problem.add_le(
                    format!("seg_q_hi_{name}_{t}_{k}"),
                    LinExpr::from(seg_q[k]),
                    LinExpr::term(on[k], pf * real.upper),
                );
                let (rp, rq) = (real.soc, reactive.soc);
                let mut bound = LinExpr::from(fuel);
                bound.add_term(seg_p[k], -rp.e);
                bound.add_term(seg_q[k], -rq.e);
                bound.add_term(on[k], -(rp.d + rq.d));
                problem.add_cone(
                    format!("fuel_{name}_{t}_{k}"),
                    vec![
                        LinExpr::term(seg_p[k], rp.b) + LinExpr::term(on[k], rp.offset),
                        LinExpr::term(seg_q[k], rq.b) + LinExpr::term(on[k], rq.offset),
                    ],
                    bound,
                );
            }
        }
        ramp(problem, name, &vars.output, g, ctx.steps(), unit.ramp, initial[g])?;
    }
    Ok(())
}

/// Boilers and chillers. Chillers also draw reactive power in proportion to
/// their electric input.
pub(crate) fn converters(
    problem: &mut Problem,
    ctx: &HorizonContext<'_>,
    units: &[PreparedConverter],
    vars: &ConverterVars,
    reactive: Option<&VariableCollection>,
    initial: &[f64],
) -> DispatchResult<()> {
    let ratio = ctx.config.reactive.chiller_ratio;
    for (c, unit) in units.iter().enumerate() {
        let name = &unit.name;
        for t in 0..ctx.steps() {
            let on = vars.on.series(2, &[c, t]);
            let seg = vars.segment.series(2, &[c, t]);
            let output = vars.output.var(&[c, t])?;
            let input = vars.input.var(&[c, t])?;

            commitment(problem, name, t, &unit.curve, output, seg, on);
            for (k, segment) in unit.curve.segments.iter().enumerate() {
                let soc = segment.soc;
                let mut bound = LinExpr::from(input);
                bound.add_term(seg[k], -soc.e);
                bound.add_term(on[k], -soc.d);
                problem.add_cone(
                    format!("input_{name}_{t}_{k}"),
                    vec![LinExpr::term(seg[k], soc.b) + LinExpr::term(on[k], soc.offset)],
                    bound,
                );
            }
            if let Some(q) = reactive {
                problem.add_eq(
                    format!("chiller_q_{name}_{t}"),
                    LinExpr::from(q.var(&[c, t])?),
                    LinExpr::term(input, ratio),
                );
            }
        }
        ramp(problem, name, &vars.output, c, ctx.steps(), unit.ramp, initial[c])?;
    }
    Ok(())
}
