//! Piecewise fitting of converter input versus output.
//!
//! The manufacturer curve gives efficiency against loading. The optimizer
//! needs input (fuel, electricity) as a function of output, so each segment of
//! `[0, size]` is sampled and fitted by least squares:
//!
//! ```text
//! input(x) = x · scale / eff(x / size)        scale = output_base / input_base
//! ```
//!
//! Segments have equal width and cover the whole range without gaps. The
//! normal equations are tiny (2×2 or 3×3) and solved with a dense LU.

use faer::{prelude::*, solvers::PartialPivLu, Mat};
use mgopt_core::EfficiencyCurve;
use serde::{Deserialize, Serialize};

use super::soc::{convert_quadratic, Quadratic, SocForm};

const SAMPLES_PER_SEGMENT: usize = 16;
const MIN_EFFICIENCY: f64 = 1e-9;

/// Polynomial order of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitOrder {
    Linear,
    Quadratic,
}

impl FitOrder {
    fn coefficients(self) -> usize {
        match self {
            FitOrder::Linear => 2,
            FitOrder::Quadratic => 3,
        }
    }
}

/// One piece of a curve, active on `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub lower: f64,
    pub upper: f64,
    pub quad: Quadratic,
    pub soc: SocForm,
}

impl Segment {
    fn new(lower: f64, upper: f64, quad: Quadratic) -> Self {
        Self {
            lower,
            upper,
            quad,
            soc: convert_quadratic(&quad),
        }
    }
}

/// Ordered, gap-free segments over `[0, rated size]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseCurve {
    pub segments: Vec<Segment>,
}

impl PiecewiseCurve {
    /// Single segment with zero bounds, used for components without capacity data.
    pub fn degenerate() -> Self {
        Self {
            segments: vec![Segment::new(0.0, 0.0, Quadratic::default())],
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_degenerate(&self) -> bool {
        self.segments.iter().all(|s| s.upper <= 0.0)
    }

    /// Upper end of the last segment.
    pub fn span(&self) -> f64 {
        self.segments.last().map_or(0.0, |s| s.upper)
    }

    /// Fitted input at output `x`, from the segment that contains it.
    pub fn eval(&self, x: f64) -> Option<f64> {
        self.segments
            .iter()
            .find(|s| x >= s.lower && x <= s.upper)
            .map(|s| s.quad.eval(x))
    }

    /// Same bounds, coefficients transformed and re-converted to SOC form.
    pub fn map_quadratics(&self, f: impl Fn(&Quadratic) -> Quadratic) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .map(|s| Segment::new(s.lower, s.upper, f(&s.quad)))
                .collect(),
        }
    }
}

/// Fits `segments` pieces of the given order over `[0, size]`.
///
/// `size` is already per-unit. Returns [`PiecewiseCurve::degenerate`] when the
/// component has no size or no curve data.
pub fn fit_piecewise(
    curve: &EfficiencyCurve,
    size: f64,
    segments: usize,
    scale: f64,
    order: FitOrder,
) -> PiecewiseCurve {
    if curve.is_empty() || !(size > 0.0) || segments == 0 {
        return PiecewiseCurve::degenerate();
    }

    let width = size / segments as f64;
    let pieces = (0..segments)
        .map(|k| {
            let lower = width * k as f64;
            let upper = if k + 1 == segments {
                size
            } else {
                width * (k + 1) as f64
            };
            let (xs, ys) = sample(curve, size, scale, lower, upper);
            let quad = fit_samples(&xs, &ys, order);
            tracing::debug!(
                segment = k,
                lower,
                upper,
                h = quad.h,
                f = quad.f,
                c = quad.c,
                "fitted segment"
            );
            Segment::new(lower, upper, quad)
        })
        .collect();
    PiecewiseCurve { segments: pieces }
}

fn sample(
    curve: &EfficiencyCurve,
    size: f64,
    scale: f64,
    lower: f64,
    upper: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(SAMPLES_PER_SEGMENT);
    let mut ys = Vec::with_capacity(SAMPLES_PER_SEGMENT);
    for i in 0..SAMPLES_PER_SEGMENT {
        let x = lower + (upper - lower) * i as f64 / (SAMPLES_PER_SEGMENT - 1) as f64;
        let eff = curve.efficiency_at(x / size);
        if eff <= MIN_EFFICIENCY {
            continue;
        }
        xs.push(x);
        ys.push(x * scale / eff);
    }
    (xs, ys)
}

/// Least squares with graceful order reduction on degenerate data.
fn fit_samples(xs: &[f64], ys: &[f64], order: FitOrder) -> Quadratic {
    let attempts: &[FitOrder] = match order {
        FitOrder::Quadratic => &[FitOrder::Quadratic, FitOrder::Linear],
        FitOrder::Linear => &[FitOrder::Linear],
    };
    for &attempt in attempts {
        if let Some(coef) = least_squares(xs, ys, attempt.coefficients()) {
            return match attempt {
                FitOrder::Quadratic => Quadratic::new(coef[2], coef[1], coef[0]),
                FitOrder::Linear => Quadratic::new(0.0, coef[1], coef[0]),
            };
        }
    }
    let mean = if ys.is_empty() {
        0.0
    } else {
        ys.iter().sum::<f64>() / ys.len() as f64
    };
    Quadratic::new(0.0, 0.0, mean)
}

/// Solves the normal equations `AᵀA c = Aᵀy` for polynomial coefficients
/// `c[0] + c[1]·x + …`. Returns `None` when underdetermined or singular.
fn least_squares(xs: &[f64], ys: &[f64], n_coef: usize) -> Option<Vec<f64>> {
    if xs.len() < n_coef {
        return None;
    }
    let power = |x: f64, p: usize| x.powi(p as i32);
    let normal = Mat::from_fn(n_coef, n_coef, |i, j| {
        xs.iter().map(|&x| power(x, i + j)).sum::<f64>()
    });
    let rhs = Mat::from_fn(n_coef, 1, |i, _| {
        xs.iter().zip(ys).map(|(&x, &y)| power(x, i) * y).sum::<f64>()
    });
    let lu = PartialPivLu::new(normal.as_ref());
    let sol = lu.solve(&rhs);
    let coef: Vec<f64> = (0..n_coef).map(|i| sol.read(i, 0)).collect();

    // Near-singular systems come back as huge or non-finite values.
    let residual: f64 = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let fit: f64 = coef.iter().enumerate().map(|(p, c)| c * power(x, p)).sum();
            (fit - y).powi(2)
        })
        .sum();
    if coef.iter().all(|c| c.is_finite()) && residual.is_finite() {
        Some(coef)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turbine_curve() -> EfficiencyCurve {
        EfficiencyCurve::new(vec![(0.1, 0.18), (0.5, 0.28), (0.75, 0.31), (1.0, 0.33)])
    }

    #[test]
    fn segments_partition_the_rated_range() {
        for k in 1..=6 {
            let curve = fit_piecewise(&turbine_curve(), 0.8, k, 1.0, FitOrder::Quadratic);
            assert_eq!(curve.len(), k);
            assert_eq!(curve.segments[0].lower, 0.0);
            assert_eq!(curve.span(), 0.8);
            for pair in curve.segments.windows(2) {
                assert!(pair[0].lower <= pair[0].upper);
                assert_eq!(pair[0].upper, pair[1].lower, "gap between segments");
            }
        }
    }

    #[test]
    fn constant_efficiency_is_linear() {
        let curve = EfficiencyCurve::new(vec![(0.0, 0.8), (1.0, 0.8)]);
        let fit = fit_piecewise(&curve, 2.0, 1, 1.0, FitOrder::Linear);
        let q = fit.segments[0].quad;
        assert!((q.f - 1.25).abs() < 1e-9, "slope {}", q.f);
        assert!(q.c.abs() < 1e-9);
        assert_eq!(q.h, 0.0);
        assert!(fit.segments[0].soc.is_linear());
    }

    #[test]
    fn quadratic_fit_tracks_the_curve() {
        let curve = EfficiencyCurve::new(vec![(0.0, 0.2), (1.0, 0.35)]);
        let fit = fit_piecewise(&curve, 1.0, 4, 1.0, FitOrder::Quadratic);
        for x in [0.2, 0.45, 0.6, 0.9] {
            let exact = x / curve.efficiency_at(x);
            let approx = fit.eval(x).unwrap();
            assert!(
                (exact - approx).abs() < 0.005 * exact,
                "x={x}: exact {exact}, fitted {approx}"
            );
        }
    }

    #[test]
    fn scale_converts_between_bases() {
        let curve = EfficiencyCurve::new(vec![(0.0, 4.0), (1.0, 4.0)]);
        let fit = fit_piecewise(&curve, 1.0, 1, 2.0, FitOrder::Quadratic);
        assert!((fit.eval(1.0).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_data_gives_degenerate_curve() {
        let empty = fit_piecewise(&EfficiencyCurve::default(), 1.0, 3, 1.0, FitOrder::Quadratic);
        assert!(empty.is_degenerate());
        assert_eq!(empty.len(), 1);
        let zero = fit_piecewise(&turbine_curve(), 0.0, 3, 1.0, FitOrder::Quadratic);
        assert!(zero.is_degenerate());
        assert_eq!(zero.segments[0].upper, 0.0);
    }

    #[test]
    fn reactive_variant_keeps_bounds() {
        let fit = fit_piecewise(&turbine_curve(), 1.0, 2, 1.0, FitOrder::Quadratic);
        let q = fit.map_quadratics(|q| q.scaled(0.2, 0.2, 0.5));
        assert_eq!(q.segments[1].lower, fit.segments[1].lower);
        assert!((q.segments[0].quad.f - 0.2 * fit.segments[0].quad.f).abs() < 1e-12);
    }
}
