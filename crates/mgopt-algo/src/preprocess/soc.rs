//! Quadratic to second-order-cone canonical form.
//!
//! A fitted segment `h·x² + f·x + c` is rewritten as `(b·x + o)² + e·x + d`
//! so that `(b·x + o)²` can appear on the left of a cone constraint and the
//! remainder stays linear.
//!
//! Fits occasionally return a slightly negative `h`. That is an artifact of
//! least squares on nearly linear data, so it is clamped to zero before the
//! square root. When `b` is zero the linear term moves into `e` instead of
//! being divided by `2b`.

use serde::{Deserialize, Serialize};

/// Below this `b` is treated as zero.
const MIN_CURVATURE_ROOT: f64 = 1e-9;

/// `h·x² + f·x + c`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quadratic {
    pub h: f64,
    pub f: f64,
    pub c: f64,
}

impl Quadratic {
    pub fn new(h: f64, f: f64, c: f64) -> Self {
        Self { h, f, c }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.h * x * x + self.f * x + self.c
    }

    /// Scales every coefficient by its own ratio.
    pub fn scaled(&self, h_ratio: f64, f_ratio: f64, c_ratio: f64) -> Self {
        Self {
            h: self.h * h_ratio,
            f: self.f * f_ratio,
            c: self.c * c_ratio,
        }
    }
}

/// `(b·x + offset)² + e·x + d`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SocForm {
    pub b: f64,
    pub offset: f64,
    pub e: f64,
    pub d: f64,
}

impl SocForm {
    pub fn eval(&self, x: f64) -> f64 {
        let w = self.b * x + self.offset;
        w * w + self.e * x + self.d
    }

    /// True when the squared term vanishes and the form is affine.
    pub fn is_linear(&self) -> bool {
        self.b == 0.0 && self.offset == 0.0
    }
}

/// Converts a quadratic into SOC form, clamping negative curvature.
pub fn convert_quadratic(q: &Quadratic) -> SocForm {
    let h = q.h.max(0.0);
    let b = h.sqrt();
    if b > MIN_CURVATURE_ROOT {
        let offset = q.f / (2.0 * b);
        SocForm {
            b,
            offset,
            e: 0.0,
            d: q.c - offset * offset,
        }
    } else {
        SocForm {
            b: 0.0,
            offset: 0.0,
            e: q.f,
            d: q.c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(q: Quadratic) {
        let soc = convert_quadratic(&q);
        for x in [0.0, 0.1, 0.37, 0.5, 1.0, 2.5] {
            let want = q.eval(x);
            let got = soc.eval(x);
            assert!(
                (want - got).abs() < 1e-9 * (1.0 + want.abs()),
                "{q:?} at x={x}: {want} vs {got}"
            );
        }
    }

    #[test]
    fn round_trip_for_convex_quadratics() {
        assert_round_trip(Quadratic::new(0.4, 1.2, 0.05));
        assert_round_trip(Quadratic::new(2.0, -0.7, 0.3));
        assert_round_trip(Quadratic::new(1e-3, 3.0, -0.2));
    }

    #[test]
    fn zero_curvature_moves_linear_term() {
        let soc = convert_quadratic(&Quadratic::new(0.0, 2.5, 0.1));
        assert_eq!(soc.b, 0.0);
        assert_eq!(soc.offset, 0.0);
        assert_eq!(soc.e, 2.5);
        assert_eq!(soc.d, 0.1);
        assert!(soc.is_linear());
        assert_round_trip(Quadratic::new(0.0, 2.5, 0.1));
    }

    #[test]
    fn negative_curvature_is_clamped() {
        let soc = convert_quadratic(&Quadratic::new(-0.3, 1.0, 0.0));
        assert_eq!(soc.b, 0.0);
        assert!(soc.offset.is_finite() && soc.e.is_finite() && soc.d.is_finite());
        assert!((soc.eval(1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_curvature_does_not_divide_by_zero() {
        let soc = convert_quadratic(&Quadratic::new(1e-22, 4.0, 1.0));
        assert!(soc.offset.is_finite());
        assert_eq!(soc.e, 4.0);
    }
}
