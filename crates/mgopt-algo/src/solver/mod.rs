//! Solver backend boundary.
//!
//! The assembler hands a [`Problem`] to a [`SolverBackend`] and gets back a
//! [`Solution`]. Infeasible and unbounded outcomes are statuses, not errors;
//! `Err` is reserved for a backend that could not run at all.

pub mod clarabel;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DispatchResult;
use crate::model::{Problem, VarId};

pub use self::clarabel::ClarabelBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Error => "error",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend result. `values` is indexed by [`VarId`] and only meaningful when
/// the status is optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolveStatus,
    pub objective: f64,
    pub values: Vec<f64>,
    /// Interior-point iterations summed over all relaxations
    pub iterations: usize,
    /// Branch-and-bound nodes explored
    pub nodes: usize,
}

impl Solution {
    pub fn optimal(objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective,
            values,
            iterations: 0,
            nodes: 0,
        }
    }

    /// A non-optimal outcome without values.
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            values: Vec::new(),
            iterations: 0,
            nodes: 0,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }
}

/// Something that can solve a mixed-integer second-order cone program.
pub trait SolverBackend: Send + Sync {
    /// Short identifier for logs, e.g. `"clarabel"`.
    fn id(&self) -> &str;

    fn solve(&self, problem: &Problem) -> DispatchResult<Solution>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_trait_is_object_safe_and_thread_safe() {
        fn _accepts(_b: &dyn SolverBackend) {}
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Box<dyn SolverBackend>>();
    }

    #[test]
    fn failed_solution_has_no_values() {
        let s = Solution::failed(SolveStatus::Infeasible);
        assert!(!s.is_optimal());
        assert!(s.values.is_empty());
        assert_eq!(s.status.to_string(), "infeasible");
    }
}
