//! State carried between solves.
//!
//! Only the driver mutates these. Constraint generation reads them through
//! shared references while building a horizon.

use serde::Serialize;

use crate::preprocess::PreparedPlant;

/// Outcome of comparing solved squared voltages against the estimate that
/// was used to build the surrogate constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageCheck {
    pub max_gap: f64,
    pub converged: bool,
}

/// Working estimate of squared voltage, `[electric node position][t]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageEstimate {
    values: Vec<Vec<f64>>,
}

impl VoltageEstimate {
    pub fn uniform(nodes: usize, steps: usize, value: f64) -> Self {
        Self {
            values: vec![vec![value; steps]; nodes],
        }
    }

    pub fn from_values(values: Vec<Vec<f64>>) -> Self {
        Self { values }
    }

    pub fn get(&self, node: usize, t: usize) -> f64 {
        self.values[node][t]
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn nodes(&self) -> usize {
        self.values.len()
    }

    /// Damped fixed-point update `e' = sqrt(solved · e) + nudge`.
    ///
    /// The gap is measured against the estimate used for the solve, before
    /// the update.
    pub fn update(&mut self, solved: &[Vec<f64>], tolerance: f64, nudge: f64) -> VoltageCheck {
        let mut max_gap: f64 = 0.0;
        for (row, solved_row) in self.values.iter_mut().zip(solved) {
            for (e, &s) in row.iter_mut().zip(solved_row) {
                max_gap = max_gap.max((s - *e).abs());
                *e = (s.max(0.0) * *e).sqrt() + nudge;
            }
        }
        VoltageCheck {
            max_gap,
            converged: max_gap <= tolerance,
        }
    }

    /// Rotates every node's row left by one step; the estimate for the step
    /// just rolled past wraps around to the new final step.
    pub fn shift(&mut self) {
        for row in &mut self.values {
            if !row.is_empty() {
                row.rotate_left(1);
            }
        }
    }
}

/// Initial conditions per component, in per-unit and in [`PreparedPlant`]
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonState {
    pub turbines: Vec<f64>,
    pub diesels: Vec<f64>,
    pub boilers: Vec<f64>,
    pub chillers: Vec<f64>,
    pub electric_storage: Vec<f64>,
    pub heat_storage: Vec<f64>,
    pub cooling_storage: Vec<f64>,
}

impl HorizonState {
    pub fn initial(prepared: &PreparedPlant) -> Self {
        Self {
            turbines: prepared.turbines.iter().map(|g| g.initial_output).collect(),
            diesels: prepared.diesels.iter().map(|g| g.initial_output).collect(),
            boilers: prepared.boilers.iter().map(|c| c.initial_output).collect(),
            chillers: prepared.chillers.iter().map(|c| c.initial_output).collect(),
            electric_storage: prepared
                .electric_storage
                .iter()
                .map(|s| s.initial_state)
                .collect(),
            heat_storage: prepared.heat_storage.iter().map(|s| s.initial_state).collect(),
            cooling_storage: prepared
                .cooling_storage
                .iter()
                .map(|s| s.initial_state)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_measures_gap_before_damping() {
        let mut est = VoltageEstimate::uniform(1, 2, 1.1025);
        let check = est.update(&[vec![1.0, 1.1025]], 0.01, 0.001);
        assert!((check.max_gap - 0.1025).abs() < 1e-12);
        assert!(!check.converged);
        assert!((est.get(0, 0) - (1.1025f64.sqrt() + 0.001)).abs() < 1e-12);
        assert!((est.get(0, 1) - 1.1035).abs() < 1e-12);
    }

    #[test]
    fn constant_target_converges_geometrically() {
        let mut est = VoltageEstimate::uniform(2, 3, 1.1025);
        let solved = vec![vec![1.0; 3]; 2];
        let mut iterations = 0;
        loop {
            iterations += 1;
            if est.update(&solved, 0.01, 0.001).converged {
                break;
            }
            assert!(iterations < 10);
        }
        assert_eq!(iterations, 5);
    }

    #[test]
    fn shift_wraps_first_step_to_the_end() {
        let mut est = VoltageEstimate::from_values(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        est.shift();
        assert_eq!(est.values()[0], vec![2.0, 3.0, 1.0]);
        assert_eq!(est.values()[1], vec![5.0, 6.0, 4.0]);
        est.shift();
        est.shift();
        assert_eq!(est.values()[0], vec![1.0, 2.0, 3.0]);
    }
}
