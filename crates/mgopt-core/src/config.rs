//! Run configuration.
//!
//! Every constant that depends on a particular campus (capacity bases,
//! conductor impedances, loop losses, reactive ratios) is a field here rather
//! than a literal in the optimizer. All sections are `#[serde(default)]`, so a
//! TOML file only needs to list what differs from the defaults:
//!
//! ```toml
//! [horizon]
//! steps = 12
//!
//! [slack]
//! allow_unserved = true
//! ```

use serde::{Deserialize, Serialize};

use crate::network::ConductorSpec;
use crate::units::{Amperes, PerUnitBases};
use crate::{MgError, MgResult};

/// Receding-horizon dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonSettings {
    /// Time steps per horizon
    pub steps: usize,
    /// Number of horizons solved before stopping
    pub horizons: usize,
    /// Length of one time step
    pub step_minutes: i64,
    /// Quadratic segments per efficiency curve
    pub segments: usize,
}

impl Default for HorizonSettings {
    fn default() -> Self {
        Self {
            steps: 24,
            horizons: 3,
            step_minutes: 60,
            segments: 5,
        }
    }
}

/// Voltage limits and the outer fixed-point loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoltageSettings {
    /// Nominal voltage magnitude (p.u.)
    pub nominal: f64,
    /// Allowed relative deviation δ
    pub deviation: f64,
    /// Thermal current limit of the distribution cable
    pub current_limit: Amperes,
    /// Largest accepted gap between solved and estimated squared voltage
    pub tolerance: f64,
    /// Fixed-point iterations per horizon
    pub max_iterations: usize,
    /// Positive nudge added after each damped update
    pub nudge: f64,
}

impl Default for VoltageSettings {
    fn default() -> Self {
        Self {
            nominal: 1.0,
            deviation: 0.05,
            current_limit: Amperes(290.0),
            tolerance: 0.01,
            max_iterations: 10,
            nudge: 0.001,
        }
    }
}

impl VoltageSettings {
    /// `(v·(1−δ))²`
    pub fn lower_squared(&self) -> f64 {
        (self.nominal * (1.0 - self.deviation)).powi(2)
    }

    /// `(v·(1+δ))²`, also the starting estimate for every node.
    pub fn upper_squared(&self) -> f64 {
        (self.nominal * (1.0 + self.deviation)).powi(2)
    }
}

/// Loop losses and conductor catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Fraction of heat/cooling delivered on the return leg of a loop
    pub loop_return_factor: f64,
    pub conductors: Vec<ConductorSpec>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            loop_return_factor: 0.95,
            conductors: vec![
                ConductorSpec {
                    name: "250kcmil".into(),
                    r_ohm_per_mile: 0.240440,
                    x_ohm_per_mile: 0.167776,
                },
                ConductorSpec {
                    name: "350kcmil".into(),
                    r_ohm_per_mile: 0.248339,
                    x_ohm_per_mile: 0.173504,
                },
            ],
        }
    }
}

impl NetworkSettings {
    pub fn conductor(&self, name: &str) -> Option<&ConductorSpec> {
        self.conductors.iter().find(|c| c.name == name)
    }
}

/// Reactive power modelling ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveSettings {
    /// Reactive demand as a fraction of real demand
    pub demand_ratio: f64,
    /// Generator reactive output limit as a fraction of real output
    pub power_factor_limit: f64,
    /// Chiller reactive draw as a fraction of real draw
    pub chiller_ratio: f64,
    /// Reactive fuel curve: linear coefficient ratio
    pub fit_linear_ratio: f64,
    /// Reactive fuel curve: quadratic coefficient ratio
    pub fit_quadratic_ratio: f64,
    /// Reactive fuel curve: constant ratio
    pub fit_constant_ratio: f64,
    /// Reactive import price as a multiple of the real price
    pub import_price_multiplier: f64,
}

impl Default for ReactiveSettings {
    fn default() -> Self {
        Self {
            demand_ratio: 0.05,
            power_factor_limit: 0.2,
            chiller_ratio: 0.05,
            fit_linear_ratio: 0.2,
            fit_quadratic_ratio: 0.2,
            fit_constant_ratio: 0.5,
            import_price_multiplier: 5.0,
        }
    }
}

/// Soft-constraint relief valves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    /// Permit unserved demand at a penalty
    pub allow_unserved: bool,
    /// Permit dumping surplus heat/cooling. On by default: recovered turbine
    /// heat at a node without heat demand has nowhere else to go.
    pub allow_dumping: bool,
    /// Penalty on unserved demand ($/kWh)
    pub unserved_penalty: f64,
    /// Export price as a fraction of the import price
    pub sellback_fraction: f64,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            allow_unserved: false,
            allow_dumping: true,
            unserved_penalty: 10.0,
            sellback_fraction: 0.5,
        }
    }
}

/// Branch-and-bound limits for the conic backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_nodes: usize,
    pub integrality_tolerance: f64,
    pub relative_gap: f64,
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_nodes: 2000,
            integrality_tolerance: 1e-5,
            relative_gap: 1e-6,
            verbose: false,
        }
    }
}

/// Complete configuration of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub bases: PerUnitBases,
    pub horizon: HorizonSettings,
    pub voltage: VoltageSettings,
    pub network: NetworkSettings,
    pub reactive: ReactiveSettings,
    pub slack: SlackSettings,
    pub solver: SolverSettings,
}

impl DispatchConfig {
    pub fn validate(&self) -> MgResult<()> {
        self.bases.validate()?;
        if self.horizon.steps == 0 {
            return Err(MgError::Config("horizon.steps must be at least 1".into()));
        }
        if self.horizon.segments == 0 {
            return Err(MgError::Config("horizon.segments must be at least 1".into()));
        }
        if self.horizon.step_minutes <= 0 {
            return Err(MgError::Config("horizon.step_minutes must be positive".into()));
        }
        if self.voltage.max_iterations == 0 {
            return Err(MgError::Config(
                "voltage.max_iterations must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.voltage.deviation) {
            return Err(MgError::Config("voltage.deviation must be in [0, 1)".into()));
        }
        if self.voltage.tolerance <= 0.0 {
            return Err(MgError::Config("voltage.tolerance must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.network.loop_return_factor) {
            return Err(MgError::Config(
                "network.loop_return_factor must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = DispatchConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.voltage.lower_squared() - 0.9025).abs() < 1e-12);
        assert!((cfg.voltage.upper_squared() - 1.1025).abs() < 1e-12);
        assert!(cfg.network.conductor("350kcmil").is_some());
        assert!(cfg.slack.allow_dumping);
        assert!(!cfg.slack.allow_unserved);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: DispatchConfig =
            serde_json::from_str(r#"{"horizon": {"steps": 6}, "slack": {"allow_unserved": true}}"#)
                .unwrap();
        assert_eq!(cfg.horizon.steps, 6);
        assert_eq!(cfg.horizon.segments, 5);
        assert!(cfg.slack.allow_unserved);
        assert_eq!(cfg.slack.unserved_penalty, 10.0);
    }

    #[test]
    fn zero_steps_rejected() {
        let mut cfg = DispatchConfig::default();
        cfg.horizon.steps = 0;
        assert!(matches!(cfg.validate(), Err(MgError::Config(_))));
    }
}
