//! Physical units and per-unit bases.
//!
//! Plant descriptors are written in physical units (kW, kV, A). The optimizer
//! works in per-unit so that every flow on a sub-network has a comparable
//! magnitude. The bases live in [`PerUnitBases`], which is configuration data:
//! each campus picks its own electric, heat and cooling capacity base.
//!
//! ```
//! use mgopt_core::units::{EnergyCarrier, Kilowatts, PerUnitBases};
//!
//! let bases = PerUnitBases::default();
//! let pu = bases.to_per_unit(Kilowatts(1250.0), EnergyCarrier::Electric);
//! assert!((pu.value() - 0.5).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Implements arithmetic for a unit newtype.
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }
    };
}

/// Power or capacity in kilowatts (kW, kVA or kW-thermal depending on carrier).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW");

/// Line-to-line voltage in kilovolts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

/// Current in amperes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

/// Dimensionless per-unit quantity.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "p.u.");

/// Energy carrier of a sub-network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyCarrier {
    Electric,
    Heat,
    Cooling,
}

impl EnergyCarrier {
    pub const ALL: [EnergyCarrier; 3] = [
        EnergyCarrier::Electric,
        EnergyCarrier::Heat,
        EnergyCarrier::Cooling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyCarrier::Electric => "electric",
            EnergyCarrier::Heat => "heat",
            EnergyCarrier::Cooling => "cooling",
        }
    }
}

impl std::fmt::Display for EnergyCarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity and voltage bases used for per-unit normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerUnitBases {
    /// Electric power base (kVA)
    pub electric: Kilowatts,
    /// Heating capacity base (kW thermal)
    pub heat: Kilowatts,
    /// Cooling capacity base (kW thermal)
    pub cooling: Kilowatts,
    /// Distribution line voltage base (kV)
    pub voltage: Kilovolts,
}

impl Default for PerUnitBases {
    fn default() -> Self {
        Self {
            electric: Kilowatts(2500.0),
            heat: Kilowatts(20000.0),
            cooling: Kilowatts(7279.884675),
            voltage: Kilovolts(4.135),
        }
    }
}

impl PerUnitBases {
    /// Capacity base for a carrier.
    pub fn capacity(&self, carrier: EnergyCarrier) -> Kilowatts {
        match carrier {
            EnergyCarrier::Electric => self.electric,
            EnergyCarrier::Heat => self.heat,
            EnergyCarrier::Cooling => self.cooling,
        }
    }

    pub fn to_per_unit(&self, value: Kilowatts, carrier: EnergyCarrier) -> PerUnit {
        PerUnit(value / self.capacity(carrier))
    }

    pub fn to_physical(&self, value: PerUnit, carrier: EnergyCarrier) -> Kilowatts {
        self.capacity(carrier) * value.value()
    }

    /// Impedance base in kilo-ohms: kV² / kVA.
    pub fn impedance_kohm(&self) -> f64 {
        self.voltage.value() * self.voltage.value() / self.electric.value()
    }

    /// Current base: kVA / kV.
    pub fn current(&self) -> Amperes {
        Amperes(self.electric.value() / self.voltage.value())
    }

    /// Rejects zero, negative or non-finite bases.
    pub fn validate(&self) -> crate::MgResult<()> {
        let checks = [
            ("electric", self.electric.value()),
            ("heat", self.heat.value()),
            ("cooling", self.cooling.value()),
            ("voltage", self.voltage.value()),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::MgError::Config(format!(
                    "{name} base must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_unit_round_trip_by_carrier() {
        let bases = PerUnitBases::default();
        for carrier in EnergyCarrier::ALL {
            let pu = bases.to_per_unit(Kilowatts(1000.0), carrier);
            let back = bases.to_physical(pu, carrier);
            assert!((back.value() - 1000.0).abs() < 1e-9, "{carrier}");
        }
        let heat = bases.to_per_unit(Kilowatts(5000.0), EnergyCarrier::Heat);
        assert!((heat.value() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn derived_bases() {
        let bases = PerUnitBases::default();
        assert!((bases.impedance_kohm() - 4.135 * 4.135 / 2500.0).abs() < 1e-12);
        assert!((bases.current().value() - 2500.0 / 4.135).abs() < 1e-9);
    }

    #[test]
    fn zero_base_is_rejected() {
        let bases = PerUnitBases {
            heat: Kilowatts(0.0),
            ..Default::default()
        };
        assert!(bases.validate().is_err());
    }

    #[test]
    fn unit_arithmetic() {
        let a = Kilowatts(3.0) + Kilowatts(1.5) - Kilowatts(0.5);
        assert_eq!(a, Kilowatts(4.0));
        assert_eq!((a * 2.0) / Kilowatts(4.0), 2.0);
        assert_eq!(format!("{}", PerUnit(0.5)), "0.5000 p.u.");
    }
}
