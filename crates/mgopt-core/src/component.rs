//! Plant components.
//!
//! [`Component`] is a closed set of variants. Every stage downstream
//! (preprocessing, constraint generation, reporting) matches on the variant
//! instead of inspecting types at runtime.

use serde::{Deserialize, Serialize};

use crate::units::{EnergyCarrier, Kilowatts};
use crate::{MgError, MgResult};

/// Fuel traded through a [`FuelSupply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    NaturalGas,
    Diesel,
}

/// Carrier stored by a thermal storage tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalCarrier {
    Heat,
    Cooling,
}

impl From<ThermalCarrier> for EnergyCarrier {
    fn from(carrier: ThermalCarrier) -> Self {
        match carrier {
            ThermalCarrier::Heat => EnergyCarrier::Heat,
            ThermalCarrier::Cooling => EnergyCarrier::Cooling,
        }
    }
}

/// One measured point on an efficiency curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Output as a fraction of rated size, in `[0, 1]`
    pub capacity_fraction: f64,
    /// Output / input at that loading (COP for chillers)
    pub efficiency: f64,
}

/// Efficiency as a function of loading, as measured by the manufacturer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EfficiencyCurve {
    pub points: Vec<CurvePoint>,
}

impl EfficiencyCurve {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|(capacity_fraction, efficiency)| CurvePoint {
                    capacity_fraction,
                    efficiency,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Linear interpolation in loading, clamped to the end points.
    pub fn efficiency_at(&self, fraction: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        if fraction <= first.capacity_fraction {
            return first.efficiency;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if fraction <= b.capacity_fraction {
                let span = b.capacity_fraction - a.capacity_fraction;
                if span <= f64::EPSILON {
                    return b.efficiency;
                }
                let w = (fraction - a.capacity_fraction) / span;
                return a.efficiency + w * (b.efficiency - a.efficiency);
            }
        }
        self.points.last().map_or(0.0, |p| p.efficiency)
    }

    fn validate(&self, owner: &str) -> MgResult<()> {
        for pair in self.points.windows(2) {
            if pair[1].capacity_fraction < pair[0].capacity_fraction {
                return Err(MgError::Validation(format!(
                    "{owner}: efficiency curve loading must be non-decreasing"
                )));
            }
        }
        if self.points.iter().any(|p| p.efficiency < 0.0) {
            return Err(MgError::Validation(format!(
                "{owner}: efficiency curve has a negative efficiency"
            )));
        }
        Ok(())
    }
}

fn default_heat_recovery() -> f64 {
    0.5
}

/// Combustion generator (gas turbine or diesel set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub name: String,
    pub node: String,
    pub size_kw: Kilowatts,
    pub ramp_rate_kw: Kilowatts,
    #[serde(default)]
    pub curve: EfficiencyCurve,
    /// Recovered heat per unit of electric output (turbines only)
    #[serde(default = "default_heat_recovery")]
    pub heat_recovery: f64,
    #[serde(default)]
    pub initial_output_kw: Option<Kilowatts>,
}

/// Single-output converter: boilers (gas to heat) and chillers (power to cooling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Converter {
    pub name: String,
    pub node: String,
    pub size_kw: Kilowatts,
    pub ramp_rate_kw: Kilowatts,
    #[serde(default)]
    pub curve: EfficiencyCurve,
    #[serde(default)]
    pub initial_output_kw: Option<Kilowatts>,
}

fn default_efficiency() -> f64 {
    0.95
}

fn default_peak() -> f64 {
    0.25
}

/// Energy storage parameters shared by batteries and thermal tanks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub name: String,
    pub node: String,
    /// Usable energy capacity per time step (kWh stored as kW-step)
    pub size_kw: Kilowatts,
    #[serde(default = "default_efficiency")]
    pub charge_efficiency: f64,
    #[serde(default = "default_efficiency")]
    pub discharge_efficiency: f64,
    /// Maximum charge per step as a fraction of size
    #[serde(default = "default_peak")]
    pub peak_charge: f64,
    /// Maximum discharge per step as a fraction of size
    #[serde(default = "default_peak")]
    pub peak_discharge: f64,
    /// Lowest allowed state of charge as a fraction of size
    #[serde(default)]
    pub min_state_fraction: f64,
    #[serde(default)]
    pub initial_state_kw: Option<Kilowatts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStorage {
    pub carrier: ThermalCarrier,
    #[serde(flatten)]
    pub storage: Storage,
}

/// Point of common coupling with the utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityGrid {
    pub name: String,
    pub node: String,
    pub size_kw: Kilowatts,
    /// Whether export to the utility is paid for
    #[serde(default)]
    pub sellback: bool,
}

/// Fuel contract. Only contributes prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSupply {
    pub name: String,
    pub fuel: FuelKind,
}

/// Non-dispatchable solar array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renewable {
    pub name: String,
    pub node: String,
    pub size_kw: Kilowatts,
}

/// What a component can do on the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub produces_electricity: bool,
    pub produces_heat: bool,
    pub produces_cooling: bool,
    pub stores_energy: bool,
    pub supplies_price: bool,
}

/// A plant component, tagged by `kind` in the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Turbine(Generator),
    DieselGenerator(Generator),
    Boiler(Converter),
    Chiller(Converter),
    ElectricStorage(Storage),
    ThermalStorage(ThermalStorage),
    UtilityGrid(UtilityGrid),
    FuelSupply(FuelSupply),
    Renewable(Renewable),
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Component::Turbine(g) | Component::DieselGenerator(g) => &g.name,
            Component::Boiler(c) | Component::Chiller(c) => &c.name,
            Component::ElectricStorage(s) => &s.name,
            Component::ThermalStorage(t) => &t.storage.name,
            Component::UtilityGrid(u) => &u.name,
            Component::FuelSupply(f) => &f.name,
            Component::Renewable(r) => &r.name,
        }
    }

    /// Home node, `None` for fuel supplies which are not located on the network.
    pub fn node(&self) -> Option<&str> {
        match self {
            Component::Turbine(g) | Component::DieselGenerator(g) => Some(&g.node),
            Component::Boiler(c) | Component::Chiller(c) => Some(&c.node),
            Component::ElectricStorage(s) => Some(&s.node),
            Component::ThermalStorage(t) => Some(&t.storage.node),
            Component::UtilityGrid(u) => Some(&u.node),
            Component::FuelSupply(_) => None,
            Component::Renewable(r) => Some(&r.node),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Component::Turbine(_) => "turbine",
            Component::DieselGenerator(_) => "diesel_generator",
            Component::Boiler(_) => "boiler",
            Component::Chiller(_) => "chiller",
            Component::ElectricStorage(_) => "electric_storage",
            Component::ThermalStorage(_) => "thermal_storage",
            Component::UtilityGrid(_) => "utility_grid",
            Component::FuelSupply(_) => "fuel_supply",
            Component::Renewable(_) => "renewable",
        }
    }

    /// Carrier whose capacity base normalizes this component's size.
    pub fn primary_carrier(&self) -> Option<EnergyCarrier> {
        match self {
            Component::Turbine(_)
            | Component::DieselGenerator(_)
            | Component::ElectricStorage(_)
            | Component::UtilityGrid(_)
            | Component::Renewable(_) => Some(EnergyCarrier::Electric),
            Component::Boiler(_) => Some(EnergyCarrier::Heat),
            Component::Chiller(_) => Some(EnergyCarrier::Cooling),
            Component::ThermalStorage(t) => Some(t.carrier.into()),
            Component::FuelSupply(_) => None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Component::Turbine(_) => Capabilities {
                produces_electricity: true,
                produces_heat: true,
                ..Default::default()
            },
            Component::DieselGenerator(_) | Component::Renewable(_) => Capabilities {
                produces_electricity: true,
                ..Default::default()
            },
            Component::Boiler(_) => Capabilities {
                produces_heat: true,
                ..Default::default()
            },
            Component::Chiller(_) => Capabilities {
                produces_cooling: true,
                ..Default::default()
            },
            Component::ElectricStorage(_) | Component::ThermalStorage(_) => Capabilities {
                stores_energy: true,
                ..Default::default()
            },
            Component::UtilityGrid(_) => Capabilities {
                produces_electricity: true,
                supplies_price: true,
                ..Default::default()
            },
            Component::FuelSupply(_) => Capabilities {
                supplies_price: true,
                ..Default::default()
            },
        }
    }

    /// Checks physical sanity of the raw record.
    pub fn validate(&self) -> MgResult<()> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(MgError::Validation("component with empty name".into()));
        }
        let size = match self {
            Component::Turbine(g) | Component::DieselGenerator(g) => {
                g.curve.validate(name)?;
                if g.heat_recovery < 0.0 {
                    return Err(MgError::Validation(format!(
                        "{name}: heat recovery ratio must be non-negative"
                    )));
                }
                Some((g.size_kw, Some(g.ramp_rate_kw)))
            }
            Component::Boiler(c) | Component::Chiller(c) => {
                c.curve.validate(name)?;
                Some((c.size_kw, Some(c.ramp_rate_kw)))
            }
            Component::ElectricStorage(s) => {
                validate_storage(s)?;
                Some((s.size_kw, None))
            }
            Component::ThermalStorage(t) => {
                validate_storage(&t.storage)?;
                Some((t.storage.size_kw, None))
            }
            Component::UtilityGrid(u) => Some((u.size_kw, None)),
            Component::Renewable(r) => Some((r.size_kw, None)),
            Component::FuelSupply(_) => None,
        };
        if let Some((size, ramp)) = size {
            if !size.value().is_finite() || size.value() < 0.0 {
                return Err(MgError::Validation(format!(
                    "{name}: size must be a non-negative number, got {size}"
                )));
            }
            if let Some(ramp) = ramp {
                if ramp.value() < 0.0 {
                    return Err(MgError::Validation(format!(
                        "{name}: ramp rate must be non-negative, got {ramp}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_storage(s: &Storage) -> MgResult<()> {
    for (label, eff) in [
        ("charge", s.charge_efficiency),
        ("discharge", s.discharge_efficiency),
    ] {
        if !(eff > 0.0 && eff <= 1.0) {
            return Err(MgError::Validation(format!(
                "{}: {label} efficiency must be in (0, 1], got {eff}",
                s.name
            )));
        }
    }
    if !(0.0..=1.0).contains(&s.min_state_fraction) {
        return Err(MgError::Validation(format!(
            "{}: minimum state fraction must be in [0, 1]",
            s.name
        )));
    }
    Ok(())
}
