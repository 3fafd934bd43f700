//! Component parameter preprocessing.
//!
//! Turns each raw [`Component`] into a [`PreparedComponent`]: sizes and ramp
//! rates in per-unit of the component's primary carrier, efficiency curves
//! fitted into piecewise SOC-ready segments, and initial conditions filled in.
//! The transformation is pure, so running it twice on the same plant yields
//! identical records.
//!
//! | Variant | Output base | Input base | Fit |
//! |---------|-------------|------------|-----|
//! | Turbine / Diesel | electric | electric (fuel) | `K` quadratic + reactive |
//! | Boiler | heat | heat (gas) | 1 linear |
//! | Chiller | cooling | electric | `K` quadratic |
//!
//! Zero-capacity components get a degenerate curve here and are dropped by
//! [`PreparedPlant::prepare`] before constraint generation.

pub mod fit;
pub mod soc;

use mgopt_core::{
    Component, Converter, DispatchConfig, EnergyCarrier, FuelKind, Generator, Kilowatts,
    NodeId, Plant, Storage,
};
use serde::Serialize;

use crate::error::{DispatchError, DispatchResult};
pub use fit::{fit_piecewise, FitOrder, PiecewiseCurve, Segment};
pub use soc::{convert_quadratic, Quadratic, SocForm};

/// Per-unit generator with real and reactive fuel curves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedGenerator {
    pub name: String,
    pub node: NodeId,
    pub size: f64,
    pub ramp: f64,
    pub fuel: FuelKind,
    pub real: PiecewiseCurve,
    pub reactive: PiecewiseCurve,
    /// Heat output per unit of electric output, in heat per-unit
    pub heat_slope: f64,
    pub initial_output: f64,
}

/// Per-unit boiler or chiller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedConverter {
    pub name: String,
    pub node: NodeId,
    pub size: f64,
    pub ramp: f64,
    pub curve: PiecewiseCurve,
    pub initial_output: f64,
}

/// Per-unit storage with its bounds resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedStorage {
    pub name: String,
    pub node: NodeId,
    pub carrier: EnergyCarrier,
    pub size: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub max_charge: f64,
    pub max_discharge: f64,
    pub min_state: f64,
    pub initial_state: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedGrid {
    pub name: String,
    pub node: NodeId,
    pub size: f64,
    pub sellback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRenewable {
    pub name: String,
    pub node: NodeId,
    pub size: f64,
}

/// Immutable, per-unit view of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreparedComponent {
    Turbine(PreparedGenerator),
    DieselGenerator(PreparedGenerator),
    Boiler(PreparedConverter),
    Chiller(PreparedConverter),
    ElectricStorage(PreparedStorage),
    ThermalStorage(PreparedStorage),
    UtilityGrid(PreparedGrid),
    FuelSupply { name: String, fuel: FuelKind },
    Renewable(PreparedRenewable),
}

impl PreparedComponent {
    pub fn name(&self) -> &str {
        match self {
            PreparedComponent::Turbine(g) | PreparedComponent::DieselGenerator(g) => &g.name,
            PreparedComponent::Boiler(c) | PreparedComponent::Chiller(c) => &c.name,
            PreparedComponent::ElectricStorage(s) | PreparedComponent::ThermalStorage(s) => {
                &s.name
            }
            PreparedComponent::UtilityGrid(g) => &g.name,
            PreparedComponent::FuelSupply { name, .. } => name,
            PreparedComponent::Renewable(r) => &r.name,
        }
    }

    /// Per-unit rated size; `None` for fuel supplies.
    pub fn rated_size(&self) -> Option<f64> {
        match self {
            PreparedComponent::Turbine(g) | PreparedComponent::DieselGenerator(g) => Some(g.size),
            PreparedComponent::Boiler(c) | PreparedComponent::Chiller(c) => Some(c.size),
            PreparedComponent::ElectricStorage(s) | PreparedComponent::ThermalStorage(s) => {
                Some(s.size)
            }
            PreparedComponent::UtilityGrid(g) => Some(g.size),
            PreparedComponent::FuelSupply { .. } => None,
            PreparedComponent::Renewable(r) => Some(r.size),
        }
    }

    /// Fitted curve, for converters only.
    pub fn curve(&self) -> Option<&PiecewiseCurve> {
        match self {
            PreparedComponent::Turbine(g) | PreparedComponent::DieselGenerator(g) => Some(&g.real),
            PreparedComponent::Boiler(c) | PreparedComponent::Chiller(c) => Some(&c.curve),
            _ => None,
        }
    }
}

fn per_unit(config: &DispatchConfig, value: Kilowatts, carrier: EnergyCarrier) -> f64 {
    config.bases.to_per_unit(value, carrier).value()
}

fn node_of(plant: &Plant, name: &str) -> DispatchResult<NodeId> {
    plant
        .node_id(name)
        .ok_or_else(|| DispatchError::UnknownNode(name.to_string()))
}

/// Prepares one component. One case per variant.
pub fn prepare_component(
    component: &Component,
    plant: &Plant,
    config: &DispatchConfig,
) -> DispatchResult<PreparedComponent> {
    let prepared = match component {
        Component::Turbine(g) => {
            PreparedComponent::Turbine(prepare_generator(g, FuelKind::NaturalGas, true, plant, config)?)
        }
        Component::DieselGenerator(g) => PreparedComponent::DieselGenerator(prepare_generator(
            g,
            FuelKind::Diesel,
            false,
            plant,
            config,
        )?),
        Component::Boiler(c) => PreparedComponent::Boiler(prepare_converter(
            c,
            EnergyCarrier::Heat,
            EnergyCarrier::Heat,
            1,
            FitOrder::Linear,
            plant,
            config,
        )?),
        Component::Chiller(c) => PreparedComponent::Chiller(prepare_converter(
            c,
            EnergyCarrier::Cooling,
            EnergyCarrier::Electric,
            config.horizon.segments,
            FitOrder::Quadratic,
            plant,
            config,
        )?),
        Component::ElectricStorage(s) => PreparedComponent::ElectricStorage(prepare_storage(
            s,
            EnergyCarrier::Electric,
            plant,
            config,
        )?),
        Component::ThermalStorage(t) => PreparedComponent::ThermalStorage(prepare_storage(
            &t.storage,
            t.carrier.into(),
            plant,
            config,
        )?),
        Component::UtilityGrid(u) => PreparedComponent::UtilityGrid(PreparedGrid {
            name: u.name.clone(),
            node: node_of(plant, &u.node)?,
            size: per_unit(config, u.size_kw, EnergyCarrier::Electric),
            sellback: u.sellback,
        }),
        Component::FuelSupply(f) => PreparedComponent::FuelSupply {
            name: f.name.clone(),
            fuel: f.fuel,
        },
        Component::Renewable(r) => PreparedComponent::Renewable(PreparedRenewable {
            name: r.name.clone(),
            node: node_of(plant, &r.node)?,
            size: per_unit(config, r.size_kw, EnergyCarrier::Electric),
        }),
    };
    Ok(prepared)
}

fn prepare_generator(
    g: &Generator,
    fuel: FuelKind,
    recovers_heat: bool,
    plant: &Plant,
    config: &DispatchConfig,
) -> DispatchResult<PreparedGenerator> {
    let size = per_unit(config, g.size_kw, EnergyCarrier::Electric);
    let real = fit_piecewise(
        &g.curve,
        size,
        config.horizon.segments,
        1.0,
        FitOrder::Quadratic,
    );
    let r = &config.reactive;
    let reactive = real.map_quadratics(|q| {
        q.scaled(
            r.fit_quadratic_ratio,
            r.fit_linear_ratio,
            r.fit_constant_ratio,
        )
    });
    let heat_slope = if recovers_heat {
        g.heat_recovery * config.bases.electric.value() / config.bases.heat.value()
    } else {
        0.0
    };
    Ok(PreparedGenerator {
        name: g.name.clone(),
        node: node_of(plant, &g.node)?,
        size,
        ramp: per_unit(config, g.ramp_rate_kw, EnergyCarrier::Electric),
        fuel,
        real,
        reactive,
        heat_slope,
        initial_output: g
            .initial_output_kw
            .map_or(size / 2.0, |kw| per_unit(config, kw, EnergyCarrier::Electric)),
    })
}

fn prepare_converter(
    c: &Converter,
    output: EnergyCarrier,
    input: EnergyCarrier,
    segments: usize,
    order: FitOrder,
    plant: &Plant,
    config: &DispatchConfig,
) -> DispatchResult<PreparedConverter> {
    let size = per_unit(config, c.size_kw, output);
    let scale = config.bases.capacity(output) / config.bases.capacity(input);
    Ok(PreparedConverter {
        name: c.name.clone(),
        node: node_of(plant, &c.node)?,
        size,
        ramp: per_unit(config, c.ramp_rate_kw, output),
        curve: fit_piecewise(&c.curve, size, segments, scale, order),
        initial_output: c
            .initial_output_kw
            .map_or(size / 2.0, |kw| per_unit(config, kw, output)),
    })
}

fn prepare_storage(
    s: &Storage,
    carrier: EnergyCarrier,
    plant: &Plant,
    config: &DispatchConfig,
) -> DispatchResult<PreparedStorage> {
    let size = per_unit(config, s.size_kw, carrier);
    Ok(PreparedStorage {
        name: s.name.clone(),
        node: node_of(plant, &s.node)?,
        carrier,
        size,
        charge_efficiency: s.charge_efficiency,
        discharge_efficiency: s.discharge_efficiency,
        max_charge: s.peak_charge * size,
        max_discharge: s.peak_discharge * size,
        min_state: s.min_state_fraction * size,
        initial_state: s
            .initial_state_kw
            .map_or(size / 2.0, |kw| per_unit(config, kw, carrier))
            .clamp(s.min_state_fraction * size, size),
    })
}

/// Prepared components grouped by kind, zero-capacity units removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedPlant {
    pub turbines: Vec<PreparedGenerator>,
    pub diesels: Vec<PreparedGenerator>,
    pub boilers: Vec<PreparedConverter>,
    pub chillers: Vec<PreparedConverter>,
    pub electric_storage: Vec<PreparedStorage>,
    pub heat_storage: Vec<PreparedStorage>,
    pub cooling_storage: Vec<PreparedStorage>,
    pub grids: Vec<PreparedGrid>,
    pub renewables: Vec<PreparedRenewable>,
    pub fuels: Vec<FuelKind>,
    /// Names of components left out for lack of capacity
    pub excluded: Vec<String>,
}

impl PreparedPlant {
    /// Validates the plant, prepares every component and groups the results.
    pub fn prepare(plant: &Plant, config: &DispatchConfig) -> DispatchResult<Self> {
        plant.validate()?;
        config.validate()?;
        let mut out = PreparedPlant::default();
        for component in &plant.components {
            let prepared = prepare_component(component, plant, config)?;
            if prepared.rated_size().is_some_and(|s| s <= 0.0) {
                tracing::warn!(
                    component = prepared.name(),
                    "zero-capacity component excluded from dispatch"
                );
                out.excluded.push(prepared.name().to_string());
                continue;
            }
            out.push(prepared);
        }
        tracing::info!(
            turbines = out.turbines.len(),
            diesels = out.diesels.len(),
            boilers = out.boilers.len(),
            chillers = out.chillers.len(),
            storage = out.electric_storage.len() + out.heat_storage.len() + out.cooling_storage.len(),
            grids = out.grids.len(),
            "plant prepared"
        );
        Ok(out)
    }

    fn push(&mut self, prepared: PreparedComponent) {
        match prepared {
            PreparedComponent::Turbine(g) => self.turbines.push(g),
            PreparedComponent::DieselGenerator(g) => self.diesels.push(g),
            PreparedComponent::Boiler(c) => self.boilers.push(c),
            PreparedComponent::Chiller(c) => self.chillers.push(c),
            PreparedComponent::ElectricStorage(s) => self.electric_storage.push(s),
            PreparedComponent::ThermalStorage(s) => match s.carrier {
                EnergyCarrier::Cooling => self.cooling_storage.push(s),
                _ => self.heat_storage.push(s),
            },
            PreparedComponent::UtilityGrid(g) => self.grids.push(g),
            PreparedComponent::FuelSupply { fuel, .. } => self.fuels.push(fuel),
            PreparedComponent::Renewable(r) => self.renewables.push(r),
        }
    }
}
