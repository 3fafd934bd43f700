//! # mgopt-core: Microgrid Plant Data Model
//!
//! Shared types for a multi-energy campus microgrid: the components that
//! produce, convert and store electricity, heat and cooling, the nodes they
//! sit on, the electrical lines between nodes, and the configuration of a
//! dispatch run.
//!
//! ## Module Overview
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`component`] | [`Component`] variants and their raw parameters |
//! | [`network`] | [`NetworkNode`], sub-networks, line and conductor records |
//! | [`plant`] | [`Plant`] descriptor and its structural validation |
//! | [`units`] | physical unit newtypes and [`PerUnitBases`] |
//! | [`config`] | [`DispatchConfig`] for a receding-horizon run |
//! | [`error`] | [`MgError`] / [`MgResult`] |
//!
//! A plant is read once, validated, and is read-only afterwards. Per-unit
//! scaling and curve fitting happen in `mgopt-algo`, which produces new
//! records instead of mutating these.

use serde::{Deserialize, Serialize};

pub mod component;
pub mod config;
pub mod error;
pub mod network;
pub mod plant;
pub mod units;

pub use component::{
    Capabilities, Component, Converter, CurvePoint, EfficiencyCurve, FuelKind, FuelSupply,
    Generator, Renewable, Storage, ThermalCarrier, ThermalStorage, UtilityGrid,
};
pub use config::{
    DispatchConfig, HorizonSettings, NetworkSettings, ReactiveSettings, SlackSettings,
    SolverSettings, VoltageSettings,
};
pub use error::{MgError, MgResult};
pub use network::{find_islands, ConductorSpec, IslandSummary, LineSpec, NetworkNode, SubNetwork};
pub use plant::Plant;
pub use units::{Amperes, EnergyCarrier, Kilovolts, Kilowatts, PerUnit, PerUnitBases};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl ComponentId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ComponentId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl NodeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}
