//! Plant descriptor: components, nodes and electrical lines.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::component::Component;
use crate::network::{LineSpec, NetworkNode};
use crate::units::EnergyCarrier;
use crate::{ComponentId, MgError, MgResult, NodeId};

/// Read-only description of a campus plant, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    #[serde(default)]
    pub name: String,
    pub components: Vec<Component>,
    pub nodes: Vec<NetworkNode>,
    #[serde(default)]
    pub lines: Vec<LineSpec>,
}

impl Plant {
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId::new)
    }

    pub fn node(&self, id: NodeId) -> Option<&NetworkNode> {
        self.nodes.get(id.value())
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.value())
    }

    pub fn component_by_name(&self, name: &str) -> Option<(ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .find(|(_, c)| c.name() == name)
            .map(|(i, c)| (ComponentId::new(i), c))
    }

    /// Structural validation: unique names, known nodes, mutual connections.
    pub fn validate(&self) -> MgResult<()> {
        let mut node_names = HashSet::new();
        for node in &self.nodes {
            if !node_names.insert(node.name.as_str()) {
                return Err(MgError::Validation(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        let mut component_names = HashSet::new();
        for component in &self.components {
            component.validate()?;
            if !component_names.insert(component.name()) {
                return Err(MgError::Validation(format!(
                    "duplicate component name '{}'",
                    component.name()
                )));
            }
            if let Some(node) = component.node() {
                if !node_names.contains(node) {
                    return Err(MgError::Validation(format!(
                        "component '{}' sits on unknown node '{node}'",
                        component.name()
                    )));
                }
            }
        }

        for carrier in EnergyCarrier::ALL {
            self.validate_connections(carrier)?;
        }
        self.validate_lines()
    }

    fn validate_connections(&self, carrier: EnergyCarrier) -> MgResult<()> {
        let by_name: HashMap<&str, &NetworkNode> =
            self.nodes.iter().map(|n| (n.name.as_str(), n)).collect();
        for node in &self.nodes {
            let mut seen = HashSet::new();
            for neighbour in node.connections(carrier) {
                if neighbour == &node.name {
                    return Err(MgError::Network(format!(
                        "{carrier} node '{}' lists itself as a neighbour",
                        node.name
                    )));
                }
                if !seen.insert(neighbour.as_str()) {
                    return Err(MgError::Network(format!(
                        "{carrier} node '{}' lists '{neighbour}' twice",
                        node.name
                    )));
                }
                let Some(other) = by_name.get(neighbour.as_str()) else {
                    return Err(MgError::Network(format!(
                        "{carrier} node '{}' connects to unknown node '{neighbour}'",
                        node.name
                    )));
                };
                if !other.connections(carrier).iter().any(|c| c == &node.name) {
                    return Err(MgError::Network(format!(
                        "{carrier} connection '{}' -> '{neighbour}' is not mutual",
                        node.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_lines(&self) -> MgResult<()> {
        for line in &self.lines {
            let Some(from) = self.node_id(&line.from).and_then(|id| self.node(id)) else {
                return Err(MgError::Network(format!(
                    "line references unknown node '{}'",
                    line.from
                )));
            };
            if !(line.length_ft > 0.0) {
                return Err(MgError::Network(format!(
                    "line from '{}' must have a positive length",
                    line.from
                )));
            }
            if let Some(to) = &line.to {
                if !from.connections(EnergyCarrier::Electric).iter().any(|c| c == to) {
                    return Err(MgError::Network(format!(
                        "line '{}' -> '{to}' has no matching electrical connection",
                        line.from
                    )));
                }
            }
        }
        Ok(())
    }
}
