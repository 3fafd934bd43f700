//! Network nodes, sub-networks and electrical line data.

use petgraph::graph::UnGraph;
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::units::EnergyCarrier;

/// One carrier's view of a node: its load column and its neighbours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubNetwork {
    /// Name of the demand series served at this node, if any
    #[serde(default)]
    pub load: Option<String>,
    /// Names of neighbouring nodes on this carrier
    #[serde(default)]
    pub connections: Vec<String>,
}

impl SubNetwork {
    /// True when the node takes part in this carrier's balance.
    pub fn is_active(&self) -> bool {
        self.load.is_some() || !self.connections.is_empty()
    }
}

/// A physical location with up to three sub-networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub name: String,
    #[serde(default)]
    pub electrical: Option<SubNetwork>,
    #[serde(default)]
    pub heat: Option<SubNetwork>,
    #[serde(default)]
    pub cooling: Option<SubNetwork>,
}

impl NetworkNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            electrical: None,
            heat: None,
            cooling: None,
        }
    }

    pub fn with_sub_network(mut self, carrier: EnergyCarrier, sub: SubNetwork) -> Self {
        match carrier {
            EnergyCarrier::Electric => self.electrical = Some(sub),
            EnergyCarrier::Heat => self.heat = Some(sub),
            EnergyCarrier::Cooling => self.cooling = Some(sub),
        }
        self
    }

    pub fn sub_network(&self, carrier: EnergyCarrier) -> Option<&SubNetwork> {
        match carrier {
            EnergyCarrier::Electric => self.electrical.as_ref(),
            EnergyCarrier::Heat => self.heat.as_ref(),
            EnergyCarrier::Cooling => self.cooling.as_ref(),
        }
    }

    pub fn connections(&self, carrier: EnergyCarrier) -> &[String] {
        self.sub_network(carrier)
            .map(|s| s.connections.as_slice())
            .unwrap_or(&[])
    }

    pub fn load(&self, carrier: EnergyCarrier) -> Option<&str> {
        self.sub_network(carrier).and_then(|s| s.load.as_deref())
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Electrical line impedance record.
///
/// `to = None` marks a feeder to loads that are not modelled as nodes; it only
/// adds self-admittance to `from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSpec {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    pub length_ft: f64,
    pub conductor: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

/// Conductor impedance per mile, in ohms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorSpec {
    pub name: String,
    pub r_ohm_per_mile: f64,
    pub x_ohm_per_mile: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandSummary {
    pub island_id: usize,
    pub nodes: Vec<String>,
}

/// Connected components of one carrier's graph, in node order.
pub fn find_islands(nodes: &[NetworkNode], carrier: EnergyCarrier) -> Vec<IslandSummary> {
    let mut graph: UnGraph<usize, ()> = UnGraph::new_undirected();
    let mut index = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if node.sub_network(carrier).is_some_and(SubNetwork::is_active) {
            index.insert(node.name.as_str(), graph.add_node(i));
        }
    }
    for node in nodes {
        let Some(&a) = index.get(node.name.as_str()) else {
            continue;
        };
        for neighbour in node.connections(carrier) {
            if let Some(&b) = index.get(neighbour.as_str()) {
                if a.index() < b.index() {
                    graph.update_edge(a, b, ());
                }
            }
        }
    }

    let mut islands: Vec<IslandSummary> = Vec::new();
    let mut assigned = vec![false; graph.node_count()];
    for start in graph.node_indices() {
        if assigned[start.index()] {
            continue;
        }
        let mut members = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(nx) = bfs.next(&graph) {
            assigned[nx.index()] = true;
            members.push(graph[nx]);
        }
        members.sort_unstable();
        islands.push(IslandSummary {
            island_id: islands.len(),
            nodes: members.into_iter().map(|i| nodes[i].name.clone()).collect(),
        });
    }
    islands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn electrical(connections: &[&str], load: Option<&str>) -> SubNetwork {
        SubNetwork {
            load: load.map(str::to_string),
            connections: connections.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn islands_follow_connections() {
        let nodes = vec![
            NetworkNode::new("A").with_sub_network(EnergyCarrier::Electric, electrical(&["B"], None)),
            NetworkNode::new("B").with_sub_network(EnergyCarrier::Electric, electrical(&["A"], Some("b"))),
            NetworkNode::new("C").with_sub_network(EnergyCarrier::Electric, electrical(&[], Some("c"))),
            NetworkNode::new("D"),
        ];
        let islands = find_islands(&nodes, EnergyCarrier::Electric);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].nodes, vec!["A", "B"]);
        assert_eq!(islands[1].nodes, vec!["C"]);
    }

    #[test]
    fn inactive_sub_network_is_ignored() {
        let node = NetworkNode::new("X").with_sub_network(EnergyCarrier::Heat, SubNetwork::default());
        assert!(!node.heat.as_ref().is_some_and(SubNetwork::is_active));
        assert!(find_islands(&[node], EnergyCarrier::Heat).is_empty());
    }
}
