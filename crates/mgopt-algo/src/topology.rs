//! Network topology indexing.
//!
//! Builds everything constraint generation needs to know about where things
//! are:
//!
//! - which nodes take part in each carrier's balance,
//! - which prepared components sit on each node,
//! - directed line indices per node and carrier, with their reverse pairing,
//! - the electrical nodal admittance split into `G = Re(Y)` and `B = Im(Y)`,
//! - loop loss coefficients for district heat and cooling.
//!
//! Every physical connection `A–B` becomes two directed lines, `A→B` owned by
//! `A` and `B→A` owned by `B`. Flow pairing constraints rely on the reverse
//! index, so a connection declared on only one side is an error here, not a
//! silently missing constraint.

use mgopt_core::{DispatchConfig, EnergyCarrier, Plant};
use num_complex::Complex64;
use std::collections::HashMap;

use crate::error::{DispatchError, DispatchResult};
use crate::preprocess::PreparedPlant;

const FEET_PER_MILE: f64 = 5280.0;

/// Directed line `from → to`, both node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub from: usize,
    pub to: usize,
}

/// Directed lines of one carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct LineIndex {
    pub carrier: EnergyCarrier,
    pub lines: Vec<Line>,
    /// Lines owned by each node, in the node's connection order
    pub by_node: Vec<Vec<usize>>,
    /// `reverse[l]` is the line pointing back along `l`
    pub reverse: Vec<usize>,
}

impl LineIndex {
    fn build(
        plant: &Plant,
        carrier: EnergyCarrier,
        index: &HashMap<&str, usize>,
    ) -> DispatchResult<Self> {
        let mut lines = Vec::new();
        let mut by_node = vec![Vec::new(); plant.nodes.len()];
        for (m, node) in plant.nodes.iter().enumerate() {
            for neighbour in node.connections(carrier) {
                let n = *index
                    .get(neighbour.as_str())
                    .ok_or_else(|| DispatchError::UnknownNode(neighbour.clone()))?;
                by_node[m].push(lines.len());
                lines.push(Line { from: m, to: n });
            }
        }

        let mut reverse = Vec::with_capacity(lines.len());
        for line in &lines {
            let matches: Vec<usize> = by_node[line.to]
                .iter()
                .copied()
                .filter(|&l| lines[l].to == line.from)
                .collect();
            match matches.as_slice() {
                [single] => reverse.push(*single),
                _ => {
                    return Err(DispatchError::MissingReverseLine {
                        network: carrier.to_string(),
                        from: plant.nodes[line.from].name.clone(),
                        to: plant.nodes[line.to].name.clone(),
                    })
                }
            }
        }

        Ok(Self {
            carrier,
            lines,
            by_node,
            reverse,
        })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Each unordered pair once, as `(line, reverse)` with `line < reverse`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.reverse
            .iter()
            .enumerate()
            .filter(|(l, r)| l < *r)
            .map(|(l, &r)| (l, r))
    }
}

/// Indices of prepared components per node, one list per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentsByNode {
    pub turbines: Vec<Vec<usize>>,
    pub diesels: Vec<Vec<usize>>,
    pub boilers: Vec<Vec<usize>>,
    pub chillers: Vec<Vec<usize>>,
    pub electric_storage: Vec<Vec<usize>>,
    pub heat_storage: Vec<Vec<usize>>,
    pub cooling_storage: Vec<Vec<usize>>,
    pub grids: Vec<Vec<usize>>,
    pub renewables: Vec<Vec<usize>>,
}

fn group<T>(n_nodes: usize, items: &[T], node_of: impl Fn(&T) -> usize) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new(); n_nodes];
    for (i, item) in items.iter().enumerate() {
        out[node_of(item)].push(i);
    }
    out
}

impl ComponentsByNode {
    fn build(n_nodes: usize, prepared: &PreparedPlant) -> Self {
        Self {
            turbines: group(n_nodes, &prepared.turbines, |g| g.node.value()),
            diesels: group(n_nodes, &prepared.diesels, |g| g.node.value()),
            boilers: group(n_nodes, &prepared.boilers, |c| c.node.value()),
            chillers: group(n_nodes, &prepared.chillers, |c| c.node.value()),
            electric_storage: group(n_nodes, &prepared.electric_storage, |s| s.node.value()),
            heat_storage: group(n_nodes, &prepared.heat_storage, |s| s.node.value()),
            cooling_storage: group(n_nodes, &prepared.cooling_storage, |s| s.node.value()),
            grids: group(n_nodes, &prepared.grids, |g| g.node.value()),
            renewables: group(n_nodes, &prepared.renewables, |r| r.node.value()),
        }
    }

    fn hosts(&self, carrier: EnergyCarrier, node: usize) -> bool {
        let any = |lists: &[&Vec<Vec<usize>>]| lists.iter().any(|l| !l[node].is_empty());
        match carrier {
            EnergyCarrier::Electric => any(&[
                &self.turbines,
                &self.diesels,
                &self.chillers,
                &self.electric_storage,
                &self.grids,
                &self.renewables,
            ]),
            EnergyCarrier::Heat => any(&[&self.turbines, &self.boilers, &self.heat_storage]),
            EnergyCarrier::Cooling => any(&[&self.chillers, &self.cooling_storage]),
        }
    }
}

/// Everything location-dependent, built once per run.
#[derive(Debug, Clone)]
pub struct Topology {
    pub node_names: Vec<String>,
    /// Nodes in each carrier's balance, in plant order
    pub electric_nodes: Vec<usize>,
    pub heat_nodes: Vec<usize>,
    pub cooling_nodes: Vec<usize>,
    /// Node index to position in `electric_nodes`
    pub electric_position: Vec<Option<usize>>,
    pub electric: LineIndex,
    pub heat: LineIndex,
    pub cooling: LineIndex,
    /// Real part of the nodal admittance matrix (per-unit)
    pub g: Vec<Vec<f64>>,
    /// Imaginary part of the nodal admittance matrix (per-unit)
    pub b: Vec<Vec<f64>>,
    pub heat_loss: Vec<Vec<f64>>,
    pub cooling_loss: Vec<Vec<f64>>,
    pub components: ComponentsByNode,
    /// Demand series names per node and carrier
    pub loads: Vec<[Option<String>; 3]>,
}

impl Topology {
    pub fn build(
        plant: &Plant,
        prepared: &PreparedPlant,
        config: &DispatchConfig,
    ) -> DispatchResult<Self> {
        let n = plant.nodes.len();
        let index: HashMap<&str, usize> = plant
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.as_str(), i))
            .collect();

        let electric = LineIndex::build(plant, EnergyCarrier::Electric, &index)?;
        let heat = LineIndex::build(plant, EnergyCarrier::Heat, &index)?;
        let cooling = LineIndex::build(plant, EnergyCarrier::Cooling, &index)?;
        let components = ComponentsByNode::build(n, prepared);

        let active = |carrier: EnergyCarrier| -> Vec<usize> {
            (0..n)
                .filter(|&i| {
                    plant.nodes[i]
                        .sub_network(carrier)
                        .is_some_and(|s| s.is_active())
                        || components.hosts(carrier, i)
                })
                .collect()
        };
        let electric_nodes = active(EnergyCarrier::Electric);
        let heat_nodes = active(EnergyCarrier::Heat);
        let cooling_nodes = active(EnergyCarrier::Cooling);
        let mut electric_position = vec![None; n];
        for (pos, &node) in electric_nodes.iter().enumerate() {
            electric_position[node] = Some(pos);
        }

        let (g, b) = admittance(plant, config, &index)?;
        let factor = config.network.loop_return_factor;
        let heat_loss = loop_losses(plant, EnergyCarrier::Heat, &index, factor);
        let cooling_loss = loop_losses(plant, EnergyCarrier::Cooling, &index, factor);

        let loads = plant
            .nodes
            .iter()
            .map(|node| EnergyCarrier::ALL.map(|c| node.load(c).map(str::to_string)))
            .collect();

        let islands = mgopt_core::find_islands(&plant.nodes, EnergyCarrier::Electric);
        tracing::debug!(
            nodes = n,
            electric_lines = electric.len(),
            heat_lines = heat.len(),
            cooling_lines = cooling.len(),
            islands = islands.len(),
            "topology indexed"
        );

        Ok(Self {
            node_names: plant.nodes.iter().map(|n| n.name.clone()).collect(),
            electric_nodes,
            heat_nodes,
            cooling_nodes,
            electric_position,
            electric,
            heat,
            cooling,
            g,
            b,
            heat_loss,
            cooling_loss,
            components,
            loads,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_names.len()
    }

    pub fn lines(&self, carrier: EnergyCarrier) -> &LineIndex {
        match carrier {
            EnergyCarrier::Electric => &self.electric,
            EnergyCarrier::Heat => &self.heat,
            EnergyCarrier::Cooling => &self.cooling,
        }
    }

    pub fn load(&self, node: usize, carrier: EnergyCarrier) -> Option<&str> {
        let slot = match carrier {
            EnergyCarrier::Electric => 0,
            EnergyCarrier::Heat => 1,
            EnergyCarrier::Cooling => 2,
        };
        self.loads[node][slot].as_deref()
    }

    pub fn loss(&self, carrier: EnergyCarrier) -> Option<&Vec<Vec<f64>>> {
        match carrier {
            EnergyCarrier::Electric => None,
            EnergyCarrier::Heat => Some(&self.heat_loss),
            EnergyCarrier::Cooling => Some(&self.cooling_loss),
        }
    }
}

/// Nodal admittance from line impedance data.
///
/// `z = (r + jx) · length / 5280 / z_base` with `r, x` in kΩ per mile. Each
/// line adds `y = scale / z` to both diagonals and `−y` off the diagonal; a
/// line without `to` only touches its `from` diagonal.
fn admittance(
    plant: &Plant,
    config: &DispatchConfig,
    index: &HashMap<&str, usize>,
) -> DispatchResult<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    let n = plant.nodes.len();
    let mut y = vec![vec![Complex64::new(0.0, 0.0); n]; n];
    let z_base = config.bases.impedance_kohm();

    for line in &plant.lines {
        let conductor = config.network.conductor(&line.conductor).ok_or_else(|| {
            DispatchError::Config(format!("unknown conductor '{}'", line.conductor))
        })?;
        let per_mile = Complex64::new(conductor.r_ohm_per_mile, conductor.x_ohm_per_mile) / 1000.0;
        let z = per_mile * (line.length_ft / FEET_PER_MILE) / z_base;
        if z.norm() <= f64::EPSILON {
            return Err(DispatchError::Config(format!(
                "line from '{}' has zero impedance",
                line.from
            )));
        }
        let adm = Complex64::new(line.scale, 0.0) / z;

        let i = *index
            .get(line.from.as_str())
            .ok_or_else(|| DispatchError::UnknownNode(line.from.clone()))?;
        y[i][i] += adm;
        if let Some(to) = &line.to {
            let j = *index
                .get(to.as_str())
                .ok_or_else(|| DispatchError::UnknownNode(to.clone()))?;
            y[j][j] += adm;
            y[i][j] -= adm;
            y[j][i] -= adm;
        }
    }

    let g = y.iter().map(|row| row.iter().map(|v| v.re).collect()).collect();
    let b = y.iter().map(|row| row.iter().map(|v| v.im).collect()).collect();
    Ok((g, b))
}

/// Directed loop coefficients: the first listed neighbour is downstream
/// (`+1`, outbound), every other neighbour feeds back in at `−factor`.
fn loop_losses(
    plant: &Plant,
    carrier: EnergyCarrier,
    index: &HashMap<&str, usize>,
    factor: f64,
) -> Vec<Vec<f64>> {
    let n = plant.nodes.len();
    let mut loss = vec![vec![0.0; n]; n];
    for (m, node) in plant.nodes.iter().enumerate() {
        for (k, neighbour) in node.connections(carrier).iter().enumerate() {
            if let Some(&j) = index.get(neighbour.as_str()) {
                loss[m][j] = if k == 0 { 1.0 } else { -factor };
            }
        }
    }
    loss
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgopt_core::{LineSpec, NetworkNode, SubNetwork};

    fn sub(connections: &[&str]) -> SubNetwork {
        SubNetwork {
            load: None,
            connections: connections.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ring(carrier: EnergyCarrier, names: &[&str]) -> Vec<NetworkNode> {
        let k = names.len();
        (0..k)
            .map(|i| {
                NetworkNode::new(names[i])
                    .with_sub_network(carrier, sub(&[names[(i + 1) % k], names[(i + k - 1) % k]]))
            })
            .collect()
    }

    fn build(plant: &Plant) -> DispatchResult<Topology> {
        Topology::build(plant, &PreparedPlant::default(), &DispatchConfig::default())
    }

    #[test]
    fn every_line_has_exactly_one_reverse() {
        let plant = Plant {
            nodes: ring(EnergyCarrier::Heat, &["A", "B", "C", "D"]),
            ..Default::default()
        };
        let topo = build(&plant).unwrap();
        assert_eq!(topo.heat.len(), 8);
        for (l, line) in topo.heat.lines.iter().enumerate() {
            let r = topo.heat.reverse[l];
            assert_eq!(topo.heat.lines[r], Line { from: line.to, to: line.from });
            assert_eq!(topo.heat.reverse[r], l);
            let back: Vec<_> = topo.heat.by_node[line.to]
                .iter()
                .filter(|&&x| topo.heat.lines[x].to == line.from)
                .collect();
            assert_eq!(back.len(), 1);
        }
        assert_eq!(topo.heat.pairs().count(), 4);
    }

    #[test]
    fn one_sided_connection_fails_loudly() {
        let plant = Plant {
            nodes: vec![
                NetworkNode::new("A").with_sub_network(EnergyCarrier::Cooling, sub(&["B"])),
                NetworkNode::new("B").with_sub_network(EnergyCarrier::Cooling, sub(&[])),
            ],
            ..Default::default()
        };
        match build(&plant) {
            Err(DispatchError::MissingReverseLine { network, from, to }) => {
                assert_eq!(network, "cooling");
                assert_eq!((from.as_str(), to.as_str()), ("A", "B"));
            }
            other => panic!("expected MissingReverseLine, got {other:?}"),
        }
    }

    #[test]
    fn loop_loss_marks_downstream_and_return() {
        let plant = Plant {
            nodes: ring(EnergyCarrier::Cooling, &["A", "B", "C"]),
            ..Default::default()
        };
        let topo = build(&plant).unwrap();
        assert_eq!(topo.cooling_loss[0][1], 1.0);
        assert_eq!(topo.cooling_loss[0][2], -0.95);
        assert_eq!(topo.cooling_loss[1][0], -0.95);
        assert_eq!(topo.cooling_nodes, vec![0, 1, 2]);
        assert!(topo.electric_nodes.is_empty());
    }

    #[test]
    fn admittance_is_symmetric_with_negative_mutual_terms() {
        let plant = Plant {
            nodes: vec![
                NetworkNode::new("A").with_sub_network(EnergyCarrier::Electric, sub(&["B"])),
                NetworkNode::new("B").with_sub_network(EnergyCarrier::Electric, sub(&["A"])),
                NetworkNode::new("C").with_sub_network(
                    EnergyCarrier::Electric,
                    SubNetwork {
                        load: Some("c".into()),
                        connections: vec![],
                    },
                ),
            ],
            lines: vec![
                LineSpec {
                    from: "A".into(),
                    to: Some("B".into()),
                    length_ft: 600.0,
                    conductor: "250kcmil".into(),
                    scale: 1.0,
                },
                LineSpec {
                    from: "B".into(),
                    to: None,
                    length_ft: 300.0,
                    conductor: "350kcmil".into(),
                    scale: 0.1,
                },
            ],
            ..Default::default()
        };
        let topo = build(&plant).unwrap();
        let cfg = DispatchConfig::default();
        let z = Complex64::new(0.240440, 0.167776) / 1000.0 * (600.0 / 5280.0)
            / cfg.bases.impedance_kohm();
        let y = Complex64::new(1.0, 0.0) / z;

        assert!((topo.g[0][1] - topo.g[1][0]).abs() < 1e-12);
        assert!((topo.g[0][1] + y.re).abs() < 1e-9);
        assert!((topo.b[0][1] + y.im).abs() < 1e-9);
        assert!((topo.g[0][0] - y.re).abs() < 1e-9);
        assert!(topo.g[1][1] > topo.g[0][0], "shunt adds to B's diagonal");
        assert_eq!(topo.g[2][2], 0.0);
        assert_eq!(topo.electric_nodes, vec![0, 1, 2]);
        assert_eq!(topo.electric_position[2], Some(2));
        assert_eq!(topo.load(2, EnergyCarrier::Electric), Some("c"));
    }

    #[test]
    fn unknown_conductor_is_a_config_error() {
        let plant = Plant {
            nodes: vec![NetworkNode::new("A")],
            lines: vec![LineSpec {
                from: "A".into(),
                to: None,
                length_ft: 10.0,
                conductor: "copper-rope".into(),
                scale: 1.0,
            }],
            ..Default::default()
        };
        assert!(matches!(build(&plant), Err(DispatchError::Config(_))));
    }
}
