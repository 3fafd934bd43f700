//! Prepared-plant overview.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use mgopt_algo::preprocess::prepare_component;
use mgopt_algo::{PreparedPlant, Topology};
use mgopt_core::{find_islands, EnergyCarrier};
use mgopt_io::{load_config, load_plant};
use tabwriter::TabWriter;

pub fn handle(plant_path: &Path, config_path: Option<&Path>) -> Result<()> {
    let plant = load_plant(plant_path)?;
    let config = load_config(config_path)?;
    let prepared = PreparedPlant::prepare(&plant, &config).context("preparing components")?;
    let topology = Topology::build(&plant, &prepared, &config).context("building topology")?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "COMPONENT\tKIND\tNODE\tSIZE (PU)\tSEGMENTS\tSTATUS")?;
    for component in &plant.components {
        let name = component.name();
        let status = if prepared.excluded.iter().any(|e| e == name) {
            "excluded"
        } else {
            "active"
        };
        let detail = prepare_component(component, &plant, &config)
            .with_context(|| format!("preparing {name}"))?;
        let size = detail
            .rated_size()
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "-".into());
        let segments = detail
            .curve()
            .map(|c| c.len().to_string())
            .unwrap_or_else(|| "-".into());
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            name,
            component.kind_label(),
            component.node().unwrap_or("-"),
            size,
            segments,
            status
        )?;
    }
    writer.flush()?;

    println!();
    println!(
        "nodes: {} (electric {}, heat {}, cooling {}), lines: {}",
        topology.node_count(),
        topology.electric_nodes.len(),
        topology.heat_nodes.len(),
        topology.cooling_nodes.len(),
        plant.lines.len()
    );
    for carrier in EnergyCarrier::ALL {
        let islands = find_islands(&plant.nodes, carrier);
        if islands.is_empty() {
            continue;
        }
        println!("{carrier} islands: {}", islands.len());
        for island in islands {
            println!("  #{}: {}", island.island_id, island.nodes.join(", "));
        }
    }
    Ok(())
}
