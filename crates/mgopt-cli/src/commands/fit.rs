//! Fitted segments and their cone form for a single component.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use mgopt_algo::preprocess::{prepare_component, PiecewiseCurve, PreparedComponent};
use mgopt_io::{load_config, load_plant};
use tabwriter::TabWriter;

pub fn handle(plant_path: &Path, component: &str, config_path: Option<&Path>) -> Result<()> {
    let plant = load_plant(plant_path)?;
    let config = load_config(config_path)?;
    let (_, found) = plant
        .component_by_name(component)
        .ok_or_else(|| anyhow!("no component named `{component}` in {}", plant.name))?;
    let prepared = prepare_component(found, &plant, &config)
        .with_context(|| format!("preparing {component}"))?;

    let Some(curve) = prepared.curve() else {
        bail!(
            "{component} is a {}, which has no efficiency curve",
            found.kind_label()
        );
    };
    println!("{component} ({}), input per unit of output", found.kind_label());
    print_curve(curve)?;

    if let PreparedComponent::Turbine(g) | PreparedComponent::DieselGenerator(g) = &prepared {
        println!();
        println!("reactive");
        print_curve(&g.reactive)?;
    }
    Ok(())
}

fn print_curve(curve: &PiecewiseCurve) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "K\tLOWER\tUPPER\tH\tF\tC\tB\tOFFSET\tE\tD")?;
    for (k, seg) in curve.segments.iter().enumerate() {
        writeln!(
            writer,
            "{}\t{:.4}\t{:.4}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            k,
            seg.lower,
            seg.upper,
            seg.quad.h,
            seg.quad.f,
            seg.quad.c,
            seg.soc.b,
            seg.soc.offset,
            seg.soc.e,
            seg.soc.d
        )?;
    }
    writer.flush()?;
    Ok(())
}
