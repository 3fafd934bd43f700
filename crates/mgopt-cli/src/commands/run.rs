use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context, Result};
use mgopt_algo::{ClarabelBackend, PreparedPlant, RecedingHorizon, Topology};
use mgopt_io::{
    load_config, load_forecast_csv, load_plant, parse_timestamp, write_summary, CsvResultSink,
};
use tracing::info;

pub struct RunArgs<'a> {
    pub plant: &'a Path,
    pub forecast: &'a Path,
    pub config: Option<&'a Path>,
    pub start: Option<&'a str>,
    pub horizons: Option<usize>,
    pub out: &'a Path,
    pub summary: Option<&'a Path>,
}

pub fn handle(args: &RunArgs) -> Result<()> {
    let plant = load_plant(args.plant)?;
    let config = load_config(args.config)?;
    let forecast = load_forecast_csv(args.forecast, &config.bases)?;

    let start = match args.start {
        Some(text) => parse_timestamp(text)?,
        None => match forecast.first_timestamp() {
            Some(first) => first,
            None => bail!("forecast {} has no rows", args.forecast.display()),
        },
    };
    let horizons = args.horizons.unwrap_or(config.horizon.horizons);

    let prepared = PreparedPlant::prepare(&plant, &config).context("preparing components")?;
    let topology = Topology::build(&plant, &prepared, &config).context("building topology")?;
    let backend = ClarabelBackend::new(config.solver.clone());

    let file = File::create(args.out)
        .with_context(|| format!("creating schedule {}", args.out.display()))?;
    let mut sink = CsvResultSink::new(BufWriter::new(file));
    info!(
        plant = %plant.name,
        %start,
        horizons,
        steps = config.horizon.steps,
        "starting dispatch"
    );
    let mut driver =
        RecedingHorizon::new(&prepared, &topology, &config, &forecast, &backend, start);
    let run = driver.run(horizons, &mut sink).context("running dispatch")?;
    let rows = sink.rows();
    sink.finish()
        .with_context(|| format!("writing schedule {}", args.out.display()))?;

    if let Some(path) = args.summary {
        write_summary(path, &plant.name, &run)?;
    }

    println!(
        "{} horizons ({} failed, {} not converged), {} rows -> {}",
        run.horizons.len(),
        run.failed(),
        run.non_converged(),
        rows,
        args.out.display()
    );
    println!("total cost: ${:.2}", run.total_cost());
    Ok(())
}
