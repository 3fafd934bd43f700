//! Forecast tables from CSV.
//!
//! The first column holds timestamps, every other column is a series named
//! as [`mgopt_algo::forecast`] expects (`electric:<load>`, `solar`,
//! `utility_price`, ...). Demand columns are in kW and are normalized by the
//! table using the configured bases.
//!
//! ```text
//! timestamp,electric:campus,heat:campus,solar,utility_price,gas_price,diesel_price
//! 2011-07-01 00:00:00,4120.5,2210.0,0.0,0.081,4.95,0.21
//! ```

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use mgopt_algo::TableForecast;
use mgopt_core::PerUnitBases;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::parse_timestamp;

/// Reads a forecast table from any CSV source.
pub fn read_forecast<R: Read>(reader: R, bases: &PerUnitBases) -> Result<TableForecast> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().context("reading forecast header")?.clone();
    if headers.len() < 2 {
        bail!("forecast needs a timestamp column and at least one series");
    }
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut stamps = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading forecast row {}", row + 1))?;
        let stamp = record.get(0).unwrap_or_default();
        stamps.push(parse_timestamp(stamp).with_context(|| format!("forecast row {}", row + 1))?);
        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i + 1).unwrap_or_default();
            let value: f64 = cell.parse().with_context(|| {
                format!("forecast row {}, column '{}': '{cell}' is not a number", row + 1, names[i])
            })?;
            column.push(value);
        }
    }
    if stamps.windows(2).any(|w| w[1] <= w[0]) {
        bail!("forecast timestamps must be strictly increasing");
    }

    let mut table = TableForecast::new(stamps, bases.clone());
    for (name, values) in names.into_iter().zip(columns) {
        table.insert_column(name, values);
    }
    Ok(table)
}

pub fn load_forecast_csv(path: &Path, bases: &PerUnitBases) -> Result<TableForecast> {
    let file =
        File::open(path).with_context(|| format!("opening forecast '{}'", path.display()))?;
    let table = read_forecast(file, bases).with_context(|| format!("in '{}'", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        rows = table.len(),
        "forecast loaded"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mgopt_algo::Forecast;
    use mgopt_core::{EnergyCarrier, FuelKind};

    const CSV: &str = "\
timestamp,electric:campus,utility_price,gas_price,diesel_price
2011-07-01 00:00:00,2500,0.1,293.07,0.2
2011-07-01 01:00:00,1250,0.2,293.07,0.2
";

    #[test]
    fn demand_is_normalized_and_gas_converted() {
        let bases = PerUnitBases::default();
        let table = read_forecast(CSV.as_bytes(), &bases).unwrap();
        assert_eq!(table.len(), 2);
        let t1 = NaiveDate::from_ymd_opt(2011, 7, 1)
            .and_then(|d| d.and_hms_opt(1, 0, 0))
            .unwrap();
        let demand = table.demand(t1, EnergyCarrier::Electric, "campus").unwrap();
        assert!((demand - 0.5).abs() < 1e-12);
        let gas = table.fuel_price(t1, FuelKind::NaturalGas).unwrap();
        assert!((gas - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bad_cell_names_row_and_column() {
        let text = "timestamp,utility_price\n2011-07-01 00:00:00,cheap\n";
        let err = read_forecast(text.as_bytes(), &PerUnitBases::default()).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("utility_price"), "{msg}");
        assert!(msg.contains("row 1"), "{msg}");
    }

    #[test]
    fn unordered_timestamps_are_rejected() {
        let text = "timestamp,solar\n2011-07-01 01:00:00,0.1\n2011-07-01 00:00:00,0.2\n";
        assert!(read_forecast(text.as_bytes(), &PerUnitBases::default()).is_err());
    }
}
