//! Forecast adapter boundary.
//!
//! The optimizer reads demand, irradiance and prices through [`Forecast`] and
//! nothing else. Lookups are pure; the driver gathers one horizon's worth into
//! [`HorizonInputs`] before building, and nothing is cached past that.
//!
//! [`TableForecast`] is the in-memory implementation used by the CSV loader
//! and the tests. Column names:
//!
//! | Column | Meaning | Unit |
//! |--------|---------|------|
//! | `electric:<load>` / `heat:<load>` / `cooling:<load>` | demand | kW |
//! | `solar:<node>` or `solar` | irradiance as a fraction of rated output | – |
//! | `utility_price` | electricity import price | $/kWh |
//! | `gas_price` | natural gas price | $/kcf |
//! | `diesel_price` | diesel price per kWh of fuel energy | $/kWh |

use chrono::NaiveDateTime;
use mgopt_core::{EnergyCarrier, FuelKind, PerUnitBases};
use std::collections::{BTreeMap, HashMap};

use crate::error::{DispatchError, DispatchResult};
use crate::topology::Topology;

/// Energy content of natural gas.
pub const KWH_PER_KCF: f64 = 293.07;

/// Time-indexed lookups for one plant.
pub trait Forecast {
    /// Normalized demand of the load series `load` (a node's load reference).
    fn demand(&self, date: NaiveDateTime, carrier: EnergyCarrier, load: &str)
        -> DispatchResult<f64>;

    /// Normalized solar output at `node`, as a fraction of rated size.
    fn solar_forecast(&self, date: NaiveDateTime, node: &str) -> DispatchResult<f64>;

    /// Utility import price in $/kWh.
    fn utility_price(&self, date: NaiveDateTime) -> DispatchResult<f64>;

    /// Fuel price in $/kWh of fuel energy.
    fn fuel_price(&self, date: NaiveDateTime, fuel: FuelKind) -> DispatchResult<f64>;
}

/// Columnar forecast table keyed by timestamp.
#[derive(Debug, Clone)]
pub struct TableForecast {
    index: BTreeMap<NaiveDateTime, usize>,
    columns: HashMap<String, Vec<f64>>,
    bases: PerUnitBases,
}

impl TableForecast {
    pub fn new(timestamps: Vec<NaiveDateTime>, bases: PerUnitBases) -> Self {
        Self {
            index: timestamps.into_iter().enumerate().map(|(i, t)| (t, i)).collect(),
            columns: HashMap::new(),
            bases,
        }
    }

    /// Adds or replaces a column. Values must align with the timestamps.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert_column(name, values);
        self
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.insert(name.into(), values);
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.index.keys().next().copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    fn value(&self, date: NaiveDateTime, column: &str) -> DispatchResult<f64> {
        let row = *self
            .index
            .get(&date)
            .ok_or_else(|| DispatchError::Forecast(format!("no data for {date}")))?;
        let values = self
            .columns
            .get(column)
            .ok_or_else(|| DispatchError::Forecast(format!("missing column '{column}'")))?;
        values.get(row).copied().ok_or_else(|| {
            DispatchError::Forecast(format!("column '{column}' is shorter than the index"))
        })
    }
}

impl Forecast for TableForecast {
    fn demand(
        &self,
        date: NaiveDateTime,
        carrier: EnergyCarrier,
        load: &str,
    ) -> DispatchResult<f64> {
        let kw = self.value(date, &format!("{carrier}:{load}"))?;
        Ok(kw / self.bases.capacity(carrier).value())
    }

    fn solar_forecast(&self, date: NaiveDateTime, node: &str) -> DispatchResult<f64> {
        let specific = format!("solar:{node}");
        if self.columns.contains_key(&specific) {
            self.value(date, &specific)
        } else {
            self.value(date, "solar")
        }
    }

    fn utility_price(&self, date: NaiveDateTime) -> DispatchResult<f64> {
        self.value(date, "utility_price")
    }

    fn fuel_price(&self, date: NaiveDateTime, fuel: FuelKind) -> DispatchResult<f64> {
        match fuel {
            FuelKind::NaturalGas => Ok(self.value(date, "gas_price")? / KWH_PER_KCF),
            FuelKind::Diesel => self.value(date, "diesel_price"),
        }
    }
}

/// One horizon's forecast values, gathered up front.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonInputs {
    pub dates: Vec<NaiveDateTime>,
    /// `[node][t]` per-unit demand, zero where a node has no load
    pub electric_demand: Vec<Vec<f64>>,
    pub heat_demand: Vec<Vec<f64>>,
    pub cooling_demand: Vec<Vec<f64>>,
    /// `[renewable][t]` fraction of rated output
    pub solar: Vec<Vec<f64>>,
    pub utility_price: Vec<f64>,
    pub gas_price: Vec<f64>,
    pub diesel_price: Vec<f64>,
}

impl HorizonInputs {
    pub fn gather<F: Forecast + ?Sized>(
        forecast: &F,
        topology: &Topology,
        renewable_nodes: &[usize],
        dates: &[NaiveDateTime],
    ) -> DispatchResult<Self> {
        let demand = |carrier: EnergyCarrier| -> DispatchResult<Vec<Vec<f64>>> {
            (0..topology.node_count())
                .map(|node| match topology.load(node, carrier) {
                    Some(load) => dates
                        .iter()
                        .map(|&d| forecast.demand(d, carrier, load))
                        .collect::<DispatchResult<Vec<f64>>>(),
                    None => Ok(vec![0.0; dates.len()]),
                })
                .collect()
        };
        let solar = renewable_nodes
            .iter()
            .map(|&node| {
                dates
                    .iter()
                    .map(|&d| forecast.solar_forecast(d, &topology.node_names[node]))
                    .collect()
            })
            .collect::<DispatchResult<Vec<Vec<f64>>>>()?;
        let prices = |f: &dyn Fn(NaiveDateTime) -> DispatchResult<f64>| -> DispatchResult<Vec<f64>> {
            dates.iter().map(|&d| f(d)).collect()
        };

        Ok(Self {
            dates: dates.to_vec(),
            electric_demand: demand(EnergyCarrier::Electric)?,
            heat_demand: demand(EnergyCarrier::Heat)?,
            cooling_demand: demand(EnergyCarrier::Cooling)?,
            solar,
            utility_price: prices(&|d| forecast.utility_price(d))?,
            gas_price: prices(&|d| forecast.fuel_price(d, FuelKind::NaturalGas))?,
            diesel_price: prices(&|d| forecast.fuel_price(d, FuelKind::Diesel))?,
        })
    }

    pub fn steps(&self) -> usize {
        self.dates.len()
    }

    pub fn demand(&self, carrier: EnergyCarrier) -> &Vec<Vec<f64>> {
        match carrier {
            EnergyCarrier::Electric => &self.electric_demand,
            EnergyCarrier::Heat => &self.heat_demand,
            EnergyCarrier::Cooling => &self.cooling_demand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2011, 7, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        (0..n).map(|h| start + Duration::hours(h as i64)).collect()
    }

    #[test]
    fn demand_is_normalized_by_carrier_base() {
        let dates = hours(2);
        let table = TableForecast::new(dates.clone(), PerUnitBases::default())
            .with_column("electric:SPU", vec![1250.0, 2500.0])
            .with_column("heat:SPU", vec![10000.0, 0.0]);
        let e = table.demand(dates[1], EnergyCarrier::Electric, "SPU").unwrap();
        let h = table.demand(dates[0], EnergyCarrier::Heat, "SPU").unwrap();
        assert!((e - 1.0).abs() < 1e-12);
        assert!((h - 0.5).abs() < 1e-12);
    }

    #[test]
    fn gas_is_converted_to_energy_price() {
        let dates = hours(1);
        let table = TableForecast::new(dates.clone(), PerUnitBases::default())
            .with_column("gas_price", vec![KWH_PER_KCF * 0.03]);
        let p = table.fuel_price(dates[0], FuelKind::NaturalGas).unwrap();
        assert!((p - 0.03).abs() < 1e-12);
    }

    #[test]
    fn solar_falls_back_to_shared_column() {
        let dates = hours(1);
        let table = TableForecast::new(dates.clone(), PerUnitBases::default())
            .with_column("solar", vec![0.4])
            .with_column("solar:PV", vec![0.7]);
        assert_eq!(table.solar_forecast(dates[0], "PV").unwrap(), 0.7);
        assert_eq!(table.solar_forecast(dates[0], "ROOF").unwrap(), 0.4);
    }

    #[test]
    fn missing_timestamp_and_column_are_errors() {
        let dates = hours(2);
        let table = TableForecast::new(dates[..1].to_vec(), PerUnitBases::default())
            .with_column("utility_price", vec![0.1]);
        assert!(matches!(
            table.utility_price(dates[1]),
            Err(DispatchError::Forecast(_))
        ));
        assert!(matches!(
            table.fuel_price(dates[0], FuelKind::Diesel),
            Err(DispatchError::Forecast(_))
        ));
    }
}
