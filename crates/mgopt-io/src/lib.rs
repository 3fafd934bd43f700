//! # mgopt-io: Plant, Configuration, Forecast and Result Files
//!
//! Thin file boundary around `mgopt-algo`. Every loader returns
//! `anyhow::Result` with the offending path in its context; the algorithm
//! crate never touches the filesystem.
//!
//! | Module | Reads / writes | Format |
//! |--------|----------------|--------|
//! | [`plant`] | [`mgopt_core::Plant`], [`mgopt_core::DispatchConfig`] | JSON, TOML |
//! | [`forecast`] | [`mgopt_algo::TableForecast`] | CSV, `timestamp` first |
//! | [`sink`] | schedule rows via [`mgopt_algo::ResultSink`] | CSV, one row per step |
//! | [`summary`] | [`mgopt_algo::RunReport`] | JSON |
//!
//! Timestamps everywhere use [`TIMESTAMP_FORMAT`].

pub mod forecast;
pub mod plant;
pub mod sink;
pub mod summary;

pub use forecast::{load_forecast_csv, read_forecast};
pub use plant::{load_config, load_plant, parse_config, parse_plant};
pub use sink::CsvResultSink;
pub use summary::write_summary;

/// `2011-07-01 13:00:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a timestamp in [`TIMESTAMP_FORMAT`], also accepting an ISO `T`.
pub fn parse_timestamp(text: &str) -> anyhow::Result<chrono::NaiveDateTime> {
    let text = text.trim();
    chrono::NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{text}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_space_or_t() {
        let a = parse_timestamp("2011-07-01 13:00:00").unwrap();
        let b = parse_timestamp("2011-07-01T13:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("July 1st").is_err());
    }
}
