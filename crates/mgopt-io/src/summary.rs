//! JSON run summary.

use anyhow::{Context, Result};
use mgopt_algo::RunReport;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Summary<'a> {
    plant: &'a str,
    horizons: usize,
    failed: usize,
    non_converged: usize,
    total_cost: f64,
    reports: &'a RunReport,
}

/// Writes per-horizon status, iterations, voltage gap and objective.
pub fn write_summary(path: &Path, plant: &str, run: &RunReport) -> Result<()> {
    let summary = Summary {
        plant,
        horizons: run.horizons.len(),
        failed: run.failed(),
        non_converged: run.non_converged(),
        total_cost: run.total_cost(),
        reports: run,
    };
    let text = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
    fs::write(path, text).with_context(|| format!("writing summary '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mgopt_algo::{HorizonReport, SolveStatus};

    #[test]
    fn summary_lists_horizons_with_status() {
        let start = NaiveDate::from_ymd_opt(2011, 7, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let run = RunReport {
            horizons: vec![HorizonReport {
                index: 0,
                start,
                status: SolveStatus::Infeasible,
                iterations: 1,
                converged: false,
                max_gap: f64::NAN,
                objective: None,
            }],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        write_summary(&path, "campus", &run).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["failed"], 1);
        assert_eq!(value["reports"]["horizons"][0]["status"], "infeasible");
        assert!(value["reports"]["horizons"][0]["max_gap"].is_null());
    }
}
