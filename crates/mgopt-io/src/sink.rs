//! Wide CSV schedule writer.
//!
//! One row per time step per horizon:
//!
//! ```text
//! horizon,timestamp,status,converged,gt1.output_kw,utility.import_kw,...
//! 0,2011-07-01 00:00:00,optimal,true,612.4,1830.2,...
//! 1,2011-07-01 01:00:00,infeasible,false,,,...
//! ```
//!
//! Columns are fixed by the first solved horizon. A failed horizon gets a
//! single row with its status and empty value cells. Rows are flushed as each
//! horizon completes.

use chrono::NaiveDateTime;
use mgopt_algo::{DispatchError, DispatchResult, HorizonReport, ResultSink};
use mgopt_core::MgError;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

use crate::TIMESTAMP_FORMAT;

const FIXED_COLUMNS: [&str; 4] = ["horizon", "timestamp", "status", "converged"];

fn io_error(err: impl std::error::Error + Send + Sync + 'static) -> DispatchError {
    DispatchError::Plant(MgError::Io(io::Error::other(err)))
}

pub struct CsvResultSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Option<Vec<String>>,
    positions: HashMap<String, usize>,
    /// Values of the horizon in progress, by step
    current: BTreeMap<NaiveDateTime, Vec<(String, f64)>>,
    /// Failed-horizon rows waiting for the header
    pending: Vec<Vec<String>>,
    rows: usize,
}

impl<W: Write> CsvResultSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            columns: None,
            positions: HashMap::new(),
            current: BTreeMap::new(),
            pending: Vec::new(),
            rows: 0,
        }
    }

    /// Data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn write_header(&mut self, columns: Vec<String>) -> DispatchResult<()> {
        let header: Vec<&str> = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(columns.iter().map(String::as_str))
            .collect();
        self.writer.write_record(&header).map_err(io_error)?;
        self.positions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        let width = columns.len();
        self.columns = Some(columns);
        for mut row in std::mem::take(&mut self.pending) {
            row.resize(FIXED_COLUMNS.len() + width, String::new());
            self.writer.write_record(&row).map_err(io_error)?;
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.columns.as_ref().map_or(0, Vec::len)
    }

    /// Writes any buffered rows and returns the inner writer.
    pub fn finish(mut self) -> DispatchResult<W> {
        if self.columns.is_none() {
            self.write_header(Vec::new())?;
        }
        self.writer.flush().map_err(io_error)?;
        self.writer
            .into_inner()
            .map_err(|e| io_error(e.into_error()))
    }
}

impl<W: Write> ResultSink for CsvResultSink<W> {
    fn begin_horizon(&mut self, _index: usize, _start: NaiveDateTime) -> DispatchResult<()> {
        self.current.clear();
        Ok(())
    }

    fn record(&mut self, time: NaiveDateTime, name: &str, value: f64) -> DispatchResult<()> {
        self.current
            .entry(time)
            .or_default()
            .push((name.to_string(), value));
        Ok(())
    }

    fn end_horizon(&mut self, report: &HorizonReport) -> DispatchResult<()> {
        let fixed = |time: NaiveDateTime| -> Vec<String> {
            vec![
                report.index.to_string(),
                time.format(TIMESTAMP_FORMAT).to_string(),
                report.status.to_string(),
                report.converged.to_string(),
            ]
        };

        if report.is_failed() || self.current.is_empty() {
            let mut row = fixed(report.start);
            if self.columns.is_some() {
                row.resize(FIXED_COLUMNS.len() + self.width(), String::new());
                self.writer.write_record(&row).map_err(io_error)?;
            } else {
                self.pending.push(row);
            }
            self.rows += 1;
            self.current.clear();
            return self.writer.flush().map_err(io_error);
        }

        if self.columns.is_none() {
            let first = self
                .current
                .values()
                .next()
                .map(|values| values.iter().map(|(name, _)| name.clone()).collect())
                .unwrap_or_default();
            self.write_header(first)?;
        }

        let width = self.width();
        let current = std::mem::take(&mut self.current);
        for (time, values) in current {
            let mut cells = vec![String::new(); width];
            for (name, value) in values {
                match self.positions.get(&name) {
                    Some(&i) => cells[i] = value.to_string(),
                    None => tracing::warn!(column = %name, "value without a column dropped"),
                }
            }
            let mut row = fixed(time);
            row.extend(cells);
            self.writer.write_record(&row).map_err(io_error)?;
            self.rows += 1;
        }
        self.writer.flush().map_err(io_error)
    }
}
