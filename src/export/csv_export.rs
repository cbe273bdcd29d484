//! CSV time-series export for simulation traces.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Local;

use crate::model::CurrentKind;
use crate::simulation::Trace;

/// CSV exporter for one or more traces
///
/// Columns are `time_sec, voltage_V`, followed by one column per membrane
/// current and their sum when currents are included.
pub struct CsvExporter {
    writer: csv::Writer<File>,
    include_currents: bool,
    rows_written: usize,
    /// Path to output file
    path: PathBuf,
}

impl CsvExporter {
    /// Create an exporter in `exports/` with a timestamped filename
    ///
    /// Creates the exports directory if it doesn't exist.
    pub fn new(include_currents: bool) -> Result<Self> {
        let dir = PathBuf::from("exports");
        std::fs::create_dir_all(&dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("trace_{}.csv", timestamp));
        Self::create(path, include_currents)
    }

    /// Create an exporter writing to `path`
    pub fn create<P: AsRef<Path>>(path: P, include_currents: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header = vec!["time_sec".to_string(), "voltage_V".to_string()];
        if include_currents {
            header.extend(CurrentKind::ALL.iter().map(|k| k.name().to_string()));
            header.push("i_total".to_string());
        }
        writer.write_record(&header)?;

        log::info!("CSV export started: {}", path.display());

        Ok(Self {
            writer,
            include_currents,
            rows_written: 0,
            path,
        })
    }

    /// Append every sample of `trace`; returns the number of rows written
    pub fn write_trace(&mut self, trace: &Trace) -> Result<usize> {
        let currents = match (self.include_currents, trace.currents()) {
            (true, Some(c)) => Some(c),
            (true, None) => bail!("trace has no current snapshots to export"),
            (false, _) => None,
        };

        for (i, (t, v)) in trace.samples().enumerate() {
            let mut row = vec![t.to_string(), v.to_string()];
            if let Some(snapshot) = currents.and_then(|c| c.get(i)) {
                row.extend(snapshot.iter().map(|(_, value)| value.to_string()));
                row.push(snapshot.total().to_string());
            }
            self.writer.write_record(&row)?;
        }
        self.rows_written += trace.len();
        Ok(trace.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Finish writing and return the output path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        log::info!(
            "CSV export completed: {} ({} rows)",
            self.path.display(),
            self.rows_written
        );
        Ok(self.path)
    }

    /// Get the output path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
