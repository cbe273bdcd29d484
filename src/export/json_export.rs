//! JSON export of a finished trace.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use crate::protocol::Protocol;
use crate::simulation::Trace;

/// Full trace export structure
#[derive(Debug, Clone, Serialize)]
pub struct TraceExport<'a> {
    /// Export timestamp
    pub exported_at: String,
    /// Export version for compatibility
    pub version: &'static str,
    pub protocol: &'a Protocol,
    pub samples: usize,
    /// `(min, max)` voltage (V)
    pub voltage_range: Option<(f64, f64)>,
    pub trace: &'a Trace,
}

impl<'a> TraceExport<'a> {
    pub fn new(protocol: &'a Protocol, trace: &'a Trace) -> Self {
        Self {
            exported_at: Local::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
            protocol,
            samples: trace.len(),
            voltage_range: trace.voltage_range(),
            trace,
        }
    }
}

/// Export a trace to JSON
///
/// Creates the exports directory if it doesn't exist.
/// Filename is auto-generated with timestamp: `trace_YYYYMMDD_HHMMSS.json`
///
/// Returns the path to the saved JSON file.
pub fn export_trace_json(protocol: &Protocol, trace: &Trace) -> Result<PathBuf> {
    let dir = PathBuf::from("exports");
    std::fs::create_dir_all(&dir)?;

    let timestamp = Local::now();
    let filename = format!("trace_{}.json", timestamp.format("%Y%m%d_%H%M%S"));
    let path = dir.join(&filename);

    export_trace_json_to(protocol, trace, &path)?;
    Ok(path)
}

/// Export a trace to a specific file
pub fn export_trace_json_to<P: AsRef<Path>>(protocol: &Protocol, trace: &Trace, path: P) -> Result<()> {
    let export = TraceExport::new(protocol, trace);

    let file = std::fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, &export)?;

    log::info!("JSON trace exported: {}", path.as_ref().display());
    Ok(())
}
