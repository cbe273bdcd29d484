//! Export functionality for simulation traces.
//!
//! Provides CSV time-series export and timestamped JSON trace export.

mod csv_export;
mod json_export;

pub use csv_export::CsvExporter;
pub use json_export::{export_trace_json, export_trace_json_to, TraceExport};
