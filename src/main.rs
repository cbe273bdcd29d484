//! paci-sim - Entry point
//!
//! Runs one baseline protocol and reports the resulting trace.
//!
//! CLI Usage:
//!   cargo run -- --protocol sap                     # 2 s single action potential
//!   cargo run -- --protocol pacing --json           # 10 s irregular pacing, JSON export
//!   cargo run -- --protocol clamp --csv clamp.csv   # voltage clamp with currents

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use paci_sim::{
    config::ModelParameters,
    export::{export_trace_json, CsvExporter},
    Protocol, Simulation,
};

struct CliOptions {
    protocol: Protocol,
    params_path: Option<PathBuf>,
    csv_path: Option<PathBuf>,
    json: bool,
    currents: bool,
}

fn print_help() {
    println!("paci-sim");
    println!();
    println!("Usage: paci-sim [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --protocol, -p P   sap | pacing | clamp (default: sap)");
    println!("  --params FILE      Model parameters JSON (default: built-in values)");
    println!("  --csv FILE         Write the trace as CSV");
    println!("  --json             Write a timestamped JSON export to exports/");
    println!("  --currents         Record current snapshots for every protocol");
    println!("  --help, -h         Show this help");
}

fn parse_protocol(name: &str) -> Result<Protocol> {
    match name {
        "sap" | "single" => Ok(Protocol::baseline_single_action_potential()),
        "pacing" | "ip" => Ok(Protocol::baseline_irregular_pacing()),
        "clamp" | "vc" => Ok(Protocol::baseline_voltage_clamp()),
        other => bail!("unknown protocol '{}', expected sap, pacing or clamp", other),
    }
}

fn parse_args() -> Result<CliOptions> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = CliOptions {
        protocol: Protocol::baseline_single_action_potential(),
        params_path: None,
        csv_path: None,
        json: false,
        currents: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--protocol" | "-p" => {
                i += 1;
                if i < args.len() {
                    options.protocol = parse_protocol(&args[i])?;
                }
            }
            "--params" => {
                i += 1;
                if i < args.len() {
                    options.params_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--csv" => {
                i += 1;
                if i < args.len() {
                    options.csv_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--json" => options.json = true,
            "--currents" => options.currents = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => log::warn!("Ignoring unknown argument {}", other),
        }
        i += 1;
    }

    Ok(options)
}

fn main() -> Result<()> {
    env_logger::init();

    let options = parse_args()?;

    let params = match &options.params_path {
        Some(path) => ModelParameters::load_or_default(path),
        None => ModelParameters::default(),
    };

    let mut simulation = Simulation::new(params);
    if options.currents {
        simulation = simulation.with_current_recording(true);
    }

    println!("=== paci-sim: {} ===\n", options.protocol.title());
    let start_time = Instant::now();
    let report = simulation.run_detailed(&options.protocol)?;
    let elapsed = start_time.elapsed();
    let trace = &report.trace;

    println!("Samples:          {}", trace.len());
    println!("RHS evaluations:  {}", report.stats.rhs_evaluations);
    println!("Rejected steps:   {}", report.stats.rejected_steps);
    if let Some((min, max)) = trace.voltage_range() {
        println!("Voltage range:    {:.1} mV to {:.1} mV", min * 1000.0, max * 1000.0);
    }
    if let Some(info) = trace.pacing_info() {
        println!("Peaks:            {}", info.peak_times_sec.len());
        println!("APD90s:           {}", info.apd90_times_sec.len());
        println!("Stimulations:     {}", info.stimulation_times_sec.len());
    }
    println!("Wall time:        {:.2?}", elapsed);

    let include_currents = trace.currents().is_some();
    if let Some(path) = &options.csv_path {
        let mut exporter = CsvExporter::create(path, include_currents)?;
        exporter.write_trace(trace)?;
        let written = exporter.finish()?;
        println!("\nCSV written to {}", written.display());
    }
    if options.json {
        let path = export_trace_json(&options.protocol, trace)?;
        println!("JSON written to {}", path.display());
    }

    Ok(())
}
