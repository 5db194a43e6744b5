//! Command-line interface for shellscan
//!
//! Calibrates one long-format calibration table and prints the
//! per-specimen reflectance estimates

use serde_json::json;
use shellscan::{calibrate_table, BatchReport, SpecimenReflectance};
use std::{env, path::Path, process};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut show_curves = false;
    let mut table_path_arg = None;

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--curves" => show_curves = true,
            "--help" | "-h" => {
                print_help(&args[0]);
                process::exit(0);
            }
            arg if !arg.starts_with("--") => {
                if table_path_arg.is_none() {
                    table_path_arg = Some(arg.to_string());
                } else {
                    eprintln!("Error: Multiple table paths provided");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Use --help for usage information");
                process::exit(1);
            }
        }
    }

    let table_path_str = match table_path_arg {
        Some(path) => path,
        None => {
            print_help(&args[0]);
            process::exit(1);
        }
    };

    let table_path = Path::new(&table_path_str);

    if !table_path.exists() {
        eprintln!("Error: File '{}' does not exist", table_path.display());
        process::exit(1);
    }

    match calibrate_table(table_path) {
        Ok(report) => {
            print_report(&report, show_curves);
            if report.invalid_count() > 0 {
                process::exit(2);
            }
        }
        Err(error) => {
            eprintln!("Calibration failed: {}", error);
            eprintln!("{}", error.user_message());
            process::exit(1);
        }
    }
}

fn print_help(program_name: &str) {
    eprintln!("Usage: {} [OPTIONS] <calibration.csv>", program_name);
    eprintln!();
    eprintln!("Estimate specimen reflectance from a long-format calibration table");
    eprintln!("(photo,region,channel,intensity,reference).");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --curves         Include fitted calibration curves in the JSON output");
    eprintln!("  --help, -h       Show this help message");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for per-curve fit diagnostics.");
    eprintln!();
    eprintln!("Exit status is 2 when any specimen could not be estimated.");
}

fn record_json(record: &SpecimenReflectance) -> serde_json::Value {
    match &record.outcome {
        Ok(estimate) => json!({
            "specimen": record.specimen,
            "photo": record.photo,
            "reflectance": estimate.reflectance,
            "sigma": estimate.sigma,
            "scaled": record.scaled,
            "valid": true,
        }),
        Err(error) => json!({
            "specimen": record.specimen,
            "photo": record.photo,
            "valid": false,
            "error": error.to_string(),
        }),
    }
}

fn print_report(report: &BatchReport, show_curves: bool) {
    // JSON to stdout for programmatic use
    let records: Vec<serde_json::Value> = report.records.iter().map(record_json).collect();
    let output = if show_curves {
        json!({ "records": records, "calibrations": report.calibrations })
    } else {
        json!({ "records": records })
    };
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error serializing result: {}", e),
    }

    // Summary to stderr for human reading
    eprintln!();
    eprintln!("Calibration Summary:");
    eprintln!("  Photos:    {}", report.calibrations.len());
    eprintln!("  Valid:     {}", report.valid_count());
    eprintln!("  Invalid:   {}", report.invalid_count());

    for failure in report.failures() {
        if let Err(error) = &failure.outcome {
            eprintln!("  Inspect: {}", error.user_message());
        }
    }
}
