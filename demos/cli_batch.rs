//! Batch CLI for shellscan with JSON configuration
//!
//! Calibrates the table named in the configuration and writes the
//! reflectance table to the configured output path

use shellscan::{calibrate_with_config, table::save_reflectance, PipelineConfig};
use std::{env, fs, path::Path, process};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help(&args[0]);
        process::exit(1);
    }

    let config_path = Path::new(&args[1]);

    if !config_path.exists() {
        eprintln!("Error: Config file '{}' does not exist", config_path.display());
        process::exit(1);
    }

    // Load configuration
    let config = match PipelineConfig::from_json_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            process::exit(1);
        }
    };

    eprintln!("Loaded configuration from {}", config_path.display());
    eprintln!("Input path: {}", config.input_path.display());
    eprintln!("Output path: {}", config.output_path.display());
    eprintln!();

    // Create output directory
    if let Some(parent) = config.output_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Error creating output directory: {}", e);
            process::exit(1);
        }
    }

    let report = match calibrate_with_config(&config) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("Calibration aborted: {}", error);
            eprintln!("{}", error.user_message());
            process::exit(1);
        }
    };

    if let Err(e) = save_reflectance(&config.output_path, &report.records) {
        eprintln!("Error writing reflectance table: {}", e);
        process::exit(1);
    }

    eprintln!("Batch Summary:");
    eprintln!("  Photos:  {}", report.calibrations.len());
    eprintln!("  Valid:   {}", report.valid_count());
    eprintln!("  Invalid: {}", report.invalid_count());

    if report.invalid_count() > 0 {
        eprintln!();
        eprintln!("Specimens to inspect:");
        for failure in report.failures() {
            if let Err(error) = &failure.outcome {
                eprintln!("  {}", error.user_message());
            }
        }
        process::exit(2);
    }
}

fn print_help(program_name: &str) {
    eprintln!("Usage: {} <config.json>", program_name);
    eprintln!();
    eprintln!("Calibrate every specimen in the configured table.");
    eprintln!("Generate a starting configuration with the generate_config example.");
}
