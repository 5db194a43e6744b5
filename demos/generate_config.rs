//! Generate default configuration file
//!
//! Creates a JSON config with all default parameters

use shellscan::PipelineConfig;
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output_config.json>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} analysis/config.json", args[0]);
        process::exit(1);
    }

    let output_path = Path::new(&args[1]);

    // Create parent directory if needed
    if let Some(parent) = output_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            process::exit(1);
        }
    }

    let config = PipelineConfig::default_config();

    match config.to_json_file(output_path) {
        Ok(_) => {
            eprintln!("Configuration saved to {}", output_path.display());
            eprintln!();
            eprintln!("Config summary:");
            eprintln!("  Input:  {}", config.input_path.display());
            eprintln!("  Output: {}", config.output_path.display());
            eprintln!(
                "  Curve fit: start a = {}, b = {}, at most {} solver evaluations",
                config.fitting.start_a, config.fitting.start_b, config.fitting.max_iterations
            );
            eprintln!(
                "  Batch: parallel = {}, fail fast = {}",
                config.batch.parallel, config.batch.fail_fast
            );
            match config.transform.observation_count {
                Some(n) => eprintln!("  Proportion transform: n pinned to {}", n),
                None => eprintln!("  Proportion transform: n counted from the proportion table"),
            }
        }
        Err(e) => {
            eprintln!("Error saving config: {}", e);
            process::exit(1);
        }
    }
}
