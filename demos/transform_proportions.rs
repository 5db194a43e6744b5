//! Squeeze consumption proportions into the open interval (0, 1)
//!
//! Reads an `id,proportion` table (or `id,consumed,offered`) and writes
//! `id,proportion,transformed` to stdout. With `--inverse` the proportion
//! column is read as model output on the transformed scale and mapped back;
//! this needs the observation count of the original dataset.

use shellscan::config::TransformConfig;
use shellscan::table::{load_proportions, proportion_column, write_transformed, TransformedRow};
use shellscan::PipelineConfig;
use std::{env, io, path::Path, process};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut inverse = false;
    let mut pinned_count = None;
    let mut config_path = None;
    let mut table_path_arg = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--inverse" => inverse = true,
            "--n" => match iter.next().map(|value| value.parse::<usize>()) {
                Some(Ok(n)) => pinned_count = Some(n),
                _ => {
                    eprintln!("Error: --n expects a positive integer");
                    process::exit(1);
                }
            },
            "--config" => match iter.next() {
                Some(path) => config_path = Some(path.clone()),
                None => {
                    eprintln!("Error: --config expects a path");
                    process::exit(1);
                }
            },
            "--help" | "-h" => {
                print_help(&args[0]);
                process::exit(0);
            }
            arg if !arg.starts_with("--") => table_path_arg = Some(arg.to_string()),
            _ => {
                eprintln!("Unknown option: {}", arg);
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

    let mut config = match config_path {
        Some(path) => match PipelineConfig::from_json_file(Path::new(&path)) {
            Ok(cfg) => cfg.transform,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                process::exit(1);
            }
        },
        None => TransformConfig::default(),
    };
    if pinned_count.is_some() {
        config.observation_count = pinned_count;
    }

    let rows = match load_proportions(Path::new(&table_path_str)) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let column = match proportion_column(&rows) {
        Ok(column) => column,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", e.user_message());
            process::exit(1);
        }
    };

    // n is fixed once for the whole dataset
    let transform = if inverse {
        config.build_inverse()
    } else {
        config.build(&column)
    };
    let transform = match transform {
        Ok(transform) => transform,
        Err(e) => {
            eprintln!("Error: {}", e);
            if inverse {
                eprintln!("Pass --n or a config with transform.observation_count set to the");
                eprintln!("count used for the forward transform.");
            }
            process::exit(1);
        }
    };

    let mapped = if inverse {
        transform.inverse_column(&column)
    } else {
        transform.transform_all(&column)
    };
    let mapped = match mapped {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let output: Vec<TransformedRow> = rows
        .iter()
        .zip(column)
        .zip(mapped)
        .map(|((row, proportion), transformed)| TransformedRow {
            id: row.id.clone(),
            proportion,
            transformed,
        })
        .collect();

    if let Err(e) = write_transformed(io::stdout().lock(), &output) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    eprintln!(
        "{} {} rows with n = {}",
        if inverse { "Back-transformed" } else { "Transformed" },
        output.iter().filter(|row| row.transformed.is_some()).count(),
        transform.observation_count()
    );
}

fn print_help(program_name: &str) {
    eprintln!("Usage: {} [OPTIONS] <proportions.csv>", program_name);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --n <count>       Pin the observation count instead of counting the table");
    eprintln!("  --config <file>   Read transform.observation_count from a pipeline config");
    eprintln!("  --inverse         Map transformed values back to proportions");
    eprintln!("                    (requires --n or a pinned count in --config)");
    eprintln!("  --help, -h        Show this help message");
}
