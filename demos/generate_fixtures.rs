// Regenerates the reference fixture set for the built-in datasets.
//
// Usage: cargo run --example generate_fixtures [config.json]
//
// Each dataset is written into its own subdirectory of the configured
// output directory. Set RUST_LOG=debug for per-fit timings.

use log::{error, info, warn};
use pca_fixtures::datasets::{self, BlobConfig};
use pca_fixtures::{FixtureGenerator, GeneratorConfig, Matrix};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let base_config = match std::env::args().nth(1) {
        Some(path) => match GeneratorConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not read config {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => GeneratorConfig::default(),
    };

    let blobs = match datasets::gaussian_blobs(&BlobConfig::default()) {
        Ok(data) => data,
        Err(e) => {
            error!("Could not build blob dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let sets: [(&str, Matrix); 3] = [
        ("sklearn", datasets::sklearn_example()),
        ("toy", datasets::toy()),
        ("blobs", blobs),
    ];

    let mut incomplete = false;
    for (name, data) in sets.iter() {
        let config = GeneratorConfig {
            output_dir: base_config.output_dir.join(name),
            dataset_name: name.to_string(),
            ..base_config.clone()
        };
        match FixtureGenerator::new(config).run(data) {
            Ok(report) => {
                info!("{}: {} fixtures written", name, report.fixtures.len());
                for failure in &report.failures {
                    // Full-rank fits on rank-deficient data are expected to fail.
                    warn!("{}: {} not written: {}", name, failure.target, failure.error);
                }
                for mismatch in &report.cross_check_mismatches {
                    error!("{}: covariance and SVD disagree for {}", name, mismatch);
                }
                incomplete |= !report.cross_check_mismatches.is_empty();
            }
            Err(e) => {
                error!("{}: generation aborted: {}", name, e);
                incomplete = true;
            }
        }
    }

    if incomplete {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
