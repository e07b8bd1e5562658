// src/generator.rs

use crate::compare;
use crate::error::{FixtureError, Result};
use crate::fixture::{self, Dtype, FixtureRecord};
use crate::matrix::{self, Matrix};
use crate::normalize::{self, NormStrategy};
use crate::pca::{PcaAlgorithm, PcaModel};
use crate::project;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Two algorithms agree when their projectors differ by at most this much.
pub const CROSS_CHECK_TOLERANCE: f32 = 1e-3;

/// How many components a fit keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCount {
    Fixed(usize),
    /// As many components as the data has dimensions.
    Full,
}

impl ComponentCount {
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            ComponentCount::Fixed(k) => k,
            ComponentCount::Full => n_features,
        }
    }
}

/// One of the three matrices every PCA fixture is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Raw,
    NormMean,
    NormMinMax,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Raw, Variant::NormMean, Variant::NormMinMax];

    /// Infix used in fixture names, e.g. `pca_norm_mean_2`.
    pub fn tag(self) -> &'static str {
        match self {
            Variant::Raw => "raw",
            Variant::NormMean => "norm_mean",
            Variant::NormMinMax => "norm_minmax",
        }
    }
}

/// Configuration for a fixture generation run.
///
/// Every field has a default, so a JSON config only needs the fields it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory all fixtures are written into. Created if missing.
    pub output_dir: PathBuf,
    /// Prefix of every fixture name (`<dataset>_pca_raw_2`); empty for no prefix.
    pub dataset_name: String,
    /// Component counts fitted for each variant. Duplicates after resolution are skipped.
    pub component_counts: Vec<ComponentCount>,
    pub algorithm: PcaAlgorithm,
    /// Flip components so their first significant entry is positive.
    pub canonicalize_signs: bool,
    /// Refit with the other algorithm and warn if the subspaces disagree.
    pub cross_check_algorithms: bool,
    /// Also write each fitted model as `<name>.model` (bincode).
    pub save_models: bool,
    /// Run the variant branches on the rayon thread pool.
    pub parallel: bool,
    pub dtype: Dtype,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            output_dir: PathBuf::from("data"),
            dataset_name: String::new(),
            component_counts: vec![ComponentCount::Fixed(2), ComponentCount::Full],
            algorithm: PcaAlgorithm::Svd,
            canonicalize_signs: true,
            cross_check_algorithms: true,
            save_models: false,
            parallel: false,
            dtype: Dtype::Float32,
        }
    }
}

impl GeneratorConfig {
    /// Reads a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FixtureError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| FixtureError::format(path, e.to_string()))
    }

    /// `<dataset>_<stem>`, or just `<stem>` without a dataset name.
    pub fn fixture_name(&self, stem: &str) -> String {
        if self.dataset_name.is_empty() {
            stem.to_string()
        } else {
            format!("{}_{}", self.dataset_name, stem)
        }
    }
}

/// A fixture (or a whole variant branch) that could not be produced.
#[derive(Debug)]
pub struct GenerationFailure {
    /// Fixture name, e.g. `pca_raw_64`.
    pub target: String,
    pub error: FixtureError,
}

/// Outcome of a generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Written fixtures in generation order.
    pub fixtures: Vec<FixtureRecord>,
    pub failures: Vec<GenerationFailure>,
    /// PCA fixtures whose two algorithms disagreed beyond `CROSS_CHECK_TOLERANCE`.
    pub cross_check_mismatches: Vec<String>,
}

impl GenerationReport {
    /// True if every planned fixture was written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fixture(&self, name: &str) -> Option<&FixtureRecord> {
        self.fixtures.iter().find(|f| f.name == name)
    }

    fn absorb(&mut self, other: GenerationReport) {
        self.fixtures.extend(other.fixtures);
        self.failures.extend(other.failures);
        self.cross_check_mismatches.extend(other.cross_check_mismatches);
    }
}

/// Drives normalization, PCA fitting, projection and serialization for one dataset.
#[derive(Clone, Debug, Default)]
pub struct FixtureGenerator {
    config: GeneratorConfig,
}

impl FixtureGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Regenerates the full fixture set for `data`.
    ///
    /// Writes the raw matrix and its mean- and min-max-normalized versions,
    /// then, for each of those and each configured component count, the
    /// component basis (`pca_<variant>_<k>`, k x d) and the projection of the
    /// same matrix (`trans_<variant>_<k>`, n x k).
    ///
    /// # Errors
    /// Invalid input data (including a normalized copy that is no longer
    /// finite) or an output directory that cannot be created abort the run.
    /// Failures of single fits or fixture writes are collected in the report
    /// instead, and sibling branches still run.
    pub fn run(&self, data: &Matrix) -> Result<GenerationReport> {
        matrix::validate(data)?;
        fixture::ensure_dir(&self.config.output_dir)?;
        let run_start = Instant::now();
        let (n_points, n_dims) = data.dim();
        info!(
            "Generating PCA fixtures for {} points x {} dimensions into {}",
            n_points,
            n_dims,
            self.config.output_dir.display()
        );

        let stats = normalize::compute_stats(data)?;
        let degenerate = stats.iter().filter(|s| !s.is_scalable()).count();
        if degenerate > 0 {
            debug!("{} column(s) have a range below the normalization epsilon and stay unscaled", degenerate);
        }
        let norm_mean = normalize::normalize(data, &stats, NormStrategy::Mean)?;
        let norm_minmax = normalize::normalize(data, &stats, NormStrategy::MinMax)?;

        let mut report = GenerationReport::default();
        for (stem, matrix) in [("data", data), ("data_norm_mean", &norm_mean), ("data_norm_minmax", &norm_minmax)] {
            self.save_into(&mut report, matrix, &self.config.fixture_name(stem));
        }

        let sources: [(Variant, &Matrix); 3] = [
            (Variant::Raw, data),
            (Variant::NormMean, &norm_mean),
            (Variant::NormMinMax, &norm_minmax),
        ];
        let mut counts: Vec<usize> = Vec::new();
        for count in &self.config.component_counts {
            let k = count.resolve(n_dims);
            if !counts.contains(&k) {
                counts.push(k);
            }
        }
        let branches: Vec<(Variant, &Matrix, usize)> = sources
            .iter()
            .flat_map(|&(variant, matrix)| counts.iter().map(move |&k| (variant, matrix, k)))
            .collect();

        let outcomes: Vec<GenerationReport> = if self.config.parallel {
            branches
                .par_iter()
                .map(|&(variant, matrix, k)| self.run_branch(variant, matrix, k))
                .collect()
        } else {
            branches
                .iter()
                .map(|&(variant, matrix, k)| self.run_branch(variant, matrix, k))
                .collect()
        };
        for outcome in outcomes {
            report.absorb(outcome);
        }
        if let Some(pos) = report.failures.iter().position(|f| !f.error.is_variant_local()) {
            let failure = report.failures.swap_remove(pos);
            error!("Aborting fixture generation at {}: {}", failure.target, failure.error);
            return Err(failure.error);
        }

        info!(
            "Wrote {} fixtures ({} failed, {} cross-check mismatches) in {:?}",
            report.fixtures.len(),
            report.failures.len(),
            report.cross_check_mismatches.len(),
            run_start.elapsed()
        );
        Ok(report)
    }

    fn run_branch(&self, variant: Variant, matrix: &Matrix, k: usize) -> GenerationReport {
        let mut outcome = GenerationReport::default();
        let pca_name = self.config.fixture_name(&format!("pca_{}_{}", variant.tag(), k));
        let trans_name = self.config.fixture_name(&format!("trans_{}_{}", variant.tag(), k));

        let model = match PcaModel::fit(matrix, k, self.config.algorithm) {
            Ok(model) if self.config.canonicalize_signs => model.canonicalize_signs(),
            Ok(model) => model,
            Err(error) => {
                warn!("Skipping {} and {}: {}", pca_name, trans_name, error);
                outcome.failures.push(GenerationFailure { target: pca_name, error });
                return outcome;
            }
        };

        if self.config.cross_check_algorithms && !self.algorithms_agree(matrix, &model) {
            outcome.cross_check_mismatches.push(pca_name.clone());
        }

        self.save_into(&mut outcome, model.components(), &pca_name);
        if self.config.save_models {
            let path = self.config.output_dir.join(format!("{}.model", pca_name));
            if let Err(error) = model.save_model(&path) {
                warn!("Could not write model {}: {}", path.display(), error);
                outcome.failures.push(GenerationFailure {
                    target: format!("{}.model", pca_name),
                    error,
                });
            }
        }

        match project::transform(matrix, &model) {
            Ok(projection) => self.save_into(&mut outcome, &projection, &trans_name),
            Err(error) => {
                warn!("Projection for {} failed: {}", trans_name, error);
                outcome.failures.push(GenerationFailure { target: trans_name, error });
            }
        }
        outcome
    }

    fn algorithms_agree(&self, matrix: &Matrix, model: &PcaModel) -> bool {
        let other_algorithm = model.algorithm().counterpart();
        match PcaModel::fit(matrix, model.component_count(), other_algorithm) {
            Ok(other) => {
                let agree = compare::same_subspace(model.components(), other.components(), CROSS_CHECK_TOLERANCE);
                if !agree {
                    warn!(
                        "{} and {} PCA disagree on a {}-component subspace",
                        model.algorithm().name(),
                        other_algorithm.name(),
                        model.component_count()
                    );
                }
                agree
            }
            Err(error) => {
                warn!("Cross-check fit with {} failed: {}", other_algorithm.name(), error);
                false
            }
        }
    }

    fn save_into(&self, report: &mut GenerationReport, matrix: &Matrix, name: &str) {
        match fixture::save(matrix, &self.config.output_dir, name, self.config.dtype) {
            Ok(record) => report.fixtures.push(record),
            Err(error) => {
                warn!("Could not write fixture {}: {}", name, error);
                report.failures.push(GenerationFailure {
                    target: name.to_string(),
                    error,
                });
            }
        }
    }
}
