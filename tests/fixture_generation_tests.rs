// End-to-end checks of a generation run, reading fixtures back from disk the
// way a consumer in another language would.

use ndarray::{Array2, Axis};
use pca_fixtures::compare::{canonical_sign, orthonormality_error};
use pca_fixtures::datasets::{self, BlobConfig};
use pca_fixtures::fixture::{self, Dtype};
use pca_fixtures::{ComponentCount, FixtureError, FixtureGenerator, GenerationReport, GeneratorConfig, Matrix};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const VARIANTS: [&str; 3] = ["raw", "norm_mean", "norm_minmax"];
const TOLERANCE: f32 = 1e-4;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn generate(dir: &Path, name: &str, data: &Matrix) -> GenerationReport {
    let config = GeneratorConfig {
        output_dir: dir.to_path_buf(),
        dataset_name: name.to_string(),
        ..GeneratorConfig::default()
    };
    FixtureGenerator::new(config).run(data).unwrap()
}

fn load(dir: &Path, name: &str) -> Matrix {
    fixture::load(&dir.join(format!("{}.json", name)))
        .unwrap_or_else(|e| panic!("failed to load fixture {}: {}", name, e))
}

/// `(X - mean(X)) · Cᵀ`, accumulated in f64.
fn expected_projection(data: &Matrix, components: &Matrix) -> Array2<f32> {
    let x = data.mapv(|v| v as f64);
    let mean = x.mean_axis(Axis(0)).unwrap();
    let c = components.mapv(|v| v as f64);
    (x - &mean).dot(&c.t()).mapv(|v| v as f32)
}

fn assert_close(actual: &Matrix, expected: &Matrix, context: &str) {
    assert_eq!(actual.dim(), expected.dim(), "shape mismatch for {}", context);
    for ((idx, a), e) in actual.indexed_iter().zip(expected.iter()) {
        let scale = e.abs().max(1.0);
        assert!(
            (a - e).abs() <= TOLERANCE * scale,
            "{} differs at {:?}: {} vs {}",
            context,
            idx,
            a,
            e
        );
    }
}

#[test]
fn toy_fixtures_are_self_consistent() {
    init_logging();
    let dir = tempdir().unwrap();
    let data = datasets::toy();
    let report = generate(dir.path(), "toy", &data);

    assert!(report.is_complete(), "{:?}", report.failures);
    assert!(report.cross_check_mismatches.is_empty());
    // 3 data matrices plus (pca, trans) for 3 variants x {2, 3} components.
    assert_eq!(report.fixtures.len(), 3 + 3 * 2 * 2);

    assert_eq!(load(dir.path(), "toy_data"), data);
    for variant in VARIANTS {
        let source_name = match variant {
            "raw" => "toy_data".to_string(),
            other => format!("toy_data_{}", other),
        };
        let source = load(dir.path(), &source_name);
        for k in [2, 3] {
            let components = load(dir.path(), &format!("toy_pca_{}_{}", variant, k));
            let projection = load(dir.path(), &format!("toy_trans_{}_{}", variant, k));

            assert_eq!(components.dim(), (k, 3));
            assert_eq!(projection.dim(), (6, k));
            assert!(orthonormality_error(&components) < 1e-3, "{} k={}", variant, k);
            for component in components.rows() {
                assert_eq!(canonical_sign(component), 1.0);
            }
            assert_close(
                &projection,
                &expected_projection(&source, &components),
                &format!("toy_trans_{}_{}", variant, k),
            );
        }

        // The two-component basis is the leading part of the full basis.
        let two = load(dir.path(), &format!("toy_pca_{}_2", variant));
        let full = load(dir.path(), &format!("toy_pca_{}_3", variant));
        assert_close(&two, &full.slice(ndarray::s![..2, ..]).to_owned(), variant);
    }
}

#[test]
fn sidecars_describe_their_binaries() {
    let dir = tempdir().unwrap();
    let report = generate(dir.path(), "sklearn", &datasets::sklearn_example());

    for record in &report.fixtures {
        let text = fs::read_to_string(&record.metadata_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 4, "{}", text);

        let rows = json["Data points"].as_u64().unwrap() as usize;
        let cols = json["Dimensions"].as_u64().unwrap() as usize;
        assert_eq!(json["Binary file"], format!("{}.bin", record.name));
        assert_eq!(json["dtype"], "float32");
        assert_eq!(fs::metadata(&record.binary_path).unwrap().len() as usize, rows * cols * 4);

        // Readable with nothing but the column count.
        let raw = fixture::load_raw(&record.binary_path, cols).unwrap();
        assert_eq!(raw.dim(), (rows, cols));
    }
}

#[test]
fn constant_column_survives_normalization_and_blocks_full_fits() {
    init_logging();
    let dir = tempdir().unwrap();
    let data = datasets::gaussian_blobs(&BlobConfig {
        constant_column: Some(7.0),
        ..BlobConfig::default()
    })
    .unwrap();
    let d = data.ncols();
    let report = generate(dir.path(), "blobs", &data);

    // Normalized copies hold zeros, not NaN, in the constant column.
    for name in ["blobs_data_norm_mean", "blobs_data_norm_minmax"] {
        let normed = load(dir.path(), name);
        assert!(normed.iter().all(|v| v.is_finite()));
        assert!(normed.column(d - 1).iter().all(|&v| v == 0.0), "{}", name);
    }
    let minmax = load(dir.path(), "blobs_data_norm_minmax");
    assert!(minmax.iter().all(|&v| (0.0..=1.0).contains(&v)));

    // Rank is d - 1, so every full fit fails while the 2-component branches succeed.
    assert_eq!(report.failures.len(), 3, "{:?}", report.failures);
    for failure in &report.failures {
        assert!(matches!(failure.error, FixtureError::Fit(_)));
        assert!(failure.target.ends_with(&format!("_{}", d)));
    }
    for variant in VARIANTS {
        assert!(report.fixture(&format!("blobs_pca_{}_2", variant)).is_some());
        assert!(report.fixture(&format!("blobs_trans_{}_2", variant)).is_some());
        assert!(!dir.path().join(format!("blobs_trans_{}_{}.bin", variant, d)).exists());
    }
}

#[test]
fn regenerating_overwrites_with_identical_bytes() {
    let dir = tempdir().unwrap();
    let data = datasets::toy();
    let first = generate(dir.path(), "toy", &data);
    let snapshot: Vec<Vec<u8>> = first
        .fixtures
        .iter()
        .map(|r| fs::read(&r.binary_path).unwrap())
        .collect();

    let second = generate(dir.path(), "toy", &data);
    assert_eq!(first.fixtures, second.fixtures);
    for (record, before) in second.fixtures.iter().zip(snapshot) {
        assert_eq!(fs::read(&record.binary_path).unwrap(), before, "{}", record.name);
    }
}

#[test]
fn json_config_controls_the_run() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nested").join("out");
    let config_path = dir.path().join("config.json");
    let config_json = serde_json::json!({
        "output_dir": out,
        "dataset_name": "toy",
        "component_counts": [{ "fixed": 1 }],
        "algorithm": "covariance",
        "dtype": "float64",
        "parallel": true
    });
    fs::write(&config_path, config_json.to_string()).unwrap();

    let config = GeneratorConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.component_counts, vec![ComponentCount::Fixed(1)]);
    let report = FixtureGenerator::new(config).run(&datasets::toy()).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.fixtures.len(), 3 + 3 * 2);
    let record = report.fixture("toy_trans_raw_1").unwrap();
    assert_eq!(record.metadata.dtype, Dtype::Float64);
    assert_eq!(fs::metadata(&record.binary_path).unwrap().len(), 6 * 8);
    assert_eq!(load(&out, "toy_trans_raw_1").dim(), (6, 1));
}

#[test]
fn unusable_output_directory_aborts() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"occupied").unwrap();

    let config = GeneratorConfig {
        output_dir: blocker.join("fixtures"),
        ..GeneratorConfig::default()
    };
    match FixtureGenerator::new(config).run(&datasets::toy()) {
        Err(FixtureError::Io { path, .. }) => assert_eq!(path, blocker.join("fixtures")),
        other => panic!("expected an IO error, got {:?}", other.map(|r| r.fixtures.len())),
    }
}

#[test]
fn malformed_config_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ \"algorithm\": \"qr\" }").unwrap();
    assert!(matches!(
        GeneratorConfig::from_json_file(&path),
        Err(FixtureError::Format { .. })
    ));
}
