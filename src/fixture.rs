// src/fixture.rs
//
// Headerless binary arrays plus a JSON sidecar describing their shape.
// A consumer that knows rows, columns and dtype can read a `.bin` file with
// a single flat read.

use crate::error::{FixtureError, Result};
use crate::matrix::{self, Matrix};
use log::trace;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Element type of a binary fixture, named as numpy names it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    #[default]
    #[serde(rename = "float32")]
    Float32,
    #[serde(rename = "float64")]
    Float64,
}

impl Dtype {
    /// Bytes per element.
    pub fn width(self) -> usize {
        match self {
            Dtype::Float32 => 4,
            Dtype::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
        }
    }
}

/// Sidecar record stored next to each binary fixture as `<name>.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureMetadata {
    #[serde(rename = "Binary file")]
    pub binary_file: String,
    #[serde(rename = "Data points")]
    pub row_count: usize,
    #[serde(rename = "Dimensions")]
    pub col_count: usize,
    pub dtype: Dtype,
}

/// A fixture written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureRecord {
    pub name: String,
    pub binary_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: FixtureMetadata,
}

/// Encodes `matrix` row-major, little-endian, at the width of `dtype`.
pub fn encode(matrix: &Matrix, dtype: Dtype) -> Vec<u8> {
    let values = matrix::to_row_major(matrix);
    match dtype {
        Dtype::Float32 => {
            if cfg!(target_endian = "little") {
                bytemuck::cast_slice::<f32, u8>(&values).to_vec()
            } else {
                values.iter().flat_map(|v| v.to_le_bytes()).collect()
            }
        }
        Dtype::Float64 => {
            let wide: Vec<f64> = values.iter().map(|&v| v as f64).collect();
            if cfg!(target_endian = "little") {
                bytemuck::cast_slice::<f64, u8>(&wide).to_vec()
            } else {
                wide.iter().flat_map(|v| v.to_le_bytes()).collect()
            }
        }
    }
}

/// Decodes a row-major little-endian buffer of `dtype` elements.
///
/// # Errors
/// Returns `FixtureError::Input` if the byte count does not describe whole
/// rows of `col_count` elements.
pub fn decode(bytes: &[u8], col_count: usize, dtype: Dtype) -> Result<Matrix> {
    let width = dtype.width();
    if bytes.len() % width != 0 {
        return Err(FixtureError::Input(format!(
            "{} bytes is not a whole number of {} elements.",
            bytes.len(),
            dtype.name()
        )));
    }
    let values: Vec<f32> = match dtype {
        Dtype::Float32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::Float64 => bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
    };
    matrix::from_row_major(values, col_count)
}

/// Writes `<dir>/<name>.bin` and its `<dir>/<name>.json` sidecar.
///
/// The sidecar's `Binary file` entry holds the binary's file name, relative
/// to the sidecar. Existing files are overwritten.
///
/// # Errors
/// Returns `FixtureError::Io` carrying the offending path if a file cannot be written.
pub fn save(matrix: &Matrix, dir: &Path, name: &str, dtype: Dtype) -> Result<FixtureRecord> {
    let binary_name = format!("{}.bin", name);
    let binary_path = dir.join(&binary_name);
    let metadata_path = dir.join(format!("{}.json", name));

    write_file(&binary_path, &encode(matrix, dtype))?;

    let metadata = FixtureMetadata {
        binary_file: binary_name,
        row_count: matrix.nrows(),
        col_count: matrix.ncols(),
        dtype,
    };
    let json = serde_json::to_vec_pretty(&metadata)
        .map_err(|e| FixtureError::format(&metadata_path, e.to_string()))?;
    write_file(&metadata_path, &json)?;

    trace!(
        "wrote fixture {} ({}x{} {})",
        binary_path.display(),
        metadata.row_count,
        metadata.col_count,
        dtype.name()
    );
    Ok(FixtureRecord {
        name: name.to_string(),
        binary_path,
        metadata_path,
        metadata,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| FixtureError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(|e| FixtureError::io(path, e))?;
    writer.flush().map_err(|e| FixtureError::io(path, e))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| FixtureError::io(path, e))?;
    Ok(bytes)
}

/// Reads a sidecar record.
pub fn read_metadata(metadata_path: &Path) -> Result<FixtureMetadata> {
    let bytes = read_file(metadata_path)?;
    serde_json::from_slice(&bytes).map_err(|e| FixtureError::format(metadata_path, e.to_string()))
}

/// Loads a fixture through its sidecar.
///
/// # Errors
/// Returns `FixtureError::Format` if the binary size disagrees with the
/// shape recorded in the sidecar.
pub fn load(metadata_path: &Path) -> Result<Matrix> {
    let metadata = read_metadata(metadata_path)?;
    let dir = metadata_path.parent().unwrap_or_else(|| Path::new(""));
    let binary_path = dir.join(&metadata.binary_file);
    let bytes = read_file(&binary_path)?;

    let expected = metadata
        .row_count
        .checked_mul(metadata.col_count)
        .and_then(|elements| elements.checked_mul(metadata.dtype.width()))
        .ok_or_else(|| {
            FixtureError::format(
                &binary_path,
                format!(
                    "shape {}x{} {} overflows the addressable size.",
                    metadata.row_count,
                    metadata.col_count,
                    metadata.dtype.name()
                ),
            )
        })?;
    if bytes.len() != expected {
        return Err(FixtureError::format(
            &binary_path,
            format!(
                "expected {} bytes for {}x{} {}, found {}.",
                expected,
                metadata.row_count,
                metadata.col_count,
                metadata.dtype.name(),
                bytes.len()
            ),
        ));
    }
    decode(&bytes, metadata.col_count, metadata.dtype).map_err(|e| match e {
        FixtureError::Input(message) => FixtureError::format(&binary_path, message),
        other => other,
    })
}

/// Loads a float32 binary knowing only its column count; rows follow from the file size.
pub fn load_raw(binary_path: &Path, col_count: usize) -> Result<Matrix> {
    let bytes = read_file(binary_path)?;
    decode(&bytes, col_count, Dtype::Float32).map_err(|e| match e {
        FixtureError::Input(message) => FixtureError::format(binary_path, message),
        other => other,
    })
}

/// Creates the output directory (and parents) if needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| FixtureError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn binary_layout_is_row_major_little_endian() {
        let m = array![[1.0f32, 2.0], [3.0, 4.0]];
        let bytes = encode(&m, Dtype::Float32);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3.0f32.to_le_bytes());

        let wide = encode(&m, Dtype::Float64);
        assert_eq!(wide.len(), 32);
        assert_eq!(&wide[24..32], &4.0f64.to_le_bytes());
    }

    #[test]
    fn metadata_uses_reference_field_names() {
        let meta = FixtureMetadata {
            binary_file: "iris_data.bin".to_string(),
            row_count: 150,
            col_count: 4,
            dtype: Dtype::Float32,
        };
        let json: serde_json::Value = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["Binary file"], "iris_data.bin");
        assert_eq!(json["Data points"], 150);
        assert_eq!(json["Dimensions"], 4);
        assert_eq!(json["dtype"], "float32");
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let m = array![[0.5f32, -1.25, 3.0], [1e-7, 42.0, -0.0]];
        let record = save(&m, dir.path(), "sample", Dtype::Float32).unwrap();
        assert_eq!(record.binary_path, dir.path().join("sample.bin"));
        assert_eq!(record.metadata.row_count, 2);
        assert_eq!(record.metadata.col_count, 3);
        assert_eq!(fs::metadata(&record.binary_path).unwrap().len(), 24);

        let loaded = load(&record.metadata_path).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(load_raw(&record.binary_path, 3).unwrap(), m);
    }

    #[test]
    fn truncated_binary_is_a_format_error() {
        let dir = tempdir().unwrap();
        let m = array![[1.0f32, 2.0], [3.0, 4.0]];
        let record = save(&m, dir.path(), "cut", Dtype::Float32).unwrap();
        fs::write(&record.binary_path, &encode(&m, Dtype::Float32)[..12]).unwrap();
        assert!(matches!(load(&record.metadata_path), Err(FixtureError::Format { .. })));
        assert!(matches!(load_raw(&record.binary_path, 2), Err(FixtureError::Format { .. })));
    }

    #[test]
    fn oversized_sidecar_shape_is_a_format_error() {
        let dir = tempdir().unwrap();
        let record = save(&array![[1.0f32, 2.0]], dir.path(), "huge", Dtype::Float32).unwrap();
        let sidecar = serde_json::json!({
            "Binary file": "huge.bin",
            "Data points": usize::MAX,
            "Dimensions": 2,
            "dtype": "float32"
        });
        fs::write(&record.metadata_path, sidecar.to_string()).unwrap();
        match load(&record.metadata_path) {
            Err(FixtureError::Format { path, message }) => {
                assert_eq!(path, record.binary_path);
                assert!(message.contains("overflows"), "{}", message);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unwritable_directory_reports_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = save(&Matrix::zeros((1, 1)), &missing, "x", Dtype::Float32).unwrap_err();
        match err {
            FixtureError::Io { path, .. } => assert_eq!(path, missing.join("x.bin")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
