// Principal component analysis (PCA) reference fixtures

#![doc = include_str!("../README.md")]

pub mod compare;
pub mod datasets;
pub mod error;
pub mod fixture;
pub mod generator;
pub mod linalg_backends;
pub mod matrix;
pub mod normalize;
pub mod pca;
pub mod project;


pub use error::{FixtureError, Result};
pub use fixture::{Dtype, FixtureMetadata, FixtureRecord};
pub use generator::{ComponentCount, FixtureGenerator, GenerationReport, GeneratorConfig};
pub use matrix::Matrix;
pub use normalize::{ColumnStats, NormStrategy, Normalization, NORM_EPSILON};
pub use pca::{reduce, PcaAlgorithm, PcaModel};
pub use project::transform;
