use std::path::PathBuf;

use floatproc_parser::{ParserError, ProfileKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sensor configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid application configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Where a required field was looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Configuration,
    Observations,
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSource::Configuration => f.write_str("sensor configuration"),
            FieldSource::Observations => f.write_str("observations"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("profile {profile}: field '{field}' missing from {location}")]
    MissingField {
        field: String,
        location: FieldSource,
        profile: ProfileKey,
    },

    #[error("profile {profile}: unsupported {category} model '{model}'")]
    UnsupportedModel {
        category: String,
        model: String,
        profile: ProfileKey,
    },

    #[error("profile {profile}: failed to assemble calibrated observations: {message}")]
    Frame { profile: ProfileKey, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegressionError {
    #[error("type I regressions disagree in sign (y on x {y_on_x}, inverted x on y {x_on_y})")]
    SignMismatch { y_on_x: f64, x_on_y: f64 },

    #[error("weighted least squares requires weights for both variables")]
    MissingWeights,

    #[error("major axis regression requires an intercept")]
    InterceptRequired,

    #[error("regression needs at least {required} paired samples, found {found}")]
    InsufficientData { required: usize, found: usize },

    #[error("input sequences differ in length ({x} and {y})")]
    LengthMismatch { x: usize, y: usize },

    #[error("regression is degenerate: {0}")]
    Degenerate(String),
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("profile {profile}: field '{field}' required for level 2 processing is missing")]
    MissingField { field: String, profile: ProfileKey },

    #[error("profile {profile}: {message}")]
    Configuration { profile: ProfileKey, message: String },

    #[error("profile {profile}: regression failed: {source}")]
    Regression {
        profile: ProfileKey,
        #[source]
        source: RegressionError,
    },

    #[error("profile {profile}: {source}")]
    Polars {
        profile: ProfileKey,
        #[source]
        source: polars::error::PolarsError,
    },
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("File I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local file {} does not exist", path.display())]
    MissingLocalFile { path: PathBuf },

    #[error("profile {profile}: channel '{channel}' is required for {output}")]
    MissingChannel {
        channel: String,
        output: &'static str,
        profile: ProfileKey,
    },

    #[error("CSV writing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("cannot derive a float user id from {}", .0.display())]
    UnknownFloat(PathBuf),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
