use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ParserError;
use crate::frame::{channel_names, channel_values};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatFamily {
    #[serde(rename = "Navis", alias = "NAVIS", alias = "navis")]
    Navis,
    #[serde(rename = "PROVOR", alias = "Provor", alias = "provor")]
    Provor,
}

impl FloatFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FloatFamily::Navis => "Navis",
            FloatFamily::Provor => "PROVOR",
        }
    }
}

impl fmt::Display for FloatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FloatFamily {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navis" => Ok(FloatFamily::Navis),
            "provor" => Ok(FloatFamily::Provor),
            other => Err(format!("unknown float family '{other}'")),
        }
    }
}

/// Identity of one transmission: the float and its profile sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileKey {
    pub float_id: u32,
    pub profile_id: u32,
}

impl ProfileKey {
    pub fn new(float_id: u32, profile_id: u32) -> Self {
        Self {
            float_id,
            profile_id,
        }
    }

    /// Reads `<float>.<profile>[.ext]` names such as `0572.010.msg`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = Path::new(name).file_name()?.to_str()?;
        let mut parts = base.split('.');
        let float_id = parts.next()?.trim().parse().ok()?;
        let profile_id = parts.next()?.trim().parse().ok()?;
        Some(Self::new(float_id, profile_id))
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}.{:03}", self.float_id, self.profile_id)
    }
}

/// Subsystem voltages and currents reported in the engineering section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineeringTelemetry {
    pub volts: BTreeMap<String, f64>,
    pub current_ma: BTreeMap<String, f64>,
}

impl EngineeringTelemetry {
    pub fn is_empty(&self) -> bool {
        self.volts.is_empty() && self.current_ma.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileHeader {
    pub key: ProfileKey,
    pub family: FloatFamily,
    pub timestamp: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub complete: bool,
    pub engineering: EngineeringTelemetry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    UnexpectedLength(usize),
    NoData,
    ShortRow { required: usize, found: usize },
    InvalidHex { channel: &'static str },
    FieldCount { expected: usize, found: usize },
    InvalidValue { field: &'static str, value: String },
    OtherProfile(ProfileKey),
    MalformedParkSample(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnexpectedLength(len) => write!(f, "unexpected row length {len}"),
            SkipReason::NoData => f.write_str("no-data sentinel row"),
            SkipReason::ShortRow { required, found } => {
                write!(f, "row has {found} characters, layout needs {required}")
            }
            SkipReason::InvalidHex { channel } => write!(f, "invalid hexadecimal in {channel}"),
            SkipReason::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
            SkipReason::InvalidValue { field, value } => {
                write!(f, "invalid value '{value}' for {field}")
            }
            SkipReason::OtherProfile(key) => write!(f, "row belongs to profile {key}"),
            SkipReason::MalformedParkSample(message) => {
                write!(f, "malformed park sample: {message}")
            }
        }
    }
}

/// A record the decoder dropped without aborting the transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line_index: usize,
    pub reason: SkipReason,
}

/// Level 0 profile: decoded but uncalibrated samples.
#[derive(Debug, Clone)]
pub struct Profile {
    pub header: ProfileHeader,
    pub observations: DataFrame,
    pub park_observations: DataFrame,
    pub skipped_rows: Vec<SkippedRow>,
}

impl Profile {
    pub fn key(&self) -> ProfileKey {
        self.header.key
    }

    pub fn sample_count(&self) -> usize {
        self.observations.height()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.observations.column(name).is_ok()
    }

    pub fn channel_names(&self) -> Vec<String> {
        channel_names(&self.observations)
    }

    /// Samples of `name` with missing values as NaN, or `None` when the channel was never observed.
    pub fn channel(&self, name: &str) -> Option<Vec<f64>> {
        if !self.has_channel(name) {
            return None;
        }
        channel_values(&self.observations, name).ok()
    }
}

/// Raw input for one profile, as delivered by the float family.
#[derive(Debug, Clone)]
pub enum Transmission {
    Navis {
        name: Option<String>,
        message: String,
    },
    Provor {
        name: Option<String>,
        fix: String,
        cast: String,
    },
}

impl Transmission {
    pub fn navis(message: impl Into<String>) -> Self {
        Transmission::Navis {
            name: None,
            message: message.into(),
        }
    }

    pub fn provor(fix: impl Into<String>, cast: impl Into<String>) -> Self {
        Transmission::Provor {
            name: None,
            fix: fix.into(),
            cast: cast.into(),
        }
    }

    pub fn read_navis(path: &Path) -> Result<Self, ParserError> {
        Ok(Transmission::Navis {
            name: file_name(path),
            message: read_text(path)?,
        })
    }

    pub fn read_provor(fix_path: &Path, cast_path: &Path) -> Result<Self, ParserError> {
        Ok(Transmission::Provor {
            name: file_name(cast_path),
            fix: read_text(fix_path)?,
            cast: read_text(cast_path)?,
        })
    }

    pub fn family(&self) -> FloatFamily {
        match self {
            Transmission::Navis { .. } => FloatFamily::Navis,
            Transmission::Provor { .. } => FloatFamily::Provor,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Transmission::Navis { name, .. } | Transmission::Provor { name, .. } => {
                name.as_deref()
            }
        }
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

// Corrupted transmissions may carry stray bytes; they only affect the rows they land in.
fn read_text(path: &Path) -> Result<String, ParserError> {
    let bytes = fs::read(path).map_err(|source| ParserError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
