//! Per-float sensor configuration (JSON) and application settings (TOML).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use floatproc_parser::FloatFamily;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::optics::{CarbonRelation, PhytoplanktonRelation};
use crate::quenching::{QuenchingParameters, QuenchingStrategy};

/// Keys inside a sensor block that describe the instrument rather than a channel.
pub const SPECIAL_SENSOR_FIELDS: [&str; 5] = ["model", "sn", "fw", "wavelength", "pathlength"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorCategory {
    Ctd,
    Oxygen,
    Eco,
    Radiometer,
    BeamTransmission,
    Other(String),
}

impl SensorCategory {
    pub fn as_str(&self) -> &str {
        match self {
            SensorCategory::Ctd => "CTD",
            SensorCategory::Oxygen => "O2",
            SensorCategory::Eco => "ECO",
            SensorCategory::Radiometer => "Radiometer",
            SensorCategory::BeamTransmission => "BeamC",
            SensorCategory::Other(name) => name,
        }
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SensorCategory {
    fn from(value: &str) -> Self {
        match value.trim() {
            "CTD" => SensorCategory::Ctd,
            "O2" => SensorCategory::Oxygen,
            "ECO" => SensorCategory::Eco,
            "Radiometer" => SensorCategory::Radiometer,
            "BeamC" => SensorCategory::BeamTransmission,
            other => SensorCategory::Other(other.to_string()),
        }
    }
}

/// Calibration coefficients for one channel, kept as parsed until a calibration claims them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCoefficients {
    pub name: String,
    pub coefficients: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorEntry {
    pub category: SensorCategory,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware: Option<String>,
    pub wavelength: Option<f64>,
    pub pathlength: Option<f64>,
    pub channels: Vec<ChannelCoefficients>,
}

impl SensorEntry {
    pub fn channel(&self, name: &str) -> Option<&ChannelCoefficients> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|channel| channel.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
struct RawSensorConfiguration {
    wmo: u32,
    user_id: String,
    model: FloatFamily,
    #[serde(default)]
    pi: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    deployment: Option<DeploymentInfo>,
    sensors: Map<String, Value>,
}

/// Installed sensors of one deployment, in the order the document lists them.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfiguration {
    pub wmo: u32,
    pub user_id: String,
    pub model: FloatFamily,
    pub pi: Option<String>,
    pub project: Option<String>,
    pub deployment: Option<DeploymentInfo>,
    pub sensors: Vec<SensorEntry>,
}

impl SensorConfiguration {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSensorConfiguration = serde_json::from_str(content)?;
        let sensors = raw
            .sensors
            .into_iter()
            .map(|(category, body)| parse_sensor(&category, body))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            wmo: raw.wmo,
            user_id: raw.user_id,
            model: raw.model,
            pi: raw.pi,
            project: raw.project,
            deployment: raw.deployment,
            sensors,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&read_config(path)?)
    }

    pub fn sensor(&self, category: &SensorCategory) -> Option<&SensorEntry> {
        self.sensors.iter().find(|sensor| &sensor.category == category)
    }

    /// Channel names in sensor-then-channel configuration order.
    pub fn channel_order(&self) -> Vec<String> {
        let mut order = Vec::new();
        for sensor in &self.sensors {
            for name in sensor.channel_names() {
                if !order.iter().any(|existing| existing == name) {
                    order.push(name.to_string());
                }
            }
        }
        order
    }
}

fn parse_sensor(category: &str, body: Value) -> Result<SensorEntry, ConfigError> {
    let Value::Object(fields) = body else {
        return Err(ConfigError::Validation(format!(
            "sensor '{category}' must be an object"
        )));
    };
    let model = fields
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::Validation(format!("sensor '{category}' is missing a model")))?
        .to_string();

    let channels = fields
        .iter()
        .filter(|(key, _)| !SPECIAL_SENSOR_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| ChannelCoefficients {
            name: key.clone(),
            coefficients: value.clone(),
        })
        .collect();

    Ok(SensorEntry {
        category: SensorCategory::from(category),
        model,
        serial_number: fields.get("sn").and_then(value_as_string),
        firmware: fields.get("fw").and_then(value_as_string),
        wavelength: fields.get("wavelength").and_then(Value::as_f64),
        pathlength: fields.get("pathlength").and_then(Value::as_f64),
        channels,
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw transmissions, one sub-directory per user id.
    pub raw: PathBuf,
    /// Sensor configurations named `<user_id>_cfg.json`.
    pub sensor_config: PathBuf,
    /// Root of the `L0`, `L1` and `L2` export directories.
    pub output: PathBuf,
    pub dashboard: PathBuf,
    pub metadata: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("data/raw"),
            sensor_config: PathBuf::from("cfg"),
            output: PathBuf::from("data"),
            dashboard: PathBuf::from("www"),
            metadata: PathBuf::from("data/floats.json"),
        }
    }
}

/// Real-time handles one incoming transmission; batch reprocesses whole floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Realtime,
    Batch,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Realtime => "realtime",
            RunMode::Batch => "batch",
        }
    }
}

/// What a run mode does after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub process: bool,
    pub dashboard: bool,
    pub upload: bool,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            process: true,
            dashboard: true,
            upload: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub npq_strategy: QuenchingStrategy,
    pub npq_par_threshold: f64,
    /// Samples before and after the quench onset used by the windowed median.
    pub npq_window: [usize; 2],
    pub npq_min_fluorescence: f64,
    pub mld_coarse_threshold: f64,
    pub mld_fine_threshold: f64,
    pub poc_relation: CarbonRelation,
    pub cphyto_relation: PhytoplanktonRelation,
    pub depolarization_ratio: f64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            npq_strategy: QuenchingStrategy::WindowedMedian,
            npq_par_threshold: 80.0,
            npq_window: [1, 2],
            npq_min_fluorescence: 0.003,
            mld_coarse_threshold: 0.125,
            mld_fine_threshold: 0.03,
            poc_relation: CarbonRelation::Nab08Down,
            cphyto_relation: PhytoplanktonRelation::Graff2015,
            depolarization_ratio: 0.039,
        }
    }
}

impl ProcessingSettings {
    pub fn quenching_parameters(&self) -> QuenchingParameters {
        QuenchingParameters {
            window_before: self.npq_window[0],
            window_after: self.npq_window[1],
            min_fluorescence: self.npq_min_fluorescence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub remote_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub realtime: ModeConfig,
    pub batch: ModeConfig,
    pub processing: ProcessingSettings,
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&read_config(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.processing;
        if !settings.npq_par_threshold.is_finite() {
            return Err(ConfigError::Validation(
                "processing.npq_par_threshold must be finite".into(),
            ));
        }
        if settings.mld_coarse_threshold <= 0.0 || settings.mld_fine_threshold <= 0.0 {
            return Err(ConfigError::Validation(
                "processing.mld thresholds must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&settings.depolarization_ratio) {
            return Err(ConfigError::Validation(
                "processing.depolarization_ratio must be in [0.0, 1.0)".into(),
            ));
        }
        let any_upload = self.realtime.upload || self.batch.upload;
        if any_upload && self.upload.remote_dir.is_none() {
            return Err(ConfigError::Validation(
                "upload.remote_dir is required when uploads are enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn mode(&self, mode: RunMode) -> &ModeConfig {
        match mode {
            RunMode::Realtime => &self.realtime,
            RunMode::Batch => &self.batch,
        }
    }

    pub fn sensor_config_path(&self, user_id: &str) -> PathBuf {
        self.paths.sensor_config.join(format!("{user_id}_cfg.json"))
    }

    pub fn raw_dir(&self, user_id: &str) -> PathBuf {
        self.paths.raw.join(user_id)
    }
}
