//! JSON documents consumed by the web dashboard.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use floatproc_parser::ProfileKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ensure_dir, profile_stem, LevelFrame};
use crate::config::{RunMode, SensorConfiguration};
use crate::error::OutputError;
use crate::numerics::{nan_mean, nan_std};
use crate::pipeline::{PipelineOutput, ProfileSink};

pub const PROFILE_FIELDS: [&str; 8] = ["p", "par", "t", "s", "chla", "poc", "fdom", "o2_c"];
const PROFILE_REQUIRED: [&str; 3] = ["p", "t", "s"];

pub const TIMESERIES_FIELDS: [&str; 6] = ["t", "s", "chla", "poc", "fdom", "o2_c"];
const TIMESERIES_REQUIRED: [&str; 2] = ["t", "s"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatistics {
    pub mean: Vec<Option<f64>>,
    pub std: Vec<Option<f64>>,
}

/// Per-profile summary of one float, ordered by profile id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatTimeseries {
    pub profile_id: Vec<u32>,
    pub dt: Vec<Option<NaiveDateTime>>,
    pub mld: Vec<Option<f64>>,
    #[serde(flatten)]
    pub channels: BTreeMap<String, ChannelStatistics>,
}

impl FloatTimeseries {
    pub fn len(&self) -> usize {
        self.profile_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile_id.is_empty()
    }

    /// Adds the profile, replacing an earlier entry with the same id.
    pub fn upsert(&mut self, frame: &LevelFrame<'_>) -> Result<(), OutputError> {
        let key = frame.key();
        require_channels(frame, &TIMESERIES_REQUIRED, "the dashboard timeseries")?;

        if let Some(existing) = self.profile_id.iter().position(|id| *id == key.profile_id) {
            self.remove(existing);
        }

        let count = self.len();
        let at = self.profile_id.partition_point(|id| *id < key.profile_id);
        self.profile_id.insert(at, key.profile_id);
        self.dt.insert(at, frame.header.timestamp);
        self.mld.insert(at, frame.mixed_layer_pressure);

        for field in TIMESERIES_FIELDS {
            let (mean, std) = if frame.has_channel(field) {
                let values = frame.channel(field)?;
                (finite(nan_mean(&values)), finite(nan_std(&values)))
            } else {
                (None, None)
            };
            let stats = self
                .channels
                .entry(field.to_string())
                .or_insert_with(|| ChannelStatistics {
                    mean: vec![None; count],
                    std: vec![None; count],
                });
            stats.mean.insert(at, mean);
            stats.std.insert(at, std);
        }
        Ok(())
    }

    fn remove(&mut self, index: usize) {
        self.profile_id.remove(index);
        self.dt.remove(index);
        self.mld.remove(index);
        for stats in self.channels.values_mut() {
            if index < stats.mean.len() {
                stats.mean.remove(index);
            }
            if index < stats.std.len() {
                stats.std.remove(index);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardWriter {
    dir: PathBuf,
}

impl DashboardWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn profile_path(&self, user_id: &str, key: ProfileKey) -> PathBuf {
        self.dir
            .join(format!("{}.profile.json", profile_stem(user_id, key)))
    }

    pub fn timeseries_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{user_id}.timeseries.json"))
    }

    /// Writes the dashboard channels of one profile; missing samples become `null`.
    pub fn write_profile(
        &self,
        user_id: &str,
        frame: &LevelFrame<'_>,
    ) -> Result<PathBuf, OutputError> {
        require_channels(frame, &PROFILE_REQUIRED, "the dashboard profile")?;

        let mut document = Map::new();
        for field in PROFILE_FIELDS {
            if !frame.has_channel(field) {
                continue;
            }
            let values: Vec<Option<f64>> = frame.channel(field)?.into_iter().map(finite).collect();
            document.insert(field.to_string(), Value::from(values));
        }

        let path = self.profile_path(user_id, frame.key());
        write_json(&path, &document)?;
        Ok(path)
    }

    pub fn load_timeseries(&self, user_id: &str) -> Result<FloatTimeseries, OutputError> {
        let path = self.timeseries_path(user_id);
        if !path.exists() {
            return Ok(FloatTimeseries::default());
        }
        read_json(&path)
    }

    pub fn update_timeseries(
        &self,
        user_id: &str,
        frame: &LevelFrame<'_>,
    ) -> Result<FloatTimeseries, OutputError> {
        let mut series = self.load_timeseries(user_id)?;
        series.upsert(frame)?;
        write_json(&self.timeseries_path(user_id), &series)?;
        Ok(series)
    }

    pub fn reset_timeseries(&self, user_id: &str) -> Result<(), OutputError> {
        let path = self.timeseries_path(user_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| OutputError::Io { path, source })?;
        }
        Ok(())
    }
}

impl ProfileSink for DashboardWriter {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn start_float(
        &mut self,
        config: &SensorConfiguration,
        mode: RunMode,
    ) -> Result<(), OutputError> {
        if mode == RunMode::Batch {
            debug!(user_id = %config.user_id, "rebuilding dashboard timeseries");
            self.reset_timeseries(&config.user_id)?;
        }
        Ok(())
    }

    fn write(
        &mut self,
        config: &SensorConfiguration,
        output: &PipelineOutput,
    ) -> Result<(), OutputError> {
        let frame = output.latest();
        self.write_profile(&config.user_id, &frame)?;
        self.update_timeseries(&config.user_id, &frame)?;
        Ok(())
    }
}

fn require_channels(
    frame: &LevelFrame<'_>,
    required: &[&str],
    output: &'static str,
) -> Result<(), OutputError> {
    match required.iter().find(|name| !frame.has_channel(name)) {
        Some(missing) => Err(OutputError::MissingChannel {
            channel: missing.to_string(),
            output,
            profile: frame.key(),
        }),
        None => Ok(()),
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, OutputError> {
    let file = File::open(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
