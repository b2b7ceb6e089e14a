use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use floatproc_parser::{FloatFamily, ProfileHeader};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::dashboard::{read_json, write_json};
use crate::config::{DeploymentInfo, SensorConfiguration};
use crate::error::OutputError;
use crate::pipeline::{PipelineOutput, ProfileSink};

/// A float silent for longer than this is reported as lost.
pub const LOST_AFTER_DAYS: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatStatus {
    Active,
    Lost,
}

impl FloatStatus {
    pub fn from_days_since_report(days: Option<i64>) -> Self {
        match days {
            Some(days) if days > LOST_AFTER_DAYS => FloatStatus::Lost,
            _ => FloatStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FloatStatus::Active => "active",
            FloatStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for FloatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatMetadataRecord {
    pub wmo: u32,
    pub user_id: String,
    pub pi: Option<String>,
    pub project: Option<String>,
    pub model: FloatFamily,
    pub profile_index: u32,
    pub deployment: Option<DeploymentInfo>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_report: Option<NaiveDateTime>,
    pub updated: NaiveDateTime,
    pub days_since_report: Option<i64>,
    pub status: FloatStatus,
}

impl FloatMetadataRecord {
    /// Builds the record after `header` was received, merging what `previous` knew.
    ///
    /// Profile 0 is the deployment profile; its position and time win over
    /// the configured deployment. A profile older than the stored one only
    /// refreshes the status.
    pub fn from_profile(
        config: &SensorConfiguration,
        header: &ProfileHeader,
        previous: Option<&FloatMetadataRecord>,
        now: NaiveDateTime,
    ) -> Self {
        let deployment = if header.key.profile_id == 0 {
            Some(DeploymentInfo {
                latitude: header.latitude,
                longitude: header.longitude,
                timestamp: header.timestamp,
            })
        } else {
            previous
                .and_then(|record| record.deployment.clone())
                .or_else(|| config.deployment.clone())
        };

        let stale = previous.is_some_and(|record| record.profile_index > header.key.profile_id);
        let (profile_index, last_latitude, last_longitude, last_report) = match previous {
            Some(record) if stale => (
                record.profile_index,
                record.last_latitude,
                record.last_longitude,
                record.last_report,
            ),
            _ => (
                header.key.profile_id,
                header.latitude,
                header.longitude,
                header.timestamp,
            ),
        };

        let mut record = Self {
            wmo: config.wmo,
            user_id: config.user_id.clone(),
            pi: config.pi.clone(),
            project: config.project.clone(),
            model: config.model,
            profile_index,
            deployment,
            last_latitude,
            last_longitude,
            last_report,
            updated: now,
            days_since_report: None,
            status: FloatStatus::Active,
        };
        record.refresh_status(now);
        record
    }

    pub fn refresh_status(&mut self, now: NaiveDateTime) {
        self.updated = now;
        self.days_since_report = self.last_report.map(|report| (now - report).num_days());
        self.status = FloatStatus::from_days_since_report(self.days_since_report);
    }
}

pub trait MetadataStore {
    fn load(&self, wmo: u32) -> Result<Option<FloatMetadataRecord>, OutputError>;

    fn upsert(&mut self, record: FloatMetadataRecord) -> Result<(), OutputError>;
}

/// All floats in one JSON object keyed by WMO number.
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    path: PathBuf,
}

impl JsonMetadataStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Result<BTreeMap<u32, FloatMetadataRecord>, OutputError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        read_json(&self.path)
    }
}

impl MetadataStore for JsonMetadataStore {
    fn load(&self, wmo: u32) -> Result<Option<FloatMetadataRecord>, OutputError> {
        Ok(self.records()?.remove(&wmo))
    }

    fn upsert(&mut self, record: FloatMetadataRecord) -> Result<(), OutputError> {
        let mut records = self.records()?;
        records.insert(record.wmo, record);
        write_json(&self.path, &records)
    }
}

pub struct MetadataRecorder<S> {
    store: S,
}

impl<S: MetadataStore> MetadataRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn record(
        &mut self,
        config: &SensorConfiguration,
        header: &ProfileHeader,
        now: NaiveDateTime,
    ) -> Result<FloatMetadataRecord, OutputError> {
        let previous = self.store.load(config.wmo)?;
        let record = FloatMetadataRecord::from_profile(config, header, previous.as_ref(), now);
        if record.status == FloatStatus::Lost {
            warn!(
                wmo = record.wmo,
                days_since_report = ?record.days_since_report,
                "float has not reported recently"
            );
        }
        self.store.upsert(record.clone())?;
        info!(
            wmo = record.wmo,
            profile = record.profile_index,
            status = %record.status,
            "float metadata updated"
        );
        Ok(record)
    }
}

impl<S: MetadataStore> ProfileSink for MetadataRecorder<S> {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn write(
        &mut self,
        config: &SensorConfiguration,
        output: &PipelineOutput,
    ) -> Result<(), OutputError> {
        let header = &output.level0().header;
        self.record(config, header, Utc::now().naive_utc())?;
        Ok(())
    }
}
