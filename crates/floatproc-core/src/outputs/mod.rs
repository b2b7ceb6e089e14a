//! Collaborators that persist processed profiles: CSV export, dashboard
//! JSON, float metadata and file upload.

pub mod dashboard;
pub mod export;
pub mod metadata;
pub mod upload;

use std::fmt;
use std::fs;
use std::path::Path;

use floatproc_parser::{channel_names, channel_values, ProfileHeader, ProfileKey};
use polars::prelude::{DataFrame, PolarsResult};

use crate::error::OutputError;

pub use dashboard::{DashboardWriter, FloatTimeseries, PROFILE_FIELDS, TIMESERIES_FIELDS};
pub use export::{column_order, CsvExporter};
pub use metadata::{
    FloatMetadataRecord, FloatStatus, JsonMetadataStore, MetadataRecorder, MetadataStore,
};
pub use upload::{DirectoryUploader, Uploader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingLevel {
    L0,
    L1,
    L2,
}

impl ProcessingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingLevel::L0 => "L0",
            ProcessingLevel::L1 => "L1",
            ProcessingLevel::L2 => "L2",
        }
    }
}

impl fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of one processing level of a profile.
#[derive(Debug, Clone, Copy)]
pub struct LevelFrame<'a> {
    pub level: ProcessingLevel,
    pub header: &'a ProfileHeader,
    pub observations: &'a DataFrame,
    /// Coarse mixed layer pressure, level 2 only.
    pub mixed_layer_pressure: Option<f64>,
}

impl LevelFrame<'_> {
    pub fn key(&self) -> ProfileKey {
        self.header.key
    }

    pub fn channel_names(&self) -> Vec<String> {
        channel_names(self.observations)
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.observations.column(name).is_ok()
    }

    pub fn channel(&self, name: &str) -> PolarsResult<Vec<f64>> {
        channel_values(self.observations, name)
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// File stem shared by exports of one profile: `<user_id>.<profile:03>`.
pub(crate) fn profile_stem(user_id: &str, key: ProfileKey) -> String {
    format!("{user_id}.{:03}", key.profile_id)
}
