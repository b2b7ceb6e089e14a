use std::path::{Path, PathBuf};

use floatproc_parser::ProfileKey;
use tracing::debug;

use super::{ensure_dir, profile_stem, LevelFrame, ProcessingLevel};
use crate::config::SensorConfiguration;
use crate::error::OutputError;
use crate::pipeline::{PipelineOutput, ProfileSink};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const POSITION_COLUMNS: [&str; 3] = ["timestamp", "latitude", "longitude"];

/// Writes each processing level to `<root>/<level>/<user_id>.<profile>.csv`.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    root: PathBuf,
}

impl CsvExporter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, level: ProcessingLevel, user_id: &str, key: ProfileKey) -> PathBuf {
        self.root
            .join(level.as_str())
            .join(format!("{}.csv", profile_stem(user_id, key)))
    }

    pub fn export(
        &self,
        config: &SensorConfiguration,
        frame: &LevelFrame<'_>,
    ) -> Result<PathBuf, OutputError> {
        let path = self.path_for(frame.level, &config.user_id, frame.key());
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }

        let channels = column_order(config, &frame.channel_names());
        let columns = channels
            .iter()
            .map(|name| frame.channel(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut writer = csv::Writer::from_path(&path)?;
        let names = POSITION_COLUMNS
            .iter()
            .copied()
            .chain(channels.iter().map(String::as_str));
        writer.write_record(names)?;

        let header = frame.header;
        let timestamp = header
            .timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        let latitude = header.latitude.map(format_value).unwrap_or_default();
        let longitude = header.longitude.map(format_value).unwrap_or_default();

        for row in 0..frame.observations.height() {
            let mut record = vec![timestamp.clone(), latitude.clone(), longitude.clone()];
            record.extend(columns.iter().map(|column| format_value(column[row])));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), level = %frame.level, "exported csv");
        Ok(path)
    }
}

impl ProfileSink for CsvExporter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(
        &mut self,
        config: &SensorConfiguration,
        output: &PipelineOutput,
    ) -> Result<(), OutputError> {
        for frame in output.frames() {
            self.export(config, &frame)?;
        }
        Ok(())
    }
}

/// Channels in sensor configuration order, followed by every other channel in frame order.
pub fn column_order(config: &SensorConfiguration, channels: &[String]) -> Vec<String> {
    let mut order: Vec<String> = config
        .channel_order()
        .into_iter()
        .filter(|name| channels.contains(name))
        .collect();
    for name in channels {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    order
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}
