//! Decode, calibrate and process transmissions, then hand the results to sinks.

use std::path::{Path, PathBuf};

use floatproc_parser::{decode_transmission, ParserError, Profile, ProfileKey, Transmission};
use tracing::{debug, info, warn};

use crate::calibration::{calibrate_profile, CalibratedProfile};
use crate::config::{AppConfig, ProcessingSettings, RunMode, SensorConfiguration};
use crate::error::{OutputError, PipelineError};
use crate::level2::{process_level2, Level2Profile};
use crate::outputs::{
    CsvExporter, DashboardWriter, DirectoryUploader, JsonMetadataStore, LevelFrame,
    MetadataRecorder, ProcessingLevel, Uploader,
};
use crate::seawater::{Eos80, SeawaterModel};

/// All three processing levels of one profile.
#[derive(Debug, Clone)]
pub struct ProcessedProfile {
    pub level0: Profile,
    pub level1: CalibratedProfile,
    pub level2: Level2Profile,
}

/// Runs calibration and level 2 processing on a decoded profile.
pub fn process_profile(
    profile: Profile,
    config: &SensorConfiguration,
    settings: &ProcessingSettings,
    seawater: &dyn SeawaterModel,
) -> Result<ProcessedProfile, PipelineError> {
    let level1 = calibrate_profile(&profile, config)?;
    let level2 = process_level2(&level1, config, settings, seawater)?;
    Ok(ProcessedProfile {
        level0: profile,
        level1,
        level2,
    })
}

/// What the pipeline produced for one transmission.
#[derive(Debug, Clone)]
pub enum PipelineOutput {
    /// Processing disabled for the run mode; only level 0 exists.
    Decoded(Profile),
    Processed(ProcessedProfile),
}

impl PipelineOutput {
    pub fn key(&self) -> ProfileKey {
        self.level0().key()
    }

    pub fn level0(&self) -> &Profile {
        match self {
            PipelineOutput::Decoded(profile) => profile,
            PipelineOutput::Processed(processed) => &processed.level0,
        }
    }

    pub fn processed(&self) -> Option<&ProcessedProfile> {
        match self {
            PipelineOutput::Decoded(_) => None,
            PipelineOutput::Processed(processed) => Some(processed),
        }
    }

    /// Every available level, lowest first.
    pub fn frames(&self) -> Vec<LevelFrame<'_>> {
        let level0 = self.level0();
        let mut frames = vec![LevelFrame {
            level: ProcessingLevel::L0,
            header: &level0.header,
            observations: &level0.observations,
            mixed_layer_pressure: None,
        }];
        if let Some(processed) = self.processed() {
            frames.push(LevelFrame {
                level: ProcessingLevel::L1,
                header: &processed.level1.header,
                observations: &processed.level1.observations,
                mixed_layer_pressure: None,
            });
            frames.push(LevelFrame {
                level: ProcessingLevel::L2,
                header: &processed.level2.header,
                observations: &processed.level2.observations,
                mixed_layer_pressure: processed.level2.mixed_layer.coarse.map(|m| m.pressure),
            });
        }
        frames
    }

    /// The most processed level available.
    pub fn latest(&self) -> LevelFrame<'_> {
        let level0 = self.level0();
        match self.processed() {
            Some(processed) => LevelFrame {
                level: ProcessingLevel::L2,
                header: &processed.level2.header,
                observations: &processed.level2.observations,
                mixed_layer_pressure: processed.level2.mixed_layer.coarse.map(|m| m.pressure),
            },
            None => LevelFrame {
                level: ProcessingLevel::L0,
                header: &level0.header,
                observations: &level0.observations,
                mixed_layer_pressure: None,
            },
        }
    }
}

/// Receives every profile the pipeline produces.
pub trait ProfileSink {
    fn name(&self) -> &'static str;

    /// Called once per float before its first profile.
    fn start_float(
        &mut self,
        _config: &SensorConfiguration,
        _mode: RunMode,
    ) -> Result<(), OutputError> {
        Ok(())
    }

    fn write(
        &mut self,
        config: &SensorConfiguration,
        output: &PipelineOutput,
    ) -> Result<(), OutputError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedProfile {
    pub user_id: String,
    pub path: Option<PathBuf>,
    pub key: Option<ProfileKey>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub processed: Vec<ProfileKey>,
    pub failed: Vec<FailedProfile>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct UploadTarget {
    uploader: Box<dyn Uploader>,
    remote_dir: PathBuf,
}

pub struct Pipeline {
    app: AppConfig,
    mode: RunMode,
    seawater: Box<dyn SeawaterModel>,
    sinks: Vec<Box<dyn ProfileSink>>,
    upload: Option<UploadTarget>,
}

impl Pipeline {
    /// A pipeline with no sinks and the EOS-80 seawater model.
    pub fn new(app: AppConfig, mode: RunMode) -> Self {
        Self {
            app,
            mode,
            seawater: Box::new(Eos80),
            sinks: Vec::new(),
            upload: None,
        }
    }

    /// Wires the collaborators enabled for `mode` in the application configuration.
    pub fn from_config(app: AppConfig, mode: RunMode) -> Self {
        let flags = *app.mode(mode);
        let paths = app.paths.clone();
        let remote_dir = app.upload.remote_dir.clone();

        let mut pipeline = Self::new(app, mode);
        if flags.process {
            pipeline = pipeline.with_sink(Box::new(CsvExporter::new(&paths.output)));
        }
        if flags.dashboard {
            pipeline = pipeline
                .with_sink(Box::new(DashboardWriter::new(&paths.dashboard)))
                .with_sink(Box::new(MetadataRecorder::new(JsonMetadataStore::new(
                    &paths.metadata,
                ))));
        }
        if let (true, Some(remote_dir)) = (flags.upload, remote_dir) {
            pipeline = pipeline.with_uploader(Box::new(DirectoryUploader), remote_dir);
        }
        pipeline
    }

    pub fn with_sink(mut self, sink: Box<dyn ProfileSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_uploader(mut self, uploader: Box<dyn Uploader>, remote_dir: PathBuf) -> Self {
        self.upload = Some(UploadTarget {
            uploader,
            remote_dir,
        });
        self
    }

    pub fn with_seawater_model(mut self, seawater: Box<dyn SeawaterModel>) -> Self {
        self.seawater = seawater;
        self
    }

    /// Processes one transmission; the first error aborts and is returned.
    pub fn run_realtime(&mut self, path: &Path) -> Result<PipelineOutput, PipelineError> {
        let user_id =
            user_id_for(path).ok_or_else(|| PipelineError::UnknownFloat(path.to_path_buf()))?;
        let config = SensorConfiguration::load(&self.app.sensor_config_path(&user_id))?;
        for sink in &mut self.sinks {
            sink.start_float(&config, self.mode)?;
        }

        let transmission = read_transmission(path)?;
        let output = self.handle(&config, transmission)?;

        if let Some(target) = &self.upload {
            for file in transmission_files(path) {
                let (Some(file_name), Some(local_dir)) =
                    (file.file_name().and_then(|n| n.to_str()), file.parent())
                else {
                    return Err(PipelineError::UnknownFloat(path.to_path_buf()));
                };
                let remote = target
                    .uploader
                    .upload(file_name, local_dir, &target.remote_dir)?;
                info!(path = %remote.display(), "transmission uploaded");
            }
        }
        Ok(output)
    }

    /// Reprocesses every stored transmission of each float in ascending profile order.
    ///
    /// A failing profile or float is logged and recorded; the run continues.
    pub fn run_batch(&mut self, user_ids: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        for user_id in user_ids {
            if let Err(err) = self.run_float(user_id, &mut report) {
                warn!(user_id = %user_id, error = %err, "float skipped");
                report.failed.push(FailedProfile {
                    user_id: user_id.clone(),
                    path: None,
                    key: None,
                    error: err.to_string(),
                });
            }
        }
        info!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }

    fn run_float(&mut self, user_id: &str, report: &mut BatchReport) -> Result<(), PipelineError> {
        let config = SensorConfiguration::load(&self.app.sensor_config_path(user_id))?;
        let files = list_transmissions(&self.app.raw_dir(user_id))?;
        info!(user_id = %user_id, files = files.len(), "processing float");

        for sink in &mut self.sinks {
            sink.start_float(&config, self.mode)?;
        }

        for path in files {
            let result = read_transmission(&path)
                .map_err(PipelineError::from)
                .and_then(|transmission| self.handle(&config, transmission));
            match result {
                Ok(output) => report.processed.push(output.key()),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "profile failed");
                    report.failed.push(FailedProfile {
                        user_id: user_id.to_string(),
                        key: file_key(&path),
                        path: Some(path),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn handle(
        &mut self,
        config: &SensorConfiguration,
        transmission: Transmission,
    ) -> Result<PipelineOutput, PipelineError> {
        let profile = decode_transmission(&transmission)?;
        let key = profile.key();
        if profile.header.family != config.model {
            warn!(
                float_id = key.float_id,
                profile_id = key.profile_id,
                decoded = %profile.header.family,
                configured = %config.model,
                "float family differs from sensor configuration"
            );
        }
        if !profile.skipped_rows.is_empty() {
            debug!(
                float_id = key.float_id,
                profile_id = key.profile_id,
                skipped = profile.skipped_rows.len(),
                "rows skipped while decoding"
            );
        }

        let output = if self.app.mode(self.mode).process {
            PipelineOutput::Processed(process_profile(
                profile,
                config,
                &self.app.processing,
                self.seawater.as_ref(),
            )?)
        } else {
            PipelineOutput::Decoded(profile)
        };

        for sink in &mut self.sinks {
            sink.write(config, &output)?;
        }

        let level0 = output.level0();
        info!(
            float_id = key.float_id,
            profile_id = key.profile_id,
            samples = level0.sample_count(),
            complete = level0.header.complete,
            level = %output.latest().level,
            "profile processed"
        );
        Ok(output)
    }
}

/// `0572.010.msg` belongs to float user id `n0572`.
pub fn user_id_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let float = name.split('.').next()?.trim();
    if float.is_empty() || !float.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("n{float}"))
}

/// Navis messages are single files; Provor profiles are `.fix`/`.cast` pairs.
pub fn read_transmission(path: &Path) -> Result<Transmission, ParserError> {
    match transmission_files(path).as_slice() {
        [fix, cast] => Transmission::read_provor(fix, cast),
        _ => Transmission::read_navis(path),
    }
}

/// Files making up the transmission at `path`: the fix and cast pair for Provor,
/// otherwise the file itself.
pub fn transmission_files(path: &Path) -> Vec<PathBuf> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("fix") | Some("cast") => vec![path.with_extension("fix"), path.with_extension("cast")],
        _ => vec![path.to_path_buf()],
    }
}

/// Transmissions stored for one float, in ascending profile order.
pub fn list_transmissions(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for extension in ["msg", "fix"] {
        let pattern = dir.join(format!("*.{extension}"));
        for entry in glob::glob(&pattern.to_string_lossy())? {
            files.push(entry.map_err(|err| err.into_error())?);
        }
    }
    files.sort_by_key(|path| {
        let key = file_key(path);
        (key.is_none(), key, path.clone())
    });
    Ok(files)
}

fn file_key(path: &Path) -> Option<ProfileKey> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(ProfileKey::from_file_name)
}
