pub mod calibration;
pub mod config;
pub mod error;
pub mod level2;
pub mod numerics;
pub mod optics;
pub mod outputs;
pub mod pipeline;
pub mod quenching;
pub mod seawater;

pub use calibration::{calibrate_profile, CalibratedProfile, Calibration, SensorCalibration};
pub use config::{AppConfig, ProcessingSettings, RunMode, SensorConfiguration};
pub use error::{
    CalibrationError, ConfigError, OutputError, PipelineError, ProcessingError, RegressionError,
};
pub use level2::{process_level2, Level2Profile};
pub use pipeline::{
    process_profile, BatchReport, Pipeline, PipelineOutput, ProcessedProfile, ProfileSink,
};
pub use seawater::{Eos80, SeawaterModel};
