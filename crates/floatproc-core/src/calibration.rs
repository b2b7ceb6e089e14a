//! Level 1: conversion of raw counts and voltages to scientific units.

use floatproc_parser::{
    channel_names, channel_values, ChannelFrameBuilder, Profile, ProfileHeader, ProfileKey,
};
use polars::prelude::DataFrame;
use serde_json::Value;
use tracing::debug;

use crate::config::{SensorCategory, SensorConfiguration, SensorEntry};
use crate::error::{CalibrationError, FieldSource};

pub const ECO_MODELS: [&str; 7] = ["MCOM", "FLBBCD", "FLBB", "FLNTU", "ECO1C", "ECO2C", "ECO3C"];

const SBE63_PHASE_SCALE: f64 = 39.457_070_7;
const SBE63_REFERENCE_VOLTAGE: f64 = 3.3;
const SBE63_BRIDGE_RESISTANCE: f64 = 100e3;
const KELVIN: f64 = 273.15;

/// One calibrated output channel.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedChannel {
    pub name: String,
    pub values: Vec<f64>,
}

impl CalibratedChannel {
    fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Contract shared by every (category, model) calibration.
pub trait SensorCalibration {
    fn name(&self) -> &'static str;

    /// Converts the channels this sensor owns; missing samples stay missing.
    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError>;
}

/// Level 1 profile. The header is carried over unchanged from level 0.
#[derive(Debug, Clone)]
pub struct CalibratedProfile {
    pub header: ProfileHeader,
    pub observations: DataFrame,
    pub park_observations: DataFrame,
}

impl CalibratedProfile {
    pub fn key(&self) -> ProfileKey {
        self.header.key
    }

    pub fn sample_count(&self) -> usize {
        self.observations.height()
    }

    pub fn channel_names(&self) -> Vec<String> {
        channel_names(&self.observations)
    }

    pub fn channel(&self, name: &str) -> Option<Vec<f64>> {
        channel_values(&self.observations, name).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    Sbe41cp(PassThrough),
    Sbe63(Sbe63),
    Eco(EcoCalibration),
    SatlanticPar(SatlanticPar),
    Crv2k(PassThrough),
}

impl Calibration {
    /// Resolves the calibration for a configured sensor and reads its coefficients.
    pub fn for_sensor(sensor: &SensorEntry, profile: ProfileKey) -> Result<Self, CalibrationError> {
        let model = sensor.model.trim();
        match &sensor.category {
            SensorCategory::Ctd if model == "SBE41CP" => {
                Ok(Calibration::Sbe41cp(PassThrough::from_sensor(sensor, "SBE41CP")))
            }
            SensorCategory::Oxygen if model == "SBE63" => {
                Sbe63::from_sensor(sensor, profile).map(Calibration::Sbe63)
            }
            SensorCategory::Eco if ECO_MODELS.contains(&model) => {
                EcoCalibration::from_sensor(sensor, profile).map(Calibration::Eco)
            }
            SensorCategory::Radiometer if model == "Satlantic PAR" => {
                SatlanticPar::from_sensor(sensor, profile).map(Calibration::SatlanticPar)
            }
            SensorCategory::BeamTransmission if model == "CRV2K" => {
                Ok(Calibration::Crv2k(PassThrough::from_sensor(sensor, "CRV2K")))
            }
            category => Err(CalibrationError::UnsupportedModel {
                category: category.to_string(),
                model: sensor.model.clone(),
                profile,
            }),
        }
    }

    fn inner(&self) -> &dyn SensorCalibration {
        match self {
            Calibration::Sbe41cp(inner) | Calibration::Crv2k(inner) => inner,
            Calibration::Sbe63(inner) => inner,
            Calibration::Eco(inner) => inner,
            Calibration::SatlanticPar(inner) => inner,
        }
    }
}

impl SensorCalibration for Calibration {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError> {
        self.inner().calibrate(profile)
    }
}

/// Copies configured channels unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PassThrough {
    model: &'static str,
    channels: Vec<String>,
}

impl PassThrough {
    fn from_sensor(sensor: &SensorEntry, model: &'static str) -> Self {
        Self {
            model,
            channels: sensor.channel_names().map(str::to_string).collect(),
        }
    }
}

impl SensorCalibration for PassThrough {
    fn name(&self) -> &'static str {
        self.model
    }

    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError> {
        self.channels
            .iter()
            .map(|name| Ok(CalibratedChannel::new(name, observed(profile, name)?)))
            .collect()
    }
}

/// SBE63 optode: thermistor voltage to temperature, then phase to concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct Sbe63 {
    thermistor: [f64; 4],
    phase_a: [f64; 3],
    phase_b: [f64; 2],
    phase_c: [f64; 3],
    order: Vec<String>,
}

impl Sbe63 {
    const NAME: &'static str = "SBE63";

    fn from_sensor(sensor: &SensorEntry, profile: ProfileKey) -> Result<Self, CalibrationError> {
        let temperature = configured(sensor, "o2_t", profile)?;
        let phase = configured(sensor, "o2_ph", profile)?;
        Ok(Self {
            thermistor: array(temperature, "o2_t", "a", profile)?,
            phase_a: array(phase, "o2_ph", "a", profile)?,
            phase_b: array(phase, "o2_ph", "b", profile)?,
            phase_c: array(phase, "o2_ph", "c", profile)?,
            order: sensor
                .channel_names()
                .filter(|name| matches!(*name, "o2_t" | "o2_ph"))
                .map(str::to_string)
                .collect(),
        })
    }

    /// Film temperature (°C) from thermistor voltage.
    pub fn temperature(&self, volts: f64) -> f64 {
        let a = self.thermistor;
        let resistance = SBE63_BRIDGE_RESISTANCE * volts / (SBE63_REFERENCE_VOLTAGE - volts);
        let l = resistance.ln();
        1.0 / (a[0] + a[1] * l + a[2] * l * l + a[3] * l.powi(3)) - KELVIN
    }

    /// Oxygen concentration (ml/l) from phase voltage and film temperature.
    pub fn concentration(&self, phase_volts: f64, temperature: f64) -> f64 {
        let (a, b, c) = (self.phase_a, self.phase_b, self.phase_c);
        let ph = phase_volts / SBE63_PHASE_SCALE;
        let t = temperature;
        ((a[0] + a[1] * t + a[2] * ph * ph) / (b[0] + b[1] * ph) - 1.0)
            / (c[0] + c[1] * t + c[2] * t * t)
    }
}

impl SensorCalibration for Sbe63 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError> {
        let thermistor = observed(profile, "o2_t")?;
        let phase = observed(profile, "o2_ph")?;

        let temperature: Vec<f64> = thermistor.iter().map(|v| self.temperature(*v)).collect();
        let concentration = phase
            .iter()
            .zip(&temperature)
            .map(|(ph, t)| self.concentration(*ph, *t))
            .collect();

        let mut channels: Vec<CalibratedChannel> = self
            .order
            .iter()
            .map(|name| match name.as_str() {
                "o2_t" => CalibratedChannel::new(name, temperature.clone()),
                _ => CalibratedChannel::new(name, phase.clone()),
            })
            .collect();
        channels.push(CalibratedChannel::new("o2_c", concentration));
        Ok(channels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcoCoefficients {
    pub scale_factor: f64,
    pub dark_count: f64,
}

impl EcoCoefficients {
    pub fn apply(&self, count: f64) -> f64 {
        self.scale_factor * (count - self.dark_count)
    }
}

/// WET Labs ECO family: `scale_factor * (count - dark_count)` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EcoCalibration {
    channels: Vec<(String, EcoCoefficients)>,
}

impl EcoCalibration {
    fn from_sensor(sensor: &SensorEntry, profile: ProfileKey) -> Result<Self, CalibrationError> {
        let channels = sensor
            .channels
            .iter()
            .map(|channel| {
                let coefficients = EcoCoefficients {
                    scale_factor: number(
                        &channel.coefficients,
                        &channel.name,
                        "scale_factor",
                        profile,
                    )?,
                    dark_count: number(
                        &channel.coefficients,
                        &channel.name,
                        "dark_count",
                        profile,
                    )?,
                };
                Ok((channel.name.clone(), coefficients))
            })
            .collect::<Result<Vec<_>, CalibrationError>>()?;
        Ok(Self { channels })
    }
}

impl SensorCalibration for EcoCalibration {
    fn name(&self) -> &'static str {
        "ECO"
    }

    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError> {
        self.channels
            .iter()
            .map(|(name, coefficients)| {
                let counts = observed(profile, name)?;
                Ok(CalibratedChannel::new(
                    name,
                    counts.iter().map(|c| coefficients.apply(*c)).collect(),
                ))
            })
            .collect()
    }
}

/// Satlantic PAR sensor: `a1 * (count - a0) * im`; tilt channels are copied.
#[derive(Debug, Clone, PartialEq)]
pub struct SatlanticPar {
    a: [f64; 2],
    immersion: f64,
    order: Vec<String>,
}

impl SatlanticPar {
    const REQUIRED: [&'static str; 3] = ["par", "tilt", "tilt_std"];

    fn from_sensor(sensor: &SensorEntry, profile: ProfileKey) -> Result<Self, CalibrationError> {
        for name in Self::REQUIRED {
            configured(sensor, name, profile)?;
        }
        let par = configured(sensor, "par", profile)?;
        Ok(Self {
            a: array(par, "par", "a", profile)?,
            immersion: number(par, "par", "im", profile)?,
            order: sensor
                .channel_names()
                .filter(|name| Self::REQUIRED.contains(name))
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn irradiance(&self, count: f64) -> f64 {
        self.a[1] * (count - self.a[0]) * self.immersion
    }
}

impl SensorCalibration for SatlanticPar {
    fn name(&self) -> &'static str {
        "Satlantic PAR"
    }

    fn calibrate(&self, profile: &Profile) -> Result<Vec<CalibratedChannel>, CalibrationError> {
        self.order
            .iter()
            .map(|name| {
                let raw = observed(profile, name)?;
                let values = if name == "par" {
                    raw.iter().map(|c| self.irradiance(*c)).collect()
                } else {
                    raw
                };
                Ok(CalibratedChannel::new(name, values))
            })
            .collect()
    }
}

/// Calibrates every configured sensor in configuration order.
///
/// The result holds exactly the configured channels, plus `o2_c` when an
/// optode is installed.
pub fn calibrate_profile(
    profile: &Profile,
    config: &SensorConfiguration,
) -> Result<CalibratedProfile, CalibrationError> {
    let key = profile.key();
    let mut builder = ChannelFrameBuilder::new();

    for sensor in &config.sensors {
        let calibration = Calibration::for_sensor(sensor, key)?;
        let channels = calibration.calibrate(profile)?;
        debug!(
            float_id = key.float_id,
            profile_id = key.profile_id,
            sensor = calibration.name(),
            channels = channels.len(),
            "calibrated sensor"
        );
        for channel in channels {
            builder.insert_values(channel.name, &channel.values);
        }
    }

    let observations = builder.build().map_err(|err| CalibrationError::Frame {
        profile: key,
        message: err.to_string(),
    })?;

    Ok(CalibratedProfile {
        header: profile.header.clone(),
        observations,
        park_observations: profile.park_observations.clone(),
    })
}

fn observed(profile: &Profile, name: &str) -> Result<Vec<f64>, CalibrationError> {
    profile.channel(name).ok_or_else(|| CalibrationError::MissingField {
        field: name.to_string(),
        location: FieldSource::Observations,
        profile: profile.key(),
    })
}

fn missing_configuration(field: String, profile: ProfileKey) -> CalibrationError {
    CalibrationError::MissingField {
        field,
        location: FieldSource::Configuration,
        profile,
    }
}

fn configured<'a>(
    sensor: &'a SensorEntry,
    channel: &str,
    profile: ProfileKey,
) -> Result<&'a Value, CalibrationError> {
    sensor
        .channel(channel)
        .map(|entry| &entry.coefficients)
        .ok_or_else(|| missing_configuration(channel.to_string(), profile))
}

fn number(
    coefficients: &Value,
    channel: &str,
    key: &str,
    profile: ProfileKey,
) -> Result<f64, CalibrationError> {
    coefficients
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| missing_configuration(format!("{channel}.{key}"), profile))
}

fn array<const N: usize>(
    coefficients: &Value,
    channel: &str,
    key: &str,
    profile: ProfileKey,
) -> Result<[f64; N], CalibrationError> {
    let missing = || missing_configuration(format!("{channel}.{key}"), profile);
    let items = coefficients.get(key).and_then(Value::as_array).ok_or_else(missing)?;
    if items.len() < N {
        return Err(missing());
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64().ok_or_else(missing)?;
    }
    Ok(out)
}
