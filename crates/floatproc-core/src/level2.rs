//! Level 2: corrections of calibrated channels and derived oceanographic products.

use floatproc_parser::{
    channel_names, channel_values, ChannelFrameBuilder, ProfileHeader, ProfileKey,
};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calibration::CalibratedProfile;
use crate::config::{ProcessingSettings, SensorCategory, SensorConfiguration};
use crate::error::ProcessingError;
use crate::numerics::{euphotic_depth, mixed_layer_index, quench_onset};
use crate::optics::{
    particulate_backscatter, CarbonRelation, PhytoplanktonRelation, ScatteringGeometry,
};
use crate::quenching::{correct_quenching, QuenchingError, QuenchingStrategy};
use crate::seawater::SeawaterModel;

const O2_PRESSURE_COEFFICIENT: f64 = 0.011;
const O2_SALINITY_B: [f64; 4] = [-6.245_23e-3, -7.376_14e-3, -1.034_10e-2, -8.170_83e-3];
const O2_SALINITY_C0: f64 = -4.886_820e-7;
/// µmol per ml of oxygen at STP.
const O2_UMOL_PER_ML: f64 = 44.6596;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MixedLayerDepth {
    pub index: usize,
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MixedLayer {
    pub coarse: Option<MixedLayerDepth>,
    pub fine: Option<MixedLayerDepth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuenchingSummary {
    pub strategy: QuenchingStrategy,
    /// Deepest pressure where PAR exceeded the threshold, if any.
    pub onset: Option<f64>,
    pub applied: bool,
}

/// Relations and sensor geometry behind the carbon products.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarbonSummary {
    pub poc_relation: CarbonRelation,
    pub cphyto_relation: PhytoplanktonRelation,
    pub geometry: ScatteringGeometry,
}

#[derive(Debug, Clone)]
pub struct Level2Profile {
    pub header: ProfileHeader,
    pub observations: DataFrame,
    pub park_observations: DataFrame,
    pub mixed_layer: MixedLayer,
    pub quenching: Option<QuenchingSummary>,
    pub euphotic_depth: Option<f64>,
    pub carbon: Option<CarbonSummary>,
}

impl Level2Profile {
    pub fn key(&self) -> ProfileKey {
        self.header.key
    }

    pub fn channel_names(&self) -> Vec<String> {
        channel_names(&self.observations)
    }

    pub fn channel(&self, name: &str) -> Option<Vec<f64>> {
        channel_values(&self.observations, name).ok()
    }
}

struct Density {
    absolute_salinity: Vec<f64>,
    conservative_temperature: Vec<f64>,
    sigma: Vec<f64>,
}

struct Backscatter {
    bbp: Vec<f64>,
    geometry: ScatteringGeometry,
}

/// Applies level 2 corrections and derivations to a calibrated profile.
///
/// Requires `p`, `s` and `par`. Any failure aborts the whole profile.
pub fn process_level2(
    profile: &CalibratedProfile,
    config: &SensorConfiguration,
    settings: &ProcessingSettings,
    seawater: &dyn SeawaterModel,
) -> Result<Level2Profile, ProcessingError> {
    let key = profile.key();
    let require = |name: &str| {
        profile
            .channel(name)
            .ok_or_else(|| ProcessingError::MissingField {
                field: name.to_string(),
                profile: key,
            })
    };

    let pressure = require("p")?;
    let salinity = require("s")?;
    let par = require("par")?;
    let temperature = profile.channel("t");

    let density = temperature
        .as_ref()
        .map(|t| derive_density(profile, &pressure, &salinity, t, seawater));

    let backscatter = match profile.channel("beta") {
        Some(beta) => Some(derive_backscatter(
            key,
            config,
            settings,
            &beta,
            temperature.as_deref(),
            &salinity,
        )?),
        None => None,
    };

    let oxygen = match profile.channel("o2_c") {
        Some(o2_c) => {
            let o2_t = require("o2_t")?;
            Some(correct_oxygen(&o2_c, &o2_t, &pressure, &salinity))
        }
        None => None,
    };

    let onset = quench_onset(&pressure, &par, settings.npq_par_threshold);
    let mut quenching = None;

    let mut builder = ChannelFrameBuilder::new();
    for name in profile.channel_names() {
        let values = require(&name)?;
        match name.as_str() {
            "fchl" => {
                let (chla, summary) = correct_fluorescence(
                    key,
                    settings,
                    &pressure,
                    &values,
                    backscatter.as_ref().map(|b| b.bbp.as_slice()),
                    onset,
                )?;
                quenching = Some(summary);
                builder.insert_values("fl", &values);
                builder.insert_values("chla", &chla);
            }
            "beta" => {
                if let Some(backscatter) = &backscatter {
                    builder.insert_values("bbp", &backscatter.bbp);
                }
            }
            "c_count" => {}
            "o2_c" => {
                if let Some(oxygen) = &oxygen {
                    builder.insert_values("o2_c", oxygen);
                }
            }
            _ => builder.insert_values(name.as_str(), &values),
        }
    }

    let mut mixed_layer = MixedLayer::default();
    if let Some(density) = &density {
        builder.insert_values("sa", &density.absolute_salinity);
        builder.insert_values("ct", &density.conservative_temperature);
        builder.insert_values("sigma", &density.sigma);

        if let Some(oxygen) = &oxygen {
            let umol_kg: Vec<f64> = oxygen
                .iter()
                .zip(&density.sigma)
                .map(|(o2, sigma)| o2 * O2_UMOL_PER_ML / (sigma + 1000.0) * 1000.0)
                .collect();
            builder.insert_values("o2_umol_kg", &umol_kg);
        }

        let locate = |threshold: f64| {
            mixed_layer_index(&density.sigma, threshold).map(|index| MixedLayerDepth {
                index,
                pressure: pressure[index],
            })
        };
        mixed_layer = MixedLayer {
            coarse: locate(settings.mld_coarse_threshold),
            fine: locate(settings.mld_fine_threshold),
        };
    }

    let mut carbon = None;
    if let Some(backscatter) = &backscatter {
        let wavelength = backscatter.geometry.wavelength;
        let estimates: Vec<_> = backscatter
            .bbp
            .iter()
            .map(|bbp| settings.poc_relation.estimate(*bbp, wavelength))
            .collect();
        let values: Vec<f64> = estimates.iter().map(|e| e.value).collect();
        let lower: Vec<f64> = estimates.iter().map(|e| e.lower).collect();
        let upper: Vec<f64> = estimates.iter().map(|e| e.upper).collect();
        let cphyto: Vec<f64> = backscatter
            .bbp
            .iter()
            .map(|bbp| settings.cphyto_relation.estimate(*bbp, wavelength))
            .collect();

        builder.insert_values("poc", &values);
        builder.insert_values("poc_lower", &lower);
        builder.insert_values("poc_upper", &upper);
        builder.insert_values("cphyto", &cphyto);
        carbon = Some(CarbonSummary {
            poc_relation: settings.poc_relation,
            cphyto_relation: settings.cphyto_relation,
            geometry: backscatter.geometry,
        });
    }

    let observations = builder
        .build()
        .map_err(|source| ProcessingError::Polars { profile: key, source })?;

    let euphotic_depth = euphotic_depth(&pressure, &par);
    debug!(
        float_id = key.float_id,
        profile_id = key.profile_id,
        mld = mixed_layer.coarse.map(|m| m.pressure),
        euphotic_depth,
        "level 2 derived"
    );

    Ok(Level2Profile {
        header: profile.header.clone(),
        observations,
        park_observations: profile.park_observations.clone(),
        mixed_layer,
        quenching,
        euphotic_depth,
        carbon,
    })
}

fn derive_density(
    profile: &CalibratedProfile,
    pressure: &[f64],
    salinity: &[f64],
    temperature: &[f64],
    seawater: &dyn SeawaterModel,
) -> Density {
    let lon = profile.header.longitude.unwrap_or(f64::NAN);
    let lat = profile.header.latitude.unwrap_or(f64::NAN);

    let absolute_salinity: Vec<f64> = salinity
        .iter()
        .zip(pressure)
        .map(|(sp, p)| seawater.absolute_salinity(*sp, *p, lon, lat))
        .collect();
    let conservative_temperature: Vec<f64> = absolute_salinity
        .iter()
        .zip(temperature)
        .zip(pressure)
        .map(|((sa, t), p)| seawater.conservative_temperature(*sa, *t, *p))
        .collect();
    let sigma = absolute_salinity
        .iter()
        .zip(&conservative_temperature)
        .zip(pressure)
        .map(|((sa, ct), p)| seawater.density(*sa, *ct, *p) - 1000.0)
        .collect();

    Density {
        absolute_salinity,
        conservative_temperature,
        sigma,
    }
}

fn derive_backscatter(
    key: ProfileKey,
    config: &SensorConfiguration,
    settings: &ProcessingSettings,
    beta: &[f64],
    temperature: Option<&[f64]>,
    salinity: &[f64],
) -> Result<Backscatter, ProcessingError> {
    let configuration = |message: String| ProcessingError::Configuration {
        profile: key,
        message,
    };

    let eco = config
        .sensor(&SensorCategory::Eco)
        .filter(|sensor| sensor.channel("beta").is_some())
        .ok_or_else(|| configuration("beta observed but no ECO sensor configures it".into()))?;
    let geometry = ScatteringGeometry::for_model(&eco.model, eco.wavelength).ok_or_else(|| {
        configuration(format!(
            "unknown scattering angle and wavelength for ECO model '{}'",
            eco.model
        ))
    })?;
    let temperature = temperature.ok_or_else(|| ProcessingError::MissingField {
        field: "t".into(),
        profile: key,
    })?;

    let bbp = particulate_backscatter(
        beta,
        temperature,
        salinity,
        geometry,
        settings.depolarization_ratio,
    )
    .ok_or_else(|| {
        configuration(format!(
            "scattering angle {} is outside the supported range",
            geometry.angle
        ))
    })?;

    Ok(Backscatter { bbp, geometry })
}

fn correct_fluorescence(
    key: ProfileKey,
    settings: &ProcessingSettings,
    pressure: &[f64],
    fluorescence: &[f64],
    backscatter: Option<&[f64]>,
    onset: Option<f64>,
) -> Result<(Vec<f64>, QuenchingSummary), ProcessingError> {
    let strategy = settings.npq_strategy;
    let Some(onset) = onset else {
        return Ok((
            fluorescence.to_vec(),
            QuenchingSummary {
                strategy,
                onset: None,
                applied: false,
            },
        ));
    };

    let correction = correct_quenching(
        strategy,
        pressure,
        fluorescence,
        backscatter,
        onset,
        &settings.quenching_parameters(),
    )
    .map_err(|err| match err {
        QuenchingError::MissingBackscatter(_) => ProcessingError::MissingField {
            field: "bbp".into(),
            profile: key,
        },
        QuenchingError::Regression(source) => ProcessingError::Regression { profile: key, source },
    })?;

    if !correction.applied {
        warn!(
            float_id = key.float_id,
            profile_id = key.profile_id,
            strategy = strategy.as_str(),
            "quenching correction not applied"
        );
    }

    Ok((
        correction.values,
        QuenchingSummary {
            strategy,
            onset: Some(onset),
            applied: correction.applied,
        },
    ))
}

/// Pressure and salinity compensation of optode oxygen, using the optode temperature.
pub fn correct_oxygen(o2_c: &[f64], o2_t: &[f64], pressure: &[f64], salinity: &[f64]) -> Vec<f64> {
    o2_c.iter()
        .zip(o2_t)
        .zip(pressure)
        .zip(salinity)
        .map(|(((o2, t), p), s)| {
            o2 * oxygen_pressure_factor(*t, *p) * oxygen_salinity_factor(*t, *s)
        })
        .collect()
}

pub fn oxygen_pressure_factor(temperature: f64, pressure: f64) -> f64 {
    let pressure = if pressure < 0.0 { 0.0 } else { pressure };
    (O2_PRESSURE_COEFFICIENT * pressure / (temperature + 273.15)).exp()
}

pub fn oxygen_salinity_factor(temperature: f64, salinity: f64) -> f64 {
    let ts = ((298.15 - temperature) / (273.15 + temperature)).ln();
    let b = O2_SALINITY_B;
    ((b[0] + b[1] * ts + b[2] * ts * ts + b[3] * ts.powi(3)) * salinity
        + O2_SALINITY_C0 * salinity * salinity)
        .exp()
}
