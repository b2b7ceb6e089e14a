//! Backscattering and carbon products derived from ECO scattering channels.

use std::f64::consts::PI;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::numerics::CubicSpline;

const AVOGADRO: f64 = 6.022_141_793_0e23;
const BOLTZMANN: f64 = 1.380_650_3e-23;
const WATER_MOLAR_MASS: f64 = 18e-3;
const SPECTRAL_SLOPE: f64 = -0.78;

/// Sullivan et al. (2013) conversion from volume scattering to backscattering.
const CHI_ANGLES: [f64; 9] = [90.0, 100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0];
const CHI_VALUES: [f64; 9] = [0.684, 0.858, 1.000, 1.097, 1.153, 1.167, 1.156, 1.131, 1.093];

static CHI_SPLINE: Lazy<Option<CubicSpline>> =
    Lazy::new(|| CubicSpline::not_a_knot(&CHI_ANGLES, &CHI_VALUES));

/// Centroid angle and wavelength of a scattering sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatteringGeometry {
    pub angle: f64,
    pub wavelength: f64,
}

impl ScatteringGeometry {
    pub const DEFAULT_WAVELENGTH: f64 = 700.0;

    /// Geometry of a known ECO model; a configured wavelength takes precedence.
    pub fn for_model(model: &str, wavelength: Option<f64>) -> Option<Self> {
        let angle = match model.trim().to_ascii_uppercase().as_str() {
            "MCOM" => 150.0,
            "FLBB" | "FLBBCD" | "FLNTU" | "ECO2C" => 142.0,
            "ECO1C" | "ECO3C" => 124.0,
            _ => return None,
        };
        Some(Self {
            angle,
            wavelength: wavelength.unwrap_or(Self::DEFAULT_WAVELENGTH),
        })
    }

    pub fn chi(&self) -> Option<f64> {
        scattering_conversion(self.angle)
    }
}

/// χ(θ) interpolated from the Sullivan table; `None` outside 90..=170°.
pub fn scattering_conversion(angle: f64) -> Option<f64> {
    CHI_SPLINE.as_ref()?.evaluate(angle)
}

/// Volume scattering of seawater (m⁻¹ sr⁻¹) after Zhang et al. (2009).
pub fn seawater_scattering(
    t: f64,
    s: f64,
    wavelength: f64,
    angle: f64,
    depolarization: f64,
) -> f64 {
    let tk = t + 273.15;
    let theta = angle.to_radians();
    let micron = wavelength / 1e3;

    let n_air = 1.0
        + (5_792_105.0 / (238.0185 - 1.0 / micron.powi(2))
            + 167_917.0 / (57.362 - 1.0 / micron.powi(2)))
            / 1e8;

    let (n0, n1, n2, n3, n4) = (1.314_05, 1.779e-4, -1.05e-6, 1.6e-8, -2.02e-6);
    let (n5, n6, n7, n8, n9) = (15.868, 0.011_55, -0.004_23, -4382.0, 1.1455e6);
    let nsw = (n0
        + (n1 + n2 * t + n3 * t * t) * s
        + n4 * t * t
        + (n5 + n6 * s + n7 * t) / wavelength
        + n8 / wavelength.powi(2)
        + n9 / wavelength.powi(3))
        * n_air;
    let dnswds = (n1 + n2 * t + n3 * t * t + n6 / wavelength) * n_air;

    let kw = crate::seawater::pure_water_bulk_modulus(t);
    let a0 = 54.6746 - 0.603_459 * t + 1.099_87e-2 * t * t - 6.167e-5 * t.powi(3);
    let b0 = 7.944e-2 + 1.6483e-2 * t - 5.3009e-4 * t * t;
    let ks = kw + a0 * s + b0 * s.powf(1.5);
    let isothermal_compressibility = 1e-5 / ks;

    let density = crate::seawater::surface_density(s, t);

    let dlnawds = (-5.586_51e-4 + 2.404_52e-7 * t - 3.121_65e-9 * t * t + 2.408_08e-11 * t.powi(3))
        + 1.5
            * (1.796_13e-5 - 9.9422e-8 * t + 2.089_19e-9 * t * t - 1.398_72e-11 * t.powi(3))
            * s.sqrt()
        + 2.0 * (-2.310_65e-6 - 1.376_74e-9 * t - 1.933_16e-11 * t * t) * s;

    let n2sw = nsw * nsw;
    let dfri =
        (n2sw - 1.0) * (1.0 + 2.0 / 3.0 * (n2sw + 2.0) * (nsw / 3.0 - 1.0 / (3.0 * nsw)).powi(2));

    let cabannes = (6.0 + 6.0 * depolarization) / (6.0 - 7.0 * depolarization);
    let lambda_m4 = (wavelength * 1e-9).powi(-4);

    let beta_df = PI * PI / 2.0
        * lambda_m4
        * BOLTZMANN
        * tk
        * isothermal_compressibility
        * dfri
        * dfri
        * cabannes;
    let flu_con = s * WATER_MOLAR_MASS * dnswds * dnswds / density / (-dlnawds) / AVOGADRO;
    let beta_cf = 2.0 * PI * PI * lambda_m4 * n2sw * flu_con * cabannes;

    (beta_df + beta_cf)
        * (1.0 + theta.cos().powi(2) * (1.0 - depolarization) / (1.0 + depolarization))
}

/// Particulate backscattering `2π·χ·(β − βsw)` per sample; NaN where an input is missing.
///
/// Returns `None` when the geometry angle lies outside the χ table.
pub fn particulate_backscatter(
    beta: &[f64],
    t: &[f64],
    s: &[f64],
    geometry: ScatteringGeometry,
    depolarization: f64,
) -> Option<Vec<f64>> {
    let chi = geometry.chi()?;
    Some(
        beta.iter()
            .zip(t)
            .zip(s)
            .map(|((beta, t), s)| {
                let sw = seawater_scattering(
                    *t,
                    *s,
                    geometry.wavelength,
                    geometry.angle,
                    depolarization,
                );
                2.0 * PI * chi * (beta - sw)
            })
            .collect(),
    )
}

fn shift_wavelength(bbp: f64, from: f64, to: f64) -> f64 {
    bbp * (to / from).powf(SPECTRAL_SLOPE)
}

/// Empirical relation from bbp(700) to particulate organic carbon (mg m⁻³).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarbonRelation {
    #[serde(rename = "SOCCOM")]
    Soccom,
    /// North Atlantic bloom 2008, upcast.
    #[serde(rename = "NAB08_up")]
    Nab08Up,
    #[serde(rename = "NAB08_down")]
    Nab08Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonEstimate {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

impl CarbonRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarbonRelation::Soccom => "SOCCOM",
            CarbonRelation::Nab08Up => "NAB08_up",
            CarbonRelation::Nab08Down => "NAB08_down",
        }
    }

    pub fn estimate(&self, bbp: f64, wavelength: f64) -> CarbonEstimate {
        let bbp700 = shift_wavelength(bbp, wavelength, 700.0);
        match self {
            CarbonRelation::Soccom => {
                let value = 3.23e4 * bbp700 + 2.76;
                CarbonEstimate {
                    value,
                    lower: value * 0.95,
                    upper: value * 1.05,
                }
            }
            CarbonRelation::Nab08Up => linear_with_bounds(bbp700, 43_317.0, 2_092.0, 18.4, 5.8),
            CarbonRelation::Nab08Down => linear_with_bounds(bbp700, 35_422.0, 1_754.0, 14.4, 5.8),
        }
    }
}

impl fmt::Display for CarbonRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn linear_with_bounds(
    bbp700: f64,
    slope: f64,
    slope_err: f64,
    offset: f64,
    offset_err: f64,
) -> CarbonEstimate {
    CarbonEstimate {
        value: slope * bbp700 - offset,
        lower: (slope - slope_err) * bbp700 - (offset + offset_err),
        upper: (slope + slope_err) * bbp700 - (offset - offset_err),
    }
}

/// Relation from bbp to phytoplankton carbon (mg m⁻³).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhytoplanktonRelation {
    Behrenfeld2005,
    Graff2015,
}

impl PhytoplanktonRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhytoplanktonRelation::Behrenfeld2005 => "Behrenfeld2005",
            PhytoplanktonRelation::Graff2015 => "Graff2015",
        }
    }

    pub fn estimate(&self, bbp: f64, wavelength: f64) -> f64 {
        match self {
            PhytoplanktonRelation::Behrenfeld2005 => {
                13_000.0 * (shift_wavelength(bbp, wavelength, 440.0) - 0.000_35)
            }
            PhytoplanktonRelation::Graff2015 => {
                12_128.0 * shift_wavelength(bbp, wavelength, 470.0) + 0.59
            }
        }
    }
}

impl fmt::Display for PhytoplanktonRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
