//! Seawater equation of state used for density and mixed-layer depth.
//!
//! The level 2 engine only talks to [`SeawaterModel`]; [`Eos80`] is the
//! built-in implementation based on the UNESCO 1983 algorithms.

/// Thermodynamic conversions needed to turn practical salinity and in-situ
/// temperature into density.
pub trait SeawaterModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Absolute salinity (g/kg) from practical salinity at a pressure and position.
    ///
    /// Feeds the exported `sa` channel. Implementations may ignore the position.
    fn absolute_salinity(
        &self,
        practical_salinity: f64,
        pressure: f64,
        lon: f64,
        lat: f64,
    ) -> f64;

    /// Conservative temperature (°C) from absolute salinity and in-situ temperature.
    ///
    /// Feeds the exported `ct` channel; whatever this returns is what
    /// [`SeawaterModel::density`] expects back.
    fn conservative_temperature(
        &self,
        absolute_salinity: f64,
        temperature: f64,
        pressure: f64,
    ) -> f64;

    /// In-situ density (kg/m³).
    fn density(
        &self,
        absolute_salinity: f64,
        conservative_temperature: f64,
        pressure: f64,
    ) -> f64;
}

const REFERENCE_SALINITY_RATIO: f64 = 35.165_04 / 35.0;
const T68_PER_T90: f64 = 1.000_24;

/// EOS-80 approximation of the TEOS-10 interface.
///
/// The `sa` and `ct` values it produces are not TEOS-10 quantities.
/// Absolute salinity is practical salinity times the reference composition
/// ratio, with no regional anomaly, so position is ignored. Conservative
/// temperature is UNESCO potential temperature referenced to 0 dbar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Eos80;

impl Eos80 {
    fn practical_salinity(absolute_salinity: f64) -> f64 {
        absolute_salinity / REFERENCE_SALINITY_RATIO
    }
}

impl SeawaterModel for Eos80 {
    fn name(&self) -> &'static str {
        "EOS-80"
    }

    /// Reference-composition salinity; no absolute salinity anomaly is applied.
    fn absolute_salinity(
        &self,
        practical_salinity: f64,
        _pressure: f64,
        _lon: f64,
        _lat: f64,
    ) -> f64 {
        practical_salinity * REFERENCE_SALINITY_RATIO
    }

    /// Potential temperature at 0 dbar (ITS-90), standing in for conservative temperature.
    fn conservative_temperature(
        &self,
        absolute_salinity: f64,
        temperature: f64,
        pressure: f64,
    ) -> f64 {
        let sp = Self::practical_salinity(absolute_salinity);
        potential_temperature(sp, temperature * T68_PER_T90, pressure, 0.0) / T68_PER_T90
    }

    fn density(
        &self,
        absolute_salinity: f64,
        conservative_temperature: f64,
        pressure: f64,
    ) -> f64 {
        let sp = Self::practical_salinity(absolute_salinity);
        let in_situ =
            potential_temperature(sp, conservative_temperature * T68_PER_T90, 0.0, pressure);
        density(sp, in_situ, pressure)
    }
}

fn pure_water_density(t: f64) -> f64 {
    999.842_594
        + t * (6.793_952e-2
            + t * (-9.095_290e-3
                + t * (1.001_685e-4 + t * (-1.120_083e-6 + t * 6.536_332e-9))))
}

/// One-atmosphere density of seawater (S in PSU, T in IPTS-68 °C).
pub fn surface_density(s: f64, t: f64) -> f64 {
    let a = 0.824_493
        + t * (-4.089_9e-3 + t * (7.643_8e-5 + t * (-8.246_7e-7 + t * 5.387_5e-9)));
    let b = -5.724_66e-3 + t * (1.022_7e-4 - t * 1.654_6e-6);
    pure_water_density(t) + a * s + b * s.powf(1.5) + 4.831_4e-4 * s * s
}

/// Secant bulk modulus of pure water (bar).
pub fn pure_water_bulk_modulus(t: f64) -> f64 {
    19_652.21 + t * (148.420_6 + t * (-2.327_105 + t * (1.360_477e-2 - t * 5.155_288e-5)))
}

fn secant_bulk_modulus(s: f64, t: f64, bar: f64) -> f64 {
    let k0 = pure_water_bulk_modulus(t)
        + s * (54.674_6 + t * (-0.603_459 + t * (1.099_87e-2 - t * 6.167_0e-5)))
        + s.powf(1.5) * (7.944e-2 + t * (1.648_3e-2 - t * 5.300_9e-4));
    let a = 3.239_908
        + t * (1.437_13e-3 + t * (1.160_92e-4 - t * 5.779_05e-7))
        + s * (2.283_8e-3 + t * (-1.098_1e-5 - t * 1.607_8e-6))
        + 1.910_75e-4 * s.powf(1.5);
    let b = 8.509_35e-5
        + t * (-6.122_93e-6 + t * 5.278_7e-8)
        + s * (-9.934_8e-7 + t * (2.081_6e-8 + t * 9.169_7e-10));
    k0 + a * bar + b * bar * bar
}

/// UNESCO 1983 in-situ density (S in PSU, T in IPTS-68 °C, pressure in dbar).
pub fn density(s: f64, t: f64, pressure: f64) -> f64 {
    let bar = pressure / 10.0;
    surface_density(s, t) / (1.0 - bar / secant_bulk_modulus(s, t, bar))
}

/// Adiabatic lapse rate (°C/dbar), Bryden 1973 as given in UNESCO 1983.
pub fn adiabatic_lapse_rate(s: f64, t: f64, p: f64) -> f64 {
    let ds = s - 35.0;
    (((-2.1687e-16 * t + 1.8676e-14) * t - 4.6206e-13) * p
        + ((2.7759e-12 * t - 1.1351e-10) * ds
            + ((-5.4481e-14 * t + 8.733e-12) * t - 6.7795e-10) * t
            + 1.8741e-8))
        * p
        + (-4.2393e-8 * t + 1.8932e-6) * ds
        + ((6.6228e-10 * t - 6.836e-8) * t + 8.5258e-6) * t
        + 3.5803e-5
}

/// Temperature a parcel at `pressure` would have if moved adiabatically to
/// `reference` (fourth order Runge-Kutta, UNESCO 1983).
pub fn potential_temperature(s: f64, t: f64, pressure: f64, reference: f64) -> f64 {
    let h = reference - pressure;
    let mut p = pressure;

    let mut xk = h * adiabatic_lapse_rate(s, t, p);
    let mut t = t + 0.5 * xk;
    let mut q = xk;
    p += 0.5 * h;

    xk = h * adiabatic_lapse_rate(s, t, p);
    t += 0.292_893_22 * (xk - q);
    q = 0.585_786_44 * xk + 0.121_320_344 * q;

    xk = h * adiabatic_lapse_rate(s, t, p);
    t += 1.707_106_781 * (xk - q);
    q = 3.414_213_562 * xk - 4.121_320_344 * q;
    p += 0.5 * h;

    xk = h * adiabatic_lapse_rate(s, t, p);
    t + (xk - 2.0 * q) / 6.0
}
