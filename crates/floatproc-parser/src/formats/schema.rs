use super::common::{FieldRule, HexField};

pub const PRESSURE: &str = "p";
pub const TEMPERATURE: &str = "t";
pub const SALINITY: &str = "s";
pub const OXYGEN_PHASE: &str = "o2_ph";
pub const OXYGEN_TEMPERATURE: &str = "o2_t";
pub const FLUORESCENCE: &str = "fchl";
pub const SCATTERING: &str = "beta";
pub const FDOM: &str = "fdom";
pub const PAR: &str = "par";
pub const TILT: &str = "tilt";
pub const TILT_STD: &str = "tilt_std";
pub const BEAM_COUNT: &str = "c_count";
pub const BEAM_SIGNAL: &str = "c_su";

pub const PARK_COLUMNS: [&str; 6] = ["timestamp", "p", "t", "s", "o2_ph", "o2_t"];

/// Row lengths, excluding the line terminator, that Navis profile rows may have.
pub const ACCEPTED_ROW_LENGTHS: [usize; 2] = [60, 72];

const SENTINEL_8: u32 = 0xFF;
const SENTINEL_16: u32 = 0xFFFF;
const SENTINEL_24: u32 = 0xFF_FFFF;

const fn offset(sentinel: u32, scale: f64, offset: f64) -> FieldRule {
    FieldRule::Offset {
        sentinel,
        scale,
        offset,
    }
}

const CORE_FIELDS: [HexField; 8] = [
    HexField::new(
        PRESSURE,
        0,
        4,
        FieldRule::Signed {
            midpoint: 32768,
            scale: 10.0,
        },
    ),
    HexField::new(
        TEMPERATURE,
        4,
        8,
        FieldRule::Signed {
            midpoint: 61440,
            scale: 1000.0,
        },
    ),
    HexField::new(
        SALINITY,
        8,
        12,
        FieldRule::Signed {
            midpoint: 61440,
            scale: 1000.0,
        },
    ),
    HexField::new(OXYGEN_PHASE, 14, 20, offset(SENTINEL_24, 100_000.0, -10.0)),
    HexField::new(OXYGEN_TEMPERATURE, 20, 26, offset(SENTINEL_24, 1_000_000.0, -1.0)),
    HexField::new(FLUORESCENCE, 28, 34, offset(SENTINEL_24, 1.0, -500.0)),
    HexField::new(SCATTERING, 34, 40, offset(SENTINEL_24, 1.0, -500.0)),
    HexField::new(FDOM, 40, 46, offset(SENTINEL_24, 1.0, -500.0)),
];

const RADIOMETER_FIELDS: [HexField; 3] = [
    HexField::new(PAR, 48, 54, offset(SENTINEL_24, 1.0, 0.0)),
    HexField::new(TILT, 56, 58, offset(SENTINEL_8, 10.0, 0.0)),
    HexField::new(TILT_STD, 58, 60, offset(SENTINEL_8, 100.0, 0.0)),
];

const AUXILIARY_FIELDS: [HexField; 5] = [
    HexField::new(BEAM_COUNT, 48, 52, offset(SENTINEL_16, 1.0, -200.0)),
    HexField::new(BEAM_SIGNAL, 52, 58, offset(SENTINEL_24, 1000.0, -10.0)),
    HexField::new(PAR, 60, 66, offset(SENTINEL_24, 1.0, 0.0)),
    HexField::new(TILT, 68, 70, offset(SENTINEL_8, 10.0, 0.0)),
    HexField::new(TILT_STD, 70, 72, offset(SENTINEL_8, 100.0, 0.0)),
];

/// Record layout of Navis profile rows, fixed once per transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavisLayout {
    WithoutAuxiliaryChannels,
    /// Beam transmissometer interleaved before the radiometer fields.
    WithAuxiliaryChannels,
}

impl NavisLayout {
    pub fn fields(&self) -> Vec<HexField> {
        let tail: &[HexField] = match self {
            NavisLayout::WithoutAuxiliaryChannels => &RADIOMETER_FIELDS,
            NavisLayout::WithAuxiliaryChannels => &AUXILIARY_FIELDS,
        };
        CORE_FIELDS.iter().chain(tail.iter()).copied().collect()
    }

    pub fn required_length(&self) -> usize {
        match self {
            NavisLayout::WithoutAuxiliaryChannels => 60,
            NavisLayout::WithAuxiliaryChannels => 72,
        }
    }

    /// Output channel order; the beam channels trail the standard ones.
    pub fn channels(&self) -> Vec<&'static str> {
        let mut channels: Vec<&'static str> = CORE_FIELDS
            .iter()
            .chain(RADIOMETER_FIELDS.iter())
            .map(|field| field.channel)
            .collect();
        if *self == NavisLayout::WithAuxiliaryChannels {
            channels.extend([BEAM_COUNT, BEAM_SIGNAL]);
        }
        channels
    }
}

/// Value columns of a Provor cast row, following the two identity columns.
pub const PROVOR_CAST_CHANNELS: [&str; 13] = [
    PRESSURE,
    TEMPERATURE,
    SALINITY,
    OXYGEN_PHASE,
    OXYGEN_TEMPERATURE,
    FLUORESCENCE,
    SCATTERING,
    FDOM,
    PAR,
    TILT,
    TILT_STD,
    BEAM_COUNT,
    BEAM_SIGNAL,
];
