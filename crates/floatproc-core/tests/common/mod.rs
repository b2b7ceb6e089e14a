#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;
use floatproc_core::SensorConfiguration;
use floatproc_parser::{
    EngineeringTelemetry, FloatFamily, Profile, ProfileHeader, ProfileKey, Transmission,
};
use polars::prelude::*;

/// Navis message shared with the parser tests: two valid rows, `0572.010`.
pub fn navis_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../floatproc-parser/tests/data")
        .join("0572.010.msg")
}

pub fn read_navis_fixture() -> Transmission {
    Transmission::read_navis(&navis_fixture()).expect("fixture readable")
}

/// Identity coefficients for every channel the Navis fixture carries, minus oxygen.
pub const IDENTITY_CONFIG: &str = r#"{
    "wmo": 5906000,
    "user_id": "n0572",
    "model": "Navis",
    "pi": "Jane Doe",
    "project": "SOCCOM",
    "sensors": {
        "CTD": {"model": "SBE41CP", "sn": 7421, "p": {}, "t": {}, "s": {}},
        "ECO": {
            "model": "MCOM",
            "sn": "MCOM-221",
            "fchl": {"scale_factor": 1.0, "dark_count": 0.0},
            "beta": {"scale_factor": 1.0, "dark_count": 0.0},
            "fdom": {"scale_factor": 1.0, "dark_count": 0.0}
        },
        "Radiometer": {
            "model": "Satlantic PAR",
            "par": {"a": [0.0, 1.0], "im": 1.0},
            "tilt": {},
            "tilt_std": {}
        }
    }
}"#;

pub const OPTODE_CONFIG: &str = r#"{
    "wmo": 5906000,
    "user_id": "n0572",
    "model": "Navis",
    "sensors": {
        "CTD": {"model": "SBE41CP", "p": {}, "t": {}, "s": {}},
        "O2": {
            "model": "SBE63",
            "o2_ph": {
                "a": [1.0513, -0.0015, 0.4000],
                "b": [-0.2500, 1.6000],
                "c": [0.1030, 0.0044, 0.00007]
            },
            "o2_t": {"a": [0.0014, 0.00026, -0.0000001, 0.00000012]}
        },
        "Radiometer": {
            "model": "Satlantic PAR",
            "par": {"a": [0.0, 1.0], "im": 1.0},
            "tilt": {},
            "tilt_std": {}
        }
    }
}"#;

pub fn identity_config() -> SensorConfiguration {
    SensorConfiguration::from_json(IDENTITY_CONFIG).expect("valid sensor configuration")
}

pub fn header(profile_id: u32) -> ProfileHeader {
    ProfileHeader {
        key: ProfileKey::new(572, profile_id),
        family: FloatFamily::Navis,
        timestamp: NaiveDate::from_ymd_opt(2016, 1, 5).and_then(|d| d.and_hms_opt(12, 34, 56)),
        latitude: Some(-54.2),
        longitude: Some(150.4),
        complete: true,
        engineering: EngineeringTelemetry::default(),
    }
}

/// Six samples from 2 to 50 dbar with a bright surface and a warm upper layer.
pub fn synthetic_profile() -> Profile {
    let observations = df!(
        "p" => &[2.0f64, 10.0, 20.0, 30.0, 40.0, 50.0],
        "t" => &[15.0f64, 15.0, 14.9, 12.0, 10.0, 9.0],
        "s" => &[35.0f64, 35.0, 35.0, 35.1, 35.2, 35.2],
        "fchl" => &[0.5f64, 0.8, 1.0, 0.9, 0.4, 0.1],
        "beta" => &[0.0012f64, 0.0012, 0.0011, 0.0008, 0.0005, 0.0004],
        "fdom" => &[1.1f64, 1.1, 1.2, 1.3, 1.3, 1.4],
        "par" => &[1500.0f64, 900.0, 300.0, 60.0, 10.0, 1.0],
        "tilt" => &[1.5f64, 1.4, 1.3, 1.2, 1.1, 1.0],
        "tilt_std" => &[0.1f64, 0.1, 0.1, 0.1, 0.1, 0.1],
    )
    .expect("synthetic frame");

    Profile {
        header: header(10),
        observations,
        park_observations: DataFrame::empty(),
        skipped_rows: Vec::new(),
    }
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}
