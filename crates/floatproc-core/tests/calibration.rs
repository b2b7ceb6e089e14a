mod common;

use floatproc_core::calibration::{calibrate_profile, Calibration, SensorCalibration};
use floatproc_core::config::{SensorCategory, SensorConfiguration};
use floatproc_core::error::{CalibrationError, FieldSource};
use floatproc_parser::{decode_transmission, ProfileKey};

use common::{assert_close, identity_config, read_navis_fixture, synthetic_profile, OPTODE_CONFIG};

#[test]
fn identity_coefficients_reproduce_decoded_values() {
    let profile = decode_transmission(&read_navis_fixture()).expect("navis decode failed");
    let calibrated = calibrate_profile(&profile, &identity_config()).expect("calibration failed");

    assert_eq!(calibrated.key(), ProfileKey::new(572, 10));
    assert_eq!(calibrated.header, profile.header);
    assert_eq!(
        calibrated.channel_names(),
        vec!["p", "t", "s", "fchl", "beta", "fdom", "par", "tilt", "tilt_std"]
    );

    let p = calibrated.channel("p").unwrap();
    assert_close(p[0], 5.0, 1e-9);
    assert_close(p[1], -0.3, 1e-9);
    let t = calibrated.channel("t").unwrap();
    assert_close(t[0], 15.5, 1e-9);
    assert_close(t[1], -1.2, 1e-9);
    let s = calibrated.channel("s").unwrap();
    assert_close(s[0], 35.1, 1e-9);
    assert!(s[1].is_nan());

    assert_eq!(calibrated.channel("fchl").unwrap(), vec![550.0, 60.0]);
    assert_eq!(calibrated.channel("beta").unwrap(), vec![100.0, 0.0]);
    assert_eq!(calibrated.channel("par").unwrap(), vec![1000.0, 50.0]);
    assert!(calibrated.channel("fdom").unwrap()[1].is_nan());
    assert!(calibrated.channel("o2_ph").is_none());
}

#[test]
fn calibration_is_repeatable() {
    let profile = synthetic_profile();
    let config = identity_config();

    let first = calibrate_profile(&profile, &config).unwrap();
    let second = calibrate_profile(&profile, &config).unwrap();

    assert_eq!(first.header, second.header);
    assert!(first.observations.equals_missing(&second.observations));
}

#[test]
fn eco_applies_scale_and_dark_count() {
    let json = common::IDENTITY_CONFIG.replace(
        r#""fchl": {"scale_factor": 1.0, "dark_count": 0.0}"#,
        r#""fchl": {"scale_factor": 0.0073, "dark_count": 48.0}"#,
    );
    let config = SensorConfiguration::from_json(&json).unwrap();
    let calibrated = calibrate_profile(&synthetic_profile(), &config).unwrap();

    let fchl = calibrated.channel("fchl").unwrap();
    assert_close(fchl[0], 0.0073 * (0.5 - 48.0), 1e-12);
    assert_close(fchl[5], 0.0073 * (0.1 - 48.0), 1e-12);
}

#[test]
fn optode_outputs_temperature_phase_and_concentration() {
    let profile = decode_transmission(&read_navis_fixture()).unwrap();
    let config = SensorConfiguration::from_json(OPTODE_CONFIG).unwrap();
    let calibrated = calibrate_profile(&profile, &config).unwrap();

    assert_eq!(
        calibrated.channel_names(),
        vec!["p", "t", "s", "o2_ph", "o2_t", "o2_c", "par", "tilt", "tilt_std"]
    );

    let sensor = config.sensor(&SensorCategory::Oxygen).unwrap();
    let Calibration::Sbe63(optode) = Calibration::for_sensor(sensor, profile.key()).unwrap() else {
        panic!("expected the SBE63 calibration");
    };

    let o2_t = calibrated.channel("o2_t").unwrap();
    assert_close(o2_t[0], optode.temperature(0.75), 1e-9);
    assert_close(o2_t[1], optode.temperature(0.5), 1e-9);
    assert_eq!(calibrated.channel("o2_ph").unwrap()[0], 2.5);

    let o2_c = calibrated.channel("o2_c").unwrap();
    assert_close(o2_c[0], optode.concentration(2.5, o2_t[0]), 1e-9);
    assert!(o2_c[1].is_nan());
}

#[test]
fn unknown_model_is_rejected() {
    let json = common::IDENTITY_CONFIG.replace("\"MCOM\"", "\"ECO-X9\"");
    let config = SensorConfiguration::from_json(&json).unwrap();
    let err = calibrate_profile(&synthetic_profile(), &config).unwrap_err();

    assert_eq!(
        err,
        CalibrationError::UnsupportedModel {
            category: "ECO".into(),
            model: "ECO-X9".into(),
            profile: ProfileKey::new(572, 10),
        }
    );
    assert_eq!(err.to_string(), "profile 0572.010: unsupported ECO model 'ECO-X9'");
}

#[test]
fn missing_coefficient_names_field_and_profile() {
    let json = common::IDENTITY_CONFIG.replace(r#""im": 1.0"#, r#""immersion": 1.0"#);
    let config = SensorConfiguration::from_json(&json).unwrap();
    let err = calibrate_profile(&synthetic_profile(), &config).unwrap_err();

    assert_eq!(
        err,
        CalibrationError::MissingField {
            field: "par.im".into(),
            location: FieldSource::Configuration,
            profile: ProfileKey::new(572, 10),
        }
    );
}

#[test]
fn missing_observation_is_fatal() {
    let mut profile = synthetic_profile();
    profile.observations = profile.observations.drop("fdom").unwrap();
    let err = calibrate_profile(&profile, &identity_config()).unwrap_err();

    match err {
        CalibrationError::MissingField {
            field, location, ..
        } => {
            assert_eq!(field, "fdom");
            assert_eq!(location, FieldSource::Observations);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn dispatch_reports_calibration_names() {
    let config = identity_config();
    let names: Vec<&str> = config
        .sensors
        .iter()
        .map(|sensor| {
            Calibration::for_sensor(sensor, ProfileKey::new(572, 10))
                .unwrap()
                .name()
        })
        .collect();
    assert_eq!(names, vec!["SBE41CP", "ECO", "Satlantic PAR"]);
}
