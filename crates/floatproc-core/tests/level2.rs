mod common;

use floatproc_core::calibration::{calibrate_profile, CalibratedProfile};
use floatproc_core::config::ProcessingSettings;
use floatproc_core::error::ProcessingError;
use floatproc_core::level2::{
    correct_oxygen, oxygen_pressure_factor, oxygen_salinity_factor, process_level2,
};
use floatproc_core::numerics::{mixed_layer_index, quench_onset};
use floatproc_core::optics::{CarbonRelation, PhytoplanktonRelation};
use floatproc_core::pipeline::process_profile;
use floatproc_core::quenching::{correct_quenching, QuenchingParameters, QuenchingStrategy};
use floatproc_core::seawater::Eos80;
use floatproc_parser::ProfileKey;
use polars::prelude::{df, DataFrame, NamedFrom, Series};

use common::{assert_close, identity_config, synthetic_profile};

fn calibrated() -> CalibratedProfile {
    calibrate_profile(&synthetic_profile(), &identity_config()).unwrap()
}

#[test]
fn derives_level2_channels_in_order() {
    let processed = process_profile(
        synthetic_profile(),
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .expect("processing failed");
    let level2 = &processed.level2;

    assert_eq!(
        level2.channel_names(),
        vec![
            "p", "t", "s", "fl", "chla", "bbp", "fdom", "par", "tilt", "tilt_std", "sa", "ct",
            "sigma", "poc", "poc_lower", "poc_upper", "cphyto",
        ]
    );
    assert_eq!(level2.header, processed.level0.header);
    assert_eq!(level2.channel("fl").unwrap(), vec![0.5, 0.8, 1.0, 0.9, 0.4, 0.1]);
}

#[test]
fn windowed_median_corrects_shallow_fluorescence() {
    let settings = ProcessingSettings::default();
    let level2 = process_level2(&calibrated(), &identity_config(), &settings, &Eos80).unwrap();

    let chla = level2.channel("chla").unwrap();
    let expected = [0.85, 0.85, 0.85, 0.9, 0.4, 0.1];
    for (actual, expected) in chla.iter().zip(expected) {
        assert_close(*actual, expected, 1e-12);
    }

    let quenching = level2.quenching.unwrap();
    assert_eq!(quenching.strategy, QuenchingStrategy::WindowedMedian);
    assert_eq!(quenching.onset, Some(20.0));
    assert!(quenching.applied);
}

#[test]
fn backscatter_and_carbon_follow_configured_relations() {
    let settings = ProcessingSettings {
        poc_relation: CarbonRelation::Soccom,
        cphyto_relation: PhytoplanktonRelation::Behrenfeld2005,
        ..ProcessingSettings::default()
    };
    let level2 = process_level2(&calibrated(), &identity_config(), &settings, &Eos80).unwrap();

    let carbon = level2.carbon.unwrap();
    assert_eq!(carbon.geometry.angle, 150.0);
    assert_eq!(carbon.geometry.wavelength, 700.0);

    let bbp = level2.channel("bbp").unwrap();
    let poc = level2.channel("poc").unwrap();
    let cphyto = level2.channel("cphyto").unwrap();
    for i in 0..bbp.len() {
        assert!(bbp[i] > 0.0);
        assert_close(poc[i], CarbonRelation::Soccom.estimate(bbp[i], 700.0).value, 1e-9);
        assert_close(
            cphyto[i],
            PhytoplanktonRelation::Behrenfeld2005.estimate(bbp[i], 700.0),
            1e-9,
        );
    }
    assert!(bbp[0] > bbp[5]);
}

#[test]
fn density_and_mixed_layer() {
    let level2 = process_level2(
        &calibrated(),
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .unwrap();

    let sigma = level2.channel("sigma").unwrap();
    assert!(sigma.windows(2).all(|pair| pair[1] > pair[0]));
    assert!(sigma.iter().all(|value| *value > 24.0 && *value < 28.0));

    let coarse = level2.mixed_layer.coarse.unwrap();
    let fine = level2.mixed_layer.fine.unwrap();
    assert!(fine.index <= coarse.index);
    let pressure = level2.channel("p").unwrap();
    assert_eq!(coarse.pressure, pressure[coarse.index]);
}

#[test]
fn euphotic_depth_interpolates_one_percent_light() {
    let level2 = process_level2(
        &calibrated(),
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .unwrap();
    assert_close(level2.euphotic_depth.unwrap(), 39.0, 1e-9);
}

#[test]
fn par_is_required() {
    let mut profile = calibrated();
    profile.observations = profile.observations.drop("par").unwrap();
    let err = process_level2(
        &profile,
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ProcessingError::MissingField { ref field, profile }
            if field == "par" && profile == ProfileKey::new(572, 10)
    ));
    assert_eq!(
        err.to_string(),
        "profile 0572.010: field 'par' required for level 2 processing is missing"
    );
}

#[test]
fn backscatter_regression_needs_bbp() {
    let mut profile = calibrated();
    profile.observations = profile.observations.drop("beta").unwrap();
    let settings = ProcessingSettings {
        npq_strategy: QuenchingStrategy::BackscatterRegression,
        ..ProcessingSettings::default()
    };

    let err = process_level2(&profile, &identity_config(), &settings, &Eos80).unwrap_err();
    assert!(matches!(err, ProcessingError::MissingField { ref field, .. } if field == "bbp"));
}

#[test]
fn backscatter_regression_replaces_quenched_samples() {
    let settings = ProcessingSettings {
        npq_strategy: QuenchingStrategy::BackscatterRegression,
        ..ProcessingSettings::default()
    };
    let level2 = process_level2(&calibrated(), &identity_config(), &settings, &Eos80).unwrap();

    assert!(level2.quenching.unwrap().applied);
    let chla = level2.channel("chla").unwrap();
    assert_eq!(&chla[3..], &[0.9, 0.4, 0.1]);
}

#[test]
fn dark_profile_is_left_uncorrected() {
    let mut profile = calibrated();
    let height = profile.observations.height();
    let dark = Series::new("par".into(), vec![1.0f64; height]);
    profile.observations.with_column(dark).unwrap();

    let level2 = process_level2(
        &profile,
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .unwrap();
    let quenching = level2.quenching.unwrap();
    assert_eq!(quenching.onset, None);
    assert!(!quenching.applied);
    assert_eq!(level2.channel("chla"), level2.channel("fl"));
}

#[test]
fn profile_without_temperature_skips_density() {
    let profile = CalibratedProfile {
        header: common::header(3),
        observations: df!(
            "p" => &[5.0f64, 15.0, 25.0],
            "s" => &[34.9f64, 35.0, 35.0],
            "par" => &[20.0f64, 5.0, 0.1],
        )
        .unwrap(),
        park_observations: DataFrame::empty(),
    };
    let level2 = process_level2(
        &profile,
        &identity_config(),
        &ProcessingSettings::default(),
        &Eos80,
    )
    .unwrap();

    assert_eq!(level2.channel_names(), vec!["p", "s", "par"]);
    assert_eq!(level2.mixed_layer.coarse, None);
    assert!(level2.carbon.is_none());
    assert!(level2.quenching.is_none());
}

#[test]
fn mixed_layer_picks_departure_closest_to_threshold() {
    let sigma = [0.0, 0.0, 0.0, 0.05, 0.10, 0.10];
    assert_eq!(mixed_layer_index(&sigma, 0.03), Some(3));
}

#[test]
fn npq_window_example() {
    let pressure = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let fluorescence = [1.0, 1.0, 5.0, 2.0, 2.0, 2.0];
    let par = [90.0, 90.0, 10.0, 10.0, 10.0, 10.0];

    let onset = quench_onset(&pressure, &par, 80.0).unwrap();
    assert_eq!(onset, 1.0);

    let parameters = QuenchingParameters {
        window_before: 1,
        window_after: 1,
        ..QuenchingParameters::default()
    };
    let correction = correct_quenching(
        QuenchingStrategy::WindowedMedian,
        &pressure,
        &fluorescence,
        None,
        onset,
        &parameters,
    )
    .unwrap();
    assert!(correction.applied);
    assert_eq!(correction.values, vec![1.0, 1.0, 5.0, 2.0, 2.0, 2.0]);
}

#[test]
fn oxygen_correction_is_identity_at_surface_freshwater() {
    let corrected = correct_oxygen(&[6.0, 6.0], &[10.0, 10.0], &[0.0, -2.0], &[0.0, 0.0]);
    assert_close(corrected[0], 6.0, 1e-12);
    assert_close(corrected[1], 6.0, 1e-12);

    assert!(oxygen_pressure_factor(10.0, 1000.0) > 1.0);
    assert!(oxygen_pressure_factor(10.0, f64::NAN).is_nan());
    assert!(oxygen_salinity_factor(10.0, 35.0) < 1.0);
}
