mod common;

use std::path::PathBuf;

use floatproc_core::config::{AppConfig, RunMode, SensorCategory, SensorConfiguration};
use floatproc_core::error::ConfigError;
use floatproc_core::optics::{CarbonRelation, PhytoplanktonRelation};
use floatproc_core::quenching::QuenchingStrategy;
use floatproc_parser::FloatFamily;

#[test]
fn sensor_configuration_keeps_document_order() {
    let config = common::identity_config();

    assert_eq!(config.wmo, 5906000);
    assert_eq!(config.user_id, "n0572");
    assert_eq!(config.model, FloatFamily::Navis);
    assert_eq!(config.project.as_deref(), Some("SOCCOM"));

    let categories: Vec<&SensorCategory> = config.sensors.iter().map(|s| &s.category).collect();
    assert_eq!(
        categories,
        vec![
            &SensorCategory::Ctd,
            &SensorCategory::Eco,
            &SensorCategory::Radiometer
        ]
    );
    assert_eq!(
        config.channel_order(),
        vec!["p", "t", "s", "fchl", "beta", "fdom", "par", "tilt", "tilt_std"]
    );

    let ctd = config.sensor(&SensorCategory::Ctd).unwrap();
    assert_eq!(ctd.serial_number.as_deref(), Some("7421"));
    let eco = config.sensor(&SensorCategory::Eco).unwrap();
    assert_eq!(eco.model, "MCOM");
    assert_eq!(eco.serial_number.as_deref(), Some("MCOM-221"));
    assert!(eco.channel("sn").is_none());
}

#[test]
fn provor_family_and_unknown_categories() {
    let config = SensorConfiguration::from_json(
        r#"{
            "wmo": 6901000,
            "user_id": "p6901",
            "model": "PROVOR",
            "deployment": {
                "latitude": -60.5, "longitude": 20.0, "timestamp": "2021-02-03T04:05:06"
            },
            "sensors": {"SUNA": {"model": "SUNA V2", "wavelength": 217, "no3": {}}}
        }"#,
    )
    .unwrap();

    assert_eq!(config.model, FloatFamily::Provor);
    assert_eq!(config.sensors[0].category, SensorCategory::Other("SUNA".into()));
    assert_eq!(config.sensors[0].wavelength, Some(217.0));
    assert_eq!(config.deployment.unwrap().latitude, Some(-60.5));
}

#[test]
fn sensor_without_model_is_invalid() {
    let err = SensorConfiguration::from_json(
        r#"{"wmo": 1, "user_id": "n0001", "model": "Navis", "sensors": {"CTD": {"p": {}}}}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref message) if message.contains("CTD")));
}

#[test]
fn app_config_defaults_and_overrides() {
    let config = AppConfig::from_toml(
        r#"
        [paths]
        raw = "/srv/floats/raw"
        sensor_config = "/srv/floats/cfg"

        [batch]
        dashboard = false

        [processing]
        npq_strategy = "Sackmann"
        npq_window = [2, 3]
        poc_relation = "SOCCOM"
        cphyto_relation = "Behrenfeld2005"
        "#,
    )
    .unwrap();

    assert_eq!(config.raw_dir("n0572"), PathBuf::from("/srv/floats/raw/n0572"));
    assert_eq!(
        config.sensor_config_path("n0572"),
        PathBuf::from("/srv/floats/cfg/n0572_cfg.json")
    );
    assert!(config.mode(RunMode::Realtime).dashboard);
    assert!(!config.mode(RunMode::Batch).dashboard);
    assert!(config.mode(RunMode::Batch).process);

    let processing = &config.processing;
    assert_eq!(processing.npq_strategy, QuenchingStrategy::BackscatterRegression);
    assert_eq!(processing.poc_relation, CarbonRelation::Soccom);
    assert_eq!(processing.cphyto_relation, PhytoplanktonRelation::Behrenfeld2005);
    assert_eq!(processing.mld_coarse_threshold, 0.125);
    let window = processing.quenching_parameters();
    assert_eq!((window.window_before, window.window_after), (2, 3));
}

#[test]
fn upload_requires_remote_dir() {
    let err = AppConfig::from_toml("[realtime]\nupload = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let config =
        AppConfig::from_toml("[realtime]\nupload = true\n[upload]\nremote_dir = \"/mnt/share\"\n")
            .unwrap();
    assert_eq!(config.upload.remote_dir, Some(PathBuf::from("/mnt/share")));
}

#[test]
fn rejects_invalid_thresholds() {
    let err = AppConfig::from_toml("[processing]\nmld_fine_threshold = 0.0\n").unwrap_err();
    assert!(err.to_string().contains("mld"));
}

#[test]
fn loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("n0572_cfg.json");
    std::fs::write(&path, common::IDENTITY_CONFIG).unwrap();
    assert_eq!(SensorConfiguration::load(&path).unwrap(), common::identity_config());

    let err = AppConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
