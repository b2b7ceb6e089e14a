mod common;

use std::fs;
use std::path::{Path, PathBuf};

use floatproc_core::config::{AppConfig, PathsConfig, RunMode, UploadConfig};
use floatproc_core::error::{OutputError, PipelineError};
use floatproc_core::outputs::{
    column_order, DashboardWriter, FloatStatus, FloatTimeseries, JsonMetadataStore, LevelFrame,
    MetadataStore, ProcessingLevel,
};
use floatproc_core::pipeline::{list_transmissions, user_id_for, Pipeline, PipelineOutput};
use floatproc_parser::ProfileKey;
use polars::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use common::{header, identity_config, navis_fixture, IDENTITY_CONFIG};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Self { dir };
        fs::create_dir_all(workspace.raw_dir()).unwrap();
        fs::create_dir_all(workspace.path("cfg")).unwrap();
        fs::write(workspace.path("cfg/n0572_cfg.json"), IDENTITY_CONFIG).unwrap();
        fs::copy(navis_fixture(), workspace.raw_dir().join("0572.010.msg")).unwrap();
        workspace
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn raw_dir(&self) -> PathBuf {
        self.path("raw/n0572")
    }

    fn app(&self) -> AppConfig {
        AppConfig {
            paths: PathsConfig {
                raw: self.path("raw"),
                sensor_config: self.path("cfg"),
                output: self.path("data"),
                dashboard: self.path("www"),
                metadata: self.path("data/floats.json"),
            },
            ..AppConfig::default()
        }
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn realtime_writes_every_level_and_dashboard() {
    let workspace = Workspace::new();
    let mut pipeline = Pipeline::from_config(workspace.app(), RunMode::Realtime);

    let output = pipeline
        .run_realtime(&workspace.raw_dir().join("0572.010.msg"))
        .expect("realtime run failed");
    assert_eq!(output.key(), ProfileKey::new(572, 10));
    assert!(output.processed().is_some());

    for level in ["L0", "L1", "L2"] {
        assert!(workspace
            .path(&format!("data/{level}/n0572.010.csv"))
            .is_file());
    }

    let level1 = fs::read_to_string(workspace.path("data/L1/n0572.010.csv")).unwrap();
    let mut lines = level1.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,latitude,longitude,p,t,s,fchl,beta,fdom,par,tilt,tilt_std")
    );
    let first: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(
        &first[..8],
        &["2016-01-05 12:34:56", "45.6789", "-39.1234", "5", "15.5", "35.1", "550", "100"]
    );
    let second: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert_eq!(second[3], "-0.3");
    assert_eq!(second[5], "NaN");

    let level2 = fs::read_to_string(workspace.path("data/L2/n0572.010.csv")).unwrap();
    let header_line = level2.lines().next().unwrap();
    assert!(header_line
        .starts_with("timestamp,latitude,longitude,p,t,s,fdom,par,tilt,tilt_std,fl,chla,bbp"));

    let profile = read_json(&workspace.path("www/n0572.010.profile.json"));
    for key in ["p", "par", "t", "s", "chla", "poc", "fdom"] {
        assert!(profile.get(key).is_some(), "missing dashboard key {key}");
    }
    assert!(profile.get("o2_c").is_none());
    assert_eq!(profile["s"][1], Value::Null);

    let series = read_json(&workspace.path("www/n0572.timeseries.json"));
    assert_eq!(series["profile_id"], serde_json::json!([10]));
    assert_eq!(series["mld"], serde_json::json!([5.0]));
    assert!(series["t"]["mean"][0].as_f64().is_some());

    let store = JsonMetadataStore::new(workspace.path("data/floats.json"));
    let record = store.load(5906000).unwrap().expect("metadata stored");
    assert_eq!(record.profile_index, 10);
    assert_eq!(record.user_id, "n0572");
    assert_eq!(record.last_latitude, Some(45.6789));
    assert_eq!(record.status, FloatStatus::Lost);
}

#[test]
fn realtime_uploads_transmission() {
    let workspace = Workspace::new();
    let mut app = workspace.app();
    app.realtime.upload = true;
    app.upload = UploadConfig {
        remote_dir: Some(workspace.path("remote")),
    };

    Pipeline::from_config(app, RunMode::Realtime)
        .run_realtime(&workspace.raw_dir().join("0572.010.msg"))
        .unwrap();
    assert!(workspace.path("remote/0572.010.msg").is_file());
}

#[test]
fn realtime_uploads_both_halves_of_a_provor_pair() {
    let workspace = Workspace::new();
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../floatproc-parser/tests/data");
    let raw = workspace.path("raw/n6901");
    fs::create_dir_all(&raw).unwrap();
    for name in ["6901.012.fix", "6901.012.cast"] {
        fs::copy(data.join(name), raw.join(name)).unwrap();
    }
    fs::write(
        workspace.path("cfg/n6901_cfg.json"),
        r#"{"wmo": 6901000, "user_id": "n6901", "model": "PROVOR",
            "sensors": {"CTD": {"model": "SBE41CP", "p": {}, "t": {}, "s": {}}}}"#,
    )
    .unwrap();

    let mut app = workspace.app();
    app.realtime.process = false;
    app.realtime.dashboard = false;
    app.realtime.upload = true;
    app.upload = UploadConfig {
        remote_dir: Some(workspace.path("remote")),
    };

    let output = Pipeline::from_config(app, RunMode::Realtime)
        .run_realtime(&raw.join("6901.012.fix"))
        .unwrap();
    assert_eq!(output.key(), ProfileKey::new(6901, 12));
    assert!(workspace.path("remote/6901.012.fix").is_file());
    assert!(workspace.path("remote/6901.012.cast").is_file());
}

#[test]
fn realtime_surfaces_errors() {
    let workspace = Workspace::new();
    fs::remove_file(workspace.path("cfg/n0572_cfg.json")).unwrap();

    let err = Pipeline::from_config(workspace.app(), RunMode::Realtime)
        .run_realtime(&workspace.raw_dir().join("0572.010.msg"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));

    let err = Pipeline::new(workspace.app(), RunMode::Realtime)
        .run_realtime(&workspace.path("raw/notes.txt"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownFloat(_)));
}

#[test]
fn batch_continues_after_failures() {
    let workspace = Workspace::new();
    fs::write(workspace.raw_dir().join("0572.bad.msg"), "garbled\n").unwrap();
    fs::create_dir_all(workspace.path("www")).unwrap();
    fs::write(
        workspace.path("www/n0572.timeseries.json"),
        r#"{"profile_id": [99], "dt": [null], "mld": [null]}"#,
    )
    .unwrap();

    let mut pipeline = Pipeline::from_config(workspace.app(), RunMode::Batch);
    let report = pipeline.run_batch(&["n0572".to_string(), "n9999".to_string()]);

    assert!(!report.is_success());
    assert_eq!(report.processed, vec![ProfileKey::new(572, 10)]);
    assert_eq!(report.failed.len(), 2);

    let garbled = &report.failed[0];
    assert_eq!(garbled.user_id, "n0572");
    assert_eq!(garbled.path, Some(workspace.raw_dir().join("0572.bad.msg")));
    assert_eq!(garbled.key, None);

    let unknown = &report.failed[1];
    assert_eq!(unknown.user_id, "n9999");
    assert_eq!(unknown.path, None);

    let series = read_json(&workspace.path("www/n0572.timeseries.json"));
    assert_eq!(series["profile_id"], serde_json::json!([10]));
}

#[test]
fn decode_only_mode_exports_level0() {
    let workspace = Workspace::new();
    let mut app = workspace.app();
    app.batch.process = false;
    app.batch.dashboard = false;

    let report = Pipeline::from_config(app, RunMode::Batch).run_batch(&["n0572".to_string()]);
    assert!(report.is_success());
    assert!(!workspace.path("data/L0/n0572.010.csv").exists());

    let mut app = workspace.app();
    app.batch.process = false;
    let report = Pipeline::from_config(app, RunMode::Batch).run_batch(&["n0572".to_string()]);
    assert!(report.is_success());
    assert!(workspace.path("www/n0572.010.profile.json").is_file());
    assert!(!workspace.path("data/L1").exists());
}

#[test]
fn pipeline_output_frames_follow_processing_levels() {
    let workspace = Workspace::new();
    let mut pipeline = Pipeline::new(workspace.app(), RunMode::Realtime);
    let output = pipeline
        .run_realtime(&workspace.raw_dir().join("0572.010.msg"))
        .unwrap();

    let levels: Vec<ProcessingLevel> = output.frames().iter().map(|f| f.level).collect();
    assert_eq!(
        levels,
        vec![ProcessingLevel::L0, ProcessingLevel::L1, ProcessingLevel::L2]
    );
    assert_eq!(output.latest().level, ProcessingLevel::L2);

    let decoded = PipelineOutput::Decoded(output.level0().clone());
    assert_eq!(decoded.frames().len(), 1);
    assert_eq!(decoded.latest().level, ProcessingLevel::L0);
}

#[test]
fn transmissions_are_listed_in_profile_order() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["0572.011.msg", "0572.002.msg", "notes.msg", "0572.010.msg", "0572.010.log"] {
        fs::write(dir.path().join(name), "").unwrap();
    }
    let names: Vec<String> = list_transmissions(dir.path())
        .unwrap()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["0572.002.msg", "0572.010.msg", "0572.011.msg", "notes.msg"]
    );

    assert_eq!(
        user_id_for(Path::new("/data/raw/0572.010.msg")),
        Some("n0572".to_string())
    );
    assert_eq!(user_id_for(Path::new("notes.msg")), None);
}

#[test]
fn export_orders_configured_channels_first() {
    let channels: Vec<String> = ["sigma", "t", "p", "fchl", "bbp"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(
        column_order(&identity_config(), &channels),
        vec!["p", "t", "fchl", "sigma", "bbp"]
    );
}

#[test]
fn dashboard_requires_pressure_temperature_and_salinity() {
    let dir = tempfile::tempdir().unwrap();
    let writer = DashboardWriter::new(dir.path());
    let header = header(7);
    let observations = df!(
        "p" => &[1.0f64, 2.0],
        "s" => &[35.0f64, 35.1],
    )
    .unwrap();
    let frame = LevelFrame {
        level: ProcessingLevel::L2,
        header: &header,
        observations: &observations,
        mixed_layer_pressure: None,
    };

    let err = writer.write_profile("n0572", &frame).unwrap_err();
    match err {
        OutputError::MissingChannel {
            channel, profile, ..
        } => {
            assert_eq!(channel, "t");
            assert_eq!(profile, ProfileKey::new(572, 7));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!writer.profile_path("n0572", ProfileKey::new(572, 7)).exists());
}

#[test]
fn timeseries_upserts_by_profile_id() {
    let frame_for = |observations: &DataFrame, header: &floatproc_parser::ProfileHeader| {
        let mut series = FloatTimeseries::default();
        series
            .upsert(&LevelFrame {
                level: ProcessingLevel::L2,
                header,
                observations,
                mixed_layer_pressure: Some(12.0),
            })
            .unwrap();
        series
    };

    let warm = df!(
        "p" => &[1.0f64, 2.0, 3.0],
        "t" => &[10.0f64, 12.0, f64::NAN],
        "s" => &[35.0f64, 35.0, 35.0],
        "chla" => &[0.2f64, 0.4, 0.6],
    )
    .unwrap();
    let cold = df!(
        "p" => &[1.0f64, 2.0],
        "t" => &[2.0f64, 4.0],
        "s" => &[34.0f64, 34.0],
    )
    .unwrap();

    let (ten, three) = (header(10), header(3));
    let mut series = frame_for(&warm, &ten);
    series
        .upsert(&LevelFrame {
            level: ProcessingLevel::L2,
            header: &three,
            observations: &cold,
            mixed_layer_pressure: None,
        })
        .unwrap();
    series
        .upsert(&LevelFrame {
            level: ProcessingLevel::L2,
            header: &ten,
            observations: &warm,
            mixed_layer_pressure: Some(12.0),
        })
        .unwrap();

    assert_eq!(series.profile_id, vec![3, 10]);
    assert_eq!(series.mld, vec![None, Some(12.0)]);
    let t = &series.channels["t"];
    assert_eq!(t.mean, vec![Some(3.0), Some(11.0)]);
    assert_eq!(t.std, vec![Some(1.0), Some(1.0)]);
    let chla = &series.channels["chla"];
    assert_eq!(chla.mean.len(), 2);
    assert_eq!(chla.mean[0], None);
    assert!(series.channels["poc"].mean.iter().all(Option::is_none));
}
