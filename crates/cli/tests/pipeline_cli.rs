// Integration tests for the `gamba` binary: exit codes, --json contract,
// config resolution.
//
// Run with: cargo test -p gamba-cli --test pipeline_cli -- --nocapture

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const IMAGE_A: &str = "OPMM_Subasta_2025-05-30_04_55_15.945_Imedea";
const IMAGE_B: &str = "OPMM_Subasta_2025-05-30_05_00_00.000_Imedea";

fn gamba(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gamba"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("GAMBA_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn seed(base: &Path) {
    let labels = base.join("INFERENCE/predict_2025-05-30_1/labels");
    write(
        &labels.join(format!("{IMAGE_A}.txt")),
        "2 0.0 0.0 0.25 0.0 0.25 0.25 0.0 0.25\n2 0.5 0.5 0.75 0.5 0.75 0.75 0.5 0.75\n",
    );
    write(&labels.join(format!("{IMAGE_B}.txt")), "2 0.0 0.0 0.5 0.0 0.5 0.5 0.0 0.5\n");
    write(
        &base.join("INFERENCE/resultados_metadatos.txt"),
        &format!("{IMAGE_A}.jpg\t450,0\t123\n{IMAGE_B}.jpg\t10,0\t999\n"),
    );
    write(
        &base.join("RESULTS/ARA.csv"),
        "FECHA,NUMVENTA,PESONETO,IMPORTE,NUMENVAS\n2025-05-30 05:10:00,123,450.0,3150.0,1\n",
    );
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn run_json_is_a_single_value() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("data");
    seed(&base);

    let out = gamba(dir.path())
        .args(["run", "--json", "--base-dir", base.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let json: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(json["areas"][0]["date"], "2025-05-30");
    assert_eq!(json["weights"][0]["processed_rows"], 2);
    let merge = &json["merge"]["dates"][0];
    assert_eq!(merge["merged_rows"], 1);
    assert_eq!(merge["unmatched_rows"], 1);
    assert!(base.join("RESULTS/DATOS_GAMBA/DATOS_GAMBA_2025-05-30.csv").is_file());
}

#[test]
fn strict_run_fails_on_unmatched() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("data");
    seed(&base);

    let out = gamba(dir.path())
        .args(["run", "--strict", "--base-dir", base.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(63));
    assert!(stderr(&out).contains("error: 1 images without a ledger match"));
}

#[test]
fn stages_run_separately() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("data");
    seed(&base);
    let b = base.to_str().unwrap();

    for stage in ["areas", "weights"] {
        let out = gamba(dir.path())
            .args([stage, "--from", "30-05-2025", "--to", "2025-05-30", "--base-dir", b])
            .output()
            .unwrap();
        assert!(out.status.success(), "{stage}: {}", stderr(&out));
    }
    assert!(base.join("RESULTS/resultados_procesados_2025-05-30.csv").is_file());

    let out = gamba(dir.path()).args(["merge", "--json", "--base-dir", b]).output().unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["universe_rows"], 2);
}

#[test]
fn config_file_with_year_selects_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("data");
    seed(&base);
    fs::rename(base.join("RESULTS/ARA.csv"), base.join("RESULTS/ARA_2025.csv")).unwrap();
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, format!("base_dir = {:?}\nyear = 2025\n", base.to_str().unwrap())).unwrap();

    let out = gamba(dir.path())
        .args(["run", "--json", "--config", config.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let json: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(json["merge"]["dates"][0]["merged_rows"], 1);

    // --year on the command line overrides the config and excludes 2025
    let out = gamba(dir.path())
        .args(["run", "--json", "--year", "2024", "--config", config.to_str().unwrap()])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert!(json["merge"]["dates"].as_array().unwrap().is_empty());
}

#[test]
fn validate_prints_resolved_paths() {
    let dir = tempfile::tempdir().unwrap();
    let out = gamba(dir.path())
        .args(["validate", "--base-dir", "/data/remar", "--year", "2025"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("ledger_file    /data/remar/RESULTS/ARA_2025.csv"));
    assert!(text.contains("temp_dir       /data/remar/AREAS/TEMP"));
}

#[test]
fn missing_config_exits_60_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let out = gamba(dir.path()).args(["validate"]).output().unwrap();
    assert_eq!(out.status.code(), Some(60));
    assert!(stderr(&out).contains("hint:"));
}

#[test]
fn invalid_config_exits_60() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "base_dir = \"/x\"\n[labels]\nimage_width = 0\n").unwrap();
    let out = gamba(dir.path())
        .args(["validate", "--config", config.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(60));
}

#[test]
fn unusable_ledger_exits_62() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("data");
    seed(&base);
    fs::write(base.join("RESULTS/ARA.csv"), "FECHA,NUMVENTA\n").unwrap();
    let out = gamba(dir.path())
        .args(["run", "--base-dir", base.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(62));
}

#[test]
fn inverted_range_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = gamba(dir.path())
        .args(["areas", "--from", "2025-06-01", "--to", "2025-05-01", "--base-dir", "/nonexistent"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}
