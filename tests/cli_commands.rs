use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

const MISMATCH_RULES: &str = "\
Product ID,Recommended Product ID,Label,Type,Priority
shoei-rf-1400-helmet,arai-vas-v-pinlock-visor,Visor,Explicit,1
shoei-rf-1400-helmet,shoei-cwr-f2-shield,Shield,Explicit,2
shoei-x-15-helmet,shoei-cwr-1-shield,,Explicit,3
";

const CLEAN_RULES: &str = "\
Product ID,Recommended Product ID,Label,Type
shoei-x-15-helmet,shoei-cwr-1-shield,Shield,Explicit
";

fn fbt(dir: &Path) -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("fbt");
    let mut cmd = Command::new(bin);
    cmd.current_dir(dir)
        .env_remove("RECOMMENDATIONS_CSV")
        .env_remove("RECOMMENDATIONS_CSV_URL")
        .env("RUST_LOG", "warn")
        .args(["--config", "missing.yaml"]);
    cmd
}

#[test]
fn validate_fails_on_definite_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.csv"), MISMATCH_RULES).unwrap();

    let assert = fbt(dir.path())
        .args(["--output", "json", "validate", "--csv", "rules.csv", "--heuristic"])
        .assert()
        .failure()
        .code(1);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let report: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(report["mode"], "heuristic");
    let mismatches: Vec<&Value> = report["findings"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|finding| finding["classification"] == "definite-mismatch")
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0]["recommended_product_id"], "arai-vas-v-pinlock-visor");
}

#[test]
fn validate_passes_heuristic_but_not_strict() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.csv"), CLEAN_RULES).unwrap();

    let assert = fbt(dir.path())
        .args(["validate", "--csv", "rules.csv", "--heuristic"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Result: OK"));

    fbt(dir.path())
        .args(["validate", "--csv", "rules.csv", "--strict"])
        .assert()
        .failure();
}

#[test]
fn autofix_dry_run_then_write() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.csv");
    std::fs::write(&rules, MISMATCH_RULES).unwrap();

    fbt(dir.path())
        .args(["autofix", "--csv", "rules.csv", "--dry-run"])
        .assert()
        .success();
    assert!(!dir.path().join("product_recommendations.autofixed.csv").exists());

    fbt(dir.path())
        .args(["autofix", "--csv", "rules.csv", "--out", "fixed.csv"])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&rules).unwrap(), MISMATCH_RULES);
    let fixed = std::fs::read_to_string(dir.path().join("fixed.csv")).unwrap();
    assert!(!fixed.contains("arai-vas-v-pinlock-visor"));
    assert!(fixed.starts_with("Product ID,Recommended Product ID,Label,Type,Priority"));
}

#[test]
fn resolve_prints_recommendations() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.csv"), CLEAN_RULES).unwrap();

    let assert = fbt(dir.path())
        .args([
            "--output",
            "json",
            "resolve",
            "--csv",
            "rules.csv",
            "--products",
            "shoei-x-15-helmet",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let recs: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(recs[0]["product_id"], "shoei-cwr-1-shield");
    assert_eq!(recs[0]["matched_from"], "shoei-x-15-helmet");
}

#[test]
fn refresh_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    fbt(dir.path())
        .args(["refresh", "--csv", "absent.csv"])
        .assert()
        .failure();
}

#[test]
fn sync_refuses_without_catalog_credentials() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.csv"), CLEAN_RULES).unwrap();
    let assert = fbt(dir.path())
        .env_remove("BC_ACCESS_TOKEN")
        .env_remove("BC_API_PATH")
        .env_remove("BC_STORE_HASH")
        .args(["sync", "--csv", "rules.csv"])
        .assert()
        .failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("BC_ACCESS_TOKEN"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("rules.csv")).unwrap(),
        CLEAN_RULES
    );
}
