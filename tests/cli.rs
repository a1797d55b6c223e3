use std::process::Command;

use clap::Parser;
use qat::QatError;
use qat::cli::{Cli, run};
use tempfile::TempDir;

fn sample(name: &str) -> String {
    format!("{}/qir-samples/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn run_args(args: &[&str]) -> Result<String, QatError> {
    let cli = Cli::try_parse_from(std::iter::once("qat").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    run(&cli, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn generate_writes_to_output_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("bell.out.qir");
    let input = sample("bell.qir");

    let stdout = run_args(&[&input, "--generate", "-o", output.to_str().unwrap()]).unwrap();
    assert!(stdout.is_empty());

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("core.module @bell {"));
    assert!(!written.contains("__quantum__rt__qubit_allocate"));
    assert!(written.contains("qir.result_ref {index = 1}"));
}

#[test]
fn validate_alone_does_not_rewrite() {
    let input = sample("bell.qir");
    let err = run_args(&[&input, "--validate", "--profile", "base"]).unwrap_err();
    assert!(matches!(err, QatError::Validation { ref violations, .. } if violations.len() == 4));

    let stdout = run_args(&[
        &input,
        "--generate",
        "--validate",
        "--profile",
        "base",
        "--verify-module",
    ])
    .unwrap();
    assert!(stdout.contains("__quantum__qis__mz__body"));
}

#[test]
fn command_line_overrides_configuration() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("qat.toml");
    std::fs::write(&config, "[allocation]\nqubit-limit = 4\n").unwrap();
    let config = config.to_str().unwrap();

    let dumped = run_args(&[
        "--config",
        config,
        "--dump-config",
        "--result-limit",
        "2",
        "--strict",
    ])
    .unwrap();
    let table: toml::Table = dumped.parse().unwrap();
    assert_eq!(table["allocation"]["qubit-limit"].as_integer(), Some(4));
    assert_eq!(table["allocation"]["result-limit"].as_integer(), Some(2));
    assert_eq!(table["transformation-rules"]["strict"].as_bool(), Some(true));
    assert!(table["validation"]["allowed-callee-prefixes"].is_array());

    let err = run_args(&[&sample("bell.qir"), "--qubit-limit", "1"]).unwrap_err();
    assert!(err.to_string().contains("statically allocated"), "{err}");
}

#[test]
fn unknown_configuration_section_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[rules]\nstrict = true\n").unwrap();

    let err = run_args(&[&sample("bell.qir"), "--config", config.to_str().unwrap()]).unwrap_err();
    assert_eq!(err.to_string(), "unknown configuration section `rules`");
}

#[test]
fn binary_exits_non_zero_on_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_qat"))
        .args([sample("bell.qir").as_str(), "--validate", "--profile", "base"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("module violates profile `base`: 4 violation(s)"), "{stderr}");

    let output = Command::new(env!("CARGO_BIN_EXE_qat"))
        .arg(sample("register.qir"))
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("qir.qubit_ref {index = 2}"));
}
