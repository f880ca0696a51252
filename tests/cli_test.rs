//! Runs the command-line tool against the in-memory provider.

use std::process::Command;

fn vidcap_cli(args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_vidcap-cli"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap();
    (
        output.status.success(),
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).unwrap()
}

#[test]
fn test_info_reports_crate() {
    let (ok, stdout) = vidcap_cli(&["info", "--json"]);
    assert!(ok);
    let info = json(&stdout);
    assert_eq!(info["name"], "vidcap");
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));

    let (ok, stdout) = vidcap_cli(&["--version"]);
    assert!(ok);
    assert!(stdout.starts_with(&format!("vidcap {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_list_devices_with_mock() {
    let (ok, stdout) = vidcap_cli(&["list-devices", "--mock", "--json"]);
    assert!(ok);
    let devices = json(&stdout);
    assert_eq!(devices[0]["name"], "USB Camera");
}

#[test]
fn test_step_control_moves_one_step() {
    let (ok, stdout) = vidcap_cli(&["step-control", "0", "PAN", "--mock", "--json"]);
    assert!(ok);
    assert_eq!(json(&stdout)["current"], 3600);
}

#[test]
fn test_step_control_at_max_fails() {
    let (ok, _) = vidcap_cli(&["step-control", "0", "ROLL", "--mock"]);
    assert!(!ok);
}
