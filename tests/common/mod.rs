//! Shared test helpers for integration tests

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Helper to get a ferp command
pub fn ferp() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("ferp"));
    cmd.env("FERP_AUTHOR", "tester").env_remove("RUST_LOG");
    cmd
}

/// Helper to create a test project in a temp directory
pub fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    ferp().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

fn stdout_line(tmp: &TempDir, args: &[&str]) -> String {
    let output = ferp()
        .current_dir(tmp.path())
        .args(args)
        .args(["--format", "id"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Helper to create a material, returning its full ID
pub fn create_material(tmp: &TempDir, name: &str, cost: &str) -> String {
    stdout_line(tmp, &["mat", "new", "--name", name, "--cost", cost])
}

/// Helper to create a stock-tracked material
pub fn create_stocked_material(tmp: &TempDir, name: &str, cost: &str, on_hand: &str) -> String {
    stdout_line(
        tmp,
        &["mat", "new", "--name", name, "--cost", cost, "--on-hand", on_hand],
    )
}

/// Helper to create a BoM with `MAT-...:QTY` items, returning its full ID
pub fn create_bom(tmp: &TempDir, product: &str, items: &[(&str, f64)]) -> String {
    let specs: Vec<String> = items
        .iter()
        .map(|(id, qty)| format!("{}:{}", id, qty))
        .collect();
    let mut args = vec!["bom", "new", "--product", product];
    for spec in &specs {
        args.push("--item");
        args.push(spec);
    }
    stdout_line(tmp, &args)
}

/// Helper to create a manufacturing order, returning its full ID
pub fn create_order(tmp: &TempDir, product: &str, bom: &str, qty: &str) -> String {
    stdout_line(
        tmp,
        &["mo", "new", "--product", product, "--bom", bom, "--qty", qty],
    )
}

/// Read an order back as JSON
pub fn order_json(tmp: &TempDir, id: &str) -> serde_json::Value {
    let output = ferp()
        .current_dir(tmp.path())
        .args(["mo", "show", id, "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}
