#![allow(clippy::uninlined_format_args)]

use ndarray::Array3;
use specim_io::{read_raw_cube, write_raw_cube, RawDtype, RawLayout};
use std::process::Command;
use tempfile::TempDir;

fn specim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_specim"))
}

fn write_cube(dir: &TempDir) -> std::path::PathBuf {
    let mut cube = Array3::from_shape_fn((3, 3, 40), |(r, c, e)| 1.0 + 0.01 * (r + c + e) as f64);
    cube[[1, 2, 17]] = 1.0e4;
    let path = dir.path().join("cube.raw");
    write_raw_cube(&path, &cube, RawDtype::F32).unwrap();
    path
}

#[test]
fn test_info_reports_shape() {
    let dir = TempDir::new().unwrap();
    let input = write_cube(&dir);
    let out = specim()
        .args(["info", input.to_str().unwrap(), "--shape", "3x3x40"])
        .args(["--energy-offset", "-2", "--dispersion", "0.1"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["shape"], serde_json::json!([3, 3, 40]));
    assert!((report["energy"]["first"].as_f64().unwrap() + 2.0).abs() < 1e-9);
}

#[test]
fn test_clean_removes_spike() {
    let dir = TempDir::new().unwrap();
    let input = write_cube(&dir);
    let output = dir.path().join("clean.raw");
    let status = specim()
        .args(["clean", input.to_str().unwrap(), "--shape", "3x3x40"])
        .args(["-o", output.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());

    let layout = RawLayout {
        shape: (3, 3, 40),
        dtype: RawDtype::F32,
    };
    let cleaned = read_raw_cube(&output, &layout).unwrap();
    assert!(cleaned[[1, 2, 17]] < 10.0);
    assert!((cleaned[[0, 0, 5]] - 1.05).abs() < 1e-5);
}

#[test]
fn test_raw_input_needs_shape() {
    let dir = TempDir::new().unwrap();
    let input = write_cube(&dir);
    let out = specim()
        .args(["pca-scree", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
}
