//! Manifest-driven coordination tests
//!
//! Loads unit declarations from a units.toml file and drives a full
//! invocation from the declaration alone.

use std::fs;

use pretty_assertions::assert_eq;
use tandem_build::{RunOutcome, UnitCoordinator, UnitManifest};
use tempfile::TempDir;

fn write_manifest(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("units.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_manifest_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"
[[unit]]
name = "codegen"
targets = ["out/a.rs"]
inputs = ["schema.json"]
command = "true"
"#,
    );

    let manifest = UnitManifest::from_file(&path).unwrap();
    manifest.validate().unwrap();
    assert_eq!(manifest.units.len(), 1);
}

#[test]
fn test_missing_manifest_file() {
    let dir = TempDir::new().unwrap();
    let result = UnitManifest::from_file(&dir.path().join("absent.toml"));
    assert!(result.is_err());
}

#[test]
fn test_manifest_round_trip() {
    let manifest = UnitManifest::from_str(
        r#"
[[unit]]
name = "codegen"
targets = ["out/a.rs", "out/b.rs"]
inputs = ["schema.json"]
command = "generate"
"#,
    )
    .unwrap();

    let rendered = manifest.to_string().unwrap();
    let reparsed = UnitManifest::from_str(&rendered).unwrap();
    assert_eq!(manifest, reparsed);
}

#[test]
fn test_declared_command_drives_an_invocation() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.txt");
    let input = dir.path().join("in.txt");
    fs::write(&input, "input").unwrap();

    let manifest = UnitManifest::from_str(&format!(
        r#"
[[unit]]
name = "assets"
targets = ["{}"]
inputs = ["{}"]
command = "printf '%s' \"$LABEL\" > \"$TANDEM_TARGETS\""

[unit.env]
LABEL = "bundled"
"#,
        target.display(),
        input.display()
    ))
    .unwrap();

    let decl = manifest.get("assets").unwrap();
    let coordinator = UnitCoordinator::new(decl.to_spec(), decl.to_work().unwrap())
        .unwrap()
        .with_state_dir(dir.path().join("state"));

    assert_eq!(coordinator.ensure_run().unwrap(), RunOutcome::Ran);
    assert_eq!(fs::read_to_string(&target).unwrap(), "bundled");

    let again = UnitCoordinator::new(decl.to_spec(), decl.to_work().unwrap())
        .unwrap()
        .with_state_dir(dir.path().join("state"));
    assert_eq!(again.ensure_run().unwrap(), RunOutcome::Fresh);
}
