//! Staleness evaluation for declared units
//!
//! A unit is stale when it has never completed, its declaration changed,
//! any declared target is missing on disk, or any input was modified after
//! the last successful run. Evaluation is a handful of metadata queries;
//! no process is spawned and nothing is written.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{UnitError, UnitResult};
use crate::stamp::RunStamp;
use crate::unit::UnitSpec;

/// Why a unit must be rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The unit has never completed successfully
    NeverRan,
    /// The declared target/input sets changed since the last run
    SpecChanged,
    /// A declared target is missing on disk
    MissingTarget(PathBuf),
    /// An input was modified after the last successful run
    InputNewer(PathBuf),
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverRan => write!(f, "never ran"),
            Self::SpecChanged => write!(f, "unit declaration changed"),
            Self::MissingTarget(path) => write!(f, "target {} is missing", path.display()),
            Self::InputNewer(path) => write!(f, "input {} changed", path.display()),
        }
    }
}

/// Decide whether a unit must run.
///
/// Returns the first staleness reason found, or `None` when the outputs
/// are current. A missing stamp is the normal first-run condition, not an
/// error; a missing input is an error (input ordering is the scheduler's
/// contract, not a staleness signal).
pub fn check_staleness(
    spec: &UnitSpec,
    stamp: Option<&RunStamp>,
) -> UnitResult<Option<StaleReason>> {
    let Some(stamp) = stamp else {
        return Ok(Some(StaleReason::NeverRan));
    };

    if stamp.spec_digest != spec.digest() {
        return Ok(Some(StaleReason::SpecChanged));
    }

    if let Some(missing) = missing_target(spec) {
        return Ok(Some(StaleReason::MissingTarget(missing)));
    }

    // Stamps persist at millisecond precision; compare at that granularity
    // so a stamp loaded from disk is not spuriously older than an input
    // written in the same millisecond.
    let stamp_millis = unix_millis(stamp.finished_at);
    for input in &spec.inputs {
        if unix_millis(newest_mtime(input)?) > stamp_millis {
            return Ok(Some(StaleReason::InputNewer(input.clone())));
        }
    }

    Ok(None)
}

fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Scan the declared targets for one that does not exist.
///
/// Idempotent and side-effect-free; returns the first missing target.
pub fn missing_target(spec: &UnitSpec) -> Option<PathBuf> {
    spec.targets.iter().find(|t| !t.exists()).cloned()
}

/// Newest modification time reachable from `path`.
///
/// A file contributes its own mtime. A directory contributes the newest
/// mtime of everything under it, the directory entries included, so that
/// additions and removals inside an input tree register as changes.
pub fn newest_mtime(path: &Path) -> UnitResult<SystemTime> {
    let metadata = fs::metadata(path).map_err(|e| UnitError::io(path, e))?;
    let mut newest = metadata.modified().map_err(|e| UnitError::io(path, e))?;

    if !metadata.is_dir() {
        return Ok(newest);
    }

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| UnitError::io(path, e))?;
        let metadata = entry.metadata().map_err(|e| UnitError::io(entry.path(), e))?;
        let modified = metadata.modified().map_err(|e| UnitError::io(entry.path(), e))?;
        if modified > newest {
            newest = modified;
        }
    }

    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::StampStore;
    use rstest::rstest;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn spec_in(dir: &TempDir) -> UnitSpec {
        UnitSpec::new("codegen")
            .with_target(dir.path().join("out.rs"))
            .with_input(dir.path().join("schema.json"))
    }

    fn write_all(spec: &UnitSpec) {
        for input in &spec.inputs {
            fs::write(input, "input").unwrap();
        }
        for target in &spec.targets {
            fs::write(target, "output").unwrap();
        }
    }

    #[test]
    fn test_no_stamp_is_stale() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        let reason = check_staleness(&spec, None).unwrap();
        assert_eq!(reason, Some(StaleReason::NeverRan));
    }

    #[test]
    fn test_fresh_after_stamp() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        let store = StampStore::new(dir.path().join("state"));
        store.record("codegen", spec.digest()).unwrap();
        let stamp = store.load("codegen").unwrap().unwrap();

        assert_eq!(check_staleness(&spec, Some(&stamp)).unwrap(), None);
    }

    #[test]
    fn test_missing_target_is_stale() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        let store = StampStore::new(dir.path().join("state"));
        store.record("codegen", spec.digest()).unwrap();
        let stamp = store.load("codegen").unwrap().unwrap();

        fs::remove_file(&spec.targets[0]).unwrap();

        let reason = check_staleness(&spec, Some(&stamp)).unwrap();
        assert_eq!(reason, Some(StaleReason::MissingTarget(spec.targets[0].clone())));
    }

    #[test]
    fn test_touched_input_is_stale() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        let store = StampStore::new(dir.path().join("state"));
        store.record("codegen", spec.digest()).unwrap();
        let stamp = store.load("codegen").unwrap().unwrap();

        thread::sleep(Duration::from_millis(25));
        fs::write(&spec.inputs[0], "changed").unwrap();

        let reason = check_staleness(&spec, Some(&stamp)).unwrap();
        assert_eq!(reason, Some(StaleReason::InputNewer(spec.inputs[0].clone())));
    }

    #[test]
    fn test_changed_declaration_is_stale() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        let store = StampStore::new(dir.path().join("state"));
        store.record("codegen", spec.digest()).unwrap();
        let stamp = store.load("codegen").unwrap().unwrap();

        let extra = dir.path().join("extra.json");
        fs::write(&extra, "input").unwrap();
        let grown = spec.clone().with_input(extra);

        let reason = check_staleness(&grown, Some(&stamp)).unwrap();
        assert_eq!(reason, Some(StaleReason::SpecChanged));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        for target in &spec.targets {
            fs::write(target, "output").unwrap();
        }

        let store = StampStore::new(dir.path().join("state"));
        store.record("codegen", spec.digest()).unwrap();
        let stamp = store.load("codegen").unwrap().unwrap();

        assert!(check_staleness(&spec, Some(&stamp)).is_err());
    }

    #[test]
    fn test_missing_target_scan() {
        let dir = TempDir::new().unwrap();
        let spec = spec_in(&dir);
        write_all(&spec);

        assert_eq!(missing_target(&spec), None);

        fs::remove_file(&spec.targets[0]).unwrap();
        assert_eq!(missing_target(&spec), Some(spec.targets[0].clone()));
    }

    #[test]
    fn test_newest_mtime_of_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("input.txt");
        fs::write(&file, "content").unwrap();

        let mtime = newest_mtime(&file).unwrap();
        assert_eq!(mtime, fs::metadata(&file).unwrap().modified().unwrap());
    }

    #[test]
    fn test_newest_mtime_recurses_into_directories() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("inputs");
        fs::create_dir_all(tree.join("nested")).unwrap();
        fs::write(tree.join("a.txt"), "a").unwrap();

        let before = newest_mtime(&tree).unwrap();

        thread::sleep(Duration::from_millis(25));
        fs::write(tree.join("nested/b.txt"), "b").unwrap();

        assert!(newest_mtime(&tree).unwrap() > before);
    }

    #[test]
    fn test_newest_mtime_missing_path() {
        let dir = TempDir::new().unwrap();
        assert!(newest_mtime(&dir.path().join("absent")).is_err());
    }

    #[rstest]
    #[case(StaleReason::NeverRan, "never ran")]
    #[case(StaleReason::SpecChanged, "unit declaration changed")]
    #[case(StaleReason::MissingTarget(PathBuf::from("out.rs")), "target out.rs is missing")]
    #[case(StaleReason::InputNewer(PathBuf::from("schema.json")), "input schema.json changed")]
    fn test_stale_reason_display(#[case] reason: StaleReason, #[case] rendered: &str) {
        assert_eq!(reason.to_string(), rendered);
    }
}
