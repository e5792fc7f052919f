//! Persisted run stamps
//!
//! A run stamp records the last successful completion of a unit's work
//! function. Staleness is evaluated against the stamp rather than against
//! the output files directly; the stamp is the single synchronization point
//! standing in for "all outputs are current".

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{UnitError, UnitResult};

/// Record of the last successful completion of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStamp {
    /// Completion time of the last successful run
    #[serde(with = "serde_millis")]
    pub finished_at: SystemTime,
    /// Digest of the declared target/input sets at stamp time
    pub spec_digest: String,
}

/// Stamp persistence, keyed by unit name.
///
/// Stamps live as one JSON file per unit under a state directory. A stamp
/// is created on the first successful run and overwritten on each
/// subsequent one; it is removed only by `clear`.
#[derive(Debug, Clone)]
pub struct StampStore {
    state_dir: PathBuf,
}

impl StampStore {
    /// Create a store rooted at the given state directory
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Get the state directory
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Get the stamp file path for a unit
    pub fn stamp_path(&self, unit: &str) -> PathBuf {
        self.state_dir.join(format!("{unit}.stamp"))
    }

    /// Load the stamp for a unit, if it has ever completed successfully
    pub fn load(&self, unit: &str) -> UnitResult<Option<RunStamp>> {
        let path = self.stamp_path(unit);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(UnitError::io(&path, e)),
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            UnitError::StampError(format!("corrupt stamp at {}: {}", path.display(), e))
        })
    }

    /// Record a successful completion at the current time
    pub fn record(&self, unit: &str, spec_digest: String) -> UnitResult<RunStamp> {
        fs::create_dir_all(&self.state_dir).map_err(|e| UnitError::io(&self.state_dir, e))?;

        let stamp = RunStamp {
            finished_at: SystemTime::now(),
            spec_digest,
        };

        let path = self.stamp_path(unit);
        let content = serde_json::to_string(&stamp)
            .map_err(|e| UnitError::StampError(format!("failed to encode stamp: {e}")))?;
        fs::write(&path, content).map_err(|e| UnitError::io(&path, e))?;

        Ok(stamp)
    }

    /// Remove the stamp for a unit, returning it to never-ran state
    pub fn clear(&self, unit: &str) -> UnitResult<()> {
        let path = self.stamp_path(unit);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(UnitError::io(&path, e)),
        }
    }
}

/// Helper module for serde SystemTime serialization
mod serde_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis as u64))
    }
}
