//! Unit declarations and run outcomes

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A multi-output unit of work.
///
/// One unit declares the full set of output paths its work function
/// regenerates together, plus the input paths those outputs are derived
/// from. The target set is fixed per unit and order-irrelevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Unit name; keys the persisted run stamp
    pub name: String,
    /// Declared output paths, regenerated together by the work function
    pub targets: Vec<PathBuf>,
    /// Input paths (files or directories) the outputs are derived from
    pub inputs: Vec<PathBuf>,
}

impl UnitSpec {
    /// Create a new unit with no targets or inputs
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            inputs: Vec::new(),
        }
    }

    /// Add a declared target
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Set the declared targets
    pub fn with_targets(mut self, targets: Vec<PathBuf>) -> Self {
        self.targets = targets;
        self
    }

    /// Add an input
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Set the inputs
    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Whether `path` is one of the declared targets
    pub fn declares_target(&self, path: &Path) -> bool {
        self.targets.iter().any(|t| t == path)
    }

    /// Validate the unit declaration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("unit name cannot be empty".to_string());
        }

        if self.name.contains('/') || self.name.contains('\\') {
            return Err(format!(
                "unit name '{}' cannot contain path separators",
                self.name
            ));
        }

        if self.targets.is_empty() {
            return Err(format!("unit '{}' declares no targets", self.name));
        }

        Ok(())
    }

    /// Digest of the declared target and input sets.
    ///
    /// Target and input order does not affect the digest; adding, removing,
    /// or renaming a declared path does. The digest is recorded in the run
    /// stamp so that editing the declaration invalidates a previous run.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());

        let mut targets: Vec<String> = self
            .targets
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        targets.sort();
        for target in &targets {
            hasher.update(b"\x1ft");
            hasher.update(target.as_bytes());
        }

        let mut inputs: Vec<String> = self
            .inputs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        inputs.sort();
        for input in &inputs {
            hasher.update(b"\x1fi");
            hasher.update(input.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

/// What an `ensure_run` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Outputs were already current; no side effects
    Fresh,
    /// The work function executed during this invocation
    Ran,
}

impl RunOutcome {
    /// Whether the work function executed
    pub fn ran(&self) -> bool {
        matches!(self, Self::Ran)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Ran => write!(f, "ran"),
        }
    }
}
