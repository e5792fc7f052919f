//! Unit manifest parsing and types (units.toml)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{UnitError, UnitResult};
use crate::unit::UnitSpec;
use crate::work::CommandWork;

/// Unit manifest (units.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitManifest {
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitDecl>,
}

impl UnitManifest {
    /// Parse manifest from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> UnitResult<Self> {
        toml::from_str(content).map_err(|e| UnitError::InvalidManifest(e.to_string()))
    }

    /// Load manifest from file
    pub fn from_file(path: &Path) -> UnitResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| UnitError::manifest_read(path, e))?;
        Self::from_str(&content)
    }

    /// Serialize to TOML string
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> UnitResult<String> {
        toml::to_string_pretty(self).map_err(|e| UnitError::InvalidManifest(e.to_string()))
    }

    /// Look up a declared unit by name
    pub fn get(&self, name: &str) -> Option<&UnitDecl> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Validate every declaration and reject duplicate unit names
    pub fn validate(&self) -> UnitResult<()> {
        let mut seen = HashSet::new();
        for decl in &self.units {
            if !seen.insert(decl.name.as_str()) {
                return Err(UnitError::InvalidManifest(format!(
                    "duplicate unit name '{}'",
                    decl.name
                )));
            }
            decl.to_spec().validate().map_err(UnitError::InvalidManifest)?;
        }
        Ok(())
    }
}

/// One declared unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitDecl {
    /// Unit name
    pub name: String,
    /// Declared output paths
    pub targets: Vec<PathBuf>,
    /// Input paths
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Shell command regenerating the targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Extra environment for the command
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl UnitDecl {
    /// Build the unit specification for this declaration
    pub fn to_spec(&self) -> UnitSpec {
        UnitSpec::new(&self.name)
            .with_targets(self.targets.clone())
            .with_inputs(self.inputs.clone())
    }

    /// Build the command work function, if a command is declared
    pub fn to_work(&self) -> Option<CommandWork> {
        let command = self.command.as_deref()?;
        let mut work = CommandWork::new(command);
        for (key, value) in &self.env {
            work = work.with_env(key.clone(), value.clone());
        }
        Some(work)
    }
}
