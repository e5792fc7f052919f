//! Work function boundary and shell-command adapter
//!
//! The work function is an external collaborator: it receives the declared
//! targets and is assumed, not verified, to regenerate all of them. A
//! still-missing output is caught by the next staleness evaluation, which
//! is what makes the loop self-correcting.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{UnitError, UnitResult};
use crate::unit::UnitSpec;

/// Context handed to the work function for one run
#[derive(Debug, Clone)]
pub struct WorkContext {
    /// Unit name
    pub unit: String,
    /// Declared targets the work function must regenerate
    pub targets: Vec<PathBuf>,
    /// Inputs the targets are derived from
    pub inputs: Vec<PathBuf>,
}

impl WorkContext {
    /// Build the context for a unit
    pub fn new(spec: &UnitSpec) -> Self {
        Self {
            unit: spec.name.clone(),
            targets: spec.targets.clone(),
            inputs: spec.inputs.clone(),
        }
    }

    /// Environment variables exported to external commands
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("TANDEM_UNIT".to_string(), self.unit.clone());
        env.insert("TANDEM_TARGETS".to_string(), join_paths(&self.targets));
        env.insert("TANDEM_INPUTS".to_string(), join_paths(&self.inputs));
        env
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// External collaborator that (re)generates every declared target
pub trait UnitWork {
    /// Regenerate all declared targets
    fn run(&self, ctx: &WorkContext) -> UnitResult<()>;
}

impl<F> UnitWork for F
where
    F: Fn(&WorkContext) -> UnitResult<()>,
{
    fn run(&self, ctx: &WorkContext) -> UnitResult<()> {
        self(ctx)
    }
}

/// Shell-command work function.
///
/// Runs the command through `sh -c` with the unit's context exported as
/// environment variables, captures output, and maps a non-zero exit to
/// `UnitError::WorkFailed`.
#[derive(Debug, Clone)]
pub struct CommandWork {
    command: String,
    working_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
}

impl CommandWork {
    /// Create a new command work function
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            env_vars: HashMap::new(),
        }
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Get the command string
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl UnitWork for CommandWork {
    fn run(&self, ctx: &WorkContext) -> UnitResult<()> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .envs(ctx.environment())
            .envs(&self.env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command
            .spawn()
            .map_err(|e| UnitError::work_spawn(&ctx.unit, e))?
            .wait_with_output()
            .map_err(|e| UnitError::work_spawn(&ctx.unit, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            return Err(UnitError::work_failed(
                &ctx.unit,
                output.status.code().unwrap_or(-1),
                combined_output(&stdout, &stderr),
            ));
        }

        Ok(())
    }
}

/// Combine captured output for error messages
fn combined_output(stdout: &str, stderr: &str) -> String {
    let mut output = String::new();
    if !stdout.is_empty() {
        output.push_str("STDOUT:\n");
        output.push_str(stdout);
        output.push('\n');
    }
    if !stderr.is_empty() {
        output.push_str("STDERR:\n");
        output.push_str(stderr);
    }
    output
}
