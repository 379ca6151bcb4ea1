//! Configuration model for procrun
//!
//! Defines the structure for XDG-compliant layered configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::executor::{Deadline, ExpectedExitCodes};
use crate::proc::{ProcBuilder, DEFAULT_TIMEOUT_MS};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Default settings applied to every run
    #[serde(default)]
    pub defaults: Defaults,

    /// Environment variables added to every run
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Named invocations, run with `procrun profile <name>`
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

/// Default settings applied to every run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Timeout in milliseconds (0 disables the timeout)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Exit codes treated as success (empty accepts any)
    #[serde(default = "default_expected_exit_codes")]
    pub expected_exit_codes: Vec<i32>,

    /// Start from an empty environment
    #[serde(default)]
    pub clear_env: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_expected_exit_codes() -> Vec<i32> {
    vec![0]
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            expected_exit_codes: default_expected_exit_codes(),
            clear_env: false,
        }
    }
}

impl Defaults {
    pub fn deadline(&self) -> Deadline {
        Deadline::from_millis(self.timeout_ms)
    }

    pub fn expected(&self) -> ExpectedExitCodes {
        ExpectedExitCodes::new(self.expected_exit_codes.iter().copied())
    }
}

/// A named invocation
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProfileConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Merged over the global `[env]` table
    #[serde(default)]
    pub env: HashMap<String, String>,

    pub working_dir: Option<String>,

    /// Overrides `defaults.timeout_ms`
    pub timeout_ms: Option<u64>,

    /// Overrides `defaults.expected_exit_codes`
    pub expected_exit_codes: Option<Vec<i32>>,

    /// Overrides `defaults.clear_env`
    pub clear_env: Option<bool>,
}

/// Fully resolved profile (after applying defaults)
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProfile {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<String>,
    pub timeout_ms: u64,
    pub expected_exit_codes: Vec<i32>,
    pub clear_env: bool,
}

impl ResolvedProfile {
    /// Turn the profile into a builder ready to run
    pub fn to_builder(&self) -> ProcBuilder {
        let mut builder = ProcBuilder::new(&self.command)
            .with_args(self.args.iter().cloned())
            .with_vars(self.env.clone())
            .with_timeout_millis(self.timeout_ms)
            .with_expected_exit_statuses(self.expected_exit_codes.iter().copied());

        if self.clear_env {
            builder = builder.clear_environment();
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.with_working_directory(dir);
        }
        builder
    }
}

impl Config {
    /// Get resolved configuration for a profile
    pub fn get_profile(&self, name: &str) -> Option<ResolvedProfile> {
        let profile = self.profiles.get(name)?;

        let mut env = self.env.clone();
        env.extend(profile.env.clone());

        Some(ResolvedProfile {
            name: name.to_string(),
            command: profile.command.clone(),
            args: profile.args.clone(),
            env,
            working_dir: profile.working_dir.clone(),
            timeout_ms: profile.timeout_ms.unwrap_or(self.defaults.timeout_ms),
            expected_exit_codes: profile
                .expected_exit_codes
                .clone()
                .unwrap_or_else(|| self.defaults.expected_exit_codes.clone()),
            clear_env: profile.clear_env.unwrap_or(self.defaults.clear_env),
        })
    }

    /// List all configured profile names, sorted
    pub fn list_profiles(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a profile is configured
    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }
}
