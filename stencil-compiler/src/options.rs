//! Compiler configuration.
//!
//! Options are plain data with `with_*` builders. The process-wide default
//! compiler reads them from the environment once.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Environment variable selecting [`Mode`].
pub const MODE_ENV: &str = "STENCIL_MODE";

/// Environment variable selecting [`Profile`].
pub const PROFILE_ENV: &str = "STENCIL_PROFILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// All checks run.
    #[default]
    Development,
    /// Semantic checks are skipped; syntax errors are still fatal.
    Production,
}

/// Identifier naming used by the source generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Verbose,
    Compact,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" => Ok(Profile::Verbose),
            "compact" => Ok(Profile::Compact),
            other => Err(format!("unknown profile '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub mode: Mode,
    pub profile: Profile,
    /// Maximum number of cached templates. `None` never evicts.
    pub cache_capacity: Option<usize>,
}

impl CompileOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from `STENCIL_MODE` and `STENCIL_PROFILE`. Unset or
    /// unrecognized values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(mode) = std::env::var(MODE_ENV).ok().and_then(|v| v.parse().ok()) {
            options.mode = mode;
        }
        if let Some(profile) = std::env::var(PROFILE_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options.profile = profile;
        }
        options
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }
}
