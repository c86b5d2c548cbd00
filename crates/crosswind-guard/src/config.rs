//! Guard configuration.
//!
//! Config file: `$CROSSWIND_GUARD_CONFIG`, else
//! `~/.config/crosswind-guard/config.toml`, else defaults.

use crate::audit::{JsonlAuditLog, DEFAULT_AUDIT_PATH};
use crate::error::GuardError;
use crate::guard::{Guardrail, DEFAULT_TOLERANCE_KT};
use crate::magnetic::{validate_variation, MagneticVariationTable};
use crate::runway::{SelectionOptions, DEFAULT_MAX_CROSSWIND_KT};
use crate::units::Knots;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CROSSWIND_GUARD_CONFIG";

/// Verification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Maximum |claim - truth| that still passes
    #[serde(default = "default_tolerance")]
    pub tolerance_kt: f64,

    /// Crosswind above which a runway selection is flagged
    #[serde(default = "default_max_crosswind")]
    pub max_crosswind_kt: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_KT
}

fn default_max_crosswind() -> f64 {
    DEFAULT_MAX_CROSSWIND_KT
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            tolerance_kt: default_tolerance(),
            max_crosswind_kt: default_max_crosswind(),
        }
    }
}

/// Audit log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_audit_path() -> PathBuf {
    PathBuf::from(DEFAULT_AUDIT_PATH)
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_audit_path(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub guard: ThresholdConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    /// Station → declination, merged over the built-in table
    #[serde(default)]
    pub magnetic_variation: BTreeMap<String, f64>,
}

impl GuardConfig {
    /// `$XDG_CONFIG_HOME/crosswind-guard/config.toml`, else
    /// `~/.config/crosswind-guard/config.toml`.
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("Cannot determine home directory")?;
                Path::new(&home).join(".config")
            }
        };
        Ok(config_dir.join("crosswind-guard").join("config.toml"))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. `$CROSSWIND_GUARD_CONFIG`
    /// 2. User config
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            if !explicit.is_empty() {
                return Self::load_from(&explicit);
            }
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: GuardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        check_knots("guard.tolerance_kt", self.guard.tolerance_kt)?;
        check_knots("guard.max_crosswind_kt", self.guard.max_crosswind_kt)?;
        for (station, value) in &self.magnetic_variation {
            validate_variation(station, *value)?;
        }
        Ok(())
    }

    pub fn tolerance(&self) -> Result<Knots, GuardError> {
        check_knots("guard.tolerance_kt", self.guard.tolerance_kt)
    }

    /// Built-in table with configured entries on top
    pub fn variation_table(&self) -> MagneticVariationTable {
        MagneticVariationTable::builtin().with_overrides(&self.magnetic_variation)
    }

    pub fn selection_options(&self) -> Result<SelectionOptions, GuardError> {
        Ok(SelectionOptions {
            max_crosswind_kt: check_knots("guard.max_crosswind_kt", self.guard.max_crosswind_kt)?,
            ..SelectionOptions::default()
        })
    }

    /// Wire a guardrail: tolerance, variation table and, when enabled, the
    /// JSONL audit log.
    pub fn build_guardrail(&self) -> Result<Guardrail> {
        self.validate().context("Invalid configuration")?;
        let mut guardrail = Guardrail::new()
            .with_tolerance(self.tolerance()?)?
            .with_variations(self.variation_table());
        if self.audit.enabled {
            guardrail = guardrail.with_audit_sink(Arc::new(JsonlAuditLog::new(&self.audit.path)));
        }
        Ok(guardrail)
    }
}

fn check_knots(field: &str, value: f64) -> Result<Knots, GuardError> {
    match Knots::from_f64(value) {
        Some(k) if !k.is_negative() => Ok(k),
        _ => Err(GuardError::Config(format!(
            "{} must be a finite, non-negative number of knots, got {}",
            field, value
        ))),
    }
}
