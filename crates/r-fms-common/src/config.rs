//! ---
//! fms_section: "01-core-functionality"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Shared primitives and utilities for the master runtime."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use uuid::Uuid;

use crate::logging::LogFormat;
use r_fms_domain::{ControllerDefinition, GroupDefinition, UnitDefinition};

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_sample_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_heartbeat_silence() -> Duration {
    Duration::from_secs(30)
}

/// Primary configuration object for the R-FMS master.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MasterConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// Metadata describing where a [`MasterConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedMasterConfig {
    pub config: MasterConfig,
    pub source: PathBuf,
}

impl MasterConfig {
    pub const ENV_CONFIG_PATH: &str = "R_FMS_CONFIG";

    /// Load configuration from disk, respecting the `R_FMS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedMasterConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMasterConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedMasterConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<MasterConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.watchdog.validate()?;
        self.inventory.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for MasterConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: MasterConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}

/// Behavioral switches for the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestrationConfig {
    /// When enabled, locally-initiated optimistic state writes are checked
    /// against the unit transition table. Callback-driven writes are never
    /// checked; the remote node's report is authoritative.
    #[serde(default)]
    pub strict_transitions: bool,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// How often the watchdog samples controller liveness.
    #[serde(default = "default_sample_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub sample_interval: Duration,
    /// Heartbeat silence beyond which a controller is flagged.
    #[serde(default = "default_max_heartbeat_silence")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_heartbeat_silence: Duration,
}

impl WatchdogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            return Err(anyhow!("watchdog sample_interval must be non-zero"));
        }
        if self.max_heartbeat_silence < self.sample_interval {
            return Err(anyhow!(
                "watchdog max_heartbeat_silence must be at least the sample interval"
            ));
        }
        Ok(())
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            max_heartbeat_silence: default_max_heartbeat_silence(),
        }
    }
}

/// Declared fleet inventory carried in the daemon configuration.
///
/// The master core treats inventory as an external store; this block is one
/// such store for deployments that drive the fleet from a single file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InventoryConfig {
    #[serde(default)]
    pub controllers: IndexMap<String, ControllerEntry>,
    #[serde(default)]
    pub units: IndexMap<String, UnitEntry>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerEntry {
    pub uuid: Uuid,
    pub host_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitEntry {
    pub uuid: Uuid,
    /// Name of the declared controller hosting this unit.
    pub controller: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupEntry {
    #[serde(default)]
    pub name: Option<String>,
    /// Ordered member unit names.
    #[serde(default)]
    pub members: Vec<String>,
}

impl InventoryConfig {
    pub fn validate(&self) -> Result<()> {
        for (unit_name, unit) in &self.units {
            if !self.controllers.contains_key(&unit.controller) {
                return Err(anyhow!(
                    "unit '{}' references undeclared controller '{}'",
                    unit_name,
                    unit.controller
                ));
            }
        }
        for (group_id, group) in &self.groups {
            for member in &group.members {
                if !self.units.contains_key(member) {
                    return Err(anyhow!(
                        "group '{}' references undeclared unit '{}'",
                        group_id,
                        member
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve the declared inventory into domain definitions.
    ///
    /// Ordering follows declaration order, including group member order.
    pub fn controller_definitions(&self) -> Vec<ControllerDefinition> {
        self.controllers
            .iter()
            .map(|(name, entry)| ControllerDefinition::new(entry.uuid, name.clone(), entry.host_id.clone()))
            .collect()
    }

    pub fn unit_definitions(&self) -> Result<Vec<UnitDefinition>> {
        self.units
            .iter()
            .map(|(name, entry)| {
                let controller = self
                    .controllers
                    .get(&entry.controller)
                    .ok_or_else(|| {
                        anyhow!("unit '{}' references undeclared controller '{}'", name, entry.controller)
                    })?;
                Ok(UnitDefinition::new(
                    entry.uuid,
                    name.clone(),
                    ControllerDefinition::new(
                        controller.uuid,
                        entry.controller.clone(),
                        controller.host_id.clone(),
                    ),
                ))
            })
            .collect()
    }

    pub fn group_definitions(&self) -> Result<Vec<GroupDefinition>> {
        let units = self.unit_definitions()?;
        self.groups
            .iter()
            .map(|(group_id, entry)| {
                let members = entry
                    .members
                    .iter()
                    .map(|member| {
                        units
                            .iter()
                            .find(|unit| &unit.name == member)
                            .cloned()
                            .ok_or_else(|| {
                                anyhow!("group '{}' references undeclared unit '{}'", group_id, member)
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let name = entry.name.clone().unwrap_or_else(|| group_id.clone());
                Ok(GroupDefinition::new(group_id.clone(), name).with_members(members))
            })
            .collect()
    }
}
