use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::workflow::{Enforcement, EnforcementPolicy, Precondition, TransitionValidator};

/// Main configuration structure for the project workflow engine
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Stage graph and precondition settings
    pub workflow: WorkflowSettings,
    /// Command execution settings
    pub service: ServiceConfig,
    /// Where project snapshots live
    pub storage: StorageConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Allow forward moves across several main stages at once
    pub allow_stage_skipping: bool,
    /// Per-precondition enforcement, keyed by precondition name
    pub enforcement: BTreeMap<String, Enforcement>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        let enforcement = Precondition::ALL
            .iter()
            .map(|p| {
                (
                    p.as_str().to_string(),
                    EnforcementPolicy::default().enforcement_of(*p),
                )
            })
            .collect();
        Self {
            allow_stage_skipping: false,
            enforcement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Reload-and-reapply attempts after a version conflict
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries, jittered
    pub retry_backoff_ms: u64,
    /// Users that act as admin on projects they are not members of
    pub admins: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            retry_backoff_ms: 25,
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for JSON snapshots (file backend)
    pub state_dir: PathBuf,
    /// SQLite URL (sqlite backend, `database` feature)
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            state_dir: PathBuf::from(".project-workflow/projects"),
            database_url: "sqlite:.project-workflow/projects.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (project-workflow.toml, .project-workflow-rc)
    /// 3. Environment variables (PROJECT_WORKFLOW_SECTION__KEY)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("project-workflow.toml").exists() {
            builder = builder.add_source(File::with_name("project-workflow"));
        }

        if Path::new(".project-workflow-rc").exists() {
            builder = builder.add_source(
                File::with_name(".project-workflow-rc").format(config::FileFormat::Toml),
            );
        }

        Self::finish(builder)
    }

    /// Load with an explicit file in place of the default locations
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        let builder = Config::builder().add_source(File::from(path));
        Self::finish(builder)
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(Self::environment())
            .build()?;

        let workflow_config: WorkflowConfig = config.try_deserialize()?;
        workflow_config.validate()?;
        Ok(workflow_config)
    }

    /// `PROJECT_WORKFLOW_<SECTION>__<KEY>` variables; `SERVICE__ADMINS` takes
    /// a comma-separated list
    fn environment() -> Environment {
        Environment::with_prefix("PROJECT_WORKFLOW")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("service.admins")
            .try_parsing(true)
    }

    /// Reject enforcement keys that do not name a precondition
    pub fn validate(&self) -> Result<()> {
        for key in self.workflow.enforcement.keys() {
            if !Precondition::ALL.iter().any(|p| p.as_str() == key) {
                bail!("unknown precondition in workflow.enforcement: {key}");
            }
        }
        if self.observability.log_level.parse::<tracing::Level>().is_err() {
            bail!(
                "invalid observability.log_level: {}",
                self.observability.log_level
            );
        }
        Ok(())
    }

    pub fn enforcement_policy(&self) -> EnforcementPolicy {
        Precondition::ALL
            .iter()
            .fold(EnforcementPolicy::default(), |policy, precondition| {
                match self.workflow.enforcement.get(precondition.as_str()) {
                    Some(enforcement) => policy.with(*precondition, *enforcement),
                    None => policy,
                }
            })
    }

    pub fn transition_validator(&self) -> TransitionValidator {
        TransitionValidator::new(self.workflow.allow_stage_skipping)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<WorkflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = WorkflowConfig::load_env_file();
        WorkflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WorkflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
