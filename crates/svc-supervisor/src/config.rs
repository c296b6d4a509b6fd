//! Service configuration and the persisted registry.
//!
//! The registry is a YAML file listing every registered service. It is the
//! authoritative configuration and is rewritten (atomically) on every
//! mutating registry operation. Runtime state lives in a separate snapshot
//! file, see [`crate::snapshot`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Broad category of a service, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    System,
    Network,
    Storage,
    User,
    Application,
}

impl Default for ServiceType {
    fn default() -> Self {
        ServiceType::Application
    }
}

/// Startup priority. Lower ordinal starts earlier among services whose
/// dependencies are already satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServicePriority {
    Critical,
    High,
    Normal,
    Low,
    Idle,
}

impl ServicePriority {
    pub fn ordinal(&self) -> u8 {
        match self {
            ServicePriority::Critical => 0,
            ServicePriority::High => 1,
            ServicePriority::Normal => 2,
            ServicePriority::Low => 3,
            ServicePriority::Idle => 4,
        }
    }
}

impl Default for ServicePriority {
    fn default() -> Self {
        ServicePriority::Normal
    }
}

/// Static definition of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unique service name (alphanumeric, `-`, `_`)
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub service_type: ServiceType,

    #[serde(default)]
    pub priority: ServicePriority,

    /// Path to the executable (or a PATH-resolvable name)
    pub executable_path: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    /// Appended to the inherited environment
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Names of services that must be Running before this one starts
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Whether start-all and state restore launch this service
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Delay before an automatic restart after an unexpected exit
    #[serde(default = "default_restart_delay", with = "duration_serde")]
    pub restart_delay: Duration,

    /// Grace period between SIGTERM and SIGKILL during stop
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Upper bound on automatic restarts after failures
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
}

impl ServiceConfig {
    /// Minimal config with defaults for everything but name and executable.
    pub fn new(name: impl Into<String>, executable_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            service_type: ServiceType::default(),
            priority: ServicePriority::default(),
            executable_path: executable_path.into(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            dependencies: Vec::new(),
            auto_start: default_auto_start(),
            restart_delay: default_restart_delay(),
            shutdown_timeout: default_shutdown_timeout(),
            max_restart_attempts: default_max_restart_attempts(),
        }
    }

    /// Validate one service definition.
    pub fn validate(&self) -> Result<()> {
        svc_process::validate_service_name(&self.name).map_err(|e| anyhow::anyhow!(e))?;
        svc_process::validate_executable_path(&self.name, &self.executable_path)
            .map_err(|e| anyhow::anyhow!(e))?;
        if self.dependencies.iter().any(|d| d == &self.name) {
            bail!("Service '{}' cannot depend on itself", self.name);
        }
        // The registry format carries millisecond precision; finer values
        // would not survive a save/load cycle.
        for (field, value) in [
            ("restart_delay", self.restart_delay),
            ("shutdown_timeout", self.shutdown_timeout),
        ] {
            if value.subsec_nanos() % 1_000_000 != 0 {
                bail!(
                    "Service '{}': {} must be a whole number of milliseconds",
                    self.name,
                    field
                );
            }
        }
        Ok(())
    }
}

/// The persisted service registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegistry {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ServiceRegistry {
    /// Load the registry from a YAML file and validate it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read registry file: {}", path.as_ref().display()))?;
        Self::load_from_string(&content)
    }

    /// Load the registry from a YAML string and validate it.
    pub fn load_from_string(content: &str) -> Result<Self> {
        let registry: ServiceRegistry =
            serde_yaml::from_str(content).context("Failed to parse YAML registry")?;
        registry.validate()?;
        Ok(registry)
    }

    /// Validate every entry plus cross-entry constraints.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for config in &self.services {
            config.validate()?;
            if !seen.insert(config.name.as_str()) {
                bail!("Duplicate service name: {}", config.name);
            }
        }
        Ok(())
    }

    /// Write the registry atomically (temp file in the same directory, then
    /// rename over the target).
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).context("Failed to serialize registry")?;

        let temp_path = path.with_extension("yaml.tmp");
        tokio::fs::write(&temp_path, &content)
            .await
            .with_context(|| format!("Failed to write temp registry: {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .with_context(|| format!("Failed to rename registry into place: {}", path.display()))?;

        debug!("Saved registry with {} service(s) to {}", self.services.len(), path.display());
        Ok(())
    }
}

/// The catalog installed when no registry file exists yet.
pub fn default_catalog() -> Vec<ServiceConfig> {
    let mut network = ServiceConfig::new("network", "/usr/sbin/networkd");
    network.description = "Network connectivity service".to_string();
    network.service_type = ServiceType::Network;
    network.priority = ServicePriority::Critical;

    let mut storage = ServiceConfig::new("storage", "/usr/sbin/storaged");
    storage.description = "Storage management service".to_string();
    storage.service_type = ServiceType::Storage;
    storage.priority = ServicePriority::High;
    storage.dependencies = vec!["network".to_string()];

    let mut desktop = ServiceConfig::new("desktop", "/usr/bin/desktop");
    desktop.description = "Desktop environment".to_string();
    desktop.service_type = ServiceType::User;
    desktop.priority = ServicePriority::Normal;
    desktop.dependencies = vec!["network".to_string(), "storage".to_string()];

    vec![network, storage, desktop]
}

fn default_auto_start() -> bool {
    true
}

fn default_restart_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_restart_attempts() -> u32 {
    3
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Keep sub-second precision when present
        if duration.subsec_nanos() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, String> {
        // Check "ms" before "s" since "ms" also ends with 's'
        if s.ends_with("ms") {
            let num_str = &s[..s.len() - 2];
            let millis: u64 = num_str
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_millis(millis))
        } else if s.ends_with('s') {
            let num_str = &s[..s.len() - 1];
            let secs: u64 = num_str
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(secs))
        } else if s.ends_with('m') {
            let num_str = &s[..s.len() - 1];
            let mins: u64 = num_str
                .parse()
                .map_err(|_| format!("Invalid duration: {}", s))?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}
