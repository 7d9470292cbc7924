pub mod env;
pub use env::{apply_env_overrides, CONFIG_PATH_VAR};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Complete streamer configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimStreamConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// HTTP / websocket listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Scenario selection and tick pacing
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Delay between ticks for new sessions (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,

    /// Scenario registry file
    #[serde(default = "default_scenarios_file")]
    pub scenarios_file: PathBuf,

    /// Run a single engine configuration instead of the registry
    #[serde(default)]
    pub configuration_file: Option<PathBuf>,
}

fn default_delay_ms() -> u64 {
    30
}

fn default_scenarios_file() -> PathBuf {
    PathBuf::from("scenarios/scenarios.json")
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            scenarios_file: default_scenarios_file(),
            configuration_file: None,
        }
    }
}

/// External simulation engine launch settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Run the GUI build of the engine (binary name gets a `-gui` suffix)
    #[serde(default)]
    pub gui: bool,

    /// Extra arguments appended to the engine command line
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_binary() -> String {
    "sumo".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            gui: false,
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn binary_name(&self) -> String {
        if self.gui {
            format!("{}-gui", self.binary)
        } else {
            self.binary.clone()
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<SimStreamConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
