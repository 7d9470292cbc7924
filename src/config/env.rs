use super::SimStreamConfig;
use std::path::PathBuf;
use tracing::warn;

/// Path of the TOML config file; defaults apply when unset
pub const CONFIG_PATH_VAR: &str = "SIM_STREAM_CONFIG";

/// Apply environment overrides on top of a loaded configuration.
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(config: &mut SimStreamConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(config: &mut SimStreamConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("PORT") {
        match v.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %v, "Ignoring invalid PORT"),
        }
    }
    if let Some(v) = var("SIM_STREAM_SCENARIOS") {
        config.simulation.scenarios_file = PathBuf::from(v);
    }
    if let Some(v) = var("SIM_STREAM_DELAY_MS") {
        match v.parse::<u64>() {
            Ok(ms) => config.simulation.default_delay_ms = ms,
            Err(_) => warn!(value = %v, "Ignoring invalid SIM_STREAM_DELAY_MS"),
        }
    }
    if let Some(v) = var("SIM_STREAM_ENGINE_ARGS") {
        config.engine.extra_args = v.split_whitespace().map(str::to_string).collect();
    }
}
