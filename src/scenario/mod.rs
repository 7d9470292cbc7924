use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;


/// Scenario lookup and registration errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario '{0}' not found")]
    NotFound(String),

    #[error("scenario '{0}' has no lane map")]
    NoLaneMap(String),

    #[error("invalid scenario configuration {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },
}

/// Lane id to row index of the lane distribution matrix
pub type LaneMap = HashMap<String, usize>;

/// What backs a scenario's frames, decided once at registration
#[derive(Clone, Debug, PartialEq)]
pub enum ScenarioBacking {
    /// Drives an external engine with this configuration file
    Live { config_file: PathBuf },
    /// Replays recorded logs
    Recorded {
        trajectory_file: PathBuf,
        lane_file: Option<PathBuf>,
    },
}

/// A registered scenario
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    /// Stable kebab-case key
    pub key: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub backing: ScenarioBacking,
    /// Which lane each row of `lane_distributions` describes
    pub lane_map: Option<LaneMap>,
}

impl Scenario {
    pub fn is_live(&self) -> bool {
        matches!(self.backing, ScenarioBacking::Live { .. })
    }

    /// Single live scenario for a user-supplied engine configuration
    pub fn from_configuration_file(config_file: &Path) -> Self {
        let name = config_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config_file.display().to_string());
        Self {
            key: to_kebab_case(&name),
            display_name: name,
            description: Some("User-specified scenario".to_string()),
            is_default: true,
            backing: ScenarioBacking::Live {
                config_file: config_file.to_path_buf(),
            },
            lane_map: None,
        }
    }
}

/// Entry of the scenarios file
#[derive(Debug, Deserialize)]
struct ScenarioEntry {
    name: String,
    config_file: PathBuf,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    fcd_file: Option<PathBuf>,
    #[serde(default)]
    lane_distr_file: Option<PathBuf>,
    #[serde(default)]
    lanemap_file: Option<PathBuf>,
}

/// Listing row returned to clients
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioSummary {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "kebabCase")]
    pub kebab_case: String,
}

/// All scenarios known to the server, keyed by kebab-case name
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: HashMap<String, Scenario>,
    /// Registration order, for stable listings
    order: Vec<String>,
    default_key: String,
}

impl ScenarioRegistry {
    /// Build a registry from already-constructed scenarios
    pub fn from_scenarios(scenarios: Vec<Scenario>, source: &Path) -> Result<Self, ScenarioError> {
        let invalid = |reason: String| ScenarioError::ConfigParse {
            path: source.to_path_buf(),
            reason,
        };

        if scenarios.is_empty() {
            return Err(invalid("no scenarios defined".to_string()));
        }

        let mut map = HashMap::new();
        let mut order = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            if map.contains_key(&scenario.key) {
                return Err(invalid(format!(
                    "two scenarios share the kebab-case name '{}'",
                    scenario.key
                )));
            }
            order.push(scenario.key.clone());
            map.insert(scenario.key.clone(), scenario);
        }

        let defaults: Vec<&String> = order.iter().filter(|k| map[*k].is_default).collect();
        let default_key = match defaults.as_slice() {
            [] => order[0].clone(),
            [key] => (*key).clone(),
            many => {
                let names: Vec<&str> = many.iter().map(|k| k.as_str()).collect();
                return Err(invalid(format!(
                    "multiple scenarios marked default: {}",
                    names.join(", ")
                )));
            }
        };

        Ok(Self {
            scenarios: map,
            order,
            default_key,
        })
    }

    /// Registry holding only the user-supplied engine configuration
    pub fn from_configuration_file(config_file: &Path) -> Result<Self, ScenarioError> {
        if !config_file.is_file() {
            return Err(ScenarioError::ConfigParse {
                path: config_file.to_path_buf(),
                reason: "configuration file does not exist".to_string(),
            });
        }
        Self::from_scenarios(vec![Scenario::from_configuration_file(config_file)], config_file)
    }

    /// Load the scenarios file. Relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let invalid = |reason: String| ScenarioError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let entries: Vec<ScenarioEntry> =
            serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let scenarios = entries
            .into_iter()
            .map(|entry| entry.into_scenario(base))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;

        let registry = Self::from_scenarios(scenarios, path)?;
        info!(
            path = %path.display(),
            scenarios = registry.len(),
            default = %registry.default_key,
            "Scenario registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Result<&Scenario, ScenarioError> {
        self.scenarios
            .get(key)
            .ok_or_else(|| ScenarioError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scenarios.contains_key(key)
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Scenarios in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.order.iter().map(|key| &self.scenarios[key])
    }

    pub fn summaries(&self) -> Vec<ScenarioSummary> {
        self.iter()
            .map(|s| ScenarioSummary {
                display_name: s.display_name.clone(),
                kebab_case: s.key.clone(),
            })
            .collect()
    }
}

impl ScenarioEntry {
    fn into_scenario(self, base: &Path) -> Result<Scenario, String> {
        let name = &self.name;
        let existing = |label: &str, path: &Path| -> Result<PathBuf, String> {
            let resolved = expand_path(base, path);
            if resolved.is_file() {
                Ok(resolved)
            } else {
                Err(format!(
                    "scenario '{}': {} {} does not exist",
                    name,
                    label,
                    resolved.display()
                ))
            }
        };

        let backing = match &self.fcd_file {
            Some(fcd) => ScenarioBacking::Recorded {
                trajectory_file: existing("trajectory file", fcd)?,
                lane_file: self
                    .lane_distr_file
                    .as_deref()
                    .map(|p| existing("lane distribution file", p))
                    .transpose()?,
            },
            None => ScenarioBacking::Live {
                config_file: existing("config file", &self.config_file)?,
            },
        };

        let lane_map = self
            .lanemap_file
            .as_deref()
            .map(|p| {
                let path = existing("lane map file", p)?;
                read_lane_map(&path).map_err(|e| format!("scenario '{}': {}", name, e))
            })
            .transpose()?;

        Ok(Scenario {
            key: to_kebab_case(&self.name),
            display_name: self.name,
            description: self.description,
            is_default: self.is_default,
            backing,
            lane_map,
        })
    }
}

/// Parse a lane map file: one JSON object of lane id to row index
fn read_lane_map(path: &Path) -> Result<LaneMap, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read lane map {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("invalid lane map {}: {}", path.display(), e))
}

/// Lowercase, with spaces and underscores turned into dashes
pub fn to_kebab_case(name: &str) -> String {
    name.to_lowercase().replace([' ', '_'], "-")
}

fn expand_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        None => path.to_path_buf(),
    };
    base.join(expanded)
}
