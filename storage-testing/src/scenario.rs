use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storage_tracker::TrackerConfig;
use storage_types::{Disk, LifecycleEvent, StorageEvent, Volume};

use crate::errors::{Result, TestingError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default = "default_available")]
    pub source_available: bool,
    #[serde(default)]
    pub expect_start_failure: bool,
    /// Inventory the source reports when the tracker starts
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Events delivered after the tracker started, in order
    #[serde(default)]
    pub steps: Vec<StorageEvent>,
    #[serde(default)]
    pub expected: Vec<LifecycleEvent>,
    /// Ids of placeholder volumes left once all steps ran
    #[serde(default)]
    pub expected_placeholders: Option<Vec<String>>,
}

fn default_available() -> bool {
    true
}

pub fn workspace_root() -> PathBuf {
    if let Ok(value) = std::env::var("STORAGE_TESTING_WORKSPACE_ROOT") {
        return PathBuf::from(value);
    }

    if let Ok(current_dir) = std::env::current_dir()
        && current_dir.join("resources/scenarios").exists()
    {
        return current_dir;
    }

    let manifest_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if manifest_root.join("resources/scenarios").exists() {
        return manifest_root;
    }

    PathBuf::from(".")
}

pub fn scenarios_root() -> PathBuf {
    workspace_root().join("resources/scenarios")
}

pub fn scenario_path_for_name(scenario_name: &str) -> PathBuf {
    scenarios_root().join(format!("{}.toml", scenario_name))
}

/// Names of all bundled scenarios, sorted.
pub fn list_names() -> Result<Vec<String>> {
    let root = scenarios_root();
    let entries = fs::read_dir(&root).map_err(|error| TestingError::ScenarioIo {
        path: root.clone(),
        reason: error.to_string(),
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    Ok(names)
}

pub fn load_by_name(scenario_name: &str) -> Result<Scenario> {
    let path = scenario_path_for_name(scenario_name);
    if !path.exists() {
        return Err(TestingError::ScenarioNotFound {
            scenario_name: scenario_name.to_string(),
        });
    }

    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Scenario> {
    let label = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|error| TestingError::ScenarioIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    parse(&raw, &label)
}

pub fn parse(raw: &str, label: &str) -> Result<Scenario> {
    let scenario: Scenario = toml::from_str(raw).map_err(|error| TestingError::ScenarioInvalid {
        scenario_name: label.to_string(),
        reason: error.to_string(),
    })?;

    validate(&scenario)?;
    Ok(scenario)
}

pub fn validate(scenario: &Scenario) -> Result<()> {
    if scenario.name.trim().is_empty() {
        return Err(TestingError::ScenarioInvalid {
            scenario_name: "<unknown>".to_string(),
            reason: "name must not be empty".to_string(),
        });
    }

    if scenario.expect_start_failure && !scenario.expected.is_empty() {
        return Err(TestingError::ScenarioInvalid {
            scenario_name: scenario.name.clone(),
            reason: "a scenario expecting start failure cannot expect lifecycle events"
                .to_string(),
        });
    }

    if scenario.expect_start_failure && scenario.source_available {
        return Err(TestingError::ScenarioInvalid {
            scenario_name: scenario.name.clone(),
            reason: "start can only fail when source_available = false".to_string(),
        });
    }

    if scenario.steps.is_empty() && scenario.expected_placeholders.is_none() {
        return Err(TestingError::ScenarioInvalid {
            scenario_name: scenario.name.clone(),
            reason: "steps must not be empty".to_string(),
        });
    }

    Ok(())
}
