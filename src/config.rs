use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

// Report columns (0-based whitespace tokens) read from the node tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportColumns {
    pub depth_column: usize,         // Node Depth Summary: maximum depth
    pub max_inflow_column: usize,    // Node Inflow Summary: maximum total inflow
    pub inflow_volume_column: usize, // Node Inflow Summary: inflow volume
}

impl Default for ReportColumns {
    fn default() -> Self {
        ReportColumns {
            depth_column: 3,
            max_inflow_column: 3,
            inflow_volume_column: 6,
        }
    }
}

// Batch configuration. Every field has a default, so an empty file (or no file
// at all) reproduces the eleven-scenario study setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub base_dir: PathBuf,              // Folder holding <scenario>.inp / .rpt
    pub output_dir: Option<PathBuf>,    // Where tables go; base_dir when unset
    pub scenarios: Vec<String>,         // Scenario names, processed in this order
    pub unit_prefix: String,            // Keys carrying area/imperv/width/slope
    pub lot_prefixes: Vec<String>,      // Key codes classified as lots
    pub rainfall: BTreeMap<String, f64>, // Rainfall total per time series [mm]
    pub scenario_series: BTreeMap<String, String>, // Scenario -> time series
    pub report: ReportColumns,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        let rainfall = [
            ("TS1", 13.9), // 5 min
            ("TS2", 31.9), // 20 min
            ("TS3", 48.8), // 50 min
            ("TS4", 48.6), // 60 min
            ("TS5", 57.9), // 90 min
            ("TS6", 54.3), // 90 min
            ("TS7", 65.5), // 180 min
        ];
        let series = [
            "TS1", "TS2", "TS3", "TS4", "TS5", "TS6", "TS7", "TS7", "TS3", "TS5", "TS6",
        ];
        let scenarios: Vec<String> = (1..=series.len()).map(|i| format!("cenario_{i:02}")).collect();

        ExtractConfig {
            base_dir: PathBuf::from("cenarios"),
            output_dir: None,
            scenario_series: scenarios
                .iter()
                .cloned()
                .zip(series.iter().map(|s| s.to_string()))
                .collect(),
            scenarios,
            unit_prefix: "B".to_string(),
            lot_prefixes: ["B", "P", "E", "G", "S", "BL", "TS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rainfall: rainfall.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            report: ReportColumns::default(),
        }
    }
}

impl ExtractConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ExtractConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    // Loads `path` when given, otherwise the built-in study setup
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ExtractError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.unit_prefix.is_empty() {
            return Err(ExtractError::Config("unit_prefix must not be empty".into()));
        }
        for (series, total) in &self.rainfall {
            if !total.is_finite() || *total < 0.0 {
                return Err(ExtractError::Config(format!(
                    "rainfall for {series} must be a non-negative number, got {total}"
                )));
            }
        }
        for (scenario, series) in &self.scenario_series {
            if !self.rainfall.contains_key(series) {
                return Err(ExtractError::Config(format!(
                    "scenario {scenario} refers to unknown time series {series}"
                )));
            }
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.base_dir)
    }

    // Event rainfall of a scenario [mm], rounded to 2 decimals; 0 when unmapped
    pub fn rainfall_for(&self, scenario: &str) -> f64 {
        let total = self
            .scenario_series
            .get(scenario)
            .and_then(|series| self.rainfall.get(series))
            .copied()
            .unwrap_or(0.0);
        (total * 100.0).round() / 100.0
    }
}
