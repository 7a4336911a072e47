use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ranking::Locatable;
use crate::ConfigError;

/// A diagnostic lab or collection centre from the lab directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Test package names offered at this lab.
    #[serde(default)]
    pub tests: Vec<String>,
}

impl Locatable for Lab {
    fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    fn longitude(&self) -> Option<f64> {
        self.longitude
    }
}

#[derive(Debug, Deserialize)]
pub struct LabsFile {
    pub labs: Vec<Lab>,
}

/// Load and validate the lab directory from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_labs(path: &Path) -> Result<LabsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LabsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_labs(&content)
}

/// Parse and validate lab directory YAML that is already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_labs(content: &str) -> Result<LabsFile, ConfigError> {
    let labs_file: LabsFile = serde_yaml::from_str(content).map_err(ConfigError::LabsFileParse)?;
    validate_labs(&labs_file)?;
    Ok(labs_file)
}

fn validate_labs(labs_file: &LabsFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for lab in &labs_file.labs {
        if lab.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "lab id must be non-empty".to_string(),
            ));
        }

        if lab.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "lab '{}' must have a non-empty name",
                lab.id
            )));
        }

        if !seen_ids.insert(lab.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate lab id '{}'",
                lab.id
            )));
        }

        match (lab.latitude, lab.longitude) {
            (Some(lat), Some(lng)) => {
                crate::geo::Coordinate::new(lat, lng).map_err(|e| {
                    ConfigError::Validation(format!("lab '{}' has invalid coordinates: {e}", lab.id))
                })?;
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "lab '{}' must set both latitude and longitude or neither",
                    lab.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "labs_test.rs"]
mod tests;
