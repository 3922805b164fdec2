//! JSON run configuration, single or batch.

use std::path::{Path, PathBuf};

use congen_core::SetPartitionParams;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Mps,
    Random,
}

/// Parameters for a generated set-partitioning instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomInstanceConfig {
    #[serde(flatten)]
    pub params: SetPartitionParams,
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_instance_name() -> String {
    "random".into()
}

impl Default for RandomInstanceConfig {
    fn default() -> Self {
        Self {
            params: SetPartitionParams::default(),
            instance_name: default_instance_name(),
        }
    }
}

impl RandomInstanceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.params.n_sets == 0 {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.n_sets",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.params.n_elements == 0 {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.n_elements",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.params.min_set_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.min_set_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.params.max_set_size < self.params.min_set_size {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.max_set_size",
                reason: "must be >= min_set_size".to_string(),
            });
        }
        if self.params.max_cost < self.params.min_cost {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.max_cost",
                reason: "must be >= min_cost".to_string(),
            });
        }
        if self.instance_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "random_instance.instance_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// One problem instance to solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input_type: InputType,
    pub sample_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file_path: Option<PathBuf>,
    #[serde(default)]
    pub random_instance: Option<RandomInstanceConfig>,
}

impl RunConfig {
    /// Validate values and, for MPS input, that the instance file exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sample_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        match self.input_type {
            InputType::Mps => {
                let path = self
                    .input_file_path
                    .as_ref()
                    .ok_or(ConfigError::MissingField("input_file_path"))?;
                if !path.exists() {
                    return Err(ConfigError::InvalidValue {
                        field: "input_file_path",
                        reason: format!("input file not found: {}", path.display()),
                    });
                }
            }
            InputType::Random => {}
        }
        if let Some(random) = &self.random_instance {
            random.validate()?;
        }
        Ok(())
    }

    /// Generator parameters, falling back to the defaults when none are configured
    pub fn random_instance_or_default(&self) -> RandomInstanceConfig {
        self.random_instance.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub batch_name: Option<String>,
    pub configs: Vec<RunConfig>,
}

impl BatchConfig {
    /// Directory name for this batch, `stamp` identifying the invocation
    pub fn batch_dir(&self, stamp: &str) -> String {
        match &self.batch_name {
            Some(name) => format!("batch_{}_{}", name, stamp),
            None => format!("batch_{}", stamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Config {
    Single(RunConfig),
    Batch(BatchConfig),
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// A top-level `configs` array selects batch mode.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_json(&content, path)
    }

    /// Parse and validate configuration text; `path` is used for diagnostics.
    pub fn parse_json(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let json_err = |source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        };
        let value: serde_json::Value = serde_json::from_str(content).map_err(json_err)?;

        let config = match value.get("configs") {
            Some(configs) => {
                let Some(runs) = configs.as_array() else {
                    return Err(ConfigError::InvalidValue {
                        field: "configs",
                        reason: "must be a list".to_string(),
                    });
                };
                runs.iter().try_for_each(check_required)?;
                Config::Batch(serde_json::from_value(value).map_err(json_err)?)
            }
            None => {
                check_required(&value)?;
                Config::Single(serde_json::from_value(value).map_err(json_err)?)
            }
        };

        config.runs().iter().try_for_each(RunConfig::validate)?;
        Ok(config)
    }

    pub fn runs(&self) -> &[RunConfig] {
        match self {
            Config::Single(run) => std::slice::from_ref(run),
            Config::Batch(batch) => &batch.configs,
        }
    }
}

fn check_required(value: &serde_json::Value) -> Result<(), ConfigError> {
    for field in ["input_type", "sample_size"] {
        if value.get(field).is_none() {
            return Err(ConfigError::MissingField(field));
        }
    }
    Ok(())
}
