//! Configuration management
//!
//! Defaults are compiled in. `Config::load` layers an optional TOML file and
//! `CALLCORE__<SECTION>__<KEY>` environment variables on top of them.

use crate::domain::shared::error::CallError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub admission: AdmissionConfig,
    pub conference: ConferenceConfig,
    pub numbers: NumberConfig,
    pub logging: LoggingConfig,
}

/// Call-count ceilings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub max_call_count: usize,
    pub max_ringing_calls: usize,
    pub max_active_calls: usize,
    /// Number of SIM slots; carrier calls must use a slot below this
    pub slot_count: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceConfig {
    pub cs_max_sub_calls: usize,
    pub ims_max_sub_calls: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberConfig {
    pub max_number_len: usize,
    pub max_reject_message_len: usize,
    pub emergency_numbers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_call_count: 6,
            max_ringing_calls: 2,
            max_active_calls: 2,
            slot_count: 2,
        }
    }
}

impl Default for ConferenceConfig {
    fn default() -> Self {
        Self {
            cs_max_sub_calls: 5,
            ims_max_sub_calls: 5,
        }
    }
}

impl Default for NumberConfig {
    fn default() -> Self {
        Self {
            max_number_len: 255,
            max_reject_message_len: 300,
            emergency_numbers: ["112", "911", "000", "08", "110", "118", "119", "999"]
                .iter()
                .map(|n| n.to_string())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix("CALLCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config
            .validate()
            .map_err(|err| ::config::ConfigError::Message(err.to_string()))?;
        Ok(config)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn validate(&self) -> Result<(), CallError> {
        if self.admission.max_call_count == 0 {
            return Err(CallError::InvalidArgument(
                "admission.max_call_count must be at least 1".to_string(),
            ));
        }
        if self.admission.slot_count == 0 {
            return Err(CallError::InvalidArgument(
                "admission.slot_count must be at least 1".to_string(),
            ));
        }
        if self.numbers.max_number_len == 0 {
            return Err(CallError::InvalidArgument(
                "numbers.max_number_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
