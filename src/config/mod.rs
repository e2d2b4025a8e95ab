//! Configuration management for the TCI surface gateway
//!
//! The configuration file is YAML, or JSON when the file name ends in `.json`.
//! Mapping entries are only checked for syntax here; whether an entry makes
//! sense is decided when the dispatch table is built, so one bad entry never
//! prevents the gateway from starting.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::mapping::Mapping;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

/// Control surface ports
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Case-insensitive substring of the input port name
    #[serde(alias = "port_name")]
    pub input_port: String,
    /// Output port for indicators; the input port name when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_port: Option<String>,
    /// Raw MIDI messages (hex, whitespace allowed) sent once after connecting
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_sequence: Vec<String>,
}

/// Radio connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    #[serde(default = "default_radio_name")]
    pub name: String,
    /// Address of the radio's control server, shown in logs
    #[serde(default = "default_radio_address", alias = "tci_address")]
    pub address: String,
    /// Number of transceivers the radio provides
    #[serde(default = "default_trx_count")]
    pub trx_count: u8,
    /// Delay before the simulated radio confirms a command
    #[serde(default = "default_confirm_delay_ms")]
    pub confirm_delay_ms: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            name: default_radio_name(),
            address: default_radio_address(),
            trx_count: default_trx_count(),
            confirm_delay_ms: default_confirm_delay_ms(),
        }
    }
}

impl RadioConfig {
    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

impl MidiConfig {
    pub fn output_port(&self) -> &str {
        self.output_port.as_deref().unwrap_or(&self.input_port)
    }

    /// Decode the init sequence into raw messages
    pub fn init_messages(&self) -> Result<Vec<Vec<u8>>> {
        self.init_sequence
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = hex::decode(&compact)
                    .with_context(|| format!("init_sequence[{}] is not valid hex: '{}'", idx, line))?;
                if bytes.first().map_or(true, |status| *status < 0x80) {
                    anyhow::bail!("init_sequence[{}] does not start with a status byte", idx);
                }
                Ok(bytes)
            })
            .collect()
    }
}

impl AppConfig {
    /// Load and validate configuration from a YAML or JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents, is_json(path))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    fn parse(contents: &str, json: bool) -> Result<Self> {
        if json {
            Ok(serde_json::from_str(contents)?)
        } else {
            Ok(serde_yaml::from_str(contents)?)
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.trim().is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.output_port.as_deref().is_some_and(|p| p.trim().is_empty()) {
            anyhow::bail!("MIDI output_port cannot be empty when given");
        }
        self.midi.init_messages()?;

        if self.radio.trx_count == 0 {
            anyhow::bail!("radio.trx_count must be at least 1");
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn default_radio_name() -> String {
    "radio".to_string()
}
fn default_radio_address() -> String {
    "localhost:40001".to_string()
}
fn default_trx_count() -> u8 {
    2
}
fn default_confirm_delay_ms() -> u64 {
    20
}
