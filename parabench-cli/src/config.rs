//! Configuration loading from parabench.toml
//!
//! Harness defaults can be specified in a `parabench.toml` file, discovered
//! by walking up from the current directory. CLI flags always override file
//! values; the configuration is passed explicitly into the orchestrator so
//! nothing reads ambient global state.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parabench configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    /// Runner defaults
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Storage layout
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Defaults for benchmark execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Iteration count used when the CLI does not specify one
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Upper bound on concurrent workers; unset means the host's logical
    /// core count
    #[serde(default)]
    pub concurrency_cap: Option<usize>,
    /// Per-iteration timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            concurrency_cap: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_iterations() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    10
}

/// Where analysis records are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the record tree; must exist before the harness runs
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "target/parabench".to_string()
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Discover and load configuration by walking up from the current
    /// directory.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("parabench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as a TOML string.
    pub fn default_toml() -> String {
        r#"# Parabench Configuration

[runner]
# Iterations per benchmark run
iterations = 5
# Per-iteration timeout in seconds
timeout_secs = 10
# Upper bound on concurrent workers (uncomment to override the core count)
# concurrency_cap = 4

[storage]
# Root directory for analysis records
output_dir = "target/parabench"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.runner.iterations, 5);
        assert_eq!(config.runner.timeout_secs, 10);
        assert_eq!(config.runner.concurrency_cap, None);
        assert_eq!(config.storage.output_dir, "target/parabench");
    }

    #[test]
    fn test_parse_partial_toml_applies_defaults() {
        let toml_str = r#"
            [runner]
            iterations = 12
        "#;

        let config: HarnessConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.iterations, 12);
        // Defaults still apply to everything unspecified.
        assert_eq!(config.runner.timeout_secs, 10);
        assert_eq!(config.storage.output_dir, "target/parabench");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: HarnessConfig = toml::from_str(&HarnessConfig::default_toml()).unwrap();
        assert_eq!(config.runner.iterations, 5);
    }
}
