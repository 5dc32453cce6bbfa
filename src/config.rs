//! Review thresholds and execution settings.
//!
//! Every rule always runs; configuration only tunes the numeric limits
//! some rules compare against and how the catalog is executed.

use crate::ReviewError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which style checker backs the `style-conformance` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleBackend {
    #[default]
    Builtin,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub backend: StyleBackend,

    /// Program run by the external backend
    pub command: String,

    /// Arguments; the source is written to stdin
    pub args: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            backend: StyleBackend::Builtin,
            command: "pycodestyle".to_string(),
            args: vec!["-".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Longest allowed physical line, in characters
    pub max_line_length: usize,

    /// Branching statements allowed inside one function
    pub max_branches: usize,

    /// Positional parameters allowed on one function
    pub max_arguments: usize,

    /// Direct body statements allowed in one function
    pub max_function_statements: usize,

    /// Blank lines allowed in a row
    pub max_blank_lines: usize,

    pub indent_width: usize,

    /// Run the catalog on the rayon pool
    pub parallel: bool,

    /// Worker threads (0 = rayon default)
    pub jobs: usize,

    pub style: StyleConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_line_length: 79,
            max_branches: 10,
            max_arguments: 5,
            max_function_statements: 50,
            max_blank_lines: 2,
            indent_width: 4,
            parallel: true,
            jobs: 0,
            style: StyleConfig::default(),
        }
    }
}

impl ReviewConfig {
    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, ReviewError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ReviewError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        let thresholds = [
            ("max_line_length", self.max_line_length),
            ("max_branches", self.max_branches),
            ("max_arguments", self.max_arguments),
            ("max_function_statements", self.max_function_statements),
            ("indent_width", self.indent_width),
        ];
        for (name, value) in thresholds {
            if value == 0 {
                return Err(ReviewError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if self.style.backend == StyleBackend::External && self.style.command.trim().is_empty() {
            return Err(ReviewError::InvalidConfig(
                "style.command must not be empty for the external backend".to_string(),
            ));
        }

        Ok(())
    }
}
