use thiserror::Error;

mod lexer;
mod parser;
mod analysis;
pub mod config;
pub mod style;

pub use analysis::CodeReviewer;
pub use analysis::diagnostic::{Diagnostic, RuleCategory};
pub use analysis::diagnostic_printer::DiagnosticPrinter;
pub use analysis::rule::ReviewRule;
pub use config::ReviewConfig;
pub use parser::ParseError;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reviews `source` with the default thresholds and built-in style checks
pub fn analyze(source: &str) -> Vec<Diagnostic> {
    CodeReviewer::new().analyze(source)
}
