//! pyreview CLI
//!
//! Reviews Python files (or stdin) and prints one finding per line.

use clap::Parser;
use colored::Colorize;
use log::debug;
use pyreview::config::StyleBackend;
use pyreview::{CodeReviewer, DiagnosticPrinter, ReviewConfig, ReviewError, ReviewRule};
use std::io::Read;
use std::path::PathBuf;

const DEMO_SOURCE: &str = r#"
import math, os

class testClass:
    def __init__(self):
        pass

def foo():
  print("hello");print("world")
  eval("1+1")
  try:
    return
    print("unreachable")
  except:
    pass

def BAR():
    TODO = 42
    pass

def bigFunc(a, b, c, d, e, f):
    if True:
        pass

"#;

#[derive(Parser)]
#[command(
    name = "pyreview",
    version,
    about = "Rule-based reviewer for Python source",
    long_about = "Parses Python source and runs a fixed catalog of 46 review rules over it."
)]
struct Cli {
    /// Files to review (`-` reads stdin)
    files: Vec<String>,

    /// Review the bundled sample program
    #[arg(long)]
    demo: bool,

    /// Configuration file path (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use an external style checker command instead of the built-in one
    #[arg(long, value_name = "COMMAND")]
    external_style: Option<String>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Run rules one after another on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Show details about one rule and exit
    #[arg(long, value_name = "RULE")]
    explain: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<ReviewConfig, ReviewError> {
    let mut config = match &cli.config {
        Some(path) => ReviewConfig::load(path)?,
        None => ReviewConfig::default(),
    };

    if let Some(command) = &cli.external_style {
        config.style.backend = StyleBackend::External;
        config.style.command = command.clone();
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    if cli.sequential {
        config.parallel = false;
    }

    Ok(config)
}

fn read_source(name: &str) -> Result<String, ReviewError> {
    if name == "-" {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        Ok(std::fs::read_to_string(name)?)
    }
}

fn explain_rule(rule: &dyn ReviewRule) {
    println!("  {}: {}", "ID".bold(), rule.id().cyan());
    println!("  {}: {}", "Category".bold(), rule.category());
    println!();
    println!("  {}", rule.description());
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let reviewer = match load_config(&cli).and_then(CodeReviewer::with_config) {
        Ok(reviewer) => reviewer,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(2);
        }
    };

    if cli.list_rules {
        for rule in reviewer.list_rules() {
            println!(
                "{:<26} {:<14} {}",
                rule.id(),
                rule.category().as_str(),
                rule.description()
            );
        }
        return;
    }

    if let Some(rule_id) = &cli.explain {
        match reviewer.rule(rule_id) {
            Some(rule) => explain_rule(rule),
            None => {
                eprintln!("{} rule '{}' not found", "error:".red().bold(), rule_id);
                eprintln!("Use {} to see all available rules", "--list-rules".cyan());
                std::process::exit(2);
            }
        }
        return;
    }

    let mut inputs: Vec<(String, String)> = Vec::new();
    if cli.demo {
        inputs.push(("<demo>".to_string(), DEMO_SOURCE.to_string()));
    }
    for name in &cli.files {
        match read_source(name) {
            Ok(source) => inputs.push((name.clone(), source)),
            Err(err) => {
                eprintln!("{} {}: {}", "error:".red().bold(), name, err);
                std::process::exit(2);
            }
        }
    }

    if inputs.is_empty() {
        eprintln!(
            "{} no input files (pass files, `-` for stdin, or --demo)",
            "error:".red().bold()
        );
        std::process::exit(2);
    }

    let use_colors = !cli.no_color;
    let mut total = 0;
    for (name, source) in &inputs {
        let diagnostics = reviewer.analyze(source);
        debug!("{}: {} findings", name, diagnostics.len());
        total += diagnostics.len();

        let printer = DiagnosticPrinter::new(name.as_str(), use_colors);
        printer.print_errors(&diagnostics);
    }

    if cli.verbose {
        eprintln!("{} findings in {} input(s)", total, inputs.len());
    }

    if total > 0 {
        std::process::exit(1);
    }
}
