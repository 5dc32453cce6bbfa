//! Style conformance backends.
//!
//! The reviewer only consumes a problem count from these; individual
//! style findings are never surfaced.

use crate::config::{ReviewConfig, StyleBackend};
use log::{debug, warn};
use std::io::{self, Write};
use std::process::{Command, Stdio};

pub trait StyleChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Number of style problems found in `source`
    fn check(&self, source: &str) -> usize;
}

/// Builds the backend selected by `config.style`
pub fn checker_for(config: &ReviewConfig) -> Box<dyn StyleChecker> {
    match config.style.backend {
        StyleBackend::Builtin => Box::new(BuiltinStyleChecker::new(config)),
        StyleBackend::External => Box::new(ExternalStyleChecker::new(
            config.style.command.clone(),
            config.style.args.clone(),
        )),
    }
}

/// In-process subset of pycodestyle's physical-line checks:
/// E501, W191, E111, W291/W293, E702/E703 and E303.
#[derive(Debug, Clone)]
pub struct BuiltinStyleChecker {
    max_line_length: usize,
    indent_width: usize,
    max_blank_lines: usize,
}

impl BuiltinStyleChecker {
    pub fn new(config: &ReviewConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            indent_width: config.indent_width,
            max_blank_lines: config.max_blank_lines,
        }
    }
}

/// Bracket depth change and semicolon presence for the code part of a line
fn scan_code(line: &str) -> (isize, bool) {
    let mut depth = 0isize;
    let mut semicolon = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => break,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ';' => semicolon = true,
            _ => {}
        }
    }

    (depth, semicolon)
}

impl StyleChecker for BuiltinStyleChecker {
    fn name(&self) -> &str {
        "builtin"
    }

    fn check(&self, source: &str) -> usize {
        let mut problems = 0;
        let mut depth = 0isize;
        let mut blank_run = 0;
        let mut continued = false;

        for raw in source.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let stripped = line.trim();

            if line.chars().count() > self.max_line_length {
                problems += 1; // E501
            }
            if line != line.trim_end() {
                problems += 1; // W291 / W293
            }

            if stripped.is_empty() {
                blank_run += 1;
                continue;
            }
            if blank_run > self.max_blank_lines {
                problems += 1; // E303
            }
            blank_run = 0;

            let indent: String = line
                .chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect();
            let logical_start = depth <= 0 && !continued;
            if indent.contains('\t') {
                problems += 1; // W191
            } else if logical_start
                && !stripped.starts_with('#')
                && indent
                    .len()
                    .checked_rem(self.indent_width)
                    .is_some_and(|r| r != 0)
            {
                problems += 1; // E111
            }

            let (delta, semicolon) = scan_code(line);
            if semicolon {
                problems += 1; // E702 / E703
            }
            depth = (depth + delta).max(0);
            continued = line.trim_end().ends_with('\\');
        }

        debug!("builtin style checker counted {} problems", problems);
        problems
    }
}

/// Pipes the source into an external program and counts its output lines
#[derive(Debug, Clone)]
pub struct ExternalStyleChecker {
    command: String,
    args: Vec<String>,
}

impl ExternalStyleChecker {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    fn run(&self, source: &str) -> io::Result<usize> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("stdin not captured"))?;
        let input = source.to_string();
        // Early exit of the child shows up as a broken pipe here; its
        // output still counts.
        let writer = std::thread::spawn(move || {
            let _ = stdin.write_all(input.as_bytes());
        });

        let output = child.wait_with_output()?;
        let _ = writer.join();

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count())
    }
}

impl StyleChecker for ExternalStyleChecker {
    fn name(&self) -> &str {
        &self.command
    }

    fn check(&self, source: &str) -> usize {
        match self.run(source) {
            Ok(count) => {
                debug!("{} reported {} style problems", self.command, count);
                count
            }
            Err(err) => {
                warn!("style checker '{}' could not run: {}", self.command, err);
                0
            }
        }
    }
}

/// Fixed-count checker for tests
#[cfg(test)]
pub(crate) struct StubStyleChecker(pub usize);

#[cfg(test)]
impl StyleChecker for StubStyleChecker {
    fn name(&self) -> &str {
        "stub"
    }

    fn check(&self, _source: &str) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> BuiltinStyleChecker {
        BuiltinStyleChecker::new(&ReviewConfig::default())
    }

    #[test]
    fn test_clean_source_has_no_problems() {
        let source = "def f(a,\n      b):\n    return (a +\n            b)\n";
        assert_eq!(builtin().check(source), 0);
    }

    #[test]
    fn test_builtin_counts_each_problem() {
        assert_eq!(builtin().check(&"x".repeat(80)), 1);
        assert_eq!(builtin().check("x = 1 \n"), 1);
        assert_eq!(builtin().check("if x:\n   y = 1\n"), 1);
        assert_eq!(builtin().check("if x:\n\ty = 1\n"), 1);
        assert_eq!(builtin().check("a = 1; b = 2\n"), 1);
        assert_eq!(builtin().check("a = 1\n\n\n\nb = 2\n"), 1);
    }

    #[test]
    fn test_zero_indent_width_skips_indent_check() {
        let config = ReviewConfig {
            indent_width: 0,
            ..ReviewConfig::default()
        };
        assert_eq!(BuiltinStyleChecker::new(&config).check("if x:\n   y = 1\n"), 0);
    }

    #[test]
    fn test_semicolon_in_string_or_comment_ignored() {
        assert_eq!(builtin().check("s = ';'  # a; b\n"), 0);
    }

    #[test]
    fn test_checker_for_selects_backend() {
        let mut config = ReviewConfig::default();
        assert_eq!(checker_for(&config).name(), "builtin");
        config.style.backend = StyleBackend::External;
        assert_eq!(checker_for(&config).name(), "pycodestyle");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_counts_output_lines() {
        let checker = ExternalStyleChecker::new("cat".to_string(), Vec::new());
        assert_eq!(checker.check("one\n\ntwo\nthree\n"), 3);
    }

    #[test]
    fn test_missing_external_command_reports_zero() {
        let checker =
            ExternalStyleChecker::new("pyreview-no-such-checker".to_string(), Vec::new());
        assert_eq!(checker.check("x = 1\n"), 0);
    }
}
