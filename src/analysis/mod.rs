pub mod context;
pub mod diagnostic;
pub mod diagnostic_printer;
pub mod lines;
pub mod linker;
pub mod rule;
pub mod rule_registry;
pub mod rules;

use crate::ReviewError;
use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{Diagnostic, DiagnosticCollector, RuleCategory};
use crate::analysis::lines::SourceLines;
use crate::analysis::linker::link;
use crate::analysis::rule::ReviewRule;
use crate::analysis::rule_registry::RuleRegistry;
use crate::config::ReviewConfig;
use crate::parser::{ParseError, parse};
use crate::style::{StyleChecker, checker_for};
use log::{debug, trace, warn};
use rayon::prelude::*;
use std::time::Instant;

pub struct CodeReviewer {
    registry: RuleRegistry,
    config: ReviewConfig,
    pool: Option<rayon::ThreadPool>,
}

impl CodeReviewer {
    pub fn new() -> Self {
        let config = ReviewConfig::default();
        let style = checker_for(&config);
        Self::build(config, style)
    }

    /// Builds the full catalog with the style backend named by `config`
    pub fn with_config(config: ReviewConfig) -> Result<Self, ReviewError> {
        config.validate()?;
        let style = checker_for(&config);
        Ok(Self::build(config, style))
    }

    pub fn with_style(
        config: ReviewConfig,
        style: Box<dyn StyleChecker>,
    ) -> Result<Self, ReviewError> {
        config.validate()?;
        Ok(Self::build(config, style))
    }

    fn build(config: ReviewConfig, style: Box<dyn StyleChecker>) -> Self {
        debug!("using style backend '{}'", style.name());
        let registry = rules::default_catalog(style);

        // jobs == 0 means rayon's global pool
        let pool = if config.parallel && config.jobs > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.jobs)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!("could not build a pool of {} threads: {}", config.jobs, err);
                    None
                }
            }
        } else {
            None
        };

        Self {
            registry,
            config,
            pool,
        }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// The catalog in execution order
    pub fn list_rules(&self) -> &[Box<dyn ReviewRule>] {
        self.registry.rules()
    }

    pub fn rule(&self, rule_id: &str) -> Option<&dyn ReviewRule> {
        self.registry.get_rule(rule_id)
    }

    /// Reviews one source unit. Malformed input yields a single
    /// `SyntaxError` diagnostic and no rule runs.
    pub fn analyze(&self, source: &str) -> Vec<Diagnostic> {
        let tree = match parse(source) {
            Ok(tree) => tree,
            Err(err) => {
                debug!("parse failed: {}", err);
                return vec![syntax_error(&err)];
            }
        };
        debug!("parsed {} nodes", tree.len());

        let parents = link(&tree);
        let lines = SourceLines::new(source);
        let ctx = AnalysisContext::new(source, &tree, &parents, &lines, &self.config);

        self.run_all(&ctx)
    }

    /// Runs every rule once and concatenates the findings in catalog order
    pub fn run_all(&self, ctx: &AnalysisContext) -> Vec<Diagnostic> {
        let rules = self.registry.rules();

        let per_rule: Vec<DiagnosticCollector> = if self.config.parallel {
            match &self.pool {
                Some(pool) => pool.install(|| rules.par_iter().map(|r| run_rule(r.as_ref(), ctx)).collect()),
                None => rules.par_iter().map(|r| run_rule(r.as_ref(), ctx)).collect(),
            }
        } else {
            rules.iter().map(|r| run_rule(r.as_ref(), ctx)).collect()
        };

        let mut all = DiagnosticCollector::new();
        for mut found in per_rule {
            all.append(&mut found);
        }
        debug!(
            "{} rules produced {} diagnostics",
            self.registry.len(),
            all.len()
        );

        all.drain()
    }
}

impl Default for CodeReviewer {
    fn default() -> Self {
        Self::new()
    }
}

fn run_rule(rule: &dyn ReviewRule, ctx: &AnalysisContext) -> DiagnosticCollector {
    let start = Instant::now();
    let mut out = DiagnosticCollector::new();
    rule.check(ctx, &mut out);
    trace!(
        "rule {} found {} in {:?}",
        rule.id(),
        out.len(),
        start.elapsed()
    );
    out
}

fn syntax_error(err: &ParseError) -> Diagnostic {
    Diagnostic {
        message: err.to_string(),
        line: Some(err.line),
        category: RuleCategory::SyntaxError,
        rule_id: "syntax-error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StubStyleChecker;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
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

    fn reviewer(parallel: bool, style_count: usize) -> CodeReviewer {
        let config = ReviewConfig {
            parallel,
            ..ReviewConfig::default()
        };
        CodeReviewer::with_style(config, Box::new(StubStyleChecker(style_count))).unwrap()
    }

    fn rendered(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_clean_source_has_no_findings() {
        let source = r#""""Utilities."""


def add_one(value):
    """Return value plus one."""
    return value + 1


class Counter:
    """Counts things."""

    def __init__(self):
        """Start at zero."""
        self.count = 0
"#;
        assert_eq!(reviewer(false, 0).analyze(source), vec![]);
    }

    #[test]
    fn test_malformed_source_yields_one_diagnostic() {
        for source in ["def f(:\n    pass\n", "x = 'open\n", "if x:\npass\n"] {
            let found = reviewer(true, 3).analyze(source);
            assert_eq!(found.len(), 1, "{source:?}");
            assert_eq!(found[0].category, RuleCategory::SyntaxError);
            assert_eq!(found[0].rule_id, "syntax-error");
            assert!(found[0].line.is_some());
        }
    }

    #[test]
    fn test_syntax_error_display() {
        let found = reviewer(false, 0).analyze("x = 'open\n");
        assert_eq!(
            rendered(&found),
            vec!["SyntaxError: unterminated string literal (line 1)"]
        );
    }

    #[test]
    fn test_deterministic_and_parallel_matches_sequential() {
        let parallel = reviewer(true, 2);
        let first = parallel.analyze(SAMPLE);
        assert_eq!(first, parallel.analyze(SAMPLE));
        assert_eq!(first, reviewer(false, 2).analyze(SAMPLE));

        let pooled = CodeReviewer::with_style(
            ReviewConfig {
                jobs: 2,
                ..ReviewConfig::default()
            },
            Box::new(StubStyleChecker(2)),
        )
        .unwrap();
        assert_eq!(first, pooled.analyze(SAMPLE));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let zero_indent = ReviewConfig {
            indent_width: 0,
            ..ReviewConfig::default()
        };
        assert!(matches!(
            CodeReviewer::with_config(zero_indent.clone()),
            Err(ReviewError::InvalidConfig(_))
        ));
        assert!(CodeReviewer::with_style(zero_indent, Box::new(StubStyleChecker(0))).is_err());
    }

    #[test]
    fn test_rule_lookup() {
        let reviewer = reviewer(false, 0);
        let rule = reviewer.rule("bare-except").unwrap();
        assert_eq!(rule.category(), RuleCategory::Hygiene);
        assert!(reviewer.rule("no-such-rule").is_none());
    }

    #[test]
    fn test_deeply_nested_source_yields_one_diagnostic() {
        let source = format!("x = {}1{}\n", "(".repeat(20000), ")".repeat(20000));
        let found = reviewer(true, 0).analyze(&source);
        assert_eq!(
            rendered(&found),
            vec!["SyntaxError: too many nested parentheses (line 1)"]
        );

        let unary = format!("x = {}1\n", "-".repeat(20000));
        let found = reviewer(true, 0).analyze(&unary);
        assert_eq!(rendered(&found), vec!["SyntaxError: too deeply nested (line 1)"]);
    }

    #[test]
    fn test_decorated_definition_reports_keyword_line() {
        let source = "@decorator\ndef BadName():\n    \"\"\"Doc.\"\"\"\n";
        let found = reviewer(false, 0).analyze(source);
        let naming: Vec<&Diagnostic> = found
            .iter()
            .filter(|d| d.rule_id == "function-naming")
            .collect();
        assert_eq!(naming.len(), 1);
        assert_eq!(naming[0].line, Some(2));
    }

    #[test]
    fn test_output_follows_catalog_order() {
        let reviewer = reviewer(true, 1);
        let order: Vec<&str> = reviewer.list_rules().iter().map(|r| r.id()).collect();
        let found = reviewer.analyze(SAMPLE);

        let positions: Vec<usize> = found
            .iter()
            .map(|d| order.iter().position(|id| *id == d.rule_id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(found[0].to_string(), "Style: Style issues found.");
    }

    #[test]
    fn test_import_scenario() {
        let found = reviewer(false, 0).analyze("import math, os\n");
        assert_eq!(
            rendered(&found),
            vec![
                "Imports: Unused import 'math'.",
                "Imports: Unused import 'os'.",
                "Imports: Multiple imports on one line at line 1.",
            ]
        );
    }

    #[test]
    fn test_mutable_default_scenario() {
        let ids = |source: &str| -> Vec<&'static str> {
            reviewer(false, 0)
                .analyze(source)
                .into_iter()
                .map(|d| d.rule_id)
                .collect()
        };
        let flagged = ids("def f(x=[]):\n    \"\"\"Doc.\"\"\"\n    return x\n");
        assert_eq!(flagged.iter().filter(|id| **id == "mutable-default").count(), 1);
        assert!(!ids("def f(x=0):\n    \"\"\"Doc.\"\"\"\n    return x\n").contains(&"mutable-default"));
    }

    #[test]
    fn test_sample_program_findings() {
        let found = rendered(&reviewer(false, 1).analyze(SAMPLE));
        for expected in [
            "Style: Style issues found.",
            "Documentation: Missing docstring in class 'testClass'.",
            "Naming: Class 'testClass' naming style.",
            "Naming: Function 'BAR' naming style.",
            "Naming: Function 'bigFunc' naming style.",
            "Imports: Unused import 'math'.",
            "Imports: Unused import 'os'.",
            "Control flow: Unreachable code after return in line 13.",
            "Complexity: Function 'bigFunc' has too many args (6).",
            "Hygiene: Eval usage at line 10.",
            "Hygiene: Catch-all except at line 14.",
            "Semantics: Magic number '42' at line 18.",
            "Semantics: Boolean literal if at line 22.",
            "Style: Semicolon at line 9.",
            "Imports: Multiple imports on one line at line 2.",
        ] {
            assert!(found.iter().any(|d| d == expected), "missing {expected:?}");
        }
    }
}
