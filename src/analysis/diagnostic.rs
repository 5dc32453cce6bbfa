use crate::analysis::rule::ReviewRule;
use std::fmt;

/// Prefix shown in front of every finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCategory {
    Style,
    Documentation,
    Naming,
    Imports,
    Complexity,
    ControlFlow,
    Hygiene,
    Semantics,
    SyntaxError,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Style => "Style",
            RuleCategory::Documentation => "Documentation",
            RuleCategory::Naming => "Naming",
            RuleCategory::Imports => "Imports",
            RuleCategory::Complexity => "Complexity",
            RuleCategory::ControlFlow => "Control flow",
            RuleCategory::Hygiene => "Hygiene",
            RuleCategory::Semantics => "Semantics",
            RuleCategory::SyntaxError => "SyntaxError",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<usize>,
    pub category: RuleCategory,
    pub rule_id: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Append-only, ordered sink of findings. Identical findings are kept.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Records a finding attributed to `rule`
    pub fn report<R: ReviewRule + ?Sized>(
        &mut self,
        rule: &R,
        message: String,
        line: Option<usize>,
    ) {
        self.add(Diagnostic {
            message,
            line,
            category: rule.category(),
            rule_id: rule.id(),
        });
    }

    pub fn report_at<R: ReviewRule + ?Sized>(&mut self, rule: &R, line: usize, message: String) {
        self.report(rule, message, Some(line))
    }

    pub fn append(&mut self, other: &mut DiagnosticCollector) {
        self.diagnostics.append(&mut other.diagnostics);
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_category() {
        let diagnostic = Diagnostic {
            message: "Break outside loop at line 3.".to_string(),
            line: Some(3),
            category: RuleCategory::ControlFlow,
            rule_id: "break-outside-loop",
        };
        assert_eq!(
            diagnostic.to_string(),
            "Control flow: Break outside loop at line 3."
        );
    }

    #[test]
    fn test_collector_keeps_duplicates_in_order() {
        let first = Diagnostic {
            message: "Tab character at line 1.".to_string(),
            line: Some(1),
            category: RuleCategory::Style,
            rule_id: "tab-character",
        };
        let mut collector = DiagnosticCollector::new();
        collector.add(first.clone());
        collector.add(first.clone());

        let mut other = DiagnosticCollector::new();
        other.add(Diagnostic {
            line: Some(2),
            ..first.clone()
        });
        collector.append(&mut other);

        assert!(other.is_empty());
        let drained = collector.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[2].line, Some(2));
        assert!(collector.is_empty());
    }
}
