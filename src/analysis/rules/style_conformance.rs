use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::style::StyleChecker;
use log::debug;

// Folds the style checker's problem count into one finding
pub struct StyleConformanceRule {
    checker: Box<dyn StyleChecker>,
}

impl StyleConformanceRule {
    pub fn new(checker: Box<dyn StyleChecker>) -> Self {
        Self { checker }
    }
}

impl ReviewRule for StyleConformanceRule {
    fn id(&self) -> &'static str {
        "style-conformance"
    }

    fn description(&self) -> &'static str {
        "Runs the configured style checker and reports when it finds problems"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        let count = self.checker.check(ctx.source);
        debug!("style checker '{}' returned {}", self.checker.name(), count);

        if count > 0 {
            out.report(self, "Style issues found.".to_string(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rules::test_support::run_rule;
    use crate::style::StubStyleChecker;

    #[test]
    fn test_reports_once_regardless_of_count() {
        let rule = StyleConformanceRule::new(Box::new(StubStyleChecker(17)));
        let found = run_rule(&rule, "x = 1\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_string(), "Style: Style issues found.");
        assert_eq!(found[0].line, None);
    }

    #[test]
    fn test_silent_when_clean() {
        let rule = StyleConformanceRule::new(Box::new(StubStyleChecker(0)));
        assert!(run_rule(&rule, "x = 1\n").is_empty());
    }
}
