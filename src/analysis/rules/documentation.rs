use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::NodeKind;

// Functions and classes must open with a non-empty docstring
pub struct MissingDocstringRule;

impl ReviewRule for MissingDocstringRule {
    fn id(&self) -> &'static str {
        "missing-docstring"
    }

    fn description(&self) -> &'static str {
        "Checks that every function and class has a docstring"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Documentation
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let (what, name, body) = match kind {
                NodeKind::FunctionDefinition { name, body, .. } => ("function", name, body),
                NodeKind::ClassDefinition { name, body, .. } => ("class", name, body),
                _ => continue,
            };

            let documented = ctx
                .tree
                .docstring(body)
                .is_some_and(|text| !text.trim().is_empty());
            if !documented {
                out.report(
                    self,
                    format!("Missing docstring in {} '{}'.", what, name),
                    Some(ctx.line(id)),
                );
            }
        }
    }
}
