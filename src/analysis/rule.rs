use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};

pub trait ReviewRule: Send + Sync {
    // Unique identifier for this rule
    fn id(&self) -> &'static str;

    // Short description of what this rule checks
    fn description(&self) -> &'static str;

    // Prefix of every finding the rule emits
    fn category(&self) -> RuleCategory;

    // Reads the shared snapshot and appends findings to `out`
    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector);
}
