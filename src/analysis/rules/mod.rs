pub mod complexity;
pub mod control_flow;
pub mod documentation;
pub mod hygiene;
pub mod imports;
pub mod lexical;
pub mod naming;
pub mod semantics;
pub mod style_conformance;

use crate::analysis::context::AnalysisContext;
use crate::analysis::rule_registry::RuleRegistry;
use crate::parser::ast::{NodeId, NodeKind};
use crate::style::StyleChecker;

use complexity::*;
use control_flow::*;
use documentation::*;
use hygiene::*;
use imports::*;
use lexical::*;
use naming::*;
use semantics::*;
use style_conformance::*;

/// The full catalog in execution order
pub fn default_catalog(style: Box<dyn StyleChecker>) -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    registry.register(StyleConformanceRule::new(style));
    registry.register(MissingDocstringRule);
    registry.register(ClassNamingRule);
    registry.register(FunctionNamingRule);
    registry.register(VariableNamingRule);
    registry.register(ConstantNamingRule);
    registry.register(UnusedImportRule);
    registry.register(RedefinedBuiltinRule);
    registry.register(UnknownMagicMethodRule);
    registry.register(UnreachableCodeRule);
    registry.register(TooManyBranchesRule);
    registry.register(TooManyArgumentsRule);
    registry.register(NestedFunctionRule);
    registry.register(BreakOutsideLoopRule);
    registry.register(ContinueOutsideLoopRule);
    registry.register(RaiseWithoutExceptionRule);
    registry.register(ReturnOutsideFunctionRule);
    registry.register(GlobalUsageRule);
    registry.register(NonlocalUsageRule);
    registry.register(MutableDefaultRule);
    registry.register(PrintCallRule);
    registry.register(ExecUsageRule);
    registry.register(EvalUsageRule);
    registry.register(UnnecessaryPassRule);
    registry.register(EmptyCommentRule);
    registry.register(MagicNumberRule);
    registry.register(ConstantConditionRule);
    registry.register(TodoCommentRule);
    registry.register(LongLineRule);
    registry.register(MultipleImportsRule);
    registry.register(BadIndentationRule);
    registry.register(SemicolonRule);
    registry.register(TabCharacterRule);
    registry.register(TrailingWhitespaceRule);
    registry.register(MultipleStatementsRule);
    registry.register(TryWithoutExceptRule);
    registry.register(BareExceptRule);
    registry.register(LoopElseRule);
    registry.register(ExitCallRule);
    registry.register(LambdaUsageRule);
    registry.register(FormatCallRule);
    registry.register(MutableClassAttributeRule);
    registry.register(InconsistentReturnRule);
    registry.register(WildcardImportRule);
    registry.register(ConsecutiveBlankLinesRule);
    registry.register(LargeFunctionRule);

    registry
}

/// Calls whose callee is a bare name, as `(call, name)` in pre-order
pub(crate) fn name_calls<'a>(
    ctx: &AnalysisContext<'a>,
) -> impl Iterator<Item = (NodeId, &'a str)> + 'a {
    let tree = ctx.tree;
    ctx.nodes().filter_map(move |(id, kind)| {
        let NodeKind::Call { function, .. } = kind else {
            return None;
        };
        match tree.kind(*function) {
            NodeKind::NameReference { id: name, .. } => Some((id, name.as_str())),
            _ => None,
        }
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analysis::context::AnalysisContext;
    use crate::analysis::diagnostic::{Diagnostic, DiagnosticCollector};
    use crate::analysis::lines::SourceLines;
    use crate::analysis::linker::link;
    use crate::analysis::rule::ReviewRule;
    use crate::config::ReviewConfig;
    use crate::parser::parse;

    /// Runs one rule over `source` with default settings
    pub fn run_rule(rule: &dyn ReviewRule, source: &str) -> Vec<Diagnostic> {
        run_rule_with(rule, source, &ReviewConfig::default())
    }

    pub fn run_rule_with(
        rule: &dyn ReviewRule,
        source: &str,
        config: &ReviewConfig,
    ) -> Vec<Diagnostic> {
        let tree = parse(source).unwrap();
        let parents = link(&tree);
        let lines = SourceLines::new(source);
        let ctx = AnalysisContext::new(source, &tree, &parents, &lines, config);

        let mut out = DiagnosticCollector::new();
        rule.check(&ctx, &mut out);
        out.drain()
    }

    pub fn messages(rule: &dyn ReviewRule, source: &str) -> Vec<String> {
        run_rule(rule, source)
            .into_iter()
            .map(|d| d.message)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::StubStyleChecker;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_unique_ids() {
        let registry = default_catalog(Box::new(StubStyleChecker(0)));
        let ids: HashSet<&str> = registry.rules().iter().map(|r| r.id()).collect();
        assert_eq!(registry.len(), 46);
        assert_eq!(ids.len(), 46);
    }

    #[test]
    fn test_catalog_order() {
        let registry = default_catalog(Box::new(StubStyleChecker(0)));
        let ids: Vec<&str> = registry.rules().iter().map(|r| r.id()).collect();
        assert_eq!(ids[0], "style-conformance");
        assert_eq!(ids[1], "missing-docstring");
        assert_eq!(ids[9], "unreachable-code");
        assert_eq!(ids[45], "large-function");
        assert!(registry.get_rule("wildcard-import").is_some());
        assert!(registry.get_rule("empty-block").is_none());
    }
}
