use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::{NodeKind, ParameterKind};

// Counts If/For/While/Try anywhere below a function, nested defs included
pub struct TooManyBranchesRule;

impl ReviewRule for TooManyBranchesRule {
    fn id(&self) -> &'static str {
        "too-many-branches"
    }

    fn description(&self) -> &'static str {
        "Flags functions with too many branching statements"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::FunctionDefinition { name, .. } = kind else {
                continue;
            };

            let branches = ctx
                .tree
                .descendants(id)
                .filter(|d| ctx.tree.kind(*d).is_branch())
                .count();
            if branches > ctx.config.max_branches {
                out.report(
                    self,
                    format!("Too many branches ({}) in function '{}'.", branches, name),
                    Some(ctx.line(id)),
                );
            }
        }
    }
}

pub struct TooManyArgumentsRule;

impl ReviewRule for TooManyArgumentsRule {
    fn id(&self) -> &'static str {
        "too-many-arguments"
    }

    fn description(&self) -> &'static str {
        "Flags functions with too many positional parameters"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::FunctionDefinition {
                name, parameters, ..
            } = kind
            else {
                continue;
            };

            let positional = parameters
                .iter()
                .filter(|p| {
                    matches!(
                        p.kind,
                        ParameterKind::PositionalOnly | ParameterKind::Positional
                    )
                })
                .count();
            if positional > ctx.config.max_arguments {
                out.report(
                    self,
                    format!("Function '{}' has too many args ({}).", name, positional),
                    Some(ctx.line(id)),
                );
            }
        }
    }
}

// Only defs sitting directly in another def's body
pub struct NestedFunctionRule;

impl ReviewRule for NestedFunctionRule {
    fn id(&self) -> &'static str {
        "nested-function"
    }

    fn description(&self) -> &'static str {
        "Flags functions defined directly inside another function"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (_, kind) in ctx.nodes() {
            let NodeKind::FunctionDefinition {
                name: outer, body, ..
            } = kind
            else {
                continue;
            };

            for statement in body {
                if let NodeKind::FunctionDefinition { name: inner, .. } = ctx.tree.kind(*statement)
                {
                    out.report(
                        self,
                        format!("Nested function '{}' in '{}'.", inner, outer),
                        Some(ctx.line(*statement)),
                    );
                }
            }
        }
    }
}

pub struct LargeFunctionRule;

impl ReviewRule for LargeFunctionRule {
    fn id(&self) -> &'static str {
        "large-function"
    }

    fn description(&self) -> &'static str {
        "Flags functions whose body has too many top-level statements"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Complexity
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::FunctionDefinition { name, body, .. } = kind {
                if body.len() > ctx.config.max_function_statements {
                    out.report(
                        self,
                        format!("Large function '{}' with {} lines.", name, body.len()),
                        Some(ctx.line(id)),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rules::test_support::{messages, run_rule_with};
    use crate::config::ReviewConfig;
    use pretty_assertions::assert_eq;

    fn branchy(count: usize) -> String {
        let mut source = String::from("def branchy(x):\n");
        for i in 0..count {
            source.push_str(&format!("    if x == {}:\n        x += 1\n", i));
        }
        source
    }

    #[test]
    fn test_branch_threshold() {
        assert!(messages(&TooManyBranchesRule, &branchy(10)).is_empty());
        assert_eq!(
            messages(&TooManyBranchesRule, &branchy(11)),
            vec!["Too many branches (11) in function 'branchy'."]
        );
    }

    #[test]
    fn test_branches_counted_through_nesting() {
        let source = "def f(x):\n    for a in x:\n        while a:\n            try:\n                pass\n            except E:\n                pass\n";
        let config = ReviewConfig {
            max_branches: 2,
            ..ReviewConfig::default()
        };
        let found = run_rule_with(&TooManyBranchesRule, source, &config);
        assert_eq!(found[0].message, "Too many branches (3) in function 'f'.");
    }

    #[test]
    fn test_argument_threshold() {
        let source = "def ok(a, b, c, d, e, *args, f=1, **kw):\n    pass\ndef big(a, b, /, c, d, e, f):\n    pass\n";
        assert_eq!(
            messages(&TooManyArgumentsRule, source),
            vec!["Function 'big' has too many args (6)."]
        );
    }

    #[test]
    fn test_nested_functions() {
        let source = "def outer():\n    def inner():\n        pass\n    if x:\n        def hidden():\n            pass\n";
        assert_eq!(
            messages(&NestedFunctionRule, source),
            vec!["Nested function 'inner' in 'outer'."]
        );
    }

    #[test]
    fn test_large_function() {
        let mut source = String::from("def long():\n");
        for i in 0..51 {
            source.push_str(&format!("    x{} = 0\n", i));
        }
        assert_eq!(
            messages(&LargeFunctionRule, &source),
            vec!["Large function 'long' with 51 lines."]
        );
        let small = "def short():\n    if x:\n        y = 1\n";
        assert!(messages(&LargeFunctionRule, small).is_empty());
    }
}
