use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::{Literal, NodeId, NodeKind, Tree};

/// Text of a numeric literal outside the allowed set, if it is one
fn magic_value(literal: &Literal) -> Option<String> {
    match literal {
        Literal::Int(value) if *value > 2 => Some(value.to_string()),
        Literal::BigInt(text) => Some(text.clone()),
        Literal::Float(value) if ![0.0, 1.0, 2.0].contains(value) => Some(format!("{:?}", value)),
        _ => None,
    }
}

// Negative numbers are unary minus over a positive literal
pub struct MagicNumberRule;

impl ReviewRule for MagicNumberRule {
    fn id(&self) -> &'static str {
        "magic-number"
    }

    fn description(&self) -> &'static str {
        "Flags numeric literals other than 0, 1 and 2"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Semantics
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::Literal(literal) = kind else {
                continue;
            };
            if let Some(value) = magic_value(literal) {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Magic number '{}' at line {}.", value, line));
            }
        }
    }
}

pub struct ConstantConditionRule;

impl ReviewRule for ConstantConditionRule {
    fn id(&self) -> &'static str {
        "constant-condition"
    }

    fn description(&self) -> &'static str {
        "Flags if statements whose test is True or False"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Semantics
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::If { test, .. } = kind else {
                continue;
            };
            if matches!(ctx.tree.kind(*test), NodeKind::Literal(Literal::Bool(_))) {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Boolean literal if at line {}.", line));
            }
        }
    }
}

pub struct LoopElseRule;

impl ReviewRule for LoopElseRule {
    fn id(&self) -> &'static str {
        "loop-else"
    }

    fn description(&self) -> &'static str {
        "Flags for and while loops with an else clause"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Semantics
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let orelse = match kind {
                NodeKind::For { orelse, .. } | NodeKind::While { orelse, .. } => orelse,
                _ => continue,
            };
            if !orelse.is_empty() {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Else on loop at line {}.", line));
            }
        }
    }
}

/// Returns belonging to `function`, skipping nested function bodies
fn own_returns(tree: &Tree, function: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    let mut stack = tree.children(function);

    while let Some(id) = stack.pop() {
        match tree.kind(id) {
            NodeKind::FunctionDefinition { .. } => {}
            NodeKind::Return { .. } => found.push(id),
            _ => stack.extend(tree.children(id)),
        }
    }

    found
}

pub struct InconsistentReturnRule;

impl ReviewRule for InconsistentReturnRule {
    fn id(&self) -> &'static str {
        "inconsistent-return"
    }

    fn description(&self) -> &'static str {
        "Flags functions mixing `return value` with bare `return`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Semantics
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::FunctionDefinition { name, .. } = kind else {
                continue;
            };

            let mut with_value = false;
            let mut bare = false;
            for ret in own_returns(ctx.tree, id) {
                match ctx.tree.kind(ret) {
                    NodeKind::Return { value: Some(_) } => with_value = true,
                    _ => bare = true,
                }
            }

            if with_value && bare {
                out.report(
                    self,
                    format!("Inconsistent return in '{}'.", name),
                    Some(ctx.line(id)),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rules::test_support::messages;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_magic_numbers() {
        let source = "a = 0 + 1 + 2\nb = -2\nc = 42\nd = 3.14\ne = 2.0\nf = True\ng = 0x10\n";
        assert_eq!(
            messages(&MagicNumberRule, source),
            vec![
                "Magic number '42' at line 3.",
                "Magic number '3.14' at line 4.",
                "Magic number '16' at line 7.",
            ]
        );
    }

    #[test]
    fn test_wide_integer_keeps_its_digits() {
        assert_eq!(
            messages(&MagicNumberRule, "n = 123456789012345678901234567890123456789012\n"),
            vec!["Magic number '123456789012345678901234567890123456789012' at line 1."]
        );
    }

    #[test]
    fn test_magic_number_inside_fstring() {
        assert_eq!(
            messages(&MagicNumberRule, "s = f\"{x * 60}\"\n"),
            vec!["Magic number '60' at line 1."]
        );
    }

    #[test]
    fn test_constant_conditions() {
        let source = "if True:\n    a()\nelif False:\n    b()\nif x:\n    c()\nwhile True:\n    d()\n";
        assert_eq!(
            messages(&ConstantConditionRule, source),
            vec!["Boolean literal if at line 1.", "Boolean literal if at line 3."]
        );
    }

    #[test]
    fn test_loop_else() {
        let source = "for a in b:\n    c()\nelse:\n    d()\nwhile e:\n    f()\n";
        assert_eq!(messages(&LoopElseRule, source), vec!["Else on loop at line 1."]);
    }

    #[test]
    fn test_inconsistent_return() {
        let source = r#"
def mixed(x):
    if x:
        return x
    return


def consistent(x):
    if x:
        return 1
    return 2


def outer():
    def inner():
        return 1
    return
"#;
        assert_eq!(
            messages(&InconsistentReturnRule, source),
            vec!["Inconsistent return in 'mixed'."]
        );
    }
}
