use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::NodeKind;

/// Statements following a `return` in the sequence that directly holds it.
/// A return in an `else` or `finally` block only affects that block.
pub struct UnreachableCodeRule;

impl ReviewRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "unreachable-code"
    }

    fn description(&self) -> &'static str {
        "Flags statements that follow a return in the same block"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::ControlFlow
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if !matches!(kind, NodeKind::Return { .. }) {
                continue;
            }
            let Some(parent) = ctx.parents.parent(id) else {
                continue;
            };

            for block in ctx.tree.kind(parent).statement_blocks() {
                let Some(position) = block.iter().position(|s| *s == id) else {
                    continue;
                };
                for statement in &block[position + 1..] {
                    let line = ctx.line(*statement);
                    out.report_at(
                        self,
                        line,
                        format!("Unreachable code after return in line {}.", line),
                    );
                }
            }
        }
    }
}

fn check_outside_loop(
    rule: &dyn ReviewRule,
    ctx: &AnalysisContext,
    out: &mut DiagnosticCollector,
    is_target: fn(&NodeKind) -> bool,
    label: &str,
) {
    for (id, kind) in ctx.nodes() {
        if is_target(kind) && !ctx.has_ancestor(id, NodeKind::is_loop) {
            let line = ctx.line(id);
            out.report_at(rule, line, format!("{} outside loop at line {}.", label, line));
        }
    }
}

// Ancestors are searched all the way to the module
pub struct BreakOutsideLoopRule;

impl ReviewRule for BreakOutsideLoopRule {
    fn id(&self) -> &'static str {
        "break-outside-loop"
    }

    fn description(&self) -> &'static str {
        "Flags `break` with no enclosing loop"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::ControlFlow
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        check_outside_loop(self, ctx, out, |k| matches!(k, NodeKind::Break), "Break");
    }
}

pub struct ContinueOutsideLoopRule;

impl ReviewRule for ContinueOutsideLoopRule {
    fn id(&self) -> &'static str {
        "continue-outside-loop"
    }

    fn description(&self) -> &'static str {
        "Flags `continue` with no enclosing loop"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::ControlFlow
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        check_outside_loop(self, ctx, out, |k| matches!(k, NodeKind::Continue), "Continue");
    }
}

pub struct RaiseWithoutExceptionRule;

impl ReviewRule for RaiseWithoutExceptionRule {
    fn id(&self) -> &'static str {
        "raise-without-exception"
    }

    fn description(&self) -> &'static str {
        "Flags bare `raise`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::ControlFlow
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::Raise {
                exception: None, ..
            } = kind
            {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Raise without exception at line {}.", line));
            }
        }
    }
}

pub struct ReturnOutsideFunctionRule;

impl ReviewRule for ReturnOutsideFunctionRule {
    fn id(&self) -> &'static str {
        "return-outside-function"
    }

    fn description(&self) -> &'static str {
        "Flags `return` with no enclosing function"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::ControlFlow
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if matches!(kind, NodeKind::Return { .. })
                && !ctx.has_ancestor(id, NodeKind::is_function)
            {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Return outside function at line {}.", line));
            }
        }
    }
}
