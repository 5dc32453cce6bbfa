use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::analysis::rules::name_calls;
use crate::parser::ast::NodeKind;

pub struct GlobalUsageRule;

impl ReviewRule for GlobalUsageRule {
    fn id(&self) -> &'static str {
        "global-usage"
    }

    fn description(&self) -> &'static str {
        "Flags every name declared `global`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::Global { names } = kind {
                let line = ctx.line(id);
                for name in names {
                    out.report_at(
                        self,
                        line,
                        format!("Global variable usage '{}' at line {}.", name, line),
                    );
                }
            }
        }
    }
}

pub struct NonlocalUsageRule;

impl ReviewRule for NonlocalUsageRule {
    fn id(&self) -> &'static str {
        "nonlocal-usage"
    }

    fn description(&self) -> &'static str {
        "Flags every name declared `nonlocal`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::Nonlocal { names } = kind {
                let line = ctx.line(id);
                for name in names {
                    out.report_at(
                        self,
                        line,
                        format!("Nonlocal usage '{}' at line {}.", name, line),
                    );
                }
            }
        }
    }
}

// One finding per offending default, keyword-only defaults included
pub struct MutableDefaultRule;

impl ReviewRule for MutableDefaultRule {
    fn id(&self) -> &'static str {
        "mutable-default"
    }

    fn description(&self) -> &'static str {
        "Flags list, dict and set displays used as parameter defaults"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::FunctionDefinition {
                name, parameters, ..
            } = kind
            else {
                continue;
            };

            for default in parameters.iter().filter_map(|p| p.default) {
                if ctx.tree.kind(default).is_mutable_literal() {
                    out.report(
                        self,
                        format!("Mutable default argument in '{}'.", name),
                        Some(ctx.line(id)),
                    );
                }
            }
        }
    }
}

pub struct PrintCallRule;

impl ReviewRule for PrintCallRule {
    fn id(&self) -> &'static str {
        "print-call"
    }

    fn description(&self) -> &'static str {
        "Flags calls to print"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, _) in name_calls(ctx).filter(|(_, name)| *name == "print") {
            let line = ctx.line(id);
            out.report_at(self, line, format!("Print statement at line {}.", line));
        }
    }
}

pub struct ExecUsageRule;

impl ReviewRule for ExecUsageRule {
    fn id(&self) -> &'static str {
        "exec-usage"
    }

    fn description(&self) -> &'static str {
        "Flags calls to exec"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, _) in name_calls(ctx).filter(|(_, name)| *name == "exec") {
            let line = ctx.line(id);
            out.report_at(self, line, format!("Exec usage at line {}.", line));
        }
    }
}

pub struct EvalUsageRule;

impl ReviewRule for EvalUsageRule {
    fn id(&self) -> &'static str {
        "eval-usage"
    }

    fn description(&self) -> &'static str {
        "Flags calls to eval"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, _) in name_calls(ctx).filter(|(_, name)| *name == "eval") {
            let line = ctx.line(id);
            out.report_at(self, line, format!("Eval usage at line {}.", line));
        }
    }
}

pub struct ExitCallRule;

impl ReviewRule for ExitCallRule {
    fn id(&self) -> &'static str {
        "exit-call"
    }

    fn description(&self) -> &'static str {
        "Flags calls to exit and quit"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, name) in name_calls(ctx).filter(|(_, name)| matches!(*name, "exit" | "quit")) {
            let line = ctx.line(id);
            out.report_at(self, line, format!("Direct {} call at line {}.", name, line));
        }
    }
}

// `pass` is expected directly under def, class and if
pub struct UnnecessaryPassRule;

impl ReviewRule for UnnecessaryPassRule {
    fn id(&self) -> &'static str {
        "unnecessary-pass"
    }

    fn description(&self) -> &'static str {
        "Flags pass statements outside function, class and if bodies"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if !matches!(kind, NodeKind::Pass) {
                continue;
            }
            let expected = matches!(
                ctx.parent_kind(id),
                Some(
                    NodeKind::FunctionDefinition { .. }
                        | NodeKind::ClassDefinition { .. }
                        | NodeKind::If { .. }
                )
            );
            if !expected {
                let line = ctx.line(id);
                out.report_at(
                    self,
                    line,
                    format!("Pass statement at line {} might be unnecessary.", line),
                );
            }
        }
    }
}

pub struct TryWithoutExceptRule;

impl ReviewRule for TryWithoutExceptRule {
    fn id(&self) -> &'static str {
        "try-without-except"
    }

    fn description(&self) -> &'static str {
        "Flags try statements with no except handler"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::Try { handlers, .. } = kind {
                if handlers.is_empty() {
                    let line = ctx.line(id);
                    out.report_at(self, line, format!("Try without except at line {}.", line));
                }
            }
        }
    }
}

pub struct BareExceptRule;

impl ReviewRule for BareExceptRule {
    fn id(&self) -> &'static str {
        "bare-except"
    }

    fn description(&self) -> &'static str {
        "Flags except clauses that name no exception type"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::ExceptHandler {
                exception_type: None,
                ..
            } = kind
            {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Catch-all except at line {}.", line));
            }
        }
    }
}

pub struct LambdaUsageRule;

impl ReviewRule for LambdaUsageRule {
    fn id(&self) -> &'static str {
        "lambda-usage"
    }

    fn description(&self) -> &'static str {
        "Flags lambda expressions"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if matches!(kind, NodeKind::Lambda { .. }) {
                let line = ctx.line(id);
                out.report_at(self, line, format!("Lambda usage at line {}.", line));
            }
        }
    }
}

pub struct MutableClassAttributeRule;

impl ReviewRule for MutableClassAttributeRule {
    fn id(&self) -> &'static str {
        "mutable-class-attribute"
    }

    fn description(&self) -> &'static str {
        "Flags class attributes initialised with a list, dict or set display"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Hygiene
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (_, kind) in ctx.nodes() {
            let NodeKind::ClassDefinition { body, .. } = kind else {
                continue;
            };

            for statement in body {
                let NodeKind::Assignment { targets, value } = ctx.tree.kind(*statement) else {
                    continue;
                };
                if !ctx.tree.kind(*value).is_mutable_literal() {
                    continue;
                }
                let line = ctx.line(*statement);
                for target in targets {
                    if let NodeKind::NameReference { id: name, .. } = ctx.tree.kind(*target) {
                        out.report_at(
                            self,
                            line,
                            format!("Mutable class var '{}' at line {}.", name, line),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rules::test_support::{messages, run_rule};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_global_and_nonlocal() {
        let source = "def f():\n    global a, b\n    def g():\n        nonlocal c\n";
        assert_eq!(
            messages(&GlobalUsageRule, source),
            vec![
                "Global variable usage 'a' at line 2.",
                "Global variable usage 'b' at line 2.",
            ]
        );
        assert_eq!(
            messages(&NonlocalUsageRule, source),
            vec!["Nonlocal usage 'c' at line 4."]
        );
    }

    #[test]
    fn test_mutable_defaults() {
        assert_eq!(run_rule(&MutableDefaultRule, "def f(x=[]):\n    pass\n").len(), 1);
        assert!(run_rule(&MutableDefaultRule, "def f(x=0):\n    pass\n").is_empty());
        assert_eq!(
            messages(&MutableDefaultRule, "def g(a={}, *, b=set(), c={1}):\n    pass\n"),
            vec![
                "Mutable default argument in 'g'.",
                "Mutable default argument in 'g'.",
            ]
        );
    }

    #[test]
    fn test_builtin_calls() {
        let source = "print('a')\nexec(code)\nx = eval('1') + obj.eval()\nexit(0)\nquit()\nlogger.print()\n";
        assert_eq!(messages(&PrintCallRule, source), vec!["Print statement at line 1."]);
        assert_eq!(messages(&ExecUsageRule, source), vec!["Exec usage at line 2."]);
        assert_eq!(messages(&EvalUsageRule, source), vec!["Eval usage at line 3."]);
        assert_eq!(
            messages(&ExitCallRule, source),
            vec!["Direct exit call at line 4.", "Direct quit call at line 5."]
        );
    }

    #[test]
    fn test_pass_placement() {
        let source = "def f():\n    pass\nclass A:\n    pass\nif x:\n    pass\nelse:\n    pass\nfor i in y:\n    pass\ntry:\n    pass\nexcept E:\n    pass\n";
        assert_eq!(
            messages(&UnnecessaryPassRule, source),
            vec![
                "Pass statement at line 10 might be unnecessary.",
                "Pass statement at line 12 might be unnecessary.",
                "Pass statement at line 14 might be unnecessary.",
            ]
        );
    }

    #[test]
    fn test_try_handlers() {
        let source = "try:\n    a()\nfinally:\n    b()\ntry:\n    c()\nexcept:\n    d()\n";
        assert_eq!(
            messages(&TryWithoutExceptRule, source),
            vec!["Try without except at line 1."]
        );
        assert_eq!(messages(&BareExceptRule, source), vec!["Catch-all except at line 7."]);
    }

    #[test]
    fn test_lambdas() {
        let source = "key = lambda item: item[0]\nsorted(xs, key=lambda: 0)\n";
        assert_eq!(
            messages(&LambdaUsageRule, source),
            vec!["Lambda usage at line 1.", "Lambda usage at line 2."]
        );
    }

    #[test]
    fn test_mutable_class_attributes() {
        let source = "class A:\n    items = []\n    table = {}\n    size = 0\n    def m(self):\n        self.cache = []\n";
        assert_eq!(
            messages(&MutableClassAttributeRule, source),
            vec![
                "Mutable class var 'items' at line 2.",
                "Mutable class var 'table' at line 3.",
            ]
        );
    }
}
