use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::{ExprContext, NodeKind};
use regex::Regex;
use std::sync::LazyLock;

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]+$").expect("valid class name pattern"));

static SNAKE_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid snake case pattern"));

static CONSTANT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("valid constant pattern"));

const BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes",
    "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "filter", "float", "format", "frozenset",
    "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input", "int",
    "isinstance", "issubclass", "iter", "len", "list", "locals", "map", "max",
    "memoryview", "min", "next", "object", "oct", "open", "ord", "pow", "print",
    "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

const MAGIC_METHODS: &[&str] = &[
    "__init__", "__str__", "__repr__", "__len__", "__getitem__", "__setitem__",
    "__delitem__", "__iter__", "__next__", "__call__", "__contains__", "__enter__",
    "__exit__", "__add__", "__sub__", "__mul__", "__truediv__", "__floordiv__",
    "__mod__", "__pow__", "__and__", "__or__", "__xor__", "__lt__", "__le__",
    "__gt__", "__ge__", "__eq__", "__ne__",
];

/// At least one cased character and no lowercase ones
fn is_upper(name: &str) -> bool {
    let mut cased = false;
    for c in name.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

pub struct ClassNamingRule;

impl ReviewRule for ClassNamingRule {
    fn id(&self) -> &'static str {
        "class-naming"
    }

    fn description(&self) -> &'static str {
        "Checks that class names are CapWords"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::ClassDefinition { name, .. } = kind {
                if !CLASS_NAME.is_match(name) {
                    out.report(self, format!("Class '{}' naming style.", name), Some(ctx.line(id)));
                }
            }
        }
    }
}

pub struct FunctionNamingRule;

impl ReviewRule for FunctionNamingRule {
    fn id(&self) -> &'static str {
        "function-naming"
    }

    fn description(&self) -> &'static str {
        "Checks that function names are snake_case"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::FunctionDefinition { name, .. } = kind {
                if !SNAKE_CASE.is_match(name) {
                    out.report(
                        self,
                        format!("Function '{}' naming style.", name),
                        Some(ctx.line(id)),
                    );
                }
            }
        }
    }
}

// Only names being stored to are checked, never reads
pub struct VariableNamingRule;

impl ReviewRule for VariableNamingRule {
    fn id(&self) -> &'static str {
        "variable-naming"
    }

    fn description(&self) -> &'static str {
        "Checks that assigned names are snake_case"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::NameReference {
                id: name,
                context: ExprContext::Store,
            } = kind
            {
                if !SNAKE_CASE.is_match(name) {
                    out.report(
                        self,
                        format!("Variable '{}' naming style.", name),
                        Some(ctx.line(id)),
                    );
                }
            }
        }
    }
}

pub struct ConstantNamingRule;

impl ReviewRule for ConstantNamingRule {
    fn id(&self) -> &'static str {
        "constant-naming"
    }

    fn description(&self) -> &'static str {
        "Checks that upper-case assignment targets only use A-Z, digits and underscores"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::Assignment { targets, .. } = kind else {
                continue;
            };
            for target in targets {
                if let NodeKind::NameReference { id: name, .. } = ctx.tree.kind(*target) {
                    if is_upper(name) && !CONSTANT_NAME.is_match(name) {
                        out.report(
                            self,
                            format!("Constant '{}' naming style.", name),
                            Some(ctx.line(id)),
                        );
                    }
                }
            }
        }
    }
}

pub struct RedefinedBuiltinRule;

impl ReviewRule for RedefinedBuiltinRule {
    fn id(&self) -> &'static str {
        "redefined-builtin"
    }

    fn description(&self) -> &'static str {
        "Flags functions and assignments that shadow a builtin"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let name = match kind {
                NodeKind::FunctionDefinition { name, .. } => name,
                NodeKind::NameReference {
                    id: name,
                    context: ExprContext::Store,
                } => name,
                _ => continue,
            };
            if BUILTINS.contains(&name.as_str()) {
                out.report(self, format!("Redefining builtin '{}'.", name), Some(ctx.line(id)));
            }
        }
    }
}

pub struct UnknownMagicMethodRule;

impl ReviewRule for UnknownMagicMethodRule {
    fn id(&self) -> &'static str {
        "unknown-magic-method"
    }

    fn description(&self) -> &'static str {
        "Flags dunder functions outside the known set"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Naming
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            if let NodeKind::FunctionDefinition { name, .. } = kind {
                let dunder = name.starts_with("__") && name.ends_with("__");
                if dunder && !MAGIC_METHODS.contains(&name.as_str()) {
                    out.report(
                        self,
                        format!("Unknown magic method '{}'.", name),
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
    use crate::analysis::rules::test_support::{messages, run_rule};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_class_names() {
        let source = "class Foo1:\n    pass\nclass foo1:\n    pass\nclass X:\n    pass\n";
        assert_eq!(
            messages(&ClassNamingRule, source),
            vec!["Class 'foo1' naming style.", "Class 'X' naming style."]
        );
    }

    #[test]
    fn test_class_pattern_rejects_leading_digit() {
        assert!(!CLASS_NAME.is_match("1Foo"));
        assert!(CLASS_NAME.is_match("Foo1"));
    }

    #[test]
    fn test_function_names() {
        let source = "def _private2():\n    pass\ndef Bad():\n    pass\nasync def camelCase():\n    pass\n";
        assert_eq!(
            messages(&FunctionNamingRule, source),
            vec![
                "Function 'Bad' naming style.",
                "Function 'camelCase' naming style.",
            ]
        );
    }

    #[test]
    fn test_variable_names_only_stores() {
        let source = "Total = Other + 1\nfor Item in things:\n    print(Item)\n";
        let found = run_rule(&VariableNamingRule, source);
        let lines: Vec<Option<usize>> = found.iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![Some(1), Some(2)]);
        assert_eq!(found[0].message, "Variable 'Total' naming style.");
    }

    #[test]
    fn test_constant_names() {
        assert!(is_upper("MAX_SIZE"));
        assert!(!is_upper("_1"));
        assert!(!is_upper("Max"));
        let source = "MAX_SIZE = 1\nÉTAT = 2\n";
        assert_eq!(
            messages(&ConstantNamingRule, source),
            vec!["Constant 'ÉTAT' naming style."]
        );
    }

    #[test]
    fn test_redefined_builtins() {
        let source = "def list():\n    pass\nid = 3\nx = len(y)\n";
        assert_eq!(
            messages(&RedefinedBuiltinRule, source),
            vec!["Redefining builtin 'list'.", "Redefining builtin 'id'."]
        );
    }

    #[test]
    fn test_magic_methods() {
        let source = "class A:\n    def __init__(self):\n        pass\n    def __frob__(self):\n        pass\n";
        assert_eq!(
            messages(&UnknownMagicMethodRule, source),
            vec!["Unknown magic method '__frob__'."]
        );
    }
}
