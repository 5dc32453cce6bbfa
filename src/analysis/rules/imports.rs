use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::rule::ReviewRule;
use crate::parser::ast::{ExprContext, NodeKind};
use std::collections::HashSet;

// Two passes: gather the names imports bind, then every name that is read
pub struct UnusedImportRule;

impl ReviewRule for UnusedImportRule {
    fn id(&self) -> &'static str {
        "unused-import"
    }

    fn description(&self) -> &'static str {
        "Flags imported names that are never read"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Imports
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        let mut imported: Vec<(&str, usize)> = Vec::new();
        for (id, kind) in ctx.nodes() {
            let names = match kind {
                NodeKind::Import { names } | NodeKind::ImportFrom { names, .. } => names,
                _ => continue,
            };
            for alias in names.iter().filter(|a| a.name != "*") {
                imported.push((alias.bound_name(), ctx.line(id)));
            }
        }

        if imported.is_empty() {
            return;
        }

        let read: HashSet<&str> = ctx
            .nodes()
            .filter_map(|(_, kind)| match kind {
                NodeKind::NameReference {
                    id,
                    context: ExprContext::Load,
                } => Some(id.as_str()),
                _ => None,
            })
            .collect();

        for (name, line) in imported {
            if !read.contains(name) {
                out.report(self, format!("Unused import '{}'.", name), Some(line));
            }
        }
    }
}

fn is_import_line(stripped: &str) -> bool {
    stripped
        .strip_prefix("import")
        .is_some_and(|rest| rest.starts_with([' ', '\t']))
}

pub struct MultipleImportsRule;

impl ReviewRule for MultipleImportsRule {
    fn id(&self) -> &'static str {
        "multiple-imports"
    }

    fn description(&self) -> &'static str {
        "Flags `import a, b` lines"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Imports
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (number, line) in ctx.lines.iter() {
            if is_import_line(line.trim()) && line.contains(',') {
                out.report_at(
                    self,
                    number,
                    format!("Multiple imports on one line at line {}.", number),
                );
            }
        }
    }
}

pub struct WildcardImportRule;

impl ReviewRule for WildcardImportRule {
    fn id(&self) -> &'static str {
        "wildcard-import"
    }

    fn description(&self) -> &'static str {
        "Flags `from module import *`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Imports
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (id, kind) in ctx.nodes() {
            let NodeKind::ImportFrom {
                module,
                names,
                level,
            } = kind
            else {
                continue;
            };

            if names.iter().any(|alias| alias.name == "*") {
                let module = format!("{}{}", ".".repeat(*level), module.as_deref().unwrap_or(""));
                let line = ctx.line(id);
                out.report_at(
                    self,
                    line,
                    format!("Wildcard import from '{}' at line {}.", module, line),
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
    fn test_unused_imports_per_name() {
        let source = "import math, os\n";
        assert_eq!(
            messages(&UnusedImportRule, source),
            vec!["Unused import 'math'.", "Unused import 'os'."]
        );
    }

    #[test]
    fn test_used_imports_by_bound_name() {
        let source = "import os.path\nimport numpy as np\nfrom typing import List, Dict\nfrom m import *\n\nos.path.join(np.zeros(1))\nx: List = []\n";
        assert_eq!(
            messages(&UnusedImportRule, source),
            vec!["Unused import 'Dict'."]
        );
    }

    #[test]
    fn test_store_does_not_count_as_use() {
        let source = "import json\njson = None\n";
        assert_eq!(
            messages(&UnusedImportRule, source),
            vec!["Unused import 'json'."]
        );
    }

    #[test]
    fn test_multiple_imports_lines() {
        let source = "import math, os\nfrom a import b, c\nimportant = 1, 2\nif a:\n    import x,y\n";
        assert_eq!(
            messages(&MultipleImportsRule, source),
            vec![
                "Multiple imports on one line at line 1.",
                "Multiple imports on one line at line 5.",
            ]
        );
    }

    #[test]
    fn test_wildcard_imports() {
        let source = "from os.path import *\nfrom .. import *\nfrom x import y\n";
        assert_eq!(
            messages(&WildcardImportRule, source),
            vec![
                "Wildcard import from 'os.path' at line 1.",
                "Wildcard import from '..' at line 2.",
            ]
        );
    }
}
