//! Rules over raw source lines. They see the text verbatim, so they fire on
//! string contents too unless noted.

use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{DiagnosticCollector, RuleCategory};
use crate::analysis::lines::comment_portion;
use crate::analysis::rule::ReviewRule;

/// Reports `"<label> at line <n>."` for every line matching `predicate`
fn flag_lines(
    rule: &dyn ReviewRule,
    ctx: &AnalysisContext,
    out: &mut DiagnosticCollector,
    label: &str,
    predicate: impl Fn(&str) -> bool,
) {
    for (number, line) in ctx.lines.iter() {
        if predicate(line) {
            out.report_at(rule, number, format!("{} at line {}.", label, number));
        }
    }
}

pub struct EmptyCommentRule;

impl ReviewRule for EmptyCommentRule {
    fn id(&self) -> &'static str {
        "empty-comment"
    }

    fn description(&self) -> &'static str {
        "Flags lines holding only `#`"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Empty comment", |line| line.trim() == "#");
    }
}

// Only the comment part of a line is searched, in any letter case
pub struct TodoCommentRule;

impl ReviewRule for TodoCommentRule {
    fn id(&self) -> &'static str {
        "todo-comment"
    }

    fn description(&self) -> &'static str {
        "Flags comments mentioning TODO"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "TODO comment", |line| {
            comment_portion(line).is_some_and(|comment| comment.to_uppercase().contains("TODO"))
        });
    }
}

pub struct LongLineRule;

impl ReviewRule for LongLineRule {
    fn id(&self) -> &'static str {
        "long-line"
    }

    fn description(&self) -> &'static str {
        "Flags lines longer than the configured maximum"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        for (number, line) in ctx.lines.iter() {
            let length = line.chars().count();
            if length > ctx.config.max_line_length {
                out.report_at(
                    self,
                    number,
                    format!("Long line ({}) at line {}.", length, number),
                );
            }
        }
    }
}

pub struct BadIndentationRule;

impl ReviewRule for BadIndentationRule {
    fn id(&self) -> &'static str {
        "bad-indentation"
    }

    fn description(&self) -> &'static str {
        "Flags leading spaces that are not a multiple of the indent width"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        let width = ctx.config.indent_width;
        flag_lines(self, ctx, out, "Bad indentation", |line| {
            let leading = line.len() - line.trim_start_matches(' ').len();
            !line.trim().is_empty() && leading.checked_rem(width).is_some_and(|r| r != 0)
        });
    }
}

pub struct SemicolonRule;

impl ReviewRule for SemicolonRule {
    fn id(&self) -> &'static str {
        "semicolon"
    }

    fn description(&self) -> &'static str {
        "Flags semicolons outside comment lines"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Semicolon", |line| {
            line.contains(';') && !line.trim().starts_with('#')
        });
    }
}

pub struct TabCharacterRule;

impl ReviewRule for TabCharacterRule {
    fn id(&self) -> &'static str {
        "tab-character"
    }

    fn description(&self) -> &'static str {
        "Flags lines containing a tab"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Tab character", |line| line.contains('\t'));
    }
}

pub struct TrailingWhitespaceRule;

impl ReviewRule for TrailingWhitespaceRule {
    fn id(&self) -> &'static str {
        "trailing-whitespace"
    }

    fn description(&self) -> &'static str {
        "Flags lines ending in whitespace"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Trailing whitespace", |line| {
            line.trim_end() != line
        });
    }
}

pub struct MultipleStatementsRule;

impl ReviewRule for MultipleStatementsRule {
    fn id(&self) -> &'static str {
        "multiple-statements"
    }

    fn description(&self) -> &'static str {
        "Flags lines with more than one semicolon"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Multiple statements", |line| {
            line.trim().matches(';').count() > 1
        });
    }
}

pub struct FormatCallRule;

impl ReviewRule for FormatCallRule {
    fn id(&self) -> &'static str {
        "format-call"
    }

    fn description(&self) -> &'static str {
        "Suggests f-strings for printed str.format calls"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        flag_lines(self, ctx, out, "Consider f-string", |line| {
            line.contains(".format(") && line.contains("print")
        });
    }
}

pub struct ConsecutiveBlankLinesRule;

impl ReviewRule for ConsecutiveBlankLinesRule {
    fn id(&self) -> &'static str {
        "consecutive-blank-lines"
    }

    fn description(&self) -> &'static str {
        "Flags runs of blank lines longer than the configured maximum"
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Style
    }

    fn check(&self, ctx: &AnalysisContext, out: &mut DiagnosticCollector) {
        let mut blank_run = 0;

        for (number, line) in ctx.lines.iter() {
            if line.trim().is_empty() {
                blank_run += 1;
                continue;
            }
            if blank_run > ctx.config.max_blank_lines {
                out.report_at(
                    self,
                    number,
                    format!("Multiple blank lines before line {}.", number),
                );
            }
            blank_run = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::rules::test_support::{messages, run_rule};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_long_line_boundary() {
        let exact = format!("x = '{}'\n", "a".repeat(73));
        assert_eq!(exact.trim_end().len(), 79);
        assert!(run_rule(&LongLineRule, &exact).is_empty());

        let over = format!("x = '{}'\n", "a".repeat(74));
        assert_eq!(
            messages(&LongLineRule, &over),
            vec!["Long line (80) at line 1."]
        );
    }

    #[test]
    fn test_comment_rules() {
        let source = "#\nx = 1  # todo: tidy\ntodo_list = []\n    #   \n# Todo later\n";
        assert_eq!(
            messages(&EmptyCommentRule, source),
            vec!["Empty comment at line 1.", "Empty comment at line 4."]
        );
        assert_eq!(
            messages(&TodoCommentRule, source),
            vec!["TODO comment at line 2.", "TODO comment at line 5."]
        );
    }

    #[test]
    fn test_bad_indentation() {
        let source = "if x:\n    y = (1,\n      2)\n\n";
        assert_eq!(messages(&BadIndentationRule, source), vec!["Bad indentation at line 3."]);
    }

    #[test]
    fn test_semicolons() {
        let source = "a = 1; b = 2; c = 3\n# note; here\nd = 4;\n";
        assert_eq!(
            messages(&SemicolonRule, source),
            vec!["Semicolon at line 1.", "Semicolon at line 3."]
        );
        assert_eq!(
            messages(&MultipleStatementsRule, source),
            vec!["Multiple statements at line 1."]
        );
    }

    #[test]
    fn test_whitespace_rules() {
        let source = "if x:\n\ty = 1 \nz = 2\n";
        assert_eq!(messages(&TabCharacterRule, source), vec!["Tab character at line 2."]);
        assert_eq!(
            messages(&TrailingWhitespaceRule, source),
            vec!["Trailing whitespace at line 2."]
        );
    }

    #[test]
    fn test_format_call() {
        let source = "print('{}'.format(x))\ny = '{}'.format(x)\n";
        assert_eq!(messages(&FormatCallRule, source), vec!["Consider f-string at line 1."]);
    }

    #[test]
    fn test_blank_line_runs() {
        let source = "a = 1\n\n\nb = 2\n\n\n\nc = 3\n";
        assert_eq!(
            messages(&ConsecutiveBlankLinesRule, source),
            vec!["Multiple blank lines before line 8."]
        );
    }
}
