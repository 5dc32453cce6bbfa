use crate::analysis::diagnostic::{Diagnostic, RuleCategory};
use colored::*;

/// Renders findings as `file:line: Category: message`
pub struct DiagnosticPrinter {
    pub use_colors: bool,
    pub file_name: String,
}

impl DiagnosticPrinter {
    pub fn new(file_name: impl Into<String>, use_colors: bool) -> Self {
        Self {
            use_colors,
            file_name: file_name.into(),
        }
    }

    fn category_str(&self, category: RuleCategory) -> ColoredString {
        let text = category.as_str();
        if !self.use_colors {
            return text.normal();
        }
        match category {
            RuleCategory::SyntaxError => text.red().bold(),
            RuleCategory::ControlFlow | RuleCategory::Semantics => text.yellow().bold(),
            RuleCategory::Hygiene => text.magenta().bold(),
            _ => text.cyan(),
        }
    }

    pub fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let location = match diagnostic.line {
            Some(line) => format!("{}:{}", self.file_name, line),
            None => self.file_name.clone(),
        };
        let location = if self.use_colors {
            location.bold().to_string()
        } else {
            location
        };

        format!(
            "{}: {}: {}",
            location,
            self.category_str(diagnostic.category),
            diagnostic.message
        )
    }

    pub fn sprint_errors(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics {
            output.push_str(&self.format_diagnostic(diagnostic));
            output.push('\n');
        }
        output
    }

    pub fn print_errors(&self, diagnostics: &[Diagnostic]) {
        print!("{}", self.sprint_errors(diagnostics))
    }
}
