use crate::analysis::rule::ReviewRule;

/// Rules in execution order. Registration order is output order.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn ReviewRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn register<R: ReviewRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<&dyn ReviewRule> {
        self.rules
            .iter()
            .find(|r| r.id() == rule_id)
            .map(|r| r.as_ref())
    }

    pub fn rules(&self) -> &[Box<dyn ReviewRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}
