//! Rules and ordered rule sets.

use std::fmt;

use qat_ir::Symbol;

use crate::captures::Captures;
use crate::error::{ActionError, RuleError};
use crate::pattern::OperandPattern;
use crate::rewriter::Rewriter;

/// Rewrite callback run when a rule's pattern matches.
pub type Action = Box<dyn Fn(&mut Rewriter<'_>, &Captures) -> Result<(), ActionError>>;

/// A pattern paired with the rewrite to perform on a match.
pub struct Rule {
    name: String,
    pattern: OperandPattern,
    action: Action,
}

impl Rule {
    /// Build a rule, checking the pattern for duplicate capture labels and
    /// misplaced `rest()` nodes.
    pub fn new<F>(
        name: impl Into<String>,
        pattern: OperandPattern,
        action: F,
    ) -> Result<Self, RuleError>
    where
        F: Fn(&mut Rewriter<'_>, &Captures) -> Result<(), ActionError> + 'static,
    {
        let name = name.into();
        if pattern.is_rest() {
            return Err(RuleError::MisplacedRest { rule: name });
        }
        let mut labels = Vec::new();
        check_pattern(&name, &pattern, &mut labels)?;
        Ok(Self {
            name,
            pattern,
            action: Box::new(action),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &OperandPattern {
        &self.pattern
    }

    pub(crate) fn apply(
        &self,
        rewriter: &mut Rewriter<'_>,
        captures: &Captures,
    ) -> Result<(), ActionError> {
        (self.action)(rewriter, captures)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

fn check_pattern(
    rule: &str,
    pattern: &OperandPattern,
    labels: &mut Vec<Symbol>,
) -> Result<(), RuleError> {
    if let Some(label) = pattern.capture_label() {
        if labels.contains(&label) {
            return Err(RuleError::DuplicateCapture {
                rule: rule.to_owned(),
                label,
            });
        }
        labels.push(label);
    }

    let children = pattern.children();
    let last = children.len().saturating_sub(1);
    for (i, child) in children.iter().enumerate() {
        if child.is_rest() && (i != last || !pattern.accepts_rest_tail()) {
            return Err(RuleError::MisplacedRest {
                rule: rule.to_owned(),
            });
        }
        check_pattern(rule, child, labels)?;
    }
    Ok(())
}

/// What the pass does with an instruction no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Leave it in place.
    #[default]
    Ignore,
    /// Fail the pass.
    Reject,
}

/// Rules in priority order. The first rule whose pattern matches wins.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    unmatched: UnmatchedPolicy,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    pub fn set_policy(&mut self, policy: UnmatchedPolicy) {
        self.unmatched = policy;
    }

    pub fn policy(&self) -> UnmatchedPolicy {
        self.unmatched
    }

    /// Append a rule at the lowest priority.
    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Build and append a rule.
    pub fn add_rule<F>(
        &mut self,
        name: impl Into<String>,
        pattern: OperandPattern,
        action: F,
    ) -> Result<(), RuleError>
    where
        F: Fn(&mut Rewriter<'_>, &Captures) -> Result<(), ActionError> + 'static,
    {
        self.add(Rule::new(name, pattern, action)?);
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::name).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Extend<Rule> for RuleSet {
    fn extend<T: IntoIterator<Item = Rule>>(&mut self, iter: T) {
        self.rules.extend(iter);
    }
}
