//! The ordered fault table.

use crate::error::TableFull;
use crate::rule::FaultRule;

/// Maximum number of rules a table can hold.
pub const MAX_RULES: usize = 1 << 8;

/// Ordered, bounded list of fault rules.
///
/// Order matters: the engine stops at the first matching rule that fires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultTable {
    rules: Vec<FaultRule>,
}

impl FaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rules in order.
    pub fn from_rules(rules: impl IntoIterator<Item = FaultRule>) -> Result<Self, TableFull> {
        let mut table = Self::new();
        for rule in rules {
            table.push(rule)?;
        }
        Ok(table)
    }

    /// Appends a rule, failing once the table holds [`MAX_RULES`] entries.
    pub fn push(&mut self, rule: FaultRule) -> Result<(), TableFull> {
        if self.rules.len() >= MAX_RULES {
            return Err(TableFull {
                count: self.rules.len(),
                limit: MAX_RULES,
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[FaultRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules naming `function`, in table order.
    pub fn rules_for<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a FaultRule> + 'a {
        self.rules.iter().filter(move |r| r.name() == function)
    }
}

impl<'a> IntoIterator for &'a FaultTable {
    type Item = &'a FaultRule;
    type IntoIter = std::slice::Iter<'a, FaultRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
