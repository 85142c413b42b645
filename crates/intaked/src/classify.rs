//! Maps file names to the operations they require.

use std::path::Path;

use intake_plugins::Operation;

/// File name that carries rate history.
pub const HISTORY_FILE_NAME: &str = "ratehistory.xml";

/// File name that carries rate limits.
pub const LIMITS_FILE_NAME: &str = "ratelimits.xml";

/// A case-insensitive exact file name mapped to an ordered operation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    file_name: String,
    operations: Vec<Operation>,
}

impl ClassificationRule {
    /// Creates a rule for `file_name`.
    #[must_use]
    pub fn new(file_name: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            file_name: file_name.into(),
            operations,
        }
    }

    /// The file name this rule matches.
    #[must_use]
    pub const fn file_name(&self) -> &str {
        self.file_name.as_str()
    }

    /// Operations to run, in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns `true` when `name` equals the rule's file name, ignoring ASCII
    /// case.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.file_name.eq_ignore_ascii_case(name)
    }
}

/// Ordered rule set; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Classifier {
    /// Builds a classifier from explicit rules.
    #[must_use]
    pub const fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Finds the rule for the final component of `path`.
    ///
    /// Returns `None` for unrecognised names and for paths without a UTF-8
    /// file name.
    #[must_use]
    pub fn classify(&self, path: &Path) -> Option<&ClassificationRule> {
        let name = path.file_name()?.to_str()?;
        self.rules.iter().find(|rule| rule.matches(name))
    }

    /// Configured rules in match order.
    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![
            ClassificationRule::new(HISTORY_FILE_NAME, vec![Operation::History]),
            ClassificationRule::new(
                LIMITS_FILE_NAME,
                vec![Operation::Security, Operation::ComplexAnalysis],
            ),
        ])
    }
}
