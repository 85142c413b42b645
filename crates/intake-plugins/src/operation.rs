//! Operations a file processor can perform on an ingested document.

use serde::{Deserialize, Serialize};

/// Named operation requested from a file processor.
///
/// # Example
///
/// ```
/// use intake_plugins::Operation;
///
/// assert_eq!(Operation::ComplexAnalysis.as_str(), "complex-analysis");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Ingest a rate history document.
    History,
    /// Run security checks on a rate limits document.
    Security,
    /// Run the deeper analysis that follows security checks.
    ComplexAnalysis,
}

impl Operation {
    /// Returns the canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Security => "security",
            Self::ComplexAnalysis => "complex-analysis",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
