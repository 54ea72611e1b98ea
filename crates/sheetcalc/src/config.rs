//! Engine configuration

use sheetcalc_formula::DefinedNames;
use std::time::Duration;

/// Options for recalculation
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecalcOptions {
    /// Request deadline, checked between cells (default: none)
    pub timeout: Option<Duration>,
    /// Names substituted into formulas at parse time
    pub defined_names: DefinedNames,
}

impl RecalcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop evaluating once a request has run this long
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_defined_names(mut self, names: DefinedNames) -> Self {
        self.defined_names = names;
        self
    }

    /// Define a single name, e.g. `("TaxRate", "Settings!$B$2")`
    pub fn with_name(mut self, name: &str, reference: &str) -> Self {
        self.defined_names.insert(name, reference);
        self
    }
}
