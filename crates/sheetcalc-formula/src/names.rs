//! Defined names
//!
//! Named ranges are supported by plain substitution: when the parser meets a
//! bare identifier that is a defined name, it parses the name's reference text
//! in its place. Names are matched case-insensitively.

use std::collections::BTreeMap;

/// Workbook-level table of defined names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DefinedNames {
    names: BTreeMap<String, String>,
}

impl DefinedNames {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a name, e.g. `("Rates", "'Lookup'!$A$1:$B$20")`
    pub fn insert(&mut self, name: impl AsRef<str>, reference: impl Into<String>) {
        self.names
            .insert(name.as_ref().to_uppercase(), reference.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl AsRef<str>, reference: impl Into<String>) -> Self {
        self.insert(name, reference);
        self
    }

    /// Reference text for a name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<N: AsRef<str>, R: Into<String>> FromIterator<(N, R)> for DefinedNames {
    fn from_iter<I: IntoIterator<Item = (N, R)>>(iter: I) -> Self {
        let mut names = DefinedNames::new();
        for (name, reference) in iter {
            names.insert(name, reference);
        }
        names
    }
}
