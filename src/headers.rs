//! Ordered, multi-valued header mapping

use serde::{Deserialize, Serialize};

/// Header mapping as recorded in a cassette
///
/// Entries keep their original order and name casing. Each name maps to an
/// ordered list of values. Name lookup is case-insensitive and the first
/// matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (distinct names as recorded)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in recorded order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Name of the first entry matching `name` case-insensitively, with its
    /// original casing
    #[must_use]
    pub fn find_name(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].0.as_str())
    }

    /// Values of the first entry matching `name` case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.entries[i].1.as_slice())
    }

    /// First value of the first entry matching `name`
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether any entry matches `name` case-insensitively
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Append a value, merging into the first entry with the same name
    #[must_use]
    pub fn with_appended(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
        self
    }

    /// Replace the values of the first entry matching `name`, keeping its
    /// casing and position; append a new entry named `name` if none matches
    #[must_use]
    pub fn with_replaced(mut self, name: &str, values: Vec<String>) -> Self {
        match self.position(name) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((name.to_string(), values)),
        }
        self
    }

    /// Build a new mapping by transforming each entry's values
    #[must_use]
    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str, &[String]) -> Vec<String>,
    {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(name, values)| (name.clone(), f(name, values)))
                .collect(),
        }
    }

    /// Flatten into (name, value) pairs, one per value
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.clone(), v.clone())))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    /// Collect (name, value) pairs; repeated names merge into one entry
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |headers, (name, value)| {
                headers.with_appended(name, value)
            })
    }
}
