//! Label Sets
//!
//! The label model shared by the desired configuration and the remote snapshot

use serde::{Deserialize, Serialize};

/// A single issue label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    /// Label name, the case-sensitive matching key
    pub name: String,

    /// Label color (6-digit hexadecimal, without #, once normalized)
    pub color: String,

    /// Label description (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Label {
    /// Create a label without a description
    pub fn new<N: Into<String>, C: Into<String>>(name: N, color: C) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An ordered collection of labels belonging to one repository
///
/// Names are expected to be unique. When they are not, lookups return the
/// first member with the requested name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether some member has exactly this name
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// The first member with this name
    pub fn find(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.name == name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.labels.iter()
    }

    /// Member names in order
    pub fn names(&self) -> Vec<&str> {
        self.labels.iter().map(|label| label.name.as_str()).collect()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Label> {
        self.labels.iter_mut()
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        Self { labels }
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

impl IntoIterator for LabelSet {
    type Item = Label;
    type IntoIter = std::vec::IntoIter<Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.into_iter()
    }
}
