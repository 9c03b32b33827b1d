//! Run-wide schema of issue labels.
//!
//! The registry is owned by the dispatcher's collector task; workers never
//! touch it directly, they send their labels over a channel. A sorted
//! snapshot only exists on [`FrozenSchema`], which is produced by consuming
//! the registry once the channel has drained.

use std::collections::BTreeSet;

use crate::types::NAME_COLUMN;

/// Growing set of every issue label seen so far.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    labels: BTreeSet<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `labels` into the schema. Returns how many were new.
    pub fn merge<I, S>(&mut self, labels: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        labels
            .into_iter()
            .map(Into::into)
            .filter(|label| self.labels.insert(label.clone()))
            .count()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Stop growth and fix the column order.
    pub fn freeze(self) -> FrozenSchema {
        FrozenSchema {
            labels: self.labels.into_iter().collect(),
        }
    }
}

/// The final, alphabetically sorted schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenSchema {
    labels: Vec<String>,
}

impl FrozenSchema {
    /// Sorted issue labels.
    pub fn snapshot(&self) -> &[String] {
        &self.labels
    }

    /// Output header: `name` followed by the sorted labels.
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(NAME_COLUMN.to_string())
            .chain(self.labels.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
