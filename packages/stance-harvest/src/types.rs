//! Records that flow through the harvest pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder written for any response that could not be obtained.
pub const SENTINEL: &str = "Couldn't fetch response";

/// Literal the link resolver writes when it found nothing.
pub const NO_LINK_MARKER: &str = "None";

/// Name of the leading column in every output table.
pub const NAME_COLUMN: &str = "name";

/// A candidate and the page that holds their answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub name: String,
    pub url: Option<String>,
}

impl LinkRecord {
    /// Build a record from a raw table cell. Empty cells and the `None`
    /// marker both mean "no link".
    pub fn new(name: impl Into<String>, link: Option<&str>) -> Self {
        let url = link
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != NO_LINK_MARKER)
            .map(str::to_string);

        Self {
            name: name.into(),
            url,
        }
    }

    /// The URL to fetch, if there is one.
    pub fn usable_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Cell value to persist for this record.
    pub fn link_cell(&self) -> &str {
        self.url.as_deref().unwrap_or(NO_LINK_MARKER)
    }
}

/// One issue label and the candidate's answer to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueResponse {
    pub issue: String,
    pub response: String,
}

impl IssueResponse {
    pub fn new(issue: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            issue: issue.into(),
            response: response.into(),
        }
    }
}

/// Everything one task learned about one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateRecord {
    pub name: String,
    pub responses: HashMap<String, String>,
}

impl CandidateRecord {
    /// A record with no responses; assembles into an all-sentinel row.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: HashMap::new(),
        }
    }

    /// Build from extracted pairs. A repeated label keeps its last response.
    pub fn from_pairs(name: impl Into<String>, pairs: impl IntoIterator<Item = IssueResponse>) -> Self {
        Self {
            name: name.into(),
            responses: pairs
                .into_iter()
                .map(|pair| (pair.issue, pair.response))
                .collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.responses.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Response for `issue`, or the sentinel.
    pub fn response_or_sentinel(&self, issue: &str) -> &str {
        self.responses.get(issue).map(String::as_str).unwrap_or(SENTINEL)
    }
}

/// One finished table row, aligned to the final column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub name: String,
    pub values: Vec<String>,
}

impl OutputRow {
    /// Row as CSV fields, name first.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.values.iter().map(String::as_str))
    }
}

/// A rectangular table: header plus rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<OutputRow>,
}

impl Table {
    /// Issue columns, without the leading name column.
    pub fn issue_columns(&self) -> &[String] {
        self.columns.get(1..).unwrap_or(&[])
    }

    pub fn row(&self, name: &str) -> Option<&OutputRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Look up one cell by candidate and column name.
    pub fn cell(&self, name: &str, column: &str) -> Option<&str> {
        let idx = self.issue_columns().iter().position(|c| c == column)?;
        self.row(name)?.values.get(idx).map(String::as_str)
    }
}
