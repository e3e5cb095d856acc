//! Canonical catalog graph
//!
//! The harvester normalizes upstream records into these types and the
//! repository persists them. A [`Work`] owns its files and their pages and
//! refers to persons and organizations that may be shared with other works.

use serde::{Deserialize, Serialize};

/// An author, identified by name only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub given: String,
    pub family: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Upstream organization id
    pub id: i64,
    pub short_name: String,
    pub long_name: String,
}

/// One extracted page of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based position in the document
    pub sequence_no: i32,
    /// Label as printed by the document, if it defines one
    pub label: Option<String>,
    pub text: String,
}

impl Page {
    pub fn new(sequence_no: i32, label: Option<String>, text: &str) -> Self {
        Self {
            sequence_no,
            label,
            text: sanitize_text(text),
        }
    }
}

/// A downloadable document belonging to a work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Upstream file id
    pub id: i64,
    pub url: String,
    /// Empty until the content extractor has run, and also when the
    /// document could not be downloaded or parsed
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    /// Upstream work id
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub source_url: Option<String>,
    pub persons: Vec<Person>,
    pub organizations: Vec<Organization>,
    pub files: Vec<File>,
}

impl Work {
    /// Total number of extracted pages across all files
    pub fn page_count(&self) -> usize {
        self.files.iter().map(|f| f.pages.len()).sum()
    }
}

/// Remove NUL characters, which PostgreSQL refuses in text columns
pub fn sanitize_text(text: &str) -> String {
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text.to_string()
    }
}
