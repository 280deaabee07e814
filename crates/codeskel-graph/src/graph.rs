//! The code structure graph document.
//!
//! A [`Graph`] holds the directory listing of the scanned tree and every
//! extracted function under a collision-safe key. It serializes to the JSON
//! document consumed by the enrichment and page-generation stages:
//!
//! ```json
//! {
//!   "repository_url": "...",
//!   "file_system_map": { "/": ["a.py"], "/src": ["b.py"] },
//!   "functions": {
//!     "a.py::helper": {
//!       "file_path": "a.py",
//!       "function_name": "helper",
//!       "code_snippet": "def helper(): ...",
//!       "calls": [],
//!       "summary": null
//!     }
//!   }
//! }
//! ```
//!
//! Maps are ordered and `calls` is a sorted set, so serializing the same
//! graph always produces the same bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::ExtractedFunction;

/// Error type for reading and writing graph documents.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One function definition and the calls it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Path relative to the scanned root, `/`-separated.
    pub file_path: String,
    pub function_name: String,
    /// Verbatim source of the definition.
    pub code_snippet: String,
    /// Distinct callee identifiers.
    pub calls: BTreeSet<String>,
    /// Filled in by the enrichment stage; always null when built.
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

/// Root aggregate for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    repository_url: String,
    #[serde(default)]
    file_system_map: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    functions: BTreeMap<String, FunctionRecord>,
}

impl Graph {
    /// Create an empty graph labelled with a repository URL.
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            file_system_map: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Directory path (`/`, `/src`, ...) to the file names directly inside it.
    pub fn file_system_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.file_system_map
    }

    /// All function records keyed by their unique key.
    pub fn functions(&self) -> &BTreeMap<String, FunctionRecord> {
        &self.functions
    }

    /// Look up a record by key.
    pub fn function(&self, key: &str) -> Option<&FunctionRecord> {
        self.functions.get(key)
    }

    /// Number of function records.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Record the file listing of one directory.
    pub(crate) fn record_directory(&mut self, dir: String, files: Vec<String>) {
        self.file_system_map.insert(dir, files);
    }

    /// Pick the first free key for `base`: `base`, then `base_2`, `base_3`, ...
    fn assign_key(&self, base: String) -> String {
        if !self.functions.contains_key(&base) {
            return base;
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.functions.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Insert an extracted function from `file_path` and return its key.
    ///
    /// The key is `"{file_path}::{name}"`, suffixed with `_2`, `_3`, ... when
    /// already taken. Callers must insert in a reproducible order since the
    /// suffix depends on what is already present.
    pub(crate) fn insert_function(
        &mut self,
        file_path: &str,
        function: ExtractedFunction,
    ) -> String {
        let key = self.assign_key(format!("{}::{}", file_path, function.name));
        self.functions.insert(
            key.clone(),
            FunctionRecord {
                file_path: file_path.to_string(),
                function_name: function.name,
                code_snippet: function.code_snippet,
                calls: function.calls,
                summary: None,
            },
        );
        key
    }

    /// Records still waiting for a summary, in key order.
    pub fn pending_summaries(&self) -> impl Iterator<Item = (&str, &FunctionRecord)> {
        self.functions
            .iter()
            .filter(|(_, record)| record.summary.is_none())
            .map(|(key, record)| (key.as_str(), record))
    }

    /// Attach a summary to a record in place.
    ///
    /// Returns false if no record has this key.
    pub fn attach_summary(&mut self, key: &str, summary: serde_json::Value) -> bool {
        match self.functions.get_mut(key) {
            Some(record) => {
                record.summary = Some(summary);
                true
            }
            None => false,
        }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a graph document.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the document to a file.
    pub fn write_to(&self, path: &Path, pretty: bool) -> Result<(), GraphError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a document from a file.
    pub fn read_from(path: &Path) -> Result<Self, GraphError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
