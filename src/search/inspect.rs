//! Query plan inspection.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;

/// One node of a query plan, as reported by
/// [`QueryMatch::inspect`](crate::search::matches::QueryMatch::inspect).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryInspectionNode {
    pub operation: String,
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<QueryInspectionNode>,
}

impl QueryInspectionNode {
    pub fn new<S: Into<String>>(operation: S) -> Self {
        QueryInspectionNode {
            operation: operation.into(),
            parameters: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_parameter<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: QueryInspectionNode) -> Self {
        self.children.push(child);
        self
    }

    /// Height of the tree rooted at this node. A leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render term bytes for display, escaping what is not UTF-8.
pub(crate) fn display_term(term: &[u8]) -> String {
    match std::str::from_utf8(term) {
        Ok(s) => s.to_string(),
        Err(_) => term.escape_ascii().to_string(),
    }
}
