//! Request payloads shared by the MCP tools and the HTTP API

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Result ordering requested from arXiv
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SortBy {
    #[default]
    #[serde(rename = "relevance")]
    Relevance,
    #[serde(rename = "lastUpdatedDate")]
    LastUpdatedDate,
}

impl SortBy {
    /// Value of the `sortBy` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::LastUpdatedDate => "lastUpdatedDate",
        }
    }
}

/// A single category or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Categories {
    One(String),
    Many(Vec<String>),
}

impl Default for Categories {
    fn default() -> Self {
        Categories::Many(vec!["cs".to_string(), "math".to_string()])
    }
}

impl Categories {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Categories::One(c) => vec![c.clone()],
            Categories::Many(cs) => cs.clone(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchRequest {
    /// Free-text or field-prefixed arXiv query, e.g. `ti:transformer`
    pub query: String,
    /// Number of papers wanted (arXiv caps a page at 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// `relevance` or `lastUpdatedDate`
    #[serde(default)]
    pub sort_by: SortBy,
    /// Category codes or prefixes such as `cs`, `cs.LG`, `math`
    #[serde(default)]
    pub categories: Categories,
    /// Earliest publication date to keep, e.g. `2024-01-01`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    /// Latest publication date to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            batch_size: default_batch_size(),
            sort_by: SortBy::default(),
            categories: Categories::default(),
            date_from: None,
            date_to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DownloadRequest {
    #[serde(flatten)]
    pub search: SearchRequest,
    /// Where to store PDFs; defaults to the configured papers directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

/// Fuzzy file-name query against the local library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PapersQuery {
    /// Characters to match, in order, against PDF file names
    pub query: String,
    /// Library root; defaults to the configured papers directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub papers_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest = serde_json::from_str(r#"{"query": "diffusion"}"#).unwrap();
        assert_eq!(req.batch_size, 5);
        assert_eq!(req.sort_by, SortBy::Relevance);
        assert_eq!(req.categories.to_vec(), ["cs", "math"]);
        assert!(req.date_from.is_none());
    }

    #[test]
    fn test_categories_accepts_string_or_list() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "q", "categories": "cs.LG"}"#).unwrap();
        assert_eq!(req.categories.to_vec(), ["cs.LG"]);

        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "q", "categories": ["stat", "cs.AI"]}"#).unwrap();
        assert_eq!(req.categories.to_vec(), ["stat", "cs.AI"]);
    }

    #[test]
    fn test_sort_by_wire_names() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"query": "q", "sort_by": "lastUpdatedDate"}"#).unwrap();
        assert_eq!(req.sort_by, SortBy::LastUpdatedDate);
        assert!(serde_json::from_str::<SortBy>(r#""submittedDate""#).is_err());
    }

    #[test]
    fn test_download_request_flattens_search() {
        let req: DownloadRequest = serde_json::from_str(
            r#"{"query": "rlhf", "batch_size": 2, "output_dir": "/tmp/papers"}"#,
        )
        .unwrap();
        assert_eq!(req.search.query, "rlhf");
        assert_eq!(req.search.batch_size, 2);
        assert_eq!(req.output_dir.as_deref(), Some("/tmp/papers"));
    }
}
