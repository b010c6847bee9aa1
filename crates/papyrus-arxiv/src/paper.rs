use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One search hit, as returned to tools and the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Paper {
    /// Last path segment of the entry URL, e.g. `2401.01234v2`
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    /// RFC 3339 with a `+00:00` offset
    pub published: String,
    pub pdf_url: String,
    pub primary_category: String,
}
