//! Search expression construction and validation

use crate::error::{Error, Result};

/// Top-level arXiv archives a category may belong to
pub const VALID_CATEGORIES: &[&str] = &[
    "cs", "econ", "eess", "math", "physics", "q-bio", "q-fin", "stat", "astro-ph", "cond-mat",
    "gr-qc", "hep-ex", "hep-lat", "hep-ph", "hep-th", "math-ph", "nlin", "nucl-ex", "nucl-th",
    "quant-ph",
];

const FIELD_MARKERS: &[&str] = &["ti:", "au:", "abs:", "cat:", "AND", "OR", "ANDNOT"];

const LONG_QUERY_TERMS: usize = 10;

/// Prefix of a category code: `cs.LG` -> `cs`, `hep-th` -> `hep-th`
pub fn category_prefix(category: &str) -> &str {
    category.split('.').next().unwrap_or(category)
}

/// Fails on the first category whose prefix is not a known archive
pub fn validate_categories(categories: &[String]) -> Result<()> {
    for category in categories {
        let prefix = category_prefix(category);
        if !VALID_CATEGORIES.contains(&prefix) {
            tracing::warn!(%prefix, "unknown category prefix");
            return Err(Error::InvalidCategory(prefix.to_string()));
        }
    }
    Ok(())
}

/// How a query is written. Queries are never rewritten, only classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape {
    /// Uses field prefixes or boolean operators
    Fielded,
    /// Wrapped in double quotes
    Quoted,
    /// Bare terms
    Plain { terms: usize },
}

pub fn inspect_query(query: &str) -> QueryShape {
    let shape = if FIELD_MARKERS.iter().any(|m| query.contains(m)) {
        QueryShape::Fielded
    } else if query.len() >= 2 && query.starts_with('"') && query.ends_with('"') {
        QueryShape::Quoted
    } else {
        let terms = query.split_whitespace().count();
        if terms > LONG_QUERY_TERMS {
            tracing::warn!(
                terms,
                "very long query; consider quoting phrases or using field prefixes"
            );
        }
        QueryShape::Plain { terms }
    };
    tracing::debug!(?shape, query, "inspected query");
    shape
}

/// A validated search expression ready to send as `search_query`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub categories: Vec<String>,
    pub shape: QueryShape,
}

impl SearchQuery {
    pub fn build(query: &str, categories: &[String]) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery(query.to_string()));
        }
        let shape = inspect_query(query);
        validate_categories(categories)?;
        Ok(Self {
            query: query.to_string(),
            categories: categories.to_vec(),
            shape,
        })
    }

    /// `({query}) (cat:a OR cat:b)`; the category group is omitted when empty
    pub fn expression(&self) -> String {
        if self.categories.is_empty() {
            return format!("({})", self.query);
        }
        let filter = self
            .categories
            .iter()
            .map(|c| format!("cat:{}", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!("({}) ({})", self.query, filter)
    }
}
