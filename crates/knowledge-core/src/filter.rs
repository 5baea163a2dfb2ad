//! Typed filters for listing knowledge items.
//!
//! A [`Filter`] is a small predicate tree that store adapters translate
//! into their native query form. [`Filter::matches`] is the reference
//! evaluation: the in-memory store uses it directly, and the SQLite
//! adapter's generated SQL must agree with it.
//!
//! # Text matching
//!
//! [`Filter::TextMatchesAny`] treats its needle as a literal substring
//! (not a pattern) and compares case-insensitively. A multi-valued field
//! such as `tags` matches when any one of its elements contains the needle.

use serde_json::{Map, Value};

/// A searchable field of a knowledge item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Content,
    Tags,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Content => "content",
            Field::Tags => "tags",
        }
    }
}

/// Predicate over stored documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// `tags` contains this exact value as one element.
    TagEquals(String),
    /// At least one of `fields` contains `needle`, ignoring case.
    TextMatchesAny { fields: Vec<Field>, needle: String },
    /// Every clause matches.
    And(Vec<Filter>),
}

impl Filter {
    /// Build the filter used by `GET /api/knowledge`.
    ///
    /// `tag` requires exact tag membership; `q` requires a case-insensitive
    /// substring match on title, content, or any tag. Both together are
    /// AND-ed. Empty strings are treated as absent.
    pub fn for_listing(tag: Option<&str>, q: Option<&str>) -> Filter {
        let mut clauses = Vec::new();
        if let Some(tag) = tag.filter(|t| !t.is_empty()) {
            clauses.push(Filter::TagEquals(tag.to_string()));
        }
        if let Some(q) = q.filter(|q| !q.is_empty()) {
            clauses.push(Filter::TextMatchesAny {
                fields: vec![Field::Title, Field::Content, Field::Tags],
                needle: q.to_string(),
            });
        }
        match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            Filter::All => true,
            Filter::And(clauses) => clauses.iter().all(Filter::is_all),
            _ => false,
        }
    }

    /// Evaluate the filter against a document body.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::TagEquals(tag) => match doc.get(Field::Tags.as_str()) {
                Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(tag)),
                Some(Value::String(s)) => s == tag,
                _ => false,
            },
            Filter::TextMatchesAny { fields, needle } => {
                let needle = needle.to_lowercase();
                fields
                    .iter()
                    .any(|f| field_contains(doc.get(f.as_str()), &needle))
            }
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
        }
    }
}

/// `needle` must already be lowercased.
fn field_contains(value: Option<&Value>, needle: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.to_lowercase().contains(needle)),
        _ => false,
    }
}
