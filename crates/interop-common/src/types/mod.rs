//! Common types shared across the healthbridge workspace.

use serde::{Deserialize, Serialize};

/// The tagged union spec.md §9 calls for in place of free-form JSON typing:
/// every column/field in a source or target schema carries exactly one of
/// these semantic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::Decimal => "decimal",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
            SemanticType::DateTime => "datetime",
        };
        write!(f, "{s}")
    }
}

/// One segment of a compiled target path: a plain field name, or an indexed
/// array element (`name` | `name[idx]`), per spec.md §9's path grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Name(String),
    Index(String, u32),
}

/// Error returned when a target path string does not match the grammar
/// `segment ::= name | name '[' uint ']'`, `path ::= segment ('.' segment)*`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid target path segment: {0}")]
pub struct PathParseError(pub String);

/// Parses a dotted target path (e.g. `"name[0].given[0]"`) into a vector of
/// segments, once, so repeated application doesn't re-parse the string.
pub fn parse_target_path(path: &str) -> Result<Vec<PathSegment>, PathParseError> {
    path.split('.')
        .map(parse_segment)
        .collect::<Result<Vec<_>, _>>()
}

fn parse_segment(segment: &str) -> Result<PathSegment, PathParseError> {
    if segment.is_empty() {
        return Err(PathParseError(segment.to_string()));
    }
    match segment.find('[') {
        None => Ok(PathSegment::Name(segment.to_string())),
        Some(open) => {
            if !segment.ends_with(']') {
                return Err(PathParseError(segment.to_string()));
            }
            let name = &segment[..open];
            let idx_str = &segment[open + 1..segment.len() - 1];
            if name.is_empty() {
                return Err(PathParseError(segment.to_string()));
            }
            let idx = idx_str
                .parse::<u32>()
                .map_err(|_| PathParseError(segment.to_string()))?;
            Ok(PathSegment::Index(name.to_string(), idx))
        },
    }
}

/// Pagination parameters for list queries (Record Store `listByJob`, RPC
/// list endpoints).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return
    pub limit: i64,

    /// Number of items to skip
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    pub fn page(page: i64, page_size: i64) -> Self {
        Self {
            limit: page_size,
            offset: page * page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_name() {
        assert_eq!(
            parse_target_path("birthDate").unwrap(),
            vec![PathSegment::Name("birthDate".to_string())]
        );
    }

    #[test]
    fn parses_nested_indexed_path() {
        assert_eq!(
            parse_target_path("name[0].given[0]").unwrap(),
            vec![
                PathSegment::Index("name".to_string(), 0),
                PathSegment::Index("given".to_string(), 0),
            ]
        );
    }

    #[test]
    fn rejects_malformed_index() {
        assert!(parse_target_path("name[x]").is_err());
        assert!(parse_target_path("[0]").is_err());
        assert!(parse_target_path("name[0").is_err());
        assert!(parse_target_path("").is_err());
    }

    #[test]
    fn semantic_type_display_round_trips_serde_tag() {
        assert_eq!(SemanticType::DateTime.to_string(), "datetime");
        let json = serde_json::to_string(&SemanticType::Decimal).unwrap();
        assert_eq!(json, "\"decimal\"");
    }

    #[test]
    fn pagination_page_computes_offset() {
        let p = Pagination::page(2, 20);
        assert_eq!(p.offset, 40);
        assert_eq!(p.limit, 20);
    }
}
