use std::collections::HashMap;

use crate::error::ApiError;

#[derive(PartialEq, Debug, Default)]
pub struct QueryString {
    items: HashMap<String, String>,
}

impl QueryString {
    pub fn from(buf: &str) -> Self {
        let vs: Vec<(String, String)> = serde_urlencoded::from_str(buf).unwrap_or_else(|_| vec![]);
        let items: HashMap<String, String> = vs.into_iter().collect();

        QueryString { items }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(|v| v.as_str())
    }

    /// Flags follow the wire convention: only the literal "true" switches
    /// them on.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    /// Numeric parameters are validated, not defaulted: a present but
    /// non-numeric value is a client error and must be rejected before any
    /// store access.
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
                ApiError::BadRequest(format!("Invalid {} parameter", key))
            }),
        }
    }
}

/// Parsed query parameters of the post-list endpoints.
#[derive(Debug, PartialEq)]
pub struct ListParams {
    pub limit: usize,
    pub offset: usize,
    pub category: Option<String>,
    pub featured: bool,
    pub include_drafts: bool,
}

impl ListParams {
    pub fn parse(query: &str, default_limit: usize) -> Result<ListParams, ApiError> {
        let qs = QueryString::from(query);

        Ok(ListParams {
            limit: qs.get_usize("limit")?.unwrap_or(default_limit),
            offset: qs.get_usize("offset")?.unwrap_or(0),
            category: qs.get("category").map(|s| s.to_string()),
            featured: qs.flag("featured"),
            include_drafts: qs.flag("includeDrafts"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let params =
            ListParams::parse("limit=10&offset=20&category=soil&featured=true", 50).unwrap();
        assert_eq!(
            params,
            ListParams {
                limit: 10,
                offset: 20,
                category: Some("soil".to_string()),
                featured: true,
                include_drafts: false,
            }
        );
    }

    #[test]
    fn test_parse_defaults() {
        let params = ListParams::parse("", 50).unwrap();
        assert_eq!(params.limit, 50);
        assert_eq!(params.offset, 0);
        assert_eq!(params.category, None);
        assert!(!params.featured);
        assert!(!params.include_drafts);
    }

    #[test]
    fn test_non_numeric_limit_rejected() {
        assert!(ListParams::parse("limit=abc", 50).is_err());
        assert!(ListParams::parse("offset=-1", 50).is_err());
    }

    #[test]
    fn test_flag_only_accepts_true() {
        let qs = QueryString::from("featured=TRUE&includeDrafts=1");
        assert!(!qs.flag("featured"));
        assert!(!qs.flag("includeDrafts"));
        assert!(QueryString::from("featured=true").flag("featured"));
    }

    #[test]
    fn test_urlencoded_values() {
        let qs = QueryString::from("category=pr%C3%A9cision");
        assert_eq!(qs.get("category"), Some("précision"));
    }

    #[test]
    fn test_invalid_query_string_is_empty() {
        assert_eq!(QueryString::from(""), QueryString::default());
    }
}
