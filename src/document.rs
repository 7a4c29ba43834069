use serde::{Deserialize, Serialize};

use crate::identity;

/// A post document exactly as the store returns it. Field names drifted
/// across schema generations (`coverImage` vs `featuredImage`, `date` vs
/// `createdAt`, `draft` vs `isPublished`), so every known spelling is kept
/// as its own optional field and the accessors below apply the precedence
/// rules. This struct is the single source of truth for the alternate-name
/// table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(rename = "featuredImage", skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(rename = "coverImage", skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagsField>,
    #[serde(rename = "isPublished", skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(rename = "isFeatured", skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

/// Legacy documents sometimes stored a single tag as a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsField {
    Many(Vec<String>),
    One(String),
}

impl RawDocument {
    /// Canonical published rule: an explicit `isPublished` wins; otherwise
    /// anything not marked `draft: true` counts as published.
    pub fn published(&self) -> bool {
        match self.is_published {
            Some(flag) => flag,
            None => self.draft != Some(true),
        }
    }

    pub fn featured(&self) -> bool {
        match self.is_featured {
            Some(flag) => flag,
            None => self.featured == Some(true),
        }
    }

    /// Tags as an array, whatever shape the document stored.
    pub fn tag_list(&self) -> Vec<String> {
        match self.tags {
            Some(TagsField::Many(ref tags)) => tags.clone(),
            Some(TagsField::One(ref tag)) => vec![tag.clone()],
            None => vec![],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        match self.tags {
            Some(TagsField::Many(ref tags)) => tags.iter().any(|t| t == tag),
            Some(TagsField::One(ref t)) => t == tag,
            None => false,
        }
    }

    pub fn created_raw(&self) -> Option<&str> {
        self.created_at.as_deref().or(self.date.as_deref())
    }

    pub fn updated_raw(&self) -> Option<&str> {
        self.updated_at.as_deref().or(self.last_modified.as_deref())
    }

    /// Numeric identity with the full precedence chain: explicit `id`
    /// field, id derived from the object identifier, checksum of the
    /// object identifier, checksum of title+content for documents that
    /// carry no identifier at all. Every path is a pure function of the
    /// document, so repeated normalization agrees.
    pub fn numeric_id(&self) -> i64 {
        if let Some(id) = self.id {
            return id;
        }

        if let Some(ref oid) = self.oid {
            if let Some(id) = identity::derive_post_id(oid) {
                return id;
            }
            return identity::checksum_id(oid.as_bytes());
        }

        let seed = format!(
            "{}\n{}",
            self.title.as_deref().unwrap_or(""),
            self.content.as_deref().unwrap_or("")
        );
        identity::checksum_id(seed.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::derive_post_id;

    fn doc(json: &str) -> RawDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_published_truth_table() {
        assert!(doc(r#"{}"#).published());
        assert!(doc(r#"{"draft": false}"#).published());
        assert!(!doc(r#"{"draft": true}"#).published());
        assert!(doc(r#"{"isPublished": true}"#).published());
        assert!(!doc(r#"{"isPublished": false}"#).published());
        // Explicit flag wins over draft
        assert!(doc(r#"{"isPublished": true, "draft": true}"#).published());
        assert!(!doc(r#"{"isPublished": false, "draft": false}"#).published());
    }

    #[test]
    fn test_featured_alternates() {
        assert!(!doc(r#"{}"#).featured());
        assert!(doc(r#"{"featured": true}"#).featured());
        assert!(doc(r#"{"isFeatured": true}"#).featured());
        assert!(!doc(r#"{"isFeatured": false, "featured": true}"#).featured());
    }

    #[test]
    fn test_tags_scalar_and_array() {
        assert_eq!(doc(r#"{"tags": ["a", "b"]}"#).tag_list(), ["a", "b"]);
        assert_eq!(doc(r#"{"tags": "solo"}"#).tag_list(), ["solo"]);
        assert!(doc(r#"{}"#).tag_list().is_empty());

        assert!(doc(r#"{"tags": "solo"}"#).has_tag("solo"));
        assert!(doc(r#"{"tags": ["a", "b"]}"#).has_tag("b"));
        assert!(!doc(r#"{"tags": ["a"]}"#).has_tag("b"));
    }

    #[test]
    fn test_timestamp_alternates() {
        let d = doc(r#"{"date": "2024-01-01", "lastModified": "2024-02-01"}"#);
        assert_eq!(d.created_raw(), Some("2024-01-01"));
        assert_eq!(d.updated_raw(), Some("2024-02-01"));

        let d = doc(r#"{"createdAt": "2024-03-01", "date": "2024-01-01"}"#);
        assert_eq!(d.created_raw(), Some("2024-03-01"));
    }

    #[test]
    fn test_numeric_id_precedence() {
        let explicit = doc(r#"{"id": 7, "_id": "507f1f77bcf86cd799439011"}"#);
        assert_eq!(explicit.numeric_id(), 7);

        let derived = doc(r#"{"_id": "507f1f77bcf86cd799439011"}"#);
        assert_eq!(
            derived.numeric_id(),
            derive_post_id("507f1f77bcf86cd799439011").unwrap()
        );
    }

    #[test]
    fn test_numeric_id_without_identifier_is_stable() {
        let a = doc(r#"{"title": "Drip irrigation", "content": "body"}"#);
        let b = doc(r#"{"title": "Drip irrigation", "content": "body"}"#);
        assert_eq!(a.numeric_id(), b.numeric_id());
        assert!(a.numeric_id() > 0);
    }

    #[test]
    fn test_legacy_document_roundtrip_keeps_shape() {
        let json = r#"{"_id":"507f1f77bcf86cd799439011","title":"T","coverImage":"/img.png","draft":true}"#;
        let d = doc(json);
        let back = serde_json::to_string(&d).unwrap();
        // Unset alternates must not materialize on disk
        assert!(!back.contains("featuredImage"));
        assert!(!back.contains("isPublished"));
        assert!(back.contains("coverImage"));
        assert!(back.contains("draft"));
    }
}
