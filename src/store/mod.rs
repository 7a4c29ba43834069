use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::RawDocument;
use crate::identity::derive_post_id;
use crate::text_utils::{parse_timestamp, slug_from_title};

pub mod json_store;
pub mod mem_store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store configuration error: {0}")]
    Config(String),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Which documents a query may see. `Published` applies the canonical
/// published rule, `Drafts` is its complement (the publish-all target
/// set), `All` is the admin/includeDrafts view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Published,
    Drafts,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Post collection filter: the store-side subset of query parameters.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub visibility: Visibility,
    pub featured: Option<bool>,
    pub tag: Option<String>,
    pub exclude_id: Option<i64>,
}

impl PostFilter {
    pub fn published_only() -> Self {
        PostFilter::default()
    }

    pub fn matches(&self, doc: &RawDocument) -> bool {
        if !visible(doc, self.visibility) {
            return false;
        }
        if let Some(featured) = self.featured {
            if doc.featured() != featured {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !doc.has_tag(tag) {
                return false;
            }
        }
        if let Some(id) = self.exclude_id {
            if doc.numeric_id() == id {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn newest(limit: usize) -> Self {
        FindOptions {
            sort: SortOrder::NewestFirst,
            skip: 0,
            limit: Some(limit),
        }
    }

    pub fn window(skip: usize, limit: usize) -> Self {
        FindOptions {
            sort: SortOrder::NewestFirst,
            skip,
            limit: Some(limit),
        }
    }
}

/// Partial update for one or more documents. Fields left as None are kept
/// as stored. Writes target the canonical field names; the published flag
/// is mirrored into the legacy `draft` flag so older readers stay
/// consistent.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
}

impl PostUpdate {
    pub fn apply_to(&self, doc: &mut RawDocument) {
        if let Some(ref title) = self.title {
            doc.title = Some(title.clone());
        }
        if let Some(ref content) = self.content {
            doc.content = Some(content.clone());
        }
        if let Some(ref slug) = self.slug {
            doc.slug = Some(slug.clone());
        }
        if let Some(ref excerpt) = self.excerpt {
            doc.excerpt = Some(excerpt.clone());
        }
        if let Some(ref image) = self.featured_image {
            doc.featured_image = Some(image.clone());
        }
        if let Some(ref tags) = self.tags {
            doc.tags = Some(crate::document::TagsField::Many(tags.clone()));
        }
        if let Some(ref user_id) = self.user_id {
            doc.user_id = Some(user_id.clone());
        }
        if let Some(published) = self.is_published {
            doc.is_published = Some(published);
            doc.draft = Some(!published);
        }
        if let Some(featured) = self.is_featured {
            doc.is_featured = Some(featured);
        }
        doc.updated_at = Some(crate::text_utils::format_timestamp(&Utc::now()));
    }

    pub fn publish() -> Self {
        PostUpdate {
            is_published: Some(true),
            ..PostUpdate::default()
        }
    }
}

/// The document store contract every backend implements: filtered finds
/// with sort/skip/limit, counting, the single-document lookups used by the
/// identifier resolution chain, and the write surface for the admin API.
pub trait DocStore: Send + Sync {
    fn find(&self, filter: &PostFilter, options: &FindOptions) -> StoreResult<Vec<RawDocument>>;
    fn count_documents(&self, filter: &PostFilter) -> StoreResult<usize>;

    fn find_by_id(&self, id: i64, visibility: Visibility) -> StoreResult<Option<RawDocument>>;
    fn find_by_oid(&self, oid: &str, visibility: Visibility) -> StoreResult<Option<RawDocument>>;
    fn find_by_slug(&self, slug: &str, visibility: Visibility)
        -> StoreResult<Option<RawDocument>>;
    fn find_by_title(&self, title: &str, visibility: Visibility)
        -> StoreResult<Option<RawDocument>>;

    fn insert_one(&self, doc: RawDocument) -> StoreResult<()>;
    fn update_one(&self, oid: &str, update: &PostUpdate) -> StoreResult<Option<RawDocument>>;
    fn update_many(&self, filter: &PostFilter, update: &PostUpdate) -> StoreResult<usize>;
    fn delete_one(&self, oid: &str) -> StoreResult<bool>;

    /// Cheap reachability probe for the health endpoint.
    fn ping(&self) -> StoreResult<()>;
}

/// A post identifier as it arrives on the wire: digits mean a numeric id,
/// anything else is treated as a slug-like string.
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    Id(i64),
    Slug(String),
}

/// None for identifiers no lookup strategy could accept (empty string,
/// digit strings that overflow).
pub fn parse_identifier(raw: &str) -> Option<Identifier> {
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().map(Identifier::Id);
    }
    Some(Identifier::Slug(raw.to_string()))
}

/// Resolution chain, first hit wins: numeric input goes explicit-id then
/// derived-id (both behind `find_by_id`); string input goes object-id
/// literal, stored slug, then case-insensitive title.
pub fn resolve_post(
    store: &dyn DocStore,
    identifier: &Identifier,
    visibility: Visibility,
) -> StoreResult<Option<RawDocument>> {
    match identifier {
        Identifier::Id(id) => store.find_by_id(*id, visibility),
        Identifier::Slug(slug) => {
            if looks_like_oid(slug) {
                if let Some(doc) = store.find_by_oid(slug, visibility)? {
                    return Ok(Some(doc));
                }
            }
            if let Some(doc) = store.find_by_slug(slug, visibility)? {
                return Ok(Some(doc));
            }
            store.find_by_title(slug, visibility)
        }
    }
}

fn looks_like_oid(raw: &str) -> bool {
    raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit())
}

// --- shared collection logic -------------------------------------------
//
// Both backends hold the collection in memory once loaded, so filtering,
// ordering and the lookup indexes live here instead of being duplicated.

fn created_key(doc: &RawDocument) -> DateTime<Utc> {
    doc.created_raw()
        .and_then(parse_timestamp)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub(crate) fn find_in(
    docs: &[RawDocument],
    filter: &PostFilter,
    options: &FindOptions,
) -> Vec<RawDocument> {
    let mut hits: Vec<RawDocument> = docs.iter().filter(|d| filter.matches(d)).cloned().collect();

    // Stable sort keeps load order for equal timestamps
    match options.sort {
        SortOrder::NewestFirst => hits.sort_by(|a, b| created_key(b).cmp(&created_key(a))),
        SortOrder::OldestFirst => hits.sort_by(|a, b| created_key(a).cmp(&created_key(b))),
    }

    let hits: Vec<RawDocument> = hits.into_iter().skip(options.skip).collect();
    match options.limit {
        Some(limit) => hits.into_iter().take(limit).collect(),
        None => hits,
    }
}

fn visible(doc: &RawDocument, visibility: Visibility) -> bool {
    match visibility {
        Visibility::Published => doc.published(),
        Visibility::Drafts => !doc.published(),
        Visibility::All => true,
    }
}

/// Secondary indexes over a loaded collection. Explicit ids are inserted
/// ahead of derived ones so an explicit `id` field always shadows a
/// derived value, matching the resolution chain order.
pub(crate) struct DocIndex {
    by_id: HashMap<i64, usize>,
    by_oid: HashMap<String, usize>,
    by_slug: HashMap<String, usize>,
}

impl DocIndex {
    pub(crate) fn build(docs: &[RawDocument]) -> DocIndex {
        let mut by_id = HashMap::new();
        let mut by_oid = HashMap::new();
        let mut by_slug = HashMap::new();

        for (pos, doc) in docs.iter().enumerate() {
            if let Some(id) = doc.id {
                by_id.entry(id).or_insert(pos);
            }
            if let Some(ref oid) = doc.oid {
                by_oid.entry(oid.clone()).or_insert(pos);
            }
            if let Some(ref slug) = doc.slug {
                by_slug.entry(slug.clone()).or_insert(pos);
            }
        }

        for (pos, doc) in docs.iter().enumerate() {
            if doc.id.is_none() {
                if let Some(derived) = doc.oid.as_deref().and_then(derive_post_id) {
                    by_id.entry(derived).or_insert(pos);
                }
            }
        }

        DocIndex {
            by_id,
            by_oid,
            by_slug,
        }
    }

    pub(crate) fn find_by_id<'a>(
        &self,
        docs: &'a [RawDocument],
        id: i64,
        visibility: Visibility,
    ) -> Option<&'a RawDocument> {
        self.by_id
            .get(&id)
            .map(|pos| &docs[*pos])
            .filter(|doc| visible(doc, visibility))
    }

    pub(crate) fn find_by_oid<'a>(
        &self,
        docs: &'a [RawDocument],
        oid: &str,
        visibility: Visibility,
    ) -> Option<&'a RawDocument> {
        self.by_oid
            .get(oid)
            .map(|pos| &docs[*pos])
            .filter(|doc| visible(doc, visibility))
    }

    pub(crate) fn find_by_slug<'a>(
        &self,
        docs: &'a [RawDocument],
        slug: &str,
        visibility: Visibility,
    ) -> Option<&'a RawDocument> {
        self.by_slug
            .get(slug)
            .map(|pos| &docs[*pos])
            .filter(|doc| visible(doc, visibility))
    }
}

/// Last-resort lookup: exact title match ignoring case, or a title whose
/// derived slug equals the identifier (covers posts stored without a slug
/// field but linked by their computed slug).
pub(crate) fn find_by_title_in<'a>(
    docs: &'a [RawDocument],
    needle: &str,
    visibility: Visibility,
) -> Option<&'a RawDocument> {
    let lowered = needle.to_lowercase();
    docs.iter()
        .filter(|doc| visible(doc, visibility))
        .find(|doc| match doc.title {
            Some(ref title) => {
                title.to_lowercase() == lowered || slug_from_title(title) == needle
            }
            None => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> RawDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse_identifier("42"), Some(Identifier::Id(42)));
        assert_eq!(
            parse_identifier("hello-world"),
            Some(Identifier::Slug("hello-world".to_string()))
        );
        assert_eq!(parse_identifier(""), None);
        // Digits that overflow i64 are rejected, not mistaken for a slug
        assert_eq!(parse_identifier("99999999999999999999999999"), None);
    }

    #[test]
    fn test_filter_published_and_tag() {
        let filter = PostFilter {
            tag: Some("soil".to_string()),
            ..PostFilter::published_only()
        };
        assert!(filter.matches(&doc(r#"{"title": "a", "tags": ["soil"]}"#)));
        assert!(filter.matches(&doc(r#"{"title": "a", "tags": "soil"}"#)));
        assert!(!filter.matches(&doc(r#"{"title": "a", "tags": ["water"]}"#)));
        assert!(!filter.matches(&doc(r#"{"title": "a", "tags": ["soil"], "draft": true}"#)));
    }

    #[test]
    fn test_filter_exclude_id() {
        let d = doc(r#"{"id": 10, "title": "a"}"#);
        let filter = PostFilter {
            exclude_id: Some(10),
            ..PostFilter::default()
        };
        assert!(!filter.matches(&d));
    }

    #[test]
    fn test_find_in_sorts_newest_first_and_windows() {
        let docs = vec![
            doc(r#"{"title": "old", "date": "2020-01-01"}"#),
            doc(r#"{"title": "new", "date": "2024-01-01"}"#),
            doc(r#"{"title": "mid", "date": "2022-01-01"}"#),
        ];
        let all = find_in(&docs, &PostFilter::default(), &FindOptions::default());
        let titles: Vec<&str> = all.iter().map(|d| d.title.as_deref().unwrap()).collect();
        assert_eq!(titles, ["new", "mid", "old"]);

        let window = find_in(&docs, &PostFilter::default(), &FindOptions::window(1, 1));
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].title.as_deref(), Some("mid"));
    }

    #[test]
    fn test_index_explicit_id_shadows_derived() {
        // derived id of the second doc is 0x01 + 0x02 = 3
        let docs = vec![
            doc(r#"{"id": 3, "title": "explicit"}"#),
            doc(r#"{"_id": "000000010000000000000002", "title": "derived"}"#),
        ];
        let index = DocIndex::build(&docs);
        let hit = index.find_by_id(&docs, 3, Visibility::All).unwrap();
        assert_eq!(hit.title.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_index_respects_visibility() {
        let docs = vec![doc(r#"{"slug": "hidden", "title": "t", "draft": true}"#)];
        let index = DocIndex::build(&docs);
        assert!(index
            .find_by_slug(&docs, "hidden", Visibility::Published)
            .is_none());
        assert!(index.find_by_slug(&docs, "hidden", Visibility::All).is_some());
    }

    #[test]
    fn test_title_fallback_matches_derived_slug() {
        let docs = vec![doc(r#"{"title": "Hello World!", "content": "c"}"#)];
        assert!(find_by_title_in(&docs, "hello world!", Visibility::All).is_some());
        assert!(find_by_title_in(&docs, "hello-world", Visibility::All).is_some());
        assert!(find_by_title_in(&docs, "other", Visibility::All).is_none());
    }

    #[test]
    fn test_update_apply_mirrors_draft() {
        let mut d = doc(r#"{"title": "t", "draft": true}"#);
        PostUpdate::publish().apply_to(&mut d);
        assert_eq!(d.is_published, Some(true));
        assert_eq!(d.draft, Some(false));
        assert!(d.updated_at.is_some());
        assert!(d.published());
    }
}
