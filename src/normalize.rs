use std::collections::HashSet;

use chrono::Utc;

use crate::document::RawDocument;
use crate::post::Post;
use crate::text_utils::{
    clean_excerpt, format_timestamp, parse_timestamp, read_time, slug_from_title,
};

/// Derived excerpts are capped at this many characters before the `...`.
pub const EXCERPT_LEN: usize = 150;

/// Maps a stored document to the canonical Post shape, applying the
/// alternate-field precedence (explicit canonical field, then known
/// alternate, then computed default). Returns None for documents too empty
/// to identify: no stored identifier and nothing to derive one from.
pub fn map_post_document(doc: &RawDocument) -> Option<Post> {
    if doc.oid.is_none()
        && doc.id.is_none()
        && doc.title.is_none()
        && doc.content.is_none()
    {
        return None;
    }

    let title = doc.title.clone().unwrap_or_else(|| "Untitled".to_string());
    let content = doc.content.clone().unwrap_or_default();

    let slug = match doc.slug {
        Some(ref slug) if !slug.is_empty() => slug.clone(),
        _ => slug_from_title(&title),
    };

    let excerpt = match doc.excerpt {
        Some(ref excerpt) if !excerpt.is_empty() => excerpt.clone(),
        _ => clean_excerpt(&content, EXCERPT_LEN),
    };

    let featured_image = doc
        .featured_image
        .clone()
        .or_else(|| doc.cover_image.clone())
        .unwrap_or_default();

    let now = Utc::now();
    let created_at = doc
        .created_raw()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let updated_at = doc
        .updated_raw()
        .and_then(parse_timestamp)
        .unwrap_or(now);

    Some(Post {
        id: doc.numeric_id(),
        title,
        read_time: read_time(&content),
        content,
        slug,
        excerpt,
        featured_image,
        created_at: format_timestamp(&created_at),
        updated_at: format_timestamp(&updated_at),
        user_id: doc.user_id.clone().unwrap_or_default(),
        tags: doc.tag_list(),
        is_featured: doc.featured(),
        is_published: doc.published(),
    })
}

/// Resolves id collisions within one result set without touching order or
/// content: a seen id is bumped by one until a free value is found. Bumped
/// values can themselves collide, so the probe repeats rather than
/// stopping after a single increment.
pub fn deduplicate_posts(posts: Vec<Post>) -> Vec<Post> {
    let mut seen: HashSet<i64> = HashSet::new();

    posts
        .into_iter()
        .map(|mut post| {
            while seen.contains(&post.id) {
                post.id += 1;
            }
            seen.insert(post.id);
            post
        })
        .collect()
}

/// find() output → deduplicated Post list, in store order.
pub fn normalize_documents(docs: &[RawDocument]) -> Vec<Post> {
    let posts = docs.iter().filter_map(map_post_document).collect();
    deduplicate_posts(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> RawDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_map_scenario_defaults() {
        let post = map_post_document(&doc(
            r##"{"title": "Hello World!", "content": "# Hi\n\nSome **bold** text."}"##,
        ))
        .unwrap();

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.excerpt, "Hi Some bold text.");
        assert_eq!(post.read_time, 1);
        assert!(post.is_published);
        assert!(!post.is_featured);
        assert!(post.tags.is_empty());
        assert!(post.id > 0);
    }

    #[test]
    fn test_map_prefers_canonical_fields() {
        let post = map_post_document(&doc(
            r#"{
                "_id": "507f1f77bcf86cd799439011",
                "title": "T",
                "content": "c",
                "slug": "explicit-slug",
                "excerpt": "explicit excerpt",
                "featuredImage": "/canonical.png",
                "coverImage": "/legacy.png",
                "createdAt": "2024-03-01T00:00:00Z",
                "date": "2020-01-01"
            }"#,
        ))
        .unwrap();

        assert_eq!(post.slug, "explicit-slug");
        assert_eq!(post.excerpt, "explicit excerpt");
        assert_eq!(post.featured_image, "/canonical.png");
        assert_eq!(post.created_at, "2024-03-01T00:00:00.000Z");
    }

    #[test]
    fn test_map_falls_back_to_alternates() {
        let post = map_post_document(&doc(
            r#"{
                "title": "T",
                "coverImage": "/legacy.png",
                "date": "2024-01-02 03:04:05",
                "lastModified": "2024-01-03",
                "tags": "irrigation",
                "featured": true,
                "draft": true
            }"#,
        ))
        .unwrap();

        assert_eq!(post.featured_image, "/legacy.png");
        assert_eq!(post.created_at, "2024-01-02T03:04:05.000Z");
        assert_eq!(post.updated_at, "2024-01-03T00:00:00.000Z");
        assert_eq!(post.tags, ["irrigation"]);
        assert!(post.is_featured);
        assert!(!post.is_published);
    }

    #[test]
    fn test_map_unparseable_timestamp_defaults_to_now() {
        let post =
            map_post_document(&doc(r#"{"title": "T", "date": "yesterday-ish"}"#)).unwrap();
        // RFC 3339 shape, not the garbage input
        assert!(post.created_at.ends_with('Z'));
        assert!(post.created_at.len() >= 20);
    }

    #[test]
    fn test_map_untitled_document() {
        let post = map_post_document(&doc(r#"{"content": "only a body"}"#)).unwrap();
        assert_eq!(post.title, "Untitled");
        assert_eq!(post.slug, "untitled");
    }

    #[test]
    fn test_map_rejects_empty_document() {
        assert!(map_post_document(&doc(r#"{}"#)).is_none());
        assert!(map_post_document(&doc(r#"{"draft": false}"#)).is_none());
    }

    #[test]
    fn test_map_is_idempotent() {
        let raw = doc(
            r#"{"_id": "65a1b2c3d4e5f60718293a4b", "title": "T", "content": "c",
                "date": "2024-01-01", "lastModified": "2024-01-02"}"#,
        );
        assert_eq!(map_post_document(&raw), map_post_document(&raw));
    }

    fn post_with_id(id: i64) -> Post {
        Post {
            id,
            title: format!("post-{}", id),
            content: String::new(),
            slug: format!("post-{}", id),
            excerpt: String::new(),
            featured_image: String::new(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000Z".to_string(),
            user_id: String::new(),
            tags: vec![],
            is_featured: false,
            is_published: true,
            read_time: 1,
        }
    }

    #[test]
    fn test_dedup_two_way_collision() {
        let out = deduplicate_posts(vec![post_with_id(42), post_with_id(42)]);
        assert_eq!(out[0].id, 42);
        assert_eq!(out[1].id, 43);
        // Order and content untouched
        assert_eq!(out[0].title, "post-42");
        assert_eq!(out[1].title, "post-42");
    }

    #[test]
    fn test_dedup_probes_past_occupied_ids() {
        // 42 bumped to 43 would collide again, then 44 is taken too
        let out = deduplicate_posts(vec![
            post_with_id(42),
            post_with_id(43),
            post_with_id(44),
            post_with_id(42),
        ]);
        let ids: Vec<i64> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, [42, 43, 44, 45]);
    }

    #[test]
    fn test_dedup_ids_pairwise_distinct() {
        let out = deduplicate_posts(vec![
            post_with_id(7),
            post_with_id(7),
            post_with_id(7),
            post_with_id(8),
            post_with_id(1),
        ]);
        let mut ids: Vec<i64> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, [7, 8, 9, 10, 1]);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), out.len());
    }

    #[test]
    fn test_normalize_documents_skips_unmappable() {
        let docs = vec![
            doc(r#"{"title": "A", "content": "a"}"#),
            doc(r#"{}"#),
            doc(r#"{"title": "B", "content": "b"}"#),
        ];
        let posts = normalize_documents(&docs);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "A");
        assert_eq!(posts[1].title, "B");
    }
}
