use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Canonical read-side projection of a stored post document. Computed per
/// request from a RawDocument and never persisted; every list/get endpoint
/// serializes exactly this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub excerpt: String,
    pub featured_image: String,
    pub created_at: String,
    pub updated_at: String,
    pub user_id: String,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub is_published: bool,
    pub read_time: u32,
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, slug={}, created={}\ntitle={}\ntags={}",
            self.id,
            self.slug,
            self.created_at,
            self.title,
            self.tags.join(" ")
        )
    }
}
