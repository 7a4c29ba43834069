use std::io;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ntex::web;
use ntex::web::HttpRequest;
use serde::Serialize;
use spdlog::info;

use crate::config::{redact_credentials, Config};
use crate::document::RawDocument;
use crate::error::ApiError;
use crate::identity::new_object_id;
use crate::normalize::{map_post_document, normalize_documents};
use crate::ping::{notify_search_engines, PingOutcome};
use crate::post::Post;
use crate::query_string::{ListParams, QueryString};
use crate::store::json_store::JsonFileStore;
use crate::store::{
    parse_identifier, resolve_post, DocStore, FindOptions, PostFilter, PostUpdate, Visibility,
};
use crate::text_utils::{format_timestamp, slug_from_title};
use crate::view::rss_renderer::RssChannel;
use crate::view::sitemap_renderer::Sitemap;

struct AppState {
    config: Config,
    store: Box<dyn DocStore>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

fn visibility_for(include_drafts: bool) -> Visibility {
    if include_drafts {
        Visibility::All
    } else {
        Visibility::Published
    }
}

// --- read-side core, handler-independent so it can be exercised directly

fn fetch_post_list(store: &dyn DocStore, params: &ListParams) -> Result<Vec<Post>, ApiError> {
    let filter = PostFilter {
        visibility: visibility_for(params.include_drafts),
        featured: if params.featured { Some(true) } else { None },
        tag: params.category.clone(),
        exclude_id: None,
    };

    let docs = store.find(&filter, &FindOptions::window(params.offset, params.limit))?;
    Ok(normalize_documents(&docs))
}

fn fetch_featured(
    store: &dyn DocStore,
    limit: usize,
    include_drafts: bool,
) -> Result<Vec<Post>, ApiError> {
    let visibility = visibility_for(include_drafts);
    let filter = PostFilter {
        visibility,
        featured: Some(true),
        ..PostFilter::default()
    };

    let mut docs = store.find(&filter, &FindOptions::newest(limit))?;

    // No featured stories yet: latest posts stand in
    if docs.is_empty() {
        let fallback = PostFilter {
            visibility,
            ..PostFilter::default()
        };
        docs = store.find(&fallback, &FindOptions::newest(limit))?;
    }

    Ok(normalize_documents(&docs))
}

fn fetch_related(store: &dyn DocStore, post_id: i64, limit: usize) -> Result<Vec<Post>, ApiError> {
    let current = resolve_post(
        store,
        &crate::store::Identifier::Id(post_id),
        Visibility::All,
    )?
    .ok_or_else(ApiError::post_not_found)?;

    let tags = current.tag_list();

    let filter = PostFilter {
        exclude_id: Some(post_id),
        ..PostFilter::published_only()
    };
    let candidates = store.find(&filter, &FindOptions::default())?;

    let related: Vec<RawDocument> = candidates
        .iter()
        .filter(|doc| doc.tag_list().iter().any(|t| tags.contains(t)))
        .take(limit)
        .cloned()
        .collect();

    // No tag overlap anywhere: latest posts stand in
    let related = if related.is_empty() {
        candidates.into_iter().take(limit).collect()
    } else {
        related
    };

    Ok(normalize_documents(&related))
}

// --- routes -------------------------------------------------------------

#[web::get("/api/posts")]
async fn list_posts(
    req: HttpRequest,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let query = req.uri().query().unwrap_or("");
    let params = match ListParams::parse(query, state.config.page_size()) {
        Ok(params) => params,
        Err(e) => return e.to_response(),
    };

    match fetch_post_list(state.store.as_ref(), &params) {
        Ok(posts) => web::HttpResponse::Ok().json(&posts),
        Err(e) => e.to_response(),
    }
}

#[web::get("/api/posts/featured")]
async fn featured_posts(
    req: HttpRequest,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let qs = QueryString::from(req.uri().query().unwrap_or(""));
    let limit = match qs.get_usize("limit") {
        Ok(limit) => limit.unwrap_or(state.config.featured_count()),
        Err(e) => return e.to_response(),
    };

    match fetch_featured(state.store.as_ref(), limit, qs.flag("includeDrafts")) {
        Ok(posts) => web::HttpResponse::Ok().json(&posts),
        Err(e) => e.to_response(),
    }
}

#[web::get("/api/posts/{identifier}")]
async fn get_post(
    path: web::types::Path<String>,
    req: HttpRequest,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let raw = path.into_inner();
    let qs = QueryString::from(req.uri().query().unwrap_or(""));

    let Some(identifier) = parse_identifier(&raw) else {
        return ApiError::BadRequest("Invalid post identifier".to_string()).to_response();
    };

    let visibility = visibility_for(qs.flag("includeDrafts"));
    match resolve_post(state.store.as_ref(), &identifier, visibility) {
        Ok(Some(doc)) => match map_post_document(&doc) {
            Some(post) => web::HttpResponse::Ok().json(&post),
            None => web::HttpResponse::InternalServerError().json(&MessageBody {
                message: "Failed to format post",
            }),
        },
        Ok(None) => ApiError::post_not_found().to_response(),
        Err(e) => ApiError::Store(e).to_response(),
    }
}

#[web::get("/api/posts/{id}/related")]
async fn related_posts(
    path: web::types::Path<String>,
    req: HttpRequest,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let raw = path.into_inner();
    let Ok(post_id) = raw.parse::<i64>() else {
        return ApiError::BadRequest("Invalid post ID format".to_string()).to_response();
    };

    let qs = QueryString::from(req.uri().query().unwrap_or(""));
    let limit = match qs.get_usize("limit") {
        Ok(limit) => limit.unwrap_or(state.config.related_count()),
        Err(e) => return e.to_response(),
    };

    match fetch_related(state.store.as_ref(), post_id, limit) {
        Ok(posts) => web::HttpResponse::Ok().json(&posts),
        Err(e) => e.to_response(),
    }
}

#[web::get("/api/feed.rss")]
async fn feed_rss(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let docs = match state.store.find(
        &PostFilter::published_only(),
        &FindOptions::newest(state.config.feed_size()),
    ) {
        Ok(docs) => docs,
        Err(e) => return ApiError::Store(e).to_response(),
    };

    let posts = normalize_documents(&docs);
    let channel = RssChannel {
        ch_title: state.config.site.title.as_str(),
        ch_link: state.config.site.base_url.as_str(),
        ch_desc: state.config.site.description.as_str(),
    };

    match channel.render(&posts) {
        Ok(xml) => web::HttpResponse::Ok()
            .content_type("application/rss+xml; charset=utf-8")
            .body(xml),
        Err(e) => web::HttpResponse::InternalServerError()
            .body(format!("Error generating RSS feed: {}", e)),
    }
}

#[web::get("/api/sitemap.xml")]
async fn sitemap_xml(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let docs = match state
        .store
        .find(&PostFilter::published_only(), &FindOptions::default())
    {
        Ok(docs) => docs,
        Err(e) => return ApiError::Store(e).to_response(),
    };

    let posts = normalize_documents(&docs);
    let sitemap = Sitemap {
        base_url: state.config.site.base_url.as_str(),
    };

    match sitemap.render(&posts, &format_timestamp(&Utc::now())) {
        Ok(xml) => web::HttpResponse::Ok()
            .content_type("application/xml; charset=utf-8")
            .body(xml),
        Err(e) => web::HttpResponse::InternalServerError()
            .body(format!("Error generating sitemap: {}", e)),
    }
}

#[web::get("/api/robots.txt")]
async fn robots_txt(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let base = state.config.site.base_url.trim_end_matches('/');
    let body = format!(
        "User-agent: *\nAllow: /\nDisallow: /api/admin/\n\nSitemap: {}/api/sitemap.xml\n",
        base
    );

    web::HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(body)
}

#[derive(Serialize)]
struct PingReport {
    message: &'static str,
    timestamp: String,
    results: Vec<PingOutcome>,
}

#[web::post("/api/sitemap/ping")]
async fn ping_sitemap(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let base = state.config.site.base_url.trim_end_matches('/');
    let sitemap_url = format!("{}/api/sitemap.xml", base);

    let results = notify_search_engines(&sitemap_url).await;

    web::HttpResponse::Ok().json(&PingReport {
        message: "Sitemap update notifications sent",
        timestamp: format_timestamp(&Utc::now()),
        results,
    })
}

#[derive(Serialize)]
struct StoreHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    timestamp: String,
    store: StoreHealth,
}

#[web::get("/api/health")]
async fn health(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let start = Instant::now();
    let report = match state.store.ping() {
        Ok(()) => HealthReport {
            status: "ok",
            timestamp: format_timestamp(&Utc::now()),
            store: StoreHealth {
                status: "healthy",
                latency_ms: Some(start.elapsed().as_millis()),
                error: None,
            },
        },
        Err(e) => HealthReport {
            status: "error",
            timestamp: format_timestamp(&Utc::now()),
            store: StoreHealth {
                status: "unhealthy",
                latency_ms: None,
                error: Some(e.to_string()),
            },
        },
    };

    if report.status == "ok" {
        web::HttpResponse::Ok().json(&report)
    } else {
        web::HttpResponse::ServiceUnavailable().json(&report)
    }
}

// --- admin (demo parity: unauthenticated, like the stub auth it replaces)

fn build_new_document(input: PostUpdate) -> RawDocument {
    let title = input.title.unwrap_or_else(|| "Untitled".to_string());
    let now = format_timestamp(&Utc::now());
    let published = input.is_published.unwrap_or(false);

    RawDocument {
        oid: Some(new_object_id()),
        slug: Some(
            input
                .slug
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| slug_from_title(&title)),
        ),
        title: Some(title),
        content: Some(input.content.unwrap_or_default()),
        excerpt: input.excerpt,
        featured_image: input.featured_image,
        created_at: Some(now.clone()),
        updated_at: Some(now),
        user_id: Some(
            input
                .user_id
                .unwrap_or_else(|| "demo-user-001".to_string()),
        ),
        tags: input.tags.map(crate::document::TagsField::Many),
        is_published: Some(published),
        draft: Some(!published),
        is_featured: Some(input.is_featured.unwrap_or(false)),
        ..RawDocument::default()
    }
}

#[web::post("/api/admin/posts")]
async fn create_post(
    body: web::types::Json<PostUpdate>,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let doc = build_new_document(body.into_inner());

    if let Err(e) = state.store.insert_one(doc.clone()) {
        return ApiError::Store(e).to_response();
    }

    info!("Created post {}", doc.oid.as_deref().unwrap_or("?"));
    match map_post_document(&doc) {
        Some(post) => web::HttpResponse::Created().json(&post),
        None => web::HttpResponse::InternalServerError().json(&MessageBody {
            message: "Failed to format post",
        }),
    }
}

fn resolve_admin_oid(store: &dyn DocStore, raw: &str) -> Result<String, ApiError> {
    let identifier = parse_identifier(raw)
        .ok_or_else(|| ApiError::BadRequest("Invalid post identifier".to_string()))?;

    let doc = resolve_post(store, &identifier, Visibility::All)?
        .ok_or_else(ApiError::post_not_found)?;

    // Documents without an object identifier cannot be addressed for writes
    doc.oid.ok_or_else(ApiError::post_not_found)
}

#[web::patch("/api/admin/posts/{id}")]
async fn update_post(
    path: web::types::Path<String>,
    body: web::types::Json<PostUpdate>,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let oid = match resolve_admin_oid(state.store.as_ref(), &path.into_inner()) {
        Ok(oid) => oid,
        Err(e) => return e.to_response(),
    };

    match state.store.update_one(&oid, &body.into_inner()) {
        Ok(Some(doc)) => match map_post_document(&doc) {
            Some(post) => web::HttpResponse::Ok().json(&post),
            None => web::HttpResponse::InternalServerError().json(&MessageBody {
                message: "Failed to format post",
            }),
        },
        Ok(None) => ApiError::post_not_found().to_response(),
        Err(e) => ApiError::Store(e).to_response(),
    }
}

#[web::delete("/api/admin/posts/{id}")]
async fn delete_post(
    path: web::types::Path<String>,
    state: web::types::State<Arc<AppState>>,
) -> web::HttpResponse {
    let oid = match resolve_admin_oid(state.store.as_ref(), &path.into_inner()) {
        Ok(oid) => oid,
        Err(e) => return e.to_response(),
    };

    match state.store.delete_one(&oid) {
        Ok(true) => web::HttpResponse::Ok().json(&MessageBody {
            message: "Post deleted",
        }),
        Ok(false) => ApiError::post_not_found().to_response(),
        Err(e) => ApiError::Store(e).to_response(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishAllReport {
    message: String,
    published_count: usize,
    total_posts: usize,
    published_posts: usize,
}

#[web::post("/api/admin/posts/publish-all")]
async fn publish_all(state: web::types::State<Arc<AppState>>) -> web::HttpResponse {
    let drafts = PostFilter {
        visibility: Visibility::Drafts,
        ..PostFilter::default()
    };

    let published_count = match state.store.update_many(&drafts, &PostUpdate::publish()) {
        Ok(count) => count,
        Err(e) => return ApiError::Store(e).to_response(),
    };

    let all = PostFilter {
        visibility: Visibility::All,
        ..PostFilter::default()
    };
    let total_posts = state.store.count_documents(&all).unwrap_or(0);
    let published_posts = state
        .store
        .count_documents(&PostFilter::published_only())
        .unwrap_or(0);

    info!("Published {} draft posts", published_count);
    web::HttpResponse::Ok().json(&PublishAllReport {
        message: format!("Successfully published {} posts", published_count),
        published_count,
        total_posts,
        published_posts,
    })
}

pub async fn server_run(config: Config) -> io::Result<()> {
    let uri = config.store_uri()?;
    info!("Using document store at {}", redact_credentials(&uri));

    let store = JsonFileStore::open(&uri)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;

    let bind_addr = config.server.address.clone();
    let bind_port = config.server.port;
    let app_state = Arc::new(AppState {
        config,
        store: Box::new(store),
    });

    web::HttpServer::new(move || {
        web::App::new()
            .state(app_state.clone())
            .service(health)
            .service(featured_posts)
            .service(related_posts)
            .service(list_posts)
            .service(get_post)
            .service(feed_rss)
            .service(sitemap_xml)
            .service(robots_txt)
            .service(ping_sitemap)
            .service(create_post)
            .service(update_post)
            .service(delete_post)
            .service(publish_all)
    })
    .bind((bind_addr, bind_port))?
    .run()
    .await
}
