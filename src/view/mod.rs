pub mod rss_renderer;
pub mod sitemap_renderer;
