use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::post::Post;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Sitemap generator: the fixed site pages plus one entry per published
/// post, post lastmod taken from the document's update timestamp.
pub struct Sitemap<'a> {
    pub base_url: &'a str,
}

struct UrlEntry<'a> {
    loc: String,
    lastmod: &'a str,
    changefreq: &'a str,
    priority: &'a str,
}

impl<'a> Sitemap<'a> {
    /// `generated_at` stamps the static pages; post entries carry their
    /// own timestamps.
    pub fn render(&self, posts: &[Post], generated_at: &str) -> quick_xml::Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        let decl = Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None));
        writer.write_event(decl)?;

        let mut urlset = BytesStart::new("urlset");
        urlset.push_attribute(("xmlns", SITEMAP_NS));
        writer.write_event(Event::Start(urlset))?;

        let base = self.base_url.trim_end_matches('/');

        let mut entries = vec![
            UrlEntry {
                loc: format!("{}/", base),
                lastmod: generated_at,
                changefreq: "daily",
                priority: "1.0",
            },
            UrlEntry {
                loc: format!("{}/posts", base),
                lastmod: generated_at,
                changefreq: "daily",
                priority: "0.8",
            },
        ];

        for post in posts {
            entries.push(UrlEntry {
                loc: format!("{}/post/{}", base, post.slug),
                lastmod: post.updated_at.as_str(),
                changefreq: "weekly",
                priority: "0.7",
            });
        }

        for page in ["about", "contact"] {
            entries.push(UrlEntry {
                loc: format!("{}/{}", base, page),
                lastmod: generated_at,
                changefreq: "monthly",
                priority: "0.5",
            });
        }

        for entry in entries {
            push_url(&mut writer, &entry)?;
        }

        writer.write_event(Event::End(BytesEnd::new("urlset")))?;

        Ok(writer.into_inner().into_inner())
    }
}

fn push_url(writer: &mut Writer<Cursor<Vec<u8>>>, entry: &UrlEntry) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("url")))?;

    push_text(writer, "loc", entry.loc.as_str())?;
    push_text(writer, "lastmod", entry.lastmod)?;
    push_text(writer, "changefreq", entry.changefreq)?;
    push_text(writer, "priority", entry.priority)?;

    writer.write_event(Event::End(BytesEnd::new("url")))?;
    Ok(())
}

fn push_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str;

    use super::*;

    fn post_with_slug(slug: &str) -> Post {
        Post {
            id: 1,
            title: slug.to_string(),
            content: String::new(),
            slug: slug.to_string(),
            excerpt: String::new(),
            featured_image: String::new(),
            created_at: "2024-01-02T05:06:07.000Z".to_string(),
            updated_at: "2024-03-04T05:06:07.000Z".to_string(),
            user_id: String::new(),
            tags: vec![],
            is_featured: false,
            is_published: true,
            read_time: 1,
        }
    }

    #[test]
    fn render_sitemap() {
        let sitemap = Sitemap {
            base_url: "https://blog.example.com/",
        };
        let xml = sitemap
            .render(&[post_with_slug("soil-sensors")], "2024-06-01T00:00:00.000Z")
            .unwrap();
        let xml = str::from_utf8(&xml).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#));
        assert!(xml.contains("<loc>https://blog.example.com/</loc>"));
        assert!(xml.contains("<loc>https://blog.example.com/posts</loc>"));
        assert!(xml.contains("<loc>https://blog.example.com/post/soil-sensors</loc>"));
        assert!(xml.contains("<lastmod>2024-03-04T05:06:07.000Z</lastmod>"));
        assert!(xml.contains("<loc>https://blog.example.com/about</loc>"));
        assert!(xml.contains("<loc>https://blog.example.com/contact</loc>"));
        // One <url> per entry: home, posts index, the post, about, contact
        assert_eq!(xml.matches("<url>").count(), 5);
    }
}
