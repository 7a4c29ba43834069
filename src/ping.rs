use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use spdlog::{info, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

const SEARCH_ENGINE_PING_BASES: [&str; 3] = [
    "https://www.google.com/ping",
    "https://www.bing.com/ping",
    "https://www.yandex.com/ping",
];

/// Outcome of one notification attempt. Failures are data, not errors:
/// one unreachable engine must never fail the whole fan-out.
#[derive(Debug, Serialize)]
pub struct PingOutcome {
    pub url: String,
    pub status: Option<u16>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ping URLs for every configured search engine, sitemap location encoded
/// as the query value.
pub fn ping_targets(sitemap_url: &str) -> Vec<String> {
    let query = serde_urlencoded::to_string([("sitemap", sitemap_url)])
        .unwrap_or_else(|_| format!("sitemap={}", sitemap_url));

    SEARCH_ENGINE_PING_BASES
        .iter()
        .map(|base| format!("{}?{}", base, query))
        .collect()
}

/// Notifies all search engines about a sitemap update, one concurrent
/// request per target, best effort.
pub async fn notify_search_engines(sitemap_url: &str) -> Vec<PingOutcome> {
    notify_targets(ping_targets(sitemap_url)).await
}

async fn notify_targets(targets: Vec<String>) -> Vec<PingOutcome> {
    let client = match Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            return targets
                .into_iter()
                .map(|url| PingOutcome {
                    url,
                    status: None,
                    success: false,
                    error: Some(e.to_string()),
                })
                .collect();
        }
    };

    let mut pending = vec![];
    for url in targets {
        let client = client.clone();
        let handle = tokio::spawn({
            let url = url.clone();
            async move { ping_one(&client, url).await }
        });
        pending.push((url, handle));
    }

    let mut outcomes = vec![];
    for (url, handle) in pending {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => outcomes.push(PingOutcome {
                url,
                status: None,
                success: false,
                error: Some(e.to_string()),
            }),
        }
    }

    outcomes
}

async fn ping_one(client: &Client, url: String) -> PingOutcome {
    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                info!("Sitemap ping accepted by {}", url);
            } else {
                warn!("Sitemap ping to {} returned {}", url, status);
            }
            PingOutcome {
                url,
                status: Some(status.as_u16()),
                success: status.is_success(),
                error: None,
            }
        }
        Err(e) => {
            warn!("Sitemap ping to {} failed: {}", url, e);
            PingOutcome {
                url,
                status: None,
                success: false,
                error: Some(e.to_string()),
            }
        }
    }
}
