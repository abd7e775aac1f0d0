//! Web data source: a breadth-first crawl from one URL.
//!
//! The crawl follows `href` links up to `depth` levels (1 = only the start
//! page), fetches at most `max_pages` pages and, with `same_domain`, never
//! leaves the starting host. Each page with text becomes one document.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::{required_str, DataSource, Document};
use crate::error::{ExtractionError, RegistryError};
use crate::schema::{config_bool, config_u64, ConfigMap};

const PLUGIN_ID: &str = "web_datasource";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGES: usize = 10;
pub const MAX_PAGES_LIMIT: usize = 100;
pub const DEFAULT_DEPTH: usize = 2;
pub const MAX_DEPTH_LIMIT: usize = 5;

pub struct WebDataSource {
    url: String,
    client: Client,
    max_pages: usize,
    depth: usize,
    same_domain: bool,
}

/// One fetched page.
struct Page {
    html: String,
    status: u16,
}

impl WebDataSource {
    /// A source that fetches only `url`; see [`crawl`](Self::crawl).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("synth-forge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Construction {
                plugin: PLUGIN_ID.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            url: url.into(),
            client,
            max_pages: 1,
            depth: 1,
            same_domain: true,
        })
    }

    /// Follows links up to `depth` levels, fetching at most `max_pages` pages.
    pub fn crawl(mut self, max_pages: usize, depth: usize, same_domain: bool) -> Self {
        self.max_pages = max_pages.clamp(1, MAX_PAGES_LIMIT);
        self.depth = depth.clamp(1, MAX_DEPTH_LIMIT);
        self.same_domain = same_domain;
        self
    }

    pub(crate) fn from_config(config: &ConfigMap) -> Result<Self, RegistryError> {
        let url = required_str(PLUGIN_ID, config, "url")?;
        let parsed = Url::parse(&url).map_err(|e| RegistryError::Construction {
            plugin: PLUGIN_ID.to_string(),
            reason: format!("'{}' is not a valid URL: {}", url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RegistryError::Construction {
                plugin: PLUGIN_ID.to_string(),
                reason: format!("'{}' is not an http(s) URL", url),
            });
        }
        let timeout = config_u64(config, "timeout").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let max_pages = config_u64(config, "max_pages").map_or(DEFAULT_MAX_PAGES, |n| n as usize);
        let depth = config_u64(config, "depth").map_or(DEFAULT_DEPTH, |n| n as usize);
        let same_domain = config_bool(config, "same_domain").unwrap_or(true);
        Ok(Self::new(url, Duration::from_secs(timeout))?.crawl(max_pages, depth, same_domain))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, url: &Url) -> Result<Page, ExtractionError> {
        let http_error = |reason: String| ExtractionError::Http {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| http_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(format!("HTTP {}", status)));
        }
        let html = response.text().await.map_err(|e| http_error(e.to_string()))?;
        Ok(Page {
            html,
            status: status.as_u16(),
        })
    }

    fn follows(&self, start: &Url, link: &Url) -> bool {
        matches!(link.scheme(), "http" | "https") && (!self.same_domain || link.host_str() == start.host_str())
    }
}

#[async_trait]
impl DataSource for WebDataSource {
    fn source_type(&self) -> &'static str {
        "web"
    }

    async fn load(&self) -> Result<Vec<Document>, ExtractionError> {
        let start = Url::parse(&self.url).map_err(|e| ExtractionError::Http {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
        let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(start.clone(), 1)]);
        let mut documents = Vec::new();
        let mut fetched = 0usize;

        while let Some((url, depth)) = queue.pop_front() {
            if fetched >= self.max_pages {
                break;
            }
            fetched += 1;

            let page = match self.fetch(&url).await {
                Ok(page) => page,
                // The start page must load; later pages are best effort.
                Err(e) if fetched == 1 => return Err(e),
                Err(e) => {
                    warn!(url = %url, error = %e, "Skipping page");
                    continue;
                }
            };

            if depth < self.depth {
                for link in extract_links(&page.html, &url) {
                    if self.follows(&start, &link) && visited.insert(link.to_string()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            let text = html_to_text(&page.html);
            if text.is_empty() {
                continue;
            }
            debug!(url = %url, depth, chars = text.len(), "Fetched web page");
            documents.push(
                Document::new(text)
                    .with_metadata("source", url.to_string())
                    .with_metadata("url", url.to_string())
                    .with_metadata("type", "web")
                    .with_metadata("title", extract_title(&page.html).unwrap_or_default())
                    .with_metadata("status_code", page.status)
                    .with_metadata("depth", depth),
            );
        }

        if documents.is_empty() {
            return Err(ExtractionError::Http {
                url: self.url.clone(),
                reason: "page has no text content".to_string(),
            });
        }
        debug!(url = %self.url, pages = fetched, documents = documents.len(), "Crawl finished");
        Ok(documents)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid"));

/// Elements whose content is never page text.
static HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<head\b.*?</head\s*>|<!--.*?-->")
        .expect("hidden element pattern is valid")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|h[1-6]|li|tr|section|article)\b[^>]*>").expect("block tag pattern is valid")
});

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern is valid"));

/// Absolute link targets of `<a href>` elements, fragments removed, in page order.
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    HREF.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .filter_map(|href| base.join(decode_entities(href.as_str().trim()).as_str()).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .collect()
}

/// Contents of the `<title>` element, if any.
pub fn extract_title(html: &str) -> Option<String> {
    let caps = TITLE.captures(html)?;
    let title = decode_entities(caps.get(1)?.as_str().trim());
    Some(title.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Strips scripts, styles and markup, keeping one line per block element.
pub fn html_to_text(html: &str) -> String {
    let text = HIDDEN.replace_all(html, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, " ");

    decode_entities(&text)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PAGE: &str = "<html><head><title>Ferris &amp; Friends</title><style>p{}</style></head>\
        <body><script>var x = 1;</script><h1>Crabs</h1><p>Crabs   walk\nsideways.</p>\
        <!-- hidden --><div>Fast &lt;and&gt; safe</div></body></html>";

    #[test]
    fn test_html_to_text() {
        assert_eq!(html_to_text(PAGE), "Crabs\nCrabs walk\nsideways.\nFast <and> safe");
        assert_eq!(extract_title(PAGE).as_deref(), Some("Ferris & Friends"));
    }

    #[test]
    fn test_from_config_rejects_non_http() {
        let config = json!({ "source_id": "web_datasource", "url": "ftp://example.com" });
        assert!(WebDataSource::from_config(config.as_object().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_load_from_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                PAGE.len(),
                PAGE
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let url = format!("http://{}/", addr);
        let source = WebDataSource::new(&url, Duration::from_secs(5)).unwrap();
        let docs = source.load().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.starts_with("Crabs"));
        assert_eq!(docs[0].metadata["status_code"], 200);
        assert_eq!(docs[0].metadata["title"], "Ferris & Friends");
    }

    /// Serves a small site: `/` links to `/a`, `/b`, an external host and
    /// fragments of itself; `/a` links on to `/c`.
    async fn serve_site() -> String {
        use axum::{response::Html, routing::get, Router};

        let app = Router::new()
            .route(
                "/",
                get(|| async {
                    Html(
                        r##"<html><head><title>Home</title></head><body><p>Home page.</p>
                        <a href="/a">A</a> <a href='b'>B</a> <a href="/a#top">A again</a>
                        <a href="#intro">Intro</a> <a href="http://external.invalid/x">Out</a>
                        <a href="mailto:ferris@example.com">Mail</a></body></html>"##,
                    )
                }),
            )
            .route("/a", get(|| async { Html(r#"<p>Page A.</p><a href="/c">C</a>"#) }))
            .route("/b", get(|| async { Html("<p>Page B.</p>") }))
            .route("/c", get(|| async { Html("<p>Page C.</p>") }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn sources(docs: &[Document]) -> Vec<String> {
        docs.iter()
            .map(|d| d.metadata["source"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_extract_links() {
        let base = Url::parse("http://host.test/dir/page").unwrap();
        let html = r#"<A HREF="/root">r</A><a class="x" href='rel#frag'>s</a><a name="no-href">n</a>"#;
        let links: Vec<String> = extract_links(html, &base).iter().map(Url::to_string).collect();
        assert_eq!(links, vec!["http://host.test/root", "http://host.test/dir/rel"]);
    }

    #[tokio::test]
    async fn test_crawl_is_breadth_first_and_same_domain() {
        let base = serve_site().await;
        let source = WebDataSource::new(&base, Duration::from_secs(5))
            .unwrap()
            .crawl(10, 2, true);
        let docs = source.load().await.unwrap();

        assert_eq!(
            sources(&docs),
            vec![base.clone(), format!("{}a", base), format!("{}b", base)]
        );
        assert_eq!(docs[0].metadata["title"], "Home");
        assert_eq!(docs[0].metadata["depth"], 1);
        assert_eq!(docs[1].metadata["depth"], 2);
        assert!(docs[1].content.starts_with("Page A."));
    }

    #[tokio::test]
    async fn test_crawl_respects_depth_and_page_limits() {
        let base = serve_site().await;

        let deep = WebDataSource::new(&base, Duration::from_secs(5)).unwrap().crawl(10, 3, true);
        let docs = deep.load().await.unwrap();
        assert_eq!(docs.len(), 4);
        assert!(sources(&docs).contains(&format!("{}c", base)));

        let capped = WebDataSource::new(&base, Duration::from_secs(5)).unwrap().crawl(2, 3, true);
        assert_eq!(capped.load().await.unwrap().len(), 2);

        let single = WebDataSource::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(sources(&single.load().await.unwrap()), vec![base.clone()]);
    }

    #[tokio::test]
    async fn test_crawl_skips_broken_links() {
        // With same_domain off the unreachable external link is tried and skipped.
        let base = serve_site().await;
        let source = WebDataSource::new(&base, Duration::from_secs(2))
            .unwrap()
            .crawl(10, 2, false);
        let docs = source.load().await.unwrap();
        assert_eq!(docs.len(), 3);
        assert!(sources(&docs).iter().all(|s| s.starts_with(&base)));
    }

    #[test]
    fn test_from_config_reads_crawl_options() {
        let config = json!({
            "source_id": "web_datasource",
            "url": "http://example.com",
            "max_pages": 500,
            "depth": 3,
            "same_domain": false
        });
        let source = WebDataSource::from_config(config.as_object().unwrap()).unwrap();
        assert_eq!(source.max_pages, MAX_PAGES_LIMIT);
        assert_eq!(source.depth, 3);
        assert!(!source.same_domain);

        let defaults = json!({ "source_id": "web_datasource", "url": "http://example.com" });
        let source = WebDataSource::from_config(defaults.as_object().unwrap()).unwrap();
        assert_eq!((source.max_pages, source.depth), (DEFAULT_MAX_PAGES, DEFAULT_DEPTH));
        assert!(source.same_domain);
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let source = WebDataSource::new("http://127.0.0.1:1/", Duration::from_secs(2)).unwrap();
        assert!(matches!(source.load().await, Err(ExtractionError::Http { .. })));
    }
}
