//! DuckDuckGo HTML endpoint backend.
//!
//! Posts the query to the lightweight HTML search form and scrapes result
//! links from `a.result__a`. DuckDuckGo wraps outbound links in a redirect
//! (`//duckduckgo.com/l/?uddg=<encoded target>`); those are decoded back to
//! the target URL. No credentials are needed.

use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::{SearchBackend, validate_request};
use crate::error::SearchError;
use crate::rate_limit::SharedLimiter;

pub const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("static result selector"));

#[derive(Debug)]
pub struct DuckDuckGoSearch {
    client: Client,
    limiter: SharedLimiter,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: &str, client: Client, limiter: SharedLimiter) -> Self {
        Self {
            client,
            limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl SearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    #[instrument(level = "info", skip(self), fields(engine = "duckduckgo"))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        validate_request(query, max_results)?;
        let endpoint = format!("{}/html/", self.base_url);

        self.limiter.wait(self.name()).await;
        let response = self
            .client
            .post(&endpoint)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::unavailable("duckduckgo", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::unavailable(
                "duckduckgo",
                format!("status {}", status.as_u16()),
            ));
        }
        let html = response
            .text()
            .await
            .map_err(|e| SearchError::unavailable("duckduckgo", e.to_string()))?;

        let urls = parse_results(&html, max_results);
        info!(count = urls.len(), "DuckDuckGo results");
        debug!(urls = ?urls, "DuckDuckGo URLs");
        Ok(urls)
    }
}

fn parse_results(html: &str, max_results: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(resolve_redirect)
        .take(max_results)
        .collect()
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links; pass other absolute links through.
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    if url.path().starts_with("/l/") {
        let target = url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        // query_pairs already decodes once; some links arrive double-encoded
        let target = if target.contains("%3A") || target.contains("%2F") {
            urlencoding::decode(&target).ok()?.into_owned()
        } else {
            target
        };
        return Some(target);
    }

    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use httpmock::prelude::*;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example.com%2Fstory%3Fid%3D1&amp;rut=abc">A</a></div>
        <div class="result"><a class="result__a" href="https://b.example.org/page">B</a></div>
        <div class="result"><a class="result__snippet" href="https://ignored.example.net/">snippet</a></div>
        <div class="result"><a class="result__a" href="javascript:void(0)">bad</a></div>
        <div class="result"><a class="result__a" href="https://c.example.net/">C</a></div>
    </body></html>"#;

    #[test]
    fn test_resolve_redirect() {
        assert_eq!(
            resolve_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example.com%2Fx&rut=1"),
            Some("https://a.example.com/x".to_string())
        );
        assert_eq!(
            resolve_redirect("https://b.example.org/page"),
            Some("https://b.example.org/page".to_string())
        );
        assert_eq!(resolve_redirect("javascript:void(0)"), None);
        assert_eq!(resolve_redirect("/relative"), None);
    }

    #[test]
    fn test_parse_results_in_order_with_limit() {
        assert_eq!(
            parse_results(RESULTS_PAGE, 10),
            vec![
                "https://a.example.com/story?id=1",
                "https://b.example.org/page",
                "https://c.example.net/"
            ]
        );
        assert_eq!(parse_results(RESULTS_PAGE, 1).len(), 1);
    }

    #[tokio::test]
    async fn test_search_posts_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/html/").body_contains("q=alpha+beta");
                then.status(200).header("content-type", "text/html").body(RESULTS_PAGE);
            })
            .await;

        let search = DuckDuckGoSearch::new(
            &server.base_url(),
            Client::new(),
            RateLimiter::unlimited().shared(),
        );
        let urls = search.search("alpha beta", 2).await.unwrap();
        assert_eq!(
            urls,
            vec!["https://a.example.com/story?id=1", "https://b.example.org/page"]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blocked_request_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/html/");
                then.status(403);
            })
            .await;

        let search = DuckDuckGoSearch::new(
            &server.base_url(),
            Client::new(),
            RateLimiter::unlimited().shared(),
        );
        let err = search.search("alpha", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Unavailable { engine: "duckduckgo", .. }));
    }
}
