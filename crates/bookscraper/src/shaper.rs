//! Outbound request decoration
//!
//! Attaches one randomly chosen browser header template to each request
//! before it is sent. The ten fingerprint headers always come from a single
//! template; any the template does not set are removed. When rotation is
//! off, or the pool could not be filled, requests go out with whatever
//! headers the fetch engine already set.

use crate::error::HeaderPoolError;
use crate::headers::HeaderPool;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::debug;

/// Decorate a request with a template from `pool`.
///
/// Returns `true` when a header set was attached.
pub fn decorate(request: &mut reqwest::Request, pool: &HeaderPool) -> bool {
    let url = request.url().to_string();
    attach(request.headers_mut(), pool, &url)
}

/// Same as [`decorate`] for engines that expose only a header map.
pub fn decorate_headers(headers: &mut HeaderMap, pool: &HeaderPool) -> bool {
    attach(headers, pool, "")
}

fn attach(headers: &mut HeaderMap, pool: &HeaderPool, url: &str) -> bool {
    if !pool.is_enabled() {
        return false;
    }

    match pool.pick() {
        Ok(template) => {
            template.apply_to(headers);
            debug!(
                url = %url,
                user_agent = template.user_agent().unwrap_or_default(),
                headers = template.header_count(),
                "Attached browser header set"
            );
            true
        },
        Err(HeaderPoolError::EmptyPool) => {
            debug!(url = %url, "Header pool empty, sending default headers");
            false
        },
        Err(e) => {
            debug!(url = %url, error = %e, "Header pick failed, sending default headers");
            false
        },
    }
}

/// Shareable handle for fetch workers.
#[derive(Debug, Clone)]
pub struct RequestShaper {
    pool: Arc<HeaderPool>,
}

impl RequestShaper {
    pub fn new(pool: Arc<HeaderPool>) -> Self {
        Self { pool }
    }

    pub fn decorate(&self, request: &mut reqwest::Request) -> bool {
        decorate(request, &self.pool)
    }

    pub fn decorate_headers(&self, headers: &mut HeaderMap) -> bool {
        decorate_headers(headers, &self.pool)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::HeaderPoolConfig;
    use crate::headers::{HeaderTemplate, HEADER_NAMES};
    use reqwest::header::HeaderValue;

    const CHROME_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Chrome/120.0";

    fn full_template() -> HeaderTemplate {
        HeaderTemplate::from_pairs([
            ("accept-language", "en-GB,en;q=0.9"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-ch-ua-platform", "\"macOS\""),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua", "\"Chromium\";v=\"120\""),
            ("accept", "text/html,application/xhtml+xml"),
            ("user-agent", CHROME_UA),
            ("upgrade-insecure-requests", "1"),
        ])
        .unwrap()
    }

    fn config(enabled: bool) -> HeaderPoolConfig {
        HeaderPoolConfig {
            api_key: "key".to_string(),
            provider_enabled: enabled,
            ..HeaderPoolConfig::default()
        }
    }

    fn request() -> reqwest::Request {
        let mut request = reqwest::Client::new()
            .get("https://books.toscrape.com/catalogue/page-2.html")
            .build()
            .unwrap();
        request
            .headers_mut()
            .insert("user-agent", HeaderValue::from_static("engine-default/1.0"));
        request
            .headers_mut()
            .insert("referer", HeaderValue::from_static("https://books.toscrape.com/"));
        request
    }

    #[test]
    fn test_decorate_sets_all_ten_headers() {
        let pool = HeaderPool::with_templates(config(true), vec![full_template()]);
        let mut request = request();

        assert!(decorate(&mut request, &pool));

        for name in HEADER_NAMES {
            assert!(request.headers().contains_key(name), "missing {name}");
        }
        assert_eq!(request.headers().get("user-agent").unwrap(), CHROME_UA);
    }

    #[test]
    fn test_decorate_leaves_other_request_state_alone() {
        let pool = HeaderPool::with_templates(config(true), vec![full_template()]);
        let mut request = request();

        decorate(&mut request, &pool);

        assert_eq!(request.method(), &reqwest::Method::GET);
        assert_eq!(request.url().path(), "/catalogue/page-2.html");
        assert_eq!(request.headers().get("referer").unwrap(), "https://books.toscrape.com/");
    }

    #[test]
    fn test_firefox_template_clears_engine_client_hints() {
        let firefox = HeaderTemplate::from_pairs([
            ("user-agent", "Mozilla/5.0 (Macintosh) Firefox/121.0"),
            ("accept", "text/html"),
        ])
        .unwrap();
        let pool = HeaderPool::with_templates(config(true), vec![firefox]);

        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("engine-default/1.0"));
        headers.insert("sec-ch-ua", HeaderValue::from_static("\"Chromium\";v=\"120\""));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
        headers.insert("referer", HeaderValue::from_static("https://books.toscrape.com/"));

        assert!(decorate_headers(&mut headers, &pool));

        assert_eq!(
            headers.get("user-agent").unwrap(),
            "Mozilla/5.0 (Macintosh) Firefox/121.0"
        );
        assert_eq!(headers.get("accept").unwrap(), "text/html");
        assert!(!headers.contains_key("sec-ch-ua"));
        assert!(!headers.contains_key("sec-ch-ua-platform"));
        assert_eq!(headers.get("referer").unwrap(), "https://books.toscrape.com/");
    }

    #[test]
    fn test_disabled_pool_is_noop() {
        let pool = HeaderPool::with_templates(config(false), vec![full_template()]);
        let mut request = request();

        assert!(!decorate(&mut request, &pool));
        assert_eq!(request.headers().get("user-agent").unwrap(), "engine-default/1.0");
        assert!(!request.headers().contains_key("sec-fetch-mode"));
    }

    #[test]
    fn test_empty_pool_is_noop() {
        let pool = HeaderPool::new(config(true));
        let mut headers = HeaderMap::new();

        assert!(!decorate_headers(&mut headers, &pool));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_shaper_shared_across_threads() {
        let shaper = RequestShaper::new(Arc::new(HeaderPool::with_templates(
            config(true),
            vec![full_template()],
        )));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shaper = shaper.clone();
                std::thread::spawn(move || {
                    let mut headers = HeaderMap::new();
                    shaper.decorate_headers(&mut headers)
                        && headers.get("user-agent").unwrap() == CHROME_UA
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
