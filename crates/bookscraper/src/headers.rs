//! Browser header pool
//!
//! Fetches realistic browser header sets from a provider once per run and
//! hands out a random one per outbound request.
//!
//! The pool is filled through `&mut self` ([`HeaderPool::refresh`]) and read
//! through `&self` ([`HeaderPool::pick`]). Wrap it in an `Arc` after
//! population to share it between fetch workers; no lock is involved.

use crate::config::HeaderPoolConfig;
use crate::error::HeaderPoolError;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// The header names a template may set, lowercase.
pub const HEADER_NAMES: [&str; 10] = [
    "accept-language",
    "sec-fetch-user",
    "sec-fetch-mode",
    "sec-fetch-site",
    "sec-ch-ua-platform",
    "sec-ch-ua-mobile",
    "sec-ch-ua",
    "accept",
    "user-agent",
    "upgrade-insecure-requests",
];

/// One browser's header fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    headers: HeaderMap,
}

impl HeaderTemplate {
    /// Build a template from name/value pairs.
    ///
    /// Names outside [`HEADER_NAMES`] and values that are not valid header
    /// values are skipped. Returns `None` unless a `user-agent` survives.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Option<Self> {
        let mut headers = HeaderMap::new();

        for (name, value) in pairs {
            let name = name.trim().to_ascii_lowercase();
            let Some(known) = HEADER_NAMES.iter().find(|known| **known == name) else {
                continue;
            };
            match HeaderValue::from_str(value.trim()) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(*known), value);
                },
                Err(_) => debug!(header = %known, "Skipping invalid header value from provider"),
            }
        }

        headers.contains_key(reqwest::header::USER_AGENT).then_some(Self { headers })
    }

    fn from_provider_entry(entry: &Map<String, Value>) -> Option<Self> {
        Self::from_pairs(
            entry
                .iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name.as_str(), v))),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get("user-agent")
    }

    /// Number of the known header names this template sets
    pub fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter()
    }

    /// Make `target` carry exactly this template's values for every name in
    /// [`HEADER_NAMES`].
    ///
    /// Known names the template lacks are removed from `target`, so no engine
    /// default from a different browser survives. Other headers are untouched.
    pub fn apply_to(&self, target: &mut HeaderMap) {
        for name in HEADER_NAMES {
            match self.headers.get(name) {
                Some(value) => {
                    target.insert(HeaderName::from_static(name), value.clone());
                },
                None => {
                    target.remove(name);
                },
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    result: Vec<Value>,
}

/// Randomly rotated set of browser header templates
#[derive(Debug)]
pub struct HeaderPool {
    config: HeaderPoolConfig,
    templates: Vec<HeaderTemplate>,
}

impl HeaderPool {
    /// Create an empty pool; call [`HeaderPool::refresh`] to populate it.
    pub fn new(config: HeaderPoolConfig) -> Self {
        Self {
            config,
            templates: Vec::new(),
        }
    }

    /// Create a pool pre-filled with templates instead of calling the provider.
    pub fn with_templates(config: HeaderPoolConfig, templates: Vec<HeaderTemplate>) -> Self {
        Self { config, templates }
    }

    /// Create a pool and populate it when rotation is enabled.
    ///
    /// A provider failure is logged and leaves the pool empty, which turns
    /// request decoration into a no-op instead of stopping the crawl.
    pub async fn initialize(config: HeaderPoolConfig) -> Self {
        let mut pool = Self::new(config);

        if !pool.is_enabled() {
            info!("Browser header rotation disabled");
            return pool;
        }

        if let Err(e) = pool.refresh().await {
            warn!(error = %e, "Browser header rotation unavailable, using default headers");
        }

        pool
    }

    /// Whether request decoration should happen at all.
    ///
    /// Requires the rotation feature, the provider flag, and an API key.
    pub fn is_enabled(&self) -> bool {
        self.config.rotation_enabled
            && self.config.provider_enabled
            && !self.config.api_key.trim().is_empty()
    }

    /// Fetch templates from the provider and replace the pool's contents.
    ///
    /// On failure the existing contents are kept. Returns the new pool size.
    pub async fn refresh(&mut self) -> Result<usize, HeaderPoolError> {
        let templates = self.fetch().await?;
        info!(
            endpoint = %self.config.endpoint,
            count = templates.len(),
            "Refreshed browser header pool"
        );
        self.templates = templates;
        Ok(self.templates.len())
    }

    async fn fetch(&self) -> Result<Vec<HeaderTemplate>, HeaderPoolError> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(HeaderPoolError::Http)?;

        let mut query = vec![("api_key", self.config.api_key.clone())];
        if let Some(num_results) = self.config.num_results {
            query.push(("num_results", num_results.to_string()));
        }

        debug!(endpoint = %self.config.endpoint, "Requesting browser headers");

        let response = client
            .get(&self.config.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HeaderPoolError::provider(format!(
                "{} returned HTTP {}",
                self.config.endpoint, status
            )));
        }

        let body: ProviderResponse = response.json().await.map_err(|e| self.request_error(e))?;
        let offered = body.result.len();

        let templates: Vec<HeaderTemplate> = body
            .result
            .iter()
            .filter_map(Value::as_object)
            .filter_map(HeaderTemplate::from_provider_entry)
            .collect();

        if templates.len() < offered {
            warn!(
                offered,
                usable = templates.len(),
                "Provider returned header entries without a user-agent"
            );
        }

        if templates.is_empty() {
            return Err(HeaderPoolError::NoUsableTemplates);
        }

        Ok(templates)
    }

    fn request_error(&self, err: reqwest::Error) -> HeaderPoolError {
        if err.is_timeout() {
            HeaderPoolError::Timeout {
                endpoint: self.config.endpoint.clone(),
                secs: self.config.timeout_secs,
            }
        } else if err.is_decode() {
            HeaderPoolError::provider(format!("malformed provider response: {}", err))
        } else {
            HeaderPoolError::Http(err)
        }
    }

    /// Pick one template uniformly at random.
    pub fn pick(&self) -> Result<&HeaderTemplate, HeaderPoolError> {
        if self.templates.is_empty() {
            return Err(HeaderPoolError::EmptyPool);
        }
        let index = rand::thread_rng().gen_range(0..self.templates.len());
        Ok(&self.templates[index])
    }

    pub fn templates(&self) -> &[HeaderTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
