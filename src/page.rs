use std::time::{Duration, Instant};

use reqwest::Url;
use tracing::info;

use crate::engine::{scrape, FieldValues, HtmlDocument};
use crate::error::{CollaboratorError, Error, Result};
use crate::settings::Settings;
use crate::store::Selectors;

/// The page the user is looking at. Extraction runs against its live document.
pub trait ActivePage {
    fn url(&self) -> &str;

    async fn run_extraction(&self, selectors: &Selectors) -> Result<FieldValues>;
}

/// Rejects anything that is not an http(s) page before it is touched.
pub fn ensure_web_page(url: &str) -> Result<()> {
    match Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        _ => Err(Error::UnsupportedPage(url.to_string())),
    }
}

/// Fetches the page over HTTP and extracts from the returned markup.
pub struct HttpPage {
    client: reqwest::Client,
    url: String,
}

impl HttpPage {
    pub fn new(settings: &Settings, url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl ActivePage for HttpPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn run_extraction(&self, selectors: &Selectors) -> Result<FieldValues> {
        let start = Instant::now();
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !is_markup(&content_type) {
            return Err(CollaboratorError::Refused(format!(
                "not an HTML document ({content_type})"
            ))
            .into());
        }
        let html = response.text().await?;
        info!(
            url = %self.url,
            bytes = html.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "page fetched"
        );
        let doc = HtmlDocument::parse(&html);
        Ok(scrape(selectors, &doc))
    }
}

fn is_markup(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    matches!(mime.as_str(), "text/html" | "text/xml" | "application/xml") || mime.ends_with("+xml")
}

/// Markup captured ahead of time, attributed to `url`.
pub struct StaticPage {
    url: String,
    html: String,
}

impl StaticPage {
    pub fn new(url: &str, html: String) -> Self {
        Self {
            url: url.to_string(),
            html,
        }
    }
}

impl ActivePage for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn run_extraction(&self, selectors: &Selectors) -> Result<FieldValues> {
        let doc = HtmlDocument::parse(&self.html);
        Ok(scrape(selectors, &doc))
    }
}

// ── Tests ──
