pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use tracing::debug;

/// Puppeteer script run by the /function endpoint: load the page, trigger
/// `scrolls` rounds of lazy loading (scroll + settle wait each round), then
/// return the rendered DOM. The rendered document is cumulative, so asking
/// for N rounds returns everything revealed by rounds 1..=N.
const SCROLL_CAPTURE_JS: &str = r#"
export default async function ({ page, context }) {
    await page.goto(context.url, { waitUntil: "networkidle2" });
    for (let i = 0; i < context.scrolls; i++) {
        await page.evaluate(() => window.scrollBy(0, window.innerHeight));
        await new Promise((resolve) => setTimeout(resolve, context.settleMs));
    }
    const html = await page.content();
    return { data: html, type: "text/html" };
}
"#;

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{}", self.base_url, path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Fetch fully-rendered HTML content for a URL via Browserless /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });

        let resp = self
            .client
            .post(self.endpoint("/content"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Render a URL, perform `scrolls` rounds of scroll-triggered lazy loading
    /// (waiting `settle_ms` after each), and return the resulting DOM via the
    /// Browserless /function endpoint. The request timeout scales with the
    /// requested rounds so long sessions are not cut off by the transport.
    pub async fn scroll_content(&self, url: &str, scrolls: u32, settle_ms: u64) -> Result<String> {
        debug!(url, scrolls, "Browserless scroll capture");

        let body = serde_json::json!({
            "code": SCROLL_CAPTURE_JS,
            "context": {
                "url": url,
                "scrolls": scrolls,
                "settleMs": settle_ms,
            },
        });

        let budget = Duration::from_secs(30) + Duration::from_millis(settle_ms * scrolls as u64);

        let resp = self
            .client
            .post(self.endpoint("/function"))
            .header("Content-Type", "application/json")
            .timeout(budget)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash_and_appends_token() {
        let client = BrowserlessClient::new("http://localhost:3000/", Some("secret"));
        assert_eq!(
            client.endpoint("/content"),
            "http://localhost:3000/content?token=secret"
        );
    }

    #[test]
    fn endpoint_without_token() {
        let client = BrowserlessClient::new("http://localhost:3000", None);
        assert_eq!(client.endpoint("/function"), "http://localhost:3000/function");
    }
}
