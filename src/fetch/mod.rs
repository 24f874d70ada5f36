//! Content fetching and main-text extraction

mod http;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use http::{extract_html_text, HttpFetcher};

/// Retrieves raw page content and reduces it to readable text
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the raw body of `url`. Fails per URL.
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;

    /// Strip navigation and boilerplate, returning plain text.
    ///
    /// Empty output means nothing usable was found.
    fn extract_main_text(&self, raw: &str) -> String;
}
