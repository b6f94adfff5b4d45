//! PDF link catalog scraped from the MWIS forecasts index page.

use cairn_core::CatalogConfig;
use regex::{Regex, RegexBuilder};
use tracing::instrument;
use url::Url;

use crate::error::{SourceError, SourceResult};
use crate::http::HttpContext;

const PDF_HREF: &str = r#"href="([^"]+\.pdf)""#;

pub struct MwisCatalog {
    ctx: HttpContext,
    index_url: String,
    max_links: usize,
    pattern: Regex,
}

impl MwisCatalog {
    pub fn new(ctx: HttpContext, config: &CatalogConfig) -> SourceResult<Self> {
        let pattern = RegexBuilder::new(PDF_HREF)
            .case_insensitive(true)
            .build()
            .map_err(|e| SourceError::data_invalid(format!("bad PDF link pattern: {}", e)))?;

        Ok(Self {
            ctx,
            index_url: config.mwis_index_url.clone(),
            max_links: config.max_links,
            pattern,
        })
    }

    /// Latest MWIS PDF links, or an empty list when the index is unreachable.
    #[instrument(skip(self), level = "info")]
    pub async fn latest_links(&self) -> Vec<String> {
        match self.ctx.get_text(|client| client.get(&self.index_url)).await {
            Ok(html) => self.extract_links(&html),
            Err(e) => {
                tracing::warn!("MWIS index unavailable: {}", e.user_message());
                Vec::new()
            }
        }
    }

    /// Unique MWIS PDF links in page order, resolved against the index URL.
    pub fn extract_links(&self, html: &str) -> Vec<String> {
        let base = Url::parse(&self.index_url).ok();
        let mut links: Vec<String> = Vec::new();

        for capture in self.pattern.captures_iter(html) {
            if links.len() >= self.max_links {
                break;
            }
            let href = &capture[1];
            if !href.to_ascii_lowercase().contains("mwi") {
                continue;
            }
            let resolved = match Url::parse(href) {
                Ok(url) => url.to_string(),
                Err(_) => match base.as_ref().and_then(|b| b.join(href).ok()) {
                    Some(url) => url.to_string(),
                    None => continue,
                },
            };
            if !links.contains(&resolved) {
                links.push(resolved);
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use cairn_core::SourcesConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog(index_url: String, max_links: usize) -> MwisCatalog {
        let mut sources = SourcesConfig::default();
        sources.retry.max_retries = 0;
        let ctx = HttpContext::new(&sources, chrono_tz::Europe::London).unwrap();
        MwisCatalog::new(
            ctx,
            &CatalogConfig {
                mwis_enabled: true,
                mwis_index_url: index_url,
                max_links,
            },
        )
        .unwrap()
    }

    const PAGE: &str = r#"
        <a href="/files/reports/WH/MWI-WH-day1.pdf">West Highlands</a>
        <a HREF="https://www.mwis.org.uk/files/reports/EH/mwi-eh-day1.PDF">Cairngorms</a>
        <a href="/files/reports/WH/MWI-WH-day1.pdf">duplicate</a>
        <a href="/files/leaflets/sponsors.pdf">Sponsors</a>
        <a href="/files/reports/SU/MWI-SU-day1.pdf">Southern Uplands</a>
    "#;

    #[test]
    fn test_extract_resolves_filters_and_dedupes() {
        let catalog = catalog("https://www.mwis.org.uk/forecasts".into(), 5);
        let links = catalog.extract_links(PAGE);
        assert_eq!(
            links,
            vec![
                "https://www.mwis.org.uk/files/reports/WH/MWI-WH-day1.pdf",
                "https://www.mwis.org.uk/files/reports/EH/mwi-eh-day1.PDF",
                "https://www.mwis.org.uk/files/reports/SU/MWI-SU-day1.pdf",
            ]
        );
    }

    #[test]
    fn test_extract_respects_limit() {
        let catalog = catalog("https://www.mwis.org.uk/forecasts".into(), 2);
        assert_eq!(catalog.extract_links(PAGE).len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_index_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecasts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let catalog = catalog(format!("{}/forecasts", server.uri()), 5);
        assert!(catalog.latest_links().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetches_index_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/forecasts"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let catalog = catalog(format!("{}/forecasts", server.uri()), 5);
        let links = catalog.latest_links().await;
        assert_eq!(links.len(), 3);
        assert!(links[0].starts_with(&server.uri()));
    }
}
