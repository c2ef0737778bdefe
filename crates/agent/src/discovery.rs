use async_trait::async_trait;
use rentwatch_core::config::SearchConfig;
use rentwatch_core::{Browser, Error, ListingId, Locator, Page, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const DISCOVERY_SESSION: &str = "discovery";

/// Produces the current candidate listings, in presentation order.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn discover(&self) -> Result<Vec<ListingId>>;
}

/// Reads listing links off the configured search results page.
pub struct SearchPageDiscovery {
    browser: Arc<dyn Browser>,
    search_url: Url,
    link_locator: Locator,
    render_delay: Duration,
}

impl SearchPageDiscovery {
    pub fn new(browser: Arc<dyn Browser>, config: &SearchConfig) -> Result<Self> {
        let search_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("search.url '{}': {}", config.url, e)))?;
        Ok(Self {
            browser,
            search_url,
            link_locator: Locator::css(config.listing_link_selector.as_str()),
            render_delay: Duration::from_millis(config.render_delay_ms),
        })
    }

    async fn read_hrefs(&self, page: &mut dyn Page) -> Result<Vec<String>> {
        page.navigate(self.search_url.as_str()).await?;
        tokio::time::sleep(self.render_delay).await;

        let links = page.find_elements(&self.link_locator).await?;
        let mut hrefs = Vec::with_capacity(links.len());
        for link in &links {
            if let Some(href) = page.attribute(link, "href").await? {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }
}

#[async_trait]
impl ListingSource for SearchPageDiscovery {
    async fn discover(&self) -> Result<Vec<ListingId>> {
        let mut page = self.browser.open(DISCOVERY_SESSION).await?;
        let hrefs = self.read_hrefs(page.as_mut()).await;
        page.close().await;

        let ids = collect_ids(&hrefs?, &self.search_url);
        info!(count = ids.len(), url = %self.search_url, "Discovered listings");
        Ok(ids)
    }
}

/// Resolve hrefs into ids, dropping blanks and repeats. First occurrence wins.
pub fn collect_ids(hrefs: &[String], base: &Url) -> Vec<ListingId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for href in hrefs {
        if href.trim().is_empty() {
            continue;
        }
        match ListingId::parse(href, base) {
            Ok(id) => {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            Err(e) => warn!(href = %href, error = %e, "Skipping listing link"),
        }
    }
    debug!(links = hrefs.len(), unique = ids.len(), "Collected listing ids");
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, FakeElement};

    fn config() -> SearchConfig {
        SearchConfig {
            render_delay_ms: 0,
            ..SearchConfig::default()
        }
    }

    fn links() -> Locator {
        Locator::css("a.listing-search-item__link")
    }

    fn base() -> Url {
        Url::parse(&SearchConfig::default().url).unwrap()
    }

    #[test]
    fn test_collect_ids_keeps_order_and_dedups() {
        let hrefs: Vec<String> = [
            "/apartment-for-rent/groningen/b1/oosterstraat",
            "/apartment-for-rent/groningen/a2/zuiderdiep",
            "",
            "/apartment-for-rent/groningen/b1/oosterstraat#photos",
            "https://www.pararius.com/apartment-for-rent/groningen/c3/vismarkt",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let ids = collect_ids(&hrefs, &base());
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "https://www.pararius.com/apartment-for-rent/groningen/b1/oosterstraat",
                "https://www.pararius.com/apartment-for-rent/groningen/a2/zuiderdiep",
                "https://www.pararius.com/apartment-for-rent/groningen/c3/vismarkt",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_reads_links_and_closes_page() {
        let browser = FakeBrowser::new()
            .with(
                links(),
                FakeElement::new("l1").attr("href", "/apartment-for-rent/groningen/x/one"),
            )
            .with(links(), FakeElement::new("l2"))
            .with(
                links(),
                FakeElement::new("l3").attr("href", "/apartment-for-rent/groningen/y/two"),
            );
        let discovery = SearchPageDiscovery::new(Arc::new(browser.clone()), &config()).unwrap();

        let ids = discovery.discover().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0].as_str().ends_with("/x/one"));
        assert!(ids[1].as_str().ends_with("/y/two"));
        assert!(browser.called("open:discovery"));
        assert!(browser.called(&format!("navigate:{}", SearchConfig::default().url)));
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn test_discover_zero_results() {
        let browser = FakeBrowser::new();
        let discovery = SearchPageDiscovery::new(Arc::new(browser.clone()), &config()).unwrap();
        assert!(discovery.discover().await.unwrap().is_empty());
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn test_discover_failure_still_closes_page() {
        let browser = FakeBrowser::new().navigate_fails();
        let discovery = SearchPageDiscovery::new(Arc::new(browser.clone()), &config()).unwrap();

        let err = discovery.discover().await.unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn test_discover_lookup_failure_still_closes_page() {
        let browser = FakeBrowser::new().broken(links());
        let discovery = SearchPageDiscovery::new(Arc::new(browser.clone()), &config()).unwrap();
        assert!(discovery.discover().await.is_err());
        assert_eq!(browser.closed(), 1);
    }

    #[test]
    fn test_bad_search_url_rejected() {
        let config = SearchConfig {
            url: "::nope".to_string(),
            ..config()
        };
        let result = SearchPageDiscovery::new(Arc::new(FakeBrowser::new()), &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
