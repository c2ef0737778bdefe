use rentwatch_core::{ElementHandle, Locator, Page};
use std::time::Duration;
use tracing::debug;

/// Ordered list of ways to find the same control. Strategies are tried in
/// priority order, each with its own bounded wait.
#[derive(Debug, Clone)]
pub struct LocatorChain {
    strategies: Vec<Locator>,
}

impl LocatorChain {
    pub fn new(strategies: Vec<Locator>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Locator] {
        &self.strategies
    }

    /// First strategy whose element becomes clickable, with its index.
    /// `None` once every strategy is exhausted.
    pub async fn first_clickable(
        &self,
        page: &mut dyn Page,
        timeout: Duration,
    ) -> Option<(usize, ElementHandle)> {
        for (index, locator) in self.strategies.iter().enumerate() {
            match page.wait_until_clickable(locator, timeout).await {
                Ok(element) => {
                    debug!(strategy = index, locator = %locator, "Locator matched");
                    return Some((index, element));
                }
                Err(e) => {
                    debug!(strategy = index, locator = %locator, error = %e, "Locator missed");
                }
            }
        }
        None
    }
}

impl From<Vec<Locator>> for LocatorChain {
    fn from(strategies: Vec<Locator>) -> Self {
        Self::new(strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, FakeElement};
    use rentwatch_core::Browser;

    fn chain() -> LocatorChain {
        vec![
            Locator::css("button.contact"),
            Locator::text("a", "Contact the estate agent"),
        ]
        .into()
    }

    #[tokio::test]
    async fn test_first_strategy_wins() {
        let browser = FakeBrowser::new()
            .with(Locator::css("button.contact"), FakeElement::new("primary"))
            .with(
                Locator::text("a", "Contact the estate agent"),
                FakeElement::new("secondary"),
            );
        let mut page = browser.open("listing").await.unwrap();
        let found = chain().first_clickable(page.as_mut(), Duration::ZERO).await;
        assert_eq!(found, Some((0, ElementHandle("primary".to_string()))));
        assert!(!browser.called("clickable:text(a ~ 'Contact the estate agent')"));
    }

    #[tokio::test]
    async fn test_falls_through_hidden_and_broken_strategies() {
        let browser = FakeBrowser::new()
            .with(Locator::css("button.contact"), FakeElement::new("primary").hidden())
            .with(
                Locator::text("a", "Contact the estate agent"),
                FakeElement::new("secondary"),
            );
        let mut page = browser.open("listing").await.unwrap();
        let found = chain().first_clickable(page.as_mut(), Duration::ZERO).await;
        assert_eq!(found, Some((1, ElementHandle("secondary".to_string()))));

        let broken = FakeBrowser::new()
            .broken(Locator::css("button.contact"))
            .with(
                Locator::text("a", "Contact the estate agent"),
                FakeElement::new("secondary"),
            );
        let mut page = broken.open("listing").await.unwrap();
        let found = chain().first_clickable(page.as_mut(), Duration::ZERO).await;
        assert_eq!(found.map(|(i, _)| i), Some(1));
    }

    #[tokio::test]
    async fn test_exhausted_chain() {
        let browser = FakeBrowser::new();
        let mut page = browser.open("listing").await.unwrap();
        assert!(chain().first_clickable(page.as_mut(), Duration::ZERO).await.is_none());
        assert_eq!(browser.calls().len(), 3);
    }
}
