use chrono::NaiveDate;
use rentwatch_core::config::CutoffConfig;
use rentwatch_core::{Locator, Page};
use std::time::Duration;
use tracing::debug;

/// Why a listing was skipped by the cutoff check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Field missing, unreadable, unparsable or not shown in time.
    DateUnavailable(String),
    BeforeCutoff(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CutoffDecision {
    Proceed(NaiveDate),
    Skip(SkipReason),
}

/// Compares a listing's "offered since" date against a fixed threshold.
#[derive(Debug, Clone)]
pub struct CutoffFilter {
    cutoff: NaiveDate,
    locator: Locator,
    date_format: String,
    timeout: Duration,
}

impl CutoffFilter {
    pub fn new(config: &CutoffConfig, timeout: Duration) -> Self {
        Self {
            cutoff: config.offered_since,
            locator: config.offered_since_locator.clone(),
            date_format: config.date_format.clone(),
            timeout,
        }
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(text.trim(), &self.date_format).ok()
    }

    /// Offered on the cutoff date itself still counts as new.
    pub fn decide(&self, offered_since: NaiveDate) -> CutoffDecision {
        if offered_since < self.cutoff {
            CutoffDecision::Skip(SkipReason::BeforeCutoff(offered_since))
        } else {
            CutoffDecision::Proceed(offered_since)
        }
    }

    /// Read the date from the current page and decide. Never fails: anything
    /// that prevents reading a date is a skip.
    pub async fn check(&self, page: &mut dyn Page) -> CutoffDecision {
        let element = match page.wait_until_visible(&self.locator, self.timeout).await {
            Ok(el) => el,
            Err(e) => {
                debug!(error = %e, "Offered-since field not available");
                return CutoffDecision::Skip(SkipReason::DateUnavailable(e.to_string()));
            }
        };

        let text = match page.text(&element).await {
            Ok(t) => t,
            Err(e) => return CutoffDecision::Skip(SkipReason::DateUnavailable(e.to_string())),
        };

        match self.parse(&text) {
            Some(date) => self.decide(date),
            None => CutoffDecision::Skip(SkipReason::DateUnavailable(format!(
                "unparsable offered-since value '{}'",
                text.trim()
            ))),
        }
    }
}
