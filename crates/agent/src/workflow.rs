//! Per-listing contact state machine.
//!
//! Every stage resolves to an explicit value. Only a failed navigation (or an
//! error no stage absorbs) keeps a listing out of the seen log; everything
//! else is a terminal `Handled` so the listing is never attempted again.

use async_trait::async_trait;
use chrono::NaiveDate;
use rentwatch_core::config::ContactConfig;
use rentwatch_core::{Browser, Config, Error, ListingId, Locator, Page, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cutoff::{CutoffDecision, CutoffFilter, SkipReason};
use crate::locator::LocatorChain;

const LISTING_SESSION: &str = "listing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    DateCheck,
    ConsentDismiss,
    LocateContactAction,
    Activate,
    LocateSendAction,
    FillFields,
    Submit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Open => "open",
            Stage::DateCheck => "date_check",
            Stage::ConsentDismiss => "consent_dismiss",
            Stage::LocateContactAction => "locate_contact_action",
            Stage::Activate => "activate",
            Stage::LocateSendAction => "locate_send_action",
            Stage::FillFields => "fill_fields",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// Why a listing needs no further attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandledReason {
    /// No automation session could be opened.
    SessionUnavailable,
    DateUnavailable,
    BeforeCutoff(NaiveDate),
    NoContactAction,
    NoSendAction,
    /// The send control was clicked. Delivery is not confirmed.
    Submitted,
}

#[derive(Debug)]
pub enum Outcome {
    Handled(HandledReason),
    Failed { stage: Stage, error: Error },
}

impl Outcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Email,
    Message,
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContactField::Name => "name",
            ContactField::Email => "email",
            ContactField::Message => "message",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFill {
    Filled,
    /// Already holds a value, left untouched.
    AlreadySet,
    Hidden,
    Missing,
}

/// Scratch state for one workflow run. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFormState {
    pub filled: Vec<ContactField>,
    /// Index of the contact strategy that matched.
    pub contact_action: Option<usize>,
    pub submitted: bool,
}

/// Anything that can take a listing to a terminal outcome.
#[async_trait]
pub trait ListingProcessor: Send + Sync {
    async fn process(&self, id: &ListingId) -> Outcome;
}

pub struct ContactWorkflow {
    browser: Arc<dyn Browser>,
    cutoff: CutoffFilter,
    contact: ContactConfig,
    contact_chain: LocatorChain,
    element_timeout: Duration,
    session_failure_marks_handled: bool,
}

impl ContactWorkflow {
    pub fn new(browser: Arc<dyn Browser>, config: &Config) -> Self {
        let element_timeout = config.browser.element_timeout();
        Self {
            browser,
            cutoff: CutoffFilter::new(&config.cutoff, element_timeout),
            contact: config.contact.clone(),
            contact_chain: LocatorChain::new(config.contact.contact_locators.clone()),
            element_timeout,
            session_failure_marks_handled: config.schedule.session_failure_marks_handled,
        }
    }

    fn field_target(&self, field: ContactField) -> (Locator, &str) {
        match field {
            ContactField::Name => (
                Locator::css(self.contact.name_selector.as_str()),
                self.contact.name.as_str(),
            ),
            ContactField::Email => (
                Locator::css(self.contact.email_selector.as_str()),
                self.contact.email.as_str(),
            ),
            ContactField::Message => (
                Locator::css(self.contact.message_selector.as_str()),
                self.contact.message.as_str(),
            ),
        }
    }

    async fn run_stages(
        &self,
        page: &mut dyn Page,
        id: &ListingId,
        state: &mut ContactFormState,
    ) -> Outcome {
        if let Err(e) = page.navigate(id.as_str()).await {
            return Outcome::Failed {
                stage: Stage::Open,
                error: e,
            };
        }

        match self.cutoff.check(page).await {
            CutoffDecision::Proceed(date) => {
                debug!(listing = %id, offered_since = %date, "Listing is recent enough");
            }
            CutoffDecision::Skip(SkipReason::DateUnavailable(reason)) => {
                info!(listing = %id, reason = %reason, "Offered-since date unavailable, skipping");
                return Outcome::Handled(HandledReason::DateUnavailable);
            }
            CutoffDecision::Skip(SkipReason::BeforeCutoff(date)) => {
                info!(
                    listing = %id,
                    offered_since = %date,
                    cutoff = %self.cutoff.cutoff(),
                    "Listing offered before cutoff, skipping"
                );
                return Outcome::Handled(HandledReason::BeforeCutoff(date));
            }
        }

        self.dismiss_consent(page).await;

        let (strategy, contact) = match self
            .contact_chain
            .first_clickable(page, self.element_timeout)
            .await
        {
            Some(found) => found,
            None => {
                info!(listing = %id, "No contact action on listing");
                return Outcome::Handled(HandledReason::NoContactAction);
            }
        };
        state.contact_action = Some(strategy);

        if let Err(e) = page.click(&contact).await {
            return Outcome::Failed {
                stage: Stage::Activate,
                error: e,
            };
        }

        let send = match page
            .wait_until_clickable(&self.contact.send_locator, self.element_timeout)
            .await
        {
            Ok(el) => el,
            Err(e) => {
                info!(listing = %id, error = %e, "Contact form has no send control");
                return Outcome::Handled(HandledReason::NoSendAction);
            }
        };

        for field in [ContactField::Name, ContactField::Email, ContactField::Message] {
            match self.fill_field(page, field).await {
                Ok(FieldFill::Filled) => state.filled.push(field),
                Ok(result) => debug!(listing = %id, field = %field, result = ?result, "Field not filled"),
                Err(e) if e.is_element_miss() => {
                    debug!(listing = %id, field = %field, error = %e, "Field went missing")
                }
                Err(e) => warn!(listing = %id, field = %field, error = %e, "Failed to fill field"),
            }
        }

        // A click error here may still have sent the form.
        if let Err(e) = page.click(&send).await {
            warn!(listing = %id, error = %e, "Send click reported an error");
        }
        state.submitted = true;
        Outcome::Handled(HandledReason::Submitted)
    }

    async fn dismiss_consent(&self, page: &mut dyn Page) {
        let locator = &self.contact.consent_locator;
        match page.wait_until_clickable(locator, self.element_timeout).await {
            Ok(button) => match page.click(&button).await {
                Ok(()) => {
                    debug!("Dismissed consent banner");
                    tokio::time::sleep(Duration::from_millis(self.contact.consent_settle_ms)).await;
                }
                Err(e) => debug!(error = %e, "Consent banner click failed"),
            },
            Err(e) => debug!(error = %e, "No consent banner"),
        }
    }

    async fn fill_field(&self, page: &mut dyn Page, field: ContactField) -> Result<FieldFill> {
        let (locator, value) = self.field_target(field);
        let element = match page.find_element(&locator).await? {
            Some(el) => el,
            None => return Ok(FieldFill::Missing),
        };
        if !page.is_displayed(&element).await? {
            return Ok(FieldFill::Hidden);
        }

        let current = match page.attribute(&element, "value").await? {
            Some(v) => v,
            None => page.text(&element).await?,
        };
        if !current.trim().is_empty() {
            return Ok(FieldFill::AlreadySet);
        }

        page.clear(&element).await?;
        page.send_keys(&element, value).await?;
        Ok(FieldFill::Filled)
    }
}

#[async_trait]
impl ListingProcessor for ContactWorkflow {
    async fn process(&self, id: &ListingId) -> Outcome {
        let mut page = match self.browser.open(LISTING_SESSION).await {
            Ok(page) => page,
            Err(e) => {
                if self.session_failure_marks_handled {
                    warn!(listing = %id, error = %e, "Automation session unavailable, marking handled");
                    return Outcome::Handled(HandledReason::SessionUnavailable);
                }
                warn!(listing = %id, error = %e, "Automation session unavailable, will retry");
                return Outcome::Failed {
                    stage: Stage::Open,
                    error: e,
                };
            }
        };

        let mut state = ContactFormState::default();
        let outcome = self.run_stages(page.as_mut(), id, &mut state).await;
        page.close().await;

        match &outcome {
            Outcome::Handled(HandledReason::Submitted) => info!(
                listing = %id,
                filled = ?state.filled,
                strategy = ?state.contact_action,
                "Contact form submitted"
            ),
            Outcome::Handled(reason) => debug!(listing = %id, reason = ?reason, "Listing handled"),
            Outcome::Failed { stage, error } => {
                warn!(listing = %id, stage = %stage, error = %error, "Listing processing failed")
            }
        }
        outcome
    }
}
