use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::capability::Locator;
use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_listing_link_selector")]
    pub listing_link_selector: String,
    /// Time given to the search page to render its results after load.
    #[serde(default = "default_render_delay_ms")]
    pub render_delay_ms: u64,
}

fn default_search_url() -> String {
    "https://www.pararius.com/apartments/groningen/apartment".to_string()
}

fn default_listing_link_selector() -> String {
    "a.listing-search-item__link".to_string()
}

fn default_render_delay_ms() -> u64 {
    3000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            listing_link_selector: default_listing_link_selector(),
            render_delay_ms: default_render_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CutoffConfig {
    /// Listings offered strictly before this date are skipped.
    #[serde(default = "default_offered_since")]
    pub offered_since: NaiveDate,
    #[serde(default = "default_offered_since_locator")]
    pub offered_since_locator: Locator,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_offered_since() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 4).unwrap_or_default()
}

fn default_offered_since_locator() -> Locator {
    Locator::xpath("//dt[contains(normalize-space(.), 'Offered since')]/following-sibling::dd[1]")
}

fn default_date_format() -> String {
    "%d-%m-%Y".to_string()
}

impl Default for CutoffConfig {
    fn default() -> Self {
        Self {
            offered_since: default_offered_since(),
            offered_since_locator: default_offered_since_locator(),
            date_format: default_date_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_name_selector")]
    pub name_selector: String,
    #[serde(default = "default_email_selector")]
    pub email_selector: String,
    #[serde(default = "default_message_selector")]
    pub message_selector: String,
    #[serde(default = "default_consent_locator")]
    pub consent_locator: Locator,
    /// Tried in order until one becomes clickable.
    #[serde(default = "default_contact_locators")]
    pub contact_locators: Vec<Locator>,
    #[serde(default = "default_send_locator")]
    pub send_locator: Locator,
    #[serde(default = "default_consent_settle_ms")]
    pub consent_settle_ms: u64,
}

fn default_message() -> String {
    "Hello,\n\nWe would be interested in attending a viewing if possible.".to_string()
}

fn default_name_selector() -> String {
    "input#contact-name".to_string()
}

fn default_email_selector() -> String {
    "input#contact-email".to_string()
}

fn default_message_selector() -> String {
    "textarea#contact-message".to_string()
}

fn default_consent_locator() -> Locator {
    Locator::css("#onetrust-accept-btn-handler")
}

fn default_contact_locators() -> Vec<Locator> {
    vec![
        Locator::css(
            "button.listing-reaction-button--contact-agent, a.listing-reaction-button--contact-agent",
        ),
        Locator::text("a", "Contact the estate agent"),
    ]
}

fn default_send_locator() -> Locator {
    Locator::text("button", "Send")
}

fn default_consent_settle_ms() -> u64 {
    500
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            message: default_message(),
            name_selector: default_name_selector(),
            email_selector: default_email_selector(),
            message_selector: default_message_selector(),
            consent_locator: default_consent_locator(),
            contact_locators: default_contact_locators(),
            send_locator: default_send_locator(),
            consent_settle_ms: default_consent_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// `host:port` of an already running Chrome started with
    /// `--remote-debugging-port`. When unset a headless browser is launched
    /// for every session.
    #[serde(default)]
    pub debugger_address: Option<String>,
    #[serde(default)]
    pub headed: bool,
    #[serde(default)]
    pub binary: Option<String>,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_page_load_timeout_secs() -> u64 {
    30
}

fn default_element_timeout_secs() -> u64 {
    5
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debugger_address: None,
            headed: false,
            binary: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            element_timeout_secs: default_element_timeout_secs(),
        }
    }
}

impl BrowserConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    #[serde(default = "default_check_interval_minutes")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_listing_pause_ms")]
    pub listing_pause_ms: u64,
    /// When no automation session can be opened for a listing, mark it
    /// handled (`true`) or leave it for the next tick (`false`).
    #[serde(default = "default_true")]
    pub session_failure_marks_handled: bool,
}

fn default_check_interval_minutes() -> u64 {
    30
}

fn default_listing_pause_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: default_check_interval_minutes(),
            listing_pause_ms: default_listing_pause_ms(),
            session_failure_marks_handled: default_true(),
        }
    }
}

impl ScheduleConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }

    pub fn listing_pause(&self) -> Duration {
        Duration::from_millis(self.listing_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cutoff: CutoffConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.search.url)
            .map_err(|e| Error::Config(format!("search.url '{}': {}", self.search.url, e)))?;
        if self.contact.contact_locators.is_empty() {
            return Err(Error::Config(
                "contact.contactLocators must list at least one locator".to_string(),
            ));
        }
        if self.schedule.check_interval_minutes == 0 {
            return Err(Error::Config(
                "schedule.checkIntervalMinutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.search.url, default_search_url());
        assert_eq!(
            config.cutoff.offered_since,
            NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
        );
        assert_eq!(config.contact.contact_locators.len(), 2);
        assert_eq!(config.browser.page_load_timeout(), Duration::from_secs(30));
        assert_eq!(config.browser.element_timeout(), Duration::from_secs(5));
        assert_eq!(config.schedule.check_interval(), Duration::from_secs(1800));
        assert_eq!(config.schedule.listing_pause(), Duration::from_secs(2));
        assert!(config.schedule.session_failure_marks_handled);
    }

    #[test]
    fn test_camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{
                "cutoff": {"offeredSince": "2025-07-01"},
                "schedule": {"checkIntervalMinutes": 5, "sessionFailureMarksHandled": false},
                "browser": {"debuggerAddress": "localhost:9222"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.cutoff.offered_since,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
        assert_eq!(config.schedule.check_interval_minutes, 5);
        assert!(!config.schedule.session_failure_marks_handled);
        assert_eq!(
            config.browser.debugger_address.as_deref(),
            Some("localhost:9222")
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let mut config = Config::default();
        config.contact.name = "Sam".to_string();
        config.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert_eq!(loaded.contact.name, "Sam");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.search.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.contact.contact_locators.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.check_interval_minutes = 0;
        assert!(config.validate().is_err());
    }
}
