use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{Error, Result};

/// Normalized absolute URL of one listing detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// Resolve an href found on `base` into a listing id. Relative links are
    /// joined onto `base`; fragments are dropped.
    pub fn parse(href: &str, base: &Url) -> Result<Self> {
        let href = href.trim();
        if href.is_empty() {
            return Err(Error::Other("empty listing href".to_string()));
        }
        let mut url = base
            .join(href)
            .map_err(|e| Error::Other(format!("invalid listing href '{}': {}", href, e)))?;
        url.set_fragment(None);
        Ok(Self(url.to_string()))
    }

    /// Wrap a value that was normalized when it was first recorded.
    pub fn from_recorded(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(Self(line.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ListingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
