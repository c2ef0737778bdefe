//! CDP-based implementation of the page-automation capability.
//!
//! - `cdp`: Chrome DevTools Protocol client over WebSocket
//! - `session`: launching a private browser or attaching a tab to a running one
//! - `page`: `Browser`/`Page` trait implementations on top of a session

pub mod cdp;
pub mod page;
pub mod session;

pub use page::{CdpBrowser, CdpPage};
pub use session::BrowserSession;
