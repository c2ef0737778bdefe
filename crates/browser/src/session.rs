//! Browser session lifecycle.
//!
//! A session is one page target plus whatever backs it: either a browser
//! process launched for that session alone, or a tab opened in a browser that
//! was already running with a remote debugging port.

use super::cdp::CdpClient;
use rentwatch_core::config::BrowserConfig;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

enum SessionOwner {
    /// Browser process started for this session; killed on close.
    Process(Child),
    /// Tab in an externally managed browser; closed through the browser target.
    Tab { browser: CdpClient, target_id: String },
}

/// A single browser session with its page-level CDP client.
pub struct BrowserSession {
    pub name: String,
    pub cdp: CdpClient,
    owner: SessionOwner,
    closed: bool,
}

impl BrowserSession {
    /// Launch a dedicated browser process for this session.
    pub async fn launch(
        name: &str,
        config: &BrowserConfig,
        user_data_dir: &Path,
    ) -> Result<Self, String> {
        let browser_path = match &config.binary {
            Some(path) => path.clone(),
            None => find_browser_binary()
                .ok_or_else(|| "chrome not found. Please install it.".to_string())?,
        };

        std::fs::create_dir_all(user_data_dir)
            .map_err(|e| format!("Failed to create user data dir: {}", e))?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(config, debug_port, user_data_dir);

        info!(
            session = name,
            port = debug_port,
            headed = config.headed,
            "Launching browser for session"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to launch {}: {}", browser_path, e))?;

        let address = format!("127.0.0.1:{}", debug_port);
        wait_for_cdp_ready(&address, Duration::from_secs(15)).await?;
        let page_ws_url = get_page_ws_url(&address).await?;
        let cdp = connect_page(&page_ws_url, config).await?;

        Ok(Self {
            name: name.to_string(),
            cdp,
            owner: SessionOwner::Process(child),
            closed: false,
        })
    }

    /// Open a fresh tab in a browser listening on `address` (`host:port`).
    pub async fn attach(name: &str, config: &BrowserConfig, address: &str) -> Result<Self, String> {
        let browser_ws_url = wait_for_cdp_ready(address, Duration::from_secs(5)).await?;
        let browser = CdpClient::connect(&browser_ws_url).await?;
        let target_id = browser.create_target("about:blank").await?;

        let page_ws_url = match get_target_ws_url(address, &target_id).await {
            Ok(url) => url,
            Err(e) => {
                let _ = browser.close_target(&target_id).await;
                return Err(e);
            }
        };
        let cdp = match connect_page(&page_ws_url, config).await {
            Ok(cdp) => cdp,
            Err(e) => {
                let _ = browser.close_target(&target_id).await;
                return Err(e);
            }
        };

        info!(session = name, address, target_id = %target_id, "Attached new tab to running browser");

        Ok(Self {
            name: name.to_string(),
            cdp,
            owner: SessionOwner::Tab { browser, target_id },
            closed: false,
        })
    }

    /// Close the session and release whatever backs it.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match &mut self.owner {
            SessionOwner::Process(child) => {
                if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
                    debug!("CDP Browser.close failed (may already be closed): {}", e);
                }
                let _ = child.kill().await;
            }
            SessionOwner::Tab { browser, target_id } => {
                if let Err(e) = browser.close_target(target_id).await {
                    warn!(session = %self.name, error = %e, "Failed to close tab");
                }
            }
        }
        debug!(session = %self.name, "Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let SessionOwner::Process(child) = &mut self.owner {
            let _ = child.start_kill();
        }
    }
}

async fn connect_page(page_ws_url: &str, config: &BrowserConfig) -> Result<CdpClient, String> {
    let cdp = CdpClient::connect(page_ws_url)
        .await?
        .with_command_timeout(config.page_load_timeout());
    cdp.enable_domain("Page").await?;
    cdp.enable_domain("Runtime").await?;
    cdp.enable_domain("DOM").await?;
    cdp.set_viewport(config.window_width, config.window_height)
        .await
        .ok();
    Ok(cdp)
}

fn build_browser_args(config: &BrowserConfig, debug_port: u16, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--disable-gpu".to_string(),
        "--password-store=basic".to_string(),
    ];
    if !config.headed {
        args.push("--headless=new".to_string());
    }
    args.push(format!(
        "--window-size={},{}",
        config.window_width, config.window_height
    ));
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome/Chromium binary on the system.
pub fn find_browser_binary() -> Option<String> {
    let candidates: Vec<&str> = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| format!("Failed to bind to find free port: {}", e))?;
    let port = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local addr: {}", e))?
        .port();
    drop(listener);
    Ok(port)
}

/// Poll `/json/version` until the browser-level WebSocket URL is available.
async fn wait_for_cdp_ready(address: &str, timeout: Duration) -> Result<String, String> {
    let start = Instant::now();
    let url = format!("http://{}/json/version", address);

    loop {
        if start.elapsed() > timeout {
            return Err(format!(
                "CDP endpoint {} not ready after {}s",
                address,
                timeout.as_secs()
            ));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn list_targets(address: &str) -> Option<Vec<Value>> {
    let url = format!("http://{}/json/list", address);
    let resp = reqwest::get(&url).await.ok()?;
    resp.json().await.ok()
}

/// WebSocket URL of the first page target. Retries since the initial page
/// target may not appear immediately after launch.
async fn get_page_ws_url(address: &str) -> Result<String, String> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Some(targets) = list_targets(address).await else {
            continue;
        };
        if let Some(ws_url) = find_ws_url(&targets, |t| {
            t.get("type").and_then(|v| v.as_str()) == Some("page")
        }) {
            return Ok(ws_url);
        }
    }
    Err("No page target found after retries".to_string())
}

/// Resolve a targetId to its WebSocket debugger URL via /json/list.
async fn get_target_ws_url(address: &str, target_id: &str) -> Result<String, String> {
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Some(targets) = list_targets(address).await else {
            continue;
        };
        if let Some(ws_url) = find_ws_url(&targets, |t| {
            t.get("id").or_else(|| t.get("targetId")).and_then(|v| v.as_str()) == Some(target_id)
        }) {
            return Ok(ws_url);
        }
    }
    Err(format!(
        "No WebSocket URL found for targetId '{}' after retries",
        target_id
    ))
}

fn find_ws_url(targets: &[Value], pred: impl Fn(&Value) -> bool) -> Option<String> {
    targets
        .iter()
        .filter(|t| pred(t))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}
