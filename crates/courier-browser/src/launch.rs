//! Browser binary discovery, launch, and DevTools target discovery.
//!
//! The session manager launches its own Chrome with a persistent per-provider
//! profile directory, so an operator's manual login survives restarts. The
//! DevTools HTTP endpoint (`/json`) is then polled until the first page
//! target exposes a `webSocketDebuggerUrl`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::error::BrowserError;

/// Environment variable naming an explicit browser binary.
pub const BROWSER_ENV_VAR: &str = "COURIER_BROWSER";

/// How long to wait for the DevTools endpoint to come up.
const TARGET_DISCOVERY_WINDOW: Duration = Duration::from_secs(15);
const TARGET_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Well-known Chrome/Chromium binary locations for this platform.
pub fn platform_candidate_paths() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    }

    #[cfg(target_os = "linux")]
    {
        &[
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        &[]
    }
}

/// Find a browser binary: explicit configuration first, then the
/// `COURIER_BROWSER` variable, then the platform candidate list.
pub fn find_browser(configured: Option<&Path>) -> Result<PathBuf, BrowserError> {
    if let Some(path) = configured {
        if path.exists() {
            tracing::info!(path = %path.display(), "using configured browser binary");
            return Ok(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured browser binary missing, scanning");
    }

    if let Ok(env_path) = std::env::var(BROWSER_ENV_VAR) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            tracing::info!(path = %path.display(), "using browser binary from environment");
            return Ok(path);
        }
        tracing::warn!(path = env_path, "browser binary from environment missing, scanning");
    }

    for candidate in platform_candidate_paths() {
        let path = Path::new(candidate);
        if path.exists() {
            tracing::info!(path = candidate, "found browser binary");
            return Ok(path.to_path_buf());
        }
    }
    Err(BrowserError::NoBrowserFound)
}

/// A browser child process we own and must kill on close.
pub struct LaunchedBrowser {
    child: tokio::process::Child,
    port: u16,
}

impl LaunchedBrowser {
    /// Launch with remote debugging enabled and a persistent profile.
    pub async fn launch(
        binary: &Path,
        port: u16,
        profile_dir: &Path,
    ) -> Result<Self, BrowserError> {
        std::fs::create_dir_all(profile_dir).map_err(|e| BrowserError::LaunchFailed {
            path: binary.display().to_string(),
            reason: format!("cannot create profile dir: {e}"),
        })?;

        let child = tokio::process::Command::new(binary)
            .arg(format!("--remote-debugging-port={port}"))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--window-size=1280,900")
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::LaunchFailed {
                path: binary.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            path = %binary.display(),
            port,
            profile = %profile_dir.display(),
            "browser launched"
        );
        Ok(Self { child, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Kill the child. Harmless if it already exited.
    pub async fn close(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "browser child already gone");
        }
    }
}

/// Pick the first page target's WebSocket URL out of a `/json` listing.
pub fn first_page_ws_url(targets: &Value) -> Option<String> {
    targets.as_array()?.iter().find_map(|t| {
        if t.get("type").and_then(Value::as_str) == Some("page") {
            t.get("webSocketDebuggerUrl")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        } else {
            None
        }
    })
}

/// Poll the DevTools HTTP endpoint until a page target appears.
pub async fn discover_page_target(port: u16) -> Result<String, BrowserError> {
    let url = format!("http://127.0.0.1:{port}/json");
    let deadline = tokio::time::Instant::now() + TARGET_DISCOVERY_WINDOW;

    loop {
        match reqwest::get(&url).await {
            Ok(resp) => {
                if let Ok(targets) = resp.json::<Value>().await {
                    if let Some(ws_url) = first_page_ws_url(&targets) {
                        tracing::debug!(port, ws_url, "page target discovered");
                        return Ok(ws_url);
                    }
                }
            }
            Err(e) => {
                tracing::trace!(port, error = %e, "DevTools endpoint not up yet");
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BrowserError::NoPageTarget {
                port,
                duration: TARGET_DISCOVERY_WINDOW,
            });
        }
        tokio::time::sleep(TARGET_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_paths_are_absolute() {
        for p in platform_candidate_paths() {
            assert!(p.starts_with('/'), "candidate path is not absolute: {p}");
        }
    }

    #[test]
    fn configured_path_takes_priority() {
        // Any existing file will do for the priority check.
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("browser");
        std::fs::write(&fake, b"").unwrap();
        let found = find_browser(Some(&fake)).unwrap();
        assert_eq!(found, fake);
    }

    #[test]
    fn first_page_target_wins() {
        let targets = serde_json::json!([
            {"type": "background_page", "webSocketDebuggerUrl": "ws://x/bg"},
            {"type": "page", "webSocketDebuggerUrl": "ws://x/page1"},
            {"type": "page", "webSocketDebuggerUrl": "ws://x/page2"},
        ]);
        assert_eq!(
            first_page_ws_url(&targets).as_deref(),
            Some("ws://x/page1")
        );
    }

    #[test]
    fn no_page_target_yields_none() {
        let targets = serde_json::json!([
            {"type": "service_worker", "webSocketDebuggerUrl": "ws://x/sw"},
        ]);
        assert!(first_page_ws_url(&targets).is_none());
        assert!(first_page_ws_url(&serde_json::json!([])).is_none());
        assert!(first_page_ws_url(&serde_json::json!({})).is_none());
    }

    #[test]
    fn page_target_without_ws_url_is_skipped() {
        let targets = serde_json::json!([
            {"type": "page"},
            {"type": "page", "webSocketDebuggerUrl": "ws://x/ok"},
        ]);
        assert_eq!(first_page_ws_url(&targets).as_deref(), Some("ws://x/ok"));
    }
}
