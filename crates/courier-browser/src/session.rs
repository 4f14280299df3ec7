//! Provider session lifecycle.
//!
//! A [`SessionManager`] owns at most one live browser session for its
//! provider. Sessions are created lazily on first use and recreated when a
//! health probe fails; the launched browser child is killed on close.
//!
//! Login is the operator's job: the profile directory is persistent, so a
//! manual login in the launched window survives restarts.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use courier_types::Provider;

use crate::driver::{js_string, PageDriver};
use crate::error::BrowserError;
use crate::launch::{discover_page_target, find_browser, LaunchedBrowser};
use crate::provider::{profile, ProviderProfile};
use crate::stability::ResponsePage;

/// How long to let the chat page settle after navigation.
const PAGE_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub provider: Provider,
    /// Persistent profile directory for this provider.
    pub profile_dir: PathBuf,
    /// DevTools port; each provider needs its own.
    pub debug_port: u16,
    /// Explicit browser binary, overriding discovery.
    pub browser_path: Option<PathBuf>,
}

/// Lazily creates and recycles the one session for a provider.
pub struct SessionManager {
    config: SessionConfig,
    session: Option<ProviderSession>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// A healthy session, creating or recreating one as needed.
    pub async fn ensure(&mut self) -> Result<&mut ProviderSession, BrowserError> {
        let reusable = match &self.session {
            Some(session) => session.healthy().await,
            None => false,
        };
        if !reusable {
            if self.session.is_some() {
                tracing::warn!(provider = %self.config.provider, "session unhealthy, recycling");
                self.close().await;
            }
            let session = ProviderSession::open(&self.config).await?;
            self.session = Some(session);
        }
        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => unreachable!("session was just created"),
        }
    }

    /// Tear down the session and its browser child, if any.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.browser.close().await;
            tracing::info!(provider = %self.config.provider, "session closed");
        }
    }
}

/// One live chat tab, driven over CDP.
pub struct ProviderSession {
    driver: PageDriver,
    browser: LaunchedBrowser,
    profile: &'static ProviderProfile,
}

impl ProviderSession {
    async fn open(config: &SessionConfig) -> Result<Self, BrowserError> {
        let profile = profile(config.provider);
        let binary = find_browser(config.browser_path.as_deref())?;
        let browser =
            LaunchedBrowser::launch(&binary, config.debug_port, &config.profile_dir).await?;
        let ws_url = discover_page_target(config.debug_port).await?;
        let driver = PageDriver::connect(&ws_url).await?;

        driver.navigate(profile.chat_url).await?;
        tokio::time::sleep(PAGE_SETTLE).await;
        tracing::info!(provider = %config.provider, url = profile.chat_url, "chat page ready");

        Ok(Self {
            driver,
            browser,
            profile,
        })
    }

    /// Can the connection still enumerate targets?
    pub async fn healthy(&self) -> bool {
        self.driver
            .connection()
            .call("Target.getTargets", serde_json::json!({}))
            .await
            .is_ok()
    }

    /// Submit a prompt. Returns the number of assistant replies that
    /// already existed, for the stability detector's baseline.
    pub async fn submit(&mut self, prompt: &str) -> Result<usize, BrowserError> {
        let input = match self.find_input().await? {
            Some(sel) => sel,
            None => {
                // A stale conversation view can lose the composer; a fresh
                // conversation URL brings it back.
                tracing::warn!(provider = %self.profile.provider, "input missing, reloading chat page");
                self.driver.navigate(self.profile.chat_url).await?;
                tokio::time::sleep(PAGE_SETTLE).await;
                self.find_input()
                    .await?
                    .ok_or_else(|| BrowserError::ElementNotFound {
                        selector: self.profile.input_selectors.join(", "),
                    })?
            }
        };

        let baseline = self.driver.count_matches(self.profile.reply_selector).await?;

        self.inject_prompt(input, prompt).await?;

        // Prefer the send button; some layouts only accept Enter.
        let mut sent = false;
        for sel in self.profile.send_selectors {
            if self.driver.element_exists(sel).await? {
                self.driver.click(sel).await?;
                sent = true;
                break;
            }
        }
        if !sent {
            self.driver.press_enter().await?;
        }

        tracing::info!(
            provider = %self.profile.provider,
            baseline,
            chars = prompt.len(),
            "prompt submitted"
        );
        Ok(baseline)
    }

    async fn find_input(&self) -> Result<Option<&'static str>, BrowserError> {
        for sel in self.profile.input_selectors.iter().copied() {
            if self.driver.element_exists(sel).await? {
                return Ok(Some(sel));
            }
        }
        Ok(None)
    }

    /// Write the prompt into the composer and fire an input event so the
    /// page's framework notices the change.
    async fn inject_prompt(&self, selector: &str, prompt: &str) -> Result<(), BrowserError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; \
             el.focus(); \
             if (el.tagName === 'TEXTAREA') {{ el.value = {text}; }} \
             else {{ el.innerText = {text}; }} \
             el.dispatchEvent(new InputEvent('input', {{ bubbles: true }})); \
             return true; }})()",
            sel = js_string(selector),
            text = js_string(prompt),
        );
        let ok = self.driver.evaluate(&expr).await?.as_bool().unwrap_or(false);
        if !ok {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ResponsePage for ProviderSession {
    async fn busy(&mut self) -> Result<bool, BrowserError> {
        self.driver.element_exists(self.profile.busy_selector).await
    }

    async fn latest_reply(&mut self, baseline: usize) -> Result<Option<String>, BrowserError> {
        let count = self.driver.count_matches(self.profile.reply_selector).await?;
        if count > baseline {
            return self.driver.last_inner_text(self.profile.reply_selector).await;
        }
        // The primary selector sees nothing new; try the fallback.
        if let Some(fallback) = self.profile.reply_fallback {
            let fb_count = self.driver.count_matches(fallback).await?;
            if fb_count > baseline {
                return self.driver.last_inner_text(fallback).await;
            }
        }
        Ok(None)
    }
}
