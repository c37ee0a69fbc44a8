mod puppeteer;

use core::time::Duration;
use std::sync::Arc;

use headless_chrome::{Browser, Tab};
use rand::seq::IndexedRandom;

pub use puppeteer::{Session, single_tab};

use crate::fetch::Renderer;

pub static USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const SCROLL: &str = "window.scrollTo(0, document.body.scrollHeight);";
const TIMELINE: &str = "li[data-item-type]";
const PATIENCE: Duration = Duration::from_secs(10);

/// One browser session, opened per invocation and closed with [`ChromeRenderer::close`].
pub struct ChromeRenderer {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeRenderer {
    pub fn launch(headless: bool, proxy: Option<String>) -> anyhow::Result<Self> {
        let browser = Session::new(headless, proxy).launch()?;
        let tab = single_tab(&browser)?;

        let user_agent = *USER_AGENTS
            .choose(&mut rand::rng())
            .ok_or_else(|| anyhow::anyhow!("no UA available"))?;
        tracing::info!(target: "browser", "choosing user-agent \x1b[1;36m{user_agent}\x1b[0m ...");
        tab.set_user_agent(user_agent, None, None)?;

        Ok(Self { browser, tab })
    }

    pub fn close(self) {
        let Self { browser, tab } = self;
        if let Err(e) = tab.close(true) {
            tracing::warn!(target: "browser", "closing tab failed: {e}");
        }
        drop(browser);
        tracing::debug!(target: "browser", "session closed");
    }
}

impl Renderer for ChromeRenderer {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        tracing::debug!(target: "browser", "navigating to {url}");
        puppeteer::navigate_to(&self.tab, url.to_owned().into()).await?;
        if !puppeteer::wait_for_async(&self.tab, TIMELINE, PATIENCE).await? {
            tracing::warn!(target: "browser", "{url}: no timeline after {PATIENCE:?}");
        }
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> anyhow::Result<()> {
        puppeteer::evaluate(&self.tab, SCROLL).await
    }

    async fn content(&mut self) -> anyhow::Result<String> {
        puppeteer::content(&self.tab).await
    }
}
