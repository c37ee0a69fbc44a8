use std::{borrow::Cow, ffi::OsStr, sync::Arc, time::Duration};

use headless_chrome::{Browser, LaunchOptions, Tab, browser::tab::NoElementFound};
use tokio::{task::spawn_blocking, time::sleep};

/// How the browser for one run is started.
#[derive(Clone, Debug)]
pub struct Session {
    pub headless: bool,
    pub proxy: Option<String>,
    pub window: (u32, u32),
    /// Chrome is shut down after this long without a command.
    pub idle: Duration,
}

impl Session {
    pub const fn new(headless: bool, proxy: Option<String>) -> Self {
        Self {
            headless,
            proxy,
            window: (1920, 1080),
            idle: Duration::from_secs(120),
        }
    }

    pub fn options(&self) -> LaunchOptions<'_> {
        LaunchOptions {
            headless: self.headless,
            window_size: Some(self.window),
            proxy_server: self.proxy.as_deref(),
            idle_browser_timeout: self.idle,
            args: vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--lang=en-US"),
            ],
            ..LaunchOptions::default()
        }
    }

    pub fn launch(&self) -> anyhow::Result<Browser> {
        Browser::new(self.options())
    }
}

/// Keeps the tab Chrome opened on start and closes any others.
pub fn single_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let kept = {
        let tabs = browser
            .get_tabs()
            .lock()
            .map_err(|e| anyhow::anyhow!("tab list poisoned: {e}"))?;
        match tabs.split_first() {
            Some((first, rest)) => {
                for extra in rest {
                    extra.close(true)?;
                }
                Some(Arc::clone(first))
            }
            None => None,
        }
    };

    match kept {
        Some(tab) => Ok(tab),
        None => browser.new_tab(),
    }
}

pub async fn navigate_to(tab: &Arc<Tab>, url: Cow<'static, str>) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || -> anyhow::Result<()> {
        tab.navigate_to(&url)?.wait_until_navigated()?;
        Ok(())
    })
    .await?
}

/// Polls for `selector` until it shows up or `patience` runs out.
pub async fn wait_for_async(
    tab: &Arc<Tab>,
    selector: &'static str,
    patience: Duration,
) -> anyhow::Result<bool> {
    const PERIOD: Duration = Duration::from_millis(1832 / 4);

    let mut waited = Duration::ZERO;
    loop {
        let arc_tab = Arc::clone(tab);
        match spawn_blocking(move || arc_tab.find_element(selector).map(|_| ())).await? {
            Ok(()) => break Ok(true),
            Err(err) => {
                if !err.is::<NoElementFound>() {
                    break Err(err);
                }
            }
        }

        if waited >= patience {
            break Ok(false);
        }
        sleep(PERIOD).await;
        waited += PERIOD;
    }
}

pub async fn evaluate(tab: &Arc<Tab>, script: &'static str) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.evaluate(script, false).map(|_| ())).await?
}

pub async fn content(tab: &Arc<Tab>) -> anyhow::Result<String> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || tab.get_content()).await?
}
