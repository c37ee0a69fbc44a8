use core::time::Duration;
use std::path::PathBuf;

use crate::{
    dom::{Document, NodeExt},
    store,
    util::{Cutoff, jitter},
};

/// The browser as the fetcher sees it.
#[allow(async_fn_in_trait)]
pub trait Renderer {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    async fn scroll_to_bottom(&mut self) -> anyhow::Result<()>;

    /// Markup as currently rendered.
    async fn content(&mut self) -> anyhow::Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Earliest visible entry is at or before the cutoff.
    Cutoff,
    /// Scrolling loaded nothing older.
    Stall,
    /// No timestamped entries at all.
    Empty,
}

/// Earliest `data-time` on the page.
pub fn earliest_timestamp(markup: &str) -> Option<i64> {
    let doc = Document::parse(markup);
    doc.root()
        .find_by_attribute("data-time", None)
        .filter(|e| e.value().name() == "span")
        .filter_map(|e| e.attr("data-time")?.trim().parse().ok())
        .min()
}

/// `Ok(earliest)` to keep scrolling.
pub fn check(earliest: Option<i64>, previous: Option<i64>, cutoff: Cutoff) -> Result<i64, Stop> {
    let earliest = earliest.ok_or(Stop::Empty)?;
    if previous == Some(earliest) {
        Err(Stop::Stall)
    } else if earliest <= cutoff.0 {
        Err(Stop::Cutoff)
    } else {
        Ok(earliest)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            base: const { Duration::from_secs(2) },
            jitter: const { Duration::from_secs(1) },
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchOptions {
    pub host: String,
    pub raw_dir: PathBuf,
    pub cutoff: Cutoff,
    pub pacing: Pacing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchReport {
    pub scrolls: usize,
    pub stop: Stop,
    pub snapshot: PathBuf,
}

pub fn profile_url(host: &str, source: &str) -> String {
    format!("{}/{source}", host.trim_end_matches('/'))
}

/// Scrolls one profile back to the cutoff and saves what is rendered.
pub async fn fetch_source<R: Renderer>(
    renderer: &mut R,
    source: &str,
    options: &FetchOptions,
) -> anyhow::Result<FetchReport> {
    renderer.navigate(&profile_url(&options.host, source)).await?;
    tracing::info!(target: "fetch", "got {source}");

    let mut scrolls = 0;
    let mut previous = None;
    let (markup, stop) = loop {
        let markup = renderer.content().await?;
        match check(earliest_timestamp(&markup), previous, options.cutoff) {
            Ok(earliest) => {
                scrolls += 1;
                tracing::info!(target: "fetch", "{source}: scrolling ({scrolls})");
                tokio::time::sleep(jitter(options.pacing.base, options.pacing.jitter)).await;
                renderer.scroll_to_bottom().await?;
                previous = Some(earliest);
            }
            Err(stop) => break (markup, stop),
        }
    };
    if stop == Stop::Empty {
        tracing::warn!(target: "fetch", "{source}: no timestamped entries rendered");
    }

    tracing::info!(target: "fetch", "saving {source} after {scrolls} scrolls ({stop:?})");
    let snapshot = store::save_snapshot(&options.raw_dir, source, &markup)?;

    Ok(FetchReport {
        scrolls,
        stop,
        snapshot,
    })
}

/// Fetches every source in order; the first failure aborts the rest.
pub async fn fetch_all<R: Renderer, S: AsRef<str>>(
    renderer: &mut R,
    sources: &[S],
    options: &FetchOptions,
) -> anyhow::Result<Vec<FetchReport>> {
    tracing::info!(target: "fetch", "# starting scraper, back to {}", options.cutoff);
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        reports.push(fetch_source(renderer, source.as_ref(), options).await?);
    }
    Ok(reports)
}
