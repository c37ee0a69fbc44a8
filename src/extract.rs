use std::path::Path;

use compact_str::CompactString;
use hashbrown::HashMap;
use scraper::ElementRef;

use crate::{
    dom::{Document, NodeExt, has_class, text_of},
    record::{Origin, Record, RecordCollection},
    stats::{Engagement, Profile, Stats},
    store,
    util::{Cutoff, now, parse_count, time_string},
};

/// One timeline entry as rendered in this snapshot.
#[derive(Clone, Debug)]
pub struct Entry<'a> {
    pub key: CompactString,
    pub element: ElementRef<'a>,
    pub engagement: Engagement,
}

impl<'a> Entry<'a> {
    pub fn parse(element: ElementRef<'a>) -> Option<Self> {
        let key = CompactString::new(element.attr("data-item-id")?);
        let counter = |class: &'static str| {
            element
                .find_by_class("button", class)
                .last()
                .and_then(|b| b.last_by_tag("span"))
                .and_then(|span| parse_count(&text_of(span)))
        };
        let engagement = Engagement {
            retweets: counter("js-actionRetweet"),
            favorites: counter("js-actionFavorite"),
        };
        Some(Self { key, element, engagement })
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.element
            .first_by_tag("small")?
            .first_by_tag("a")?
            .first_by_tag("span")?
            .attr("data-time")?
            .trim()
            .parse()
            .ok()
    }

    /// `None` when the context marker is missing altogether.
    pub fn classify(&self) -> Option<Origin> {
        let marker = self
            .element
            .first_by_tag("div")?
            .first_by_tag("div")?
            .first_by_tag("span")?;
        Some(if has_class(marker, "Icon--retweeted") {
            Origin::Reshare
        } else {
            Origin::Original
        })
    }

    fn anchors_with(&self, class: &'static str) -> Vec<CompactString> {
        self.element
            .find_by_class("a", class)
            .map(|a| text_of(a).trim().into())
            .collect()
    }

    pub fn hashtags(&self) -> Vec<CompactString> {
        self.anchors_with("twitter-hashtag")
    }

    pub fn to_record(&self) -> Record {
        let origin = self.classify().unwrap_or_else(|| {
            tracing::debug!(target: "extract", "{}: no context marker, treating as original", self.key);
            Origin::Original
        });
        Record {
            time: self.timestamp().and_then(time_string),
            origin,
            text: self.element.first_by_tag("p").map(text_of),
            hashtags: self.hashtags(),
            mentions: self.anchors_with("twitter-atreply"),
            retweets: self.engagement.retweets,
            favorites: self.engagement.favorites,
        }
    }
}

/// Timeline entries in document order; entries without a key are dropped.
pub fn entries(root: ElementRef<'_>) -> Vec<Entry<'_>> {
    root.find_by_attribute("data-item-type", Some("tweet"))
        .filter(|e| e.value().name() == "li")
        .filter_map(|li| {
            let entry = Entry::parse(li);
            if entry.is_none() {
                tracing::warn!(target: "extract", "timeline entry without data-item-id skipped");
            }
            entry
        })
        .collect()
}

/// Per-run accumulator, created for one source and dropped with it.
#[derive(Debug, Default)]
pub struct Tally {
    pub new: usize,
    pub updated: usize,
    pub hashtags: HashMap<CompactString, usize>,
}

impl Tally {
    fn count(&mut self, hashtags: &[CompactString]) {
        for tag in hashtags {
            *self.hashtags.entry(tag.clone()).or_default() += 1;
        }
    }

    /// Most used hashtags of this run, ties broken alphabetically.
    pub fn top_hashtags(&self, n: usize) -> Vec<(&str, usize)> {
        let mut tags: Vec<_> = self.hashtags.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        tags.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        tags.truncate(n);
        tags
    }
}

/// Inserts unknown keys in full; known keys only get their counters refreshed.
pub fn merge(
    records: &mut RecordCollection,
    entries: &[Entry<'_>],
    first_run: bool,
    tally: &mut Tally,
) {
    let total = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        tracing::info!(target: "extract", "{} / {total}", i + 1);
        if !first_run {
            if let Some(existing) = records.get_mut(&entry.key) {
                existing.refresh(entry.engagement.retweets, entry.engagement.favorites);
                tally.count(&entry.hashtags());
                tally.updated += 1;
                continue;
            }
        }
        let record = entry.to_record();
        tally.count(&record.hashtags);
        records.insert(entry.key.clone(), record);
        tally.new += 1;
    }
}

#[derive(Debug)]
pub struct ExtractReport {
    pub entries: usize,
    pub tally: Tally,
    pub stats: Stats,
}

/// Parses one snapshot and merges it into `records`.
pub fn extract_markup(
    markup: &str,
    records: &mut RecordCollection,
    first_run: bool,
    cutoff: Cutoff,
    now: i64,
) -> ExtractReport {
    let doc = Document::parse(markup);
    let root = doc.root();

    let profile = Profile::parse(root);
    let entries = entries(root);
    let mut tally = Tally::default();
    merge(records, &entries, first_run, &mut tally);

    let seen: Vec<_> = entries.iter().map(|e| e.engagement).collect();
    let stats = Stats::compute(profile, &seen, cutoff, now);

    ExtractReport {
        entries: entries.len(),
        tally,
        stats,
    }
}

/// Extracts one source: snapshot in, collection and stats out.
pub fn extract_source(
    source: &str,
    raw_dir: &Path,
    out_dir: &Path,
    cutoff: Cutoff,
    now: i64,
) -> anyhow::Result<ExtractReport> {
    let markup = store::load_snapshot(raw_dir, source)?;
    tracing::info!(target: "extract", "got {source}");

    let (mut records, first_run) = match store::load_records(out_dir, source)? {
        Some(records) => (records, false),
        None => (RecordCollection::new(), true),
    };

    let report = extract_markup(&markup, &mut records, first_run, cutoff, now);
    if report.tally.new > 0 {
        tracing::info!(target: "extract", "{source}: {} new", report.tally.new);
    }
    tracing::debug!(
        target: "extract",
        "{source}: {} updated, top hashtags {:?}",
        report.tally.updated,
        report.tally.top_hashtags(5),
    );

    tracing::info!(target: "extract", "saving {source}");
    store::save_records(out_dir, source, &records)?;
    store::save_stats(out_dir, source, &report.stats)?;

    Ok(report)
}

/// Extracts every source in order, stopping at the first fatal error.
pub fn extract_all<S: AsRef<str>>(
    sources: &[S],
    raw_dir: &Path,
    out_dir: &Path,
    cutoff: Cutoff,
) -> anyhow::Result<Vec<ExtractReport>> {
    tracing::info!(target: "extract", "# parsing");
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        reports.push(extract_source(source.as_ref(), raw_dir, out_dir, cutoff, now())?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tweet(id: &str, time: i64, retweeted: bool, body: &str, rts: &str, favs: &str) -> String {
        let icon = if retweeted { "Icon Icon--retweeted" } else { "Icon Icon--pinned" };
        format!(
            r#"<li class="js-stream-item" data-item-id="{id}" data-item-type="tweet">
              <div class="tweet"><div class="context"><span class="{icon}"></span></div>
                <div class="content">
                  <small class="time"><a href="/x/status/{id}"><span class="_timestamp" data-time="{time}">Jun 1</span></a></small>
                  <p class="TweetTextSize">{body}</p>
                  <div class="ProfileTweet-actionList">
                    <button class="ProfileTweet-actionButton js-actionRetweet"><span class="ProfileTweet-actionCount"><span class="ProfileTweet-actionCountForPresentation">{rts}</span></span></button>
                    <button class="ProfileTweet-actionButton js-actionFavorite"><span class="ProfileTweet-actionCount"><span class="ProfileTweet-actionCountForPresentation">{favs}</span></span></button>
                  </div>
                </div>
              </div>
            </li>"#
        )
    }

    fn page(items: &[String]) -> String {
        format!(
            r#"<html><body><ol class="stream-items">{}</ol></body></html>"#,
            items.concat()
        )
    }

    const BODY: &str = r#"Hello <a class="twitter-hashtag pretty-link" href="/hashtag/rust"><s>#</s><b>rust</b></a> from <a class="twitter-atreply pretty-link" href="/ferris"><s>@</s><b>ferris</b></a> and <a class="twitter-hashtag" href="/hashtag/rust">#rust</a>"#;

    #[test]
    fn parses_entry_fields() {
        let markup = page(&[tweet("101", 1_434_639_464, true, BODY, "1,204", "")]);
        let doc = Document::parse(&markup);
        let entries = entries(doc.root());
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.key, "101");
        assert_eq!(entry.timestamp(), Some(1_434_639_464));
        assert_eq!(entry.classify(), Some(Origin::Reshare));

        let record = entry.to_record();
        assert_eq!(record.time, time_string(1_434_639_464));
        assert_eq!(record.origin, Origin::Reshare);
        assert_eq!(record.text.as_deref(), Some("Hello #rust from @ferris and #rust"));
        assert_eq!(record.hashtags, ["#rust", "#rust"]);
        assert_eq!(record.mentions, ["@ferris"]);
        assert_eq!(record.retweets, Some(1204));
        assert_eq!(record.favorites, None);
    }

    #[test]
    fn missing_marker_is_unclassified_but_stored_original() {
        let markup = page(&[r#"<li data-item-id="7" data-item-type="tweet"><p>plain</p></li>"#.to_owned()]);
        let doc = Document::parse(&markup);
        let entries = entries(doc.root());
        assert_eq!(entries[0].classify(), None);

        let record = entries[0].to_record();
        assert_eq!(record.origin, Origin::Original);
        assert_eq!(record.time, None);
        assert_eq!(record.text.as_deref(), Some("plain"));
        assert_eq!((record.retweets, record.favorites), (None, None));
    }

    #[test]
    fn skips_non_tweets_and_keyless_items() {
        let markup = page(&[
            tweet("1", 100, false, "a", "0", "0"),
            r#"<li data-item-type="user" data-item-id="2"></li>"#.to_owned(),
            r#"<li data-item-type="tweet"><p>no id</p></li>"#.to_owned(),
            tweet("3", 90, false, "b", "0", "0"),
        ]);
        let doc = Document::parse(&markup);
        let keys: Vec<_> = entries(doc.root()).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, ["1", "3"]);
    }

    #[test]
    fn last_counter_button_wins() {
        let item = r#"<li data-item-id="9" data-item-type="tweet">
            <button class="js-actionRetweet"><span>1</span></button>
            <button class="js-actionRetweet"><span>x</span><span>5</span></button>
        </li>"#;
        let markup = page(&[item.to_owned()]);
        let doc = Document::parse(&markup);
        assert_eq!(entries(doc.root())[0].engagement.retweets, Some(5));
    }

    #[test]
    fn merge_updates_counters_only() {
        let cutoff = Cutoff(1_400_000_000);
        let now = cutoff.0 + 86_400;

        let first = page(&[
            tweet("1", 1_434_000_000, false, "one", "1", "2"),
            tweet("2", 1_433_000_000, true, "two", "3", "4"),
        ]);
        let mut records = RecordCollection::new();
        let report = extract_markup(&first, &mut records, true, cutoff, now);
        assert_eq!(report.tally.new, 2);
        let before = records.clone();

        let second = page(&[
            tweet("3", 1_435_000_000, false, "three #new", "0", "0"),
            tweet("1", 1_434_000_000, true, "edited", "10", "20"),
        ]);
        let report = extract_markup(&second, &mut records, false, cutoff, now);
        assert_eq!((report.tally.new, report.tally.updated), (1, 1));
        assert_eq!(records.len(), 3);

        let one = &records["1"];
        let old = &before["1"];
        assert_eq!((&one.time, one.origin, &one.text), (&old.time, old.origin, &old.text));
        assert_eq!((&one.hashtags, &one.mentions), (&old.hashtags, &old.mentions));
        assert_eq!((one.retweets, one.favorites), (Some(10), Some(20)));
        assert_eq!(records["2"], before["2"]);
        assert_eq!(records["3"].text.as_deref(), Some("three #new"));
    }

    #[test]
    fn tally_counts_hashtags() {
        let markup = page(&[tweet("1", 100, false, BODY, "0", "0")]);
        let mut records = RecordCollection::new();
        let report = extract_markup(&markup, &mut records, true, Cutoff(0), 86_400);
        assert_eq!(report.tally.top_hashtags(3), [("#rust", 2)]);
    }

    #[test]
    fn tally_counts_known_entries_too() {
        let markup = page(&[
            tweet("1", 100, false, BODY, "0", "0"),
            tweet("2", 90, false, r#"<a class="twitter-hashtag" href="/h">#go</a>"#, "0", "0"),
        ]);
        let mut records = RecordCollection::new();
        extract_markup(&markup, &mut records, true, Cutoff(0), 86_400);

        let again = extract_markup(&markup, &mut records, false, Cutoff(0), 86_400);
        assert_eq!((again.tally.new, again.tally.updated), (0, 2));
        assert_eq!(again.tally.top_hashtags(3), [("#rust", 2), ("#go", 1)]);
    }
}
