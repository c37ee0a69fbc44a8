use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use crate::{
    dom::{NodeExt, first_class, squeezed_text, text_of},
    util::Cutoff,
};

/// Profile header fields as displayed on the page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub tweets: Option<String>,
    pub following: Option<String>,
    pub followers: Option<String>,
    pub favorites: Option<String>,
    pub bio_text: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub join_date: Option<String>,
}

impl Profile {
    pub fn parse(root: ElementRef<'_>) -> Self {
        let mut profile = Self {
            name: root
                .find_by_class("a", "ProfileHeaderCard-nameLink")
                .last()
                .map(|a| text_of(a).trim().to_owned()),
            bio_text: root
                .find_by_class("p", "ProfileHeaderCard-bio")
                .next()
                .map(text_of),
            ..Self::default()
        };

        for a in root.find_by_attribute("data-nav", None) {
            if a.value().name() != "a" {
                continue;
            }
            let slot = match a.attr("data-nav") {
                Some("tweets") => &mut profile.tweets,
                Some("following") => &mut profile.following,
                Some("followers") => &mut profile.followers,
                Some("favorites") => &mut profile.favorites,
                _ => continue,
            };
            if let Some(span) = a.last_by_tag("span") {
                *slot = Some(text_of(span).trim().replace(',', ""));
            }
        }

        for div in root.find_by_tag("div") {
            let Some(class) = first_class(div) else {
                continue;
            };
            if !class.contains("ProfileHeaderCard-") {
                continue;
            }
            if class.contains("location") {
                profile.location = Some(squeezed_text(div));
            } else if class.contains("url") {
                profile.url = Some(format!("http://{}", squeezed_text(div)));
            } else if class.contains("joinDate") {
                profile.join_date = Some(squeezed_text(div));
            }
        }

        profile
    }
}

/// Per-run summary, overwritten on every extraction.
///
/// `favorites` is the displayed profile counter; the mean favorite count of
/// this run is `favoritesMean`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorites: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_date: Option<String>,
    pub frequency: String,
    pub retweets: String,
    pub favorites_mean: String,
}

/// Engagement counters of the entries seen in one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Engagement {
    pub retweets: Option<u64>,
    pub favorites: Option<u64>,
}

impl Stats {
    /// Unparsed counters add nothing to the sums but still count as entries.
    pub fn compute(profile: Profile, seen: &[Engagement], cutoff: Cutoff, now: i64) -> Self {
        let n = seen.len();
        let days = cutoff.elapsed_days(now);
        let retweets: u64 = seen.iter().filter_map(|e| e.retweets).sum();
        let favorites: u64 = seen.iter().filter_map(|e| e.favorites).sum();
        let mean = |sum: u64| if n == 0 { 0.0 } else { sum as f64 / n as f64 };

        Self {
            name: profile.name,
            tweets: profile.tweets,
            following: profile.following,
            followers: profile.followers,
            favorites: profile.favorites,
            bio_text: profile.bio_text,
            location: profile.location,
            url: profile.url,
            join_date: profile.join_date,
            frequency: format!("{:.3}", n as f64 / days as f64),
            retweets: format!("{:.3}", mean(retweets)),
            favorites_mean: format!("{:.3}", mean(favorites)),
        }
    }
}
