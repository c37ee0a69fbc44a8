use compact_str::CompactString;
use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::parse_count;

/// Entry key -> record. Keys are never removed.
pub type RecordCollection = HashMap<CompactString, Record>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[default]
    #[serde(rename = "T")]
    Original,
    #[serde(rename = "RT")]
    Reshare,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<CompactString>,
    #[serde(default)]
    pub mentions: Vec<CompactString>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub retweets: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub favorites: Option<u64>,
}

impl Record {
    /// Refreshes the point-in-time counters, leaving content untouched.
    pub const fn refresh(&mut self, retweets: Option<u64>, favorites: Option<u64>) {
        self.retweets = retweets;
        self.favorites = favorites;
    }
}

/// Accepts `12`, `"12"`, `"1,234"`, `""` and `null`.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => parse_count(&s),
        None => None,
    })
}
