use core::time::Duration;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use compact_str::CompactString;
use serde::{Deserialize, Deserializer};

use crate::{fetch::Pacing, util::Cutoff};

pub mod constants {
    macro_rules! env_or_default {
        ($name:expr, $default:expr) => {
            if let Some(s) = option_env!($name) {
                s
            } else {
                $default
            }
        };
    }

    pub const PROFILE_HOST: &str = env_or_default!("PROFILE_HOST", "https://twitter.com");
    pub const RAW_DIR: &str = env_or_default!("RAW_DIR", "./data/raw");
    pub const OUT_DIR: &str = env_or_default!("OUT_DIR", "./data");
}

/// The optional JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub handles: Vec<CompactString>,
    pub raw_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "cutoff")]
    pub cutoff: Option<Cutoff>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub headless: bool,
    pub proxy: Option<String>,
    pub host: Option<String>,
    pub delay: Option<f64>,
    pub jitter: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("bad config {}: {e}", path.display()))
    }
}

/// `1433116800` or `"2015-06-01"`.
fn cutoff<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Cutoff>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Seconds(secs)) => Ok(Some(Cutoff(secs))),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn seconds(what: &str, secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow::anyhow!("bad {what} {secs}: {e}"))
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub handles: Vec<CompactString>,
    pub raw_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub cutoff: Option<Cutoff>,
    pub verbose: bool,
    pub headless: bool,
    pub proxy: Option<String>,
    pub delay: Option<f64>,
    pub jitter: Option<f64>,
}

#[derive(Debug)]
pub struct Settings {
    pub sources: Vec<CompactString>,
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
    pub cutoff: Cutoff,
    pub verbose: bool,
    pub headless: bool,
    pub proxy: Option<String>,
    pub host: String,
    pub pacing: Pacing,
}

impl Settings {
    /// Command line beats config file beats built-in defaults.
    pub fn resolve(file: FileConfig, cli: Overrides) -> anyhow::Result<Self> {
        let sources = if cli.handles.is_empty() { file.handles } else { cli.handles };
        if sources.is_empty() {
            anyhow::bail!("no handles given");
        }
        let Some(cutoff) = cli.cutoff.or(file.cutoff) else {
            anyhow::bail!("no cutoff time given");
        };

        let mut pacing = Pacing::default();
        if let Some(delay) = cli.delay.or(file.delay) {
            pacing.base = seconds("delay", delay)?;
        }
        if let Some(jitter) = cli.jitter.or(file.jitter) {
            pacing.jitter = seconds("jitter", jitter)?;
        }

        Ok(Self {
            sources,
            raw_dir: cli.raw_dir.or(file.raw_dir).unwrap_or_else(|| constants::RAW_DIR.into()),
            out_dir: cli.out_dir.or(file.out_dir).unwrap_or_else(|| constants::OUT_DIR.into()),
            cutoff,
            verbose: cli.verbose || file.verbose,
            headless: cli.headless || file.headless,
            proxy: cli.proxy.or(file.proxy),
            host: file.host.unwrap_or_else(|| constants::PROFILE_HOST.to_owned()),
            pacing,
        })
    }
}
