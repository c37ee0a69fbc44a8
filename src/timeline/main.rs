use std::path::PathBuf;

use compact_str::CompactString;
use tscr::{
    FetchOptions,
    config::{FileConfig, Overrides, Settings},
    scrape::ChromeRenderer,
    util::Cutoff,
};

#[derive(clap::Parser)]
#[command(version, about = "Scroll profile timelines and extract them into JSON records")]
struct Args {
    /// JSON config file; flags below take precedence.
    #[arg(short, long, value_name = "file")]
    config: Option<PathBuf>,
    /// Where raw page snapshots go.
    #[arg(long, env = "TIMELINE_RAW_DIR")]
    raw_dir: Option<PathBuf>,
    /// Where record and stats JSON go.
    #[arg(long, env = "TIMELINE_OUT_DIR")]
    out_dir: Option<PathBuf>,
    /// Unix seconds, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (local time).
    #[arg(long, env = "TIMELINE_CUTOFF")]
    cutoff: Option<Cutoff>,
    /// Base pause between scrolls, in seconds.
    #[arg(long)]
    delay: Option<f64>,
    /// Extra random pause on top of the delay, up to this many seconds.
    #[arg(long)]
    jitter: Option<f64>,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    headless: bool,
    #[arg(long, env = "TIMELINE_PROXY")]
    proxy: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scroll each profile back to the cutoff and save the page.
    Fetch { handles: Vec<String> },
    /// Parse saved pages into records and stats.
    Extract { handles: Vec<String> },
    /// Fetch, then extract.
    Run { handles: Vec<String> },
}

impl Commands {
    fn handles(&self) -> &[String] {
        match self {
            Self::Fetch { handles } | Self::Extract { handles } | Self::Run { handles } => handles,
        }
    }

    const fn fetches(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Run { .. })
    }

    const fn extracts(&self) -> bool {
        matches!(self, Self::Extract { .. } | Self::Run { .. })
    }
}

fn init_logger(verbose: bool) -> anyhow::Result<()> {
    let mut builder = pretty_env_logger::formatted_timed_builder();
    builder.filter_level(if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Error
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.try_init()?;
    Ok(())
}

async fn fetch(settings: &Settings) -> anyhow::Result<()> {
    let options = FetchOptions {
        host: settings.host.clone(),
        raw_dir: settings.raw_dir.clone(),
        cutoff: settings.cutoff,
        pacing: settings.pacing,
    };

    let mut renderer = ChromeRenderer::launch(settings.headless, settings.proxy.clone())?;
    let result = tscr::fetch_all(&mut renderer, &settings.sources, &options).await;
    renderer.close();

    for report in result? {
        tracing::info!(target: "fetch", "{}: {} scrolls, {:?}", report.snapshot.display(), report.scrolls, report.stop);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let cli = Overrides {
        handles: args.command.handles().iter().map(CompactString::new).collect(),
        raw_dir: args.raw_dir,
        out_dir: args.out_dir,
        cutoff: args.cutoff,
        verbose: args.verbose,
        headless: args.headless,
        proxy: args.proxy,
        delay: args.delay,
        jitter: args.jitter,
    };
    let settings = Settings::resolve(file, cli)?;

    init_logger(settings.verbose)?;
    tracing::debug!("settings: {settings:?}");

    if args.command.fetches() {
        fetch(&settings).await?;
    }
    if args.command.extracts() {
        tscr::extract_all(&settings.sources, &settings.raw_dir, &settings.out_dir, settings.cutoff)?;
    }

    Ok(())
}
