use std::{
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use anyhow::Context;
use blockgen::{
    codec::Block,
    logging::{init_logging, LogFormat},
    profile::{Profiles, RunProfile, DEFAULT_PROFILE},
    reader::read_blocks,
    view::scatter_chart_html,
    writer::{remove_dir, FileBlockStore},
    Generator, MetricSetProvider, StoreGuard, Time,
};
use clap::{Parser, Subcommand};

const DEFAULT_CHART_SERIES: usize = 5;

/// Generates synthetic time-series blocks for storage benchmarks.
#[derive(Debug, Parser)]
#[command(name = "blockgen", version)]
struct Cli {
    #[arg(long, global = true, default_value = "info", env = "BLOCKGEN_LOG_LEVEL")]
    log_level: String,
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate blocks for a profile.
    Generate {
        /// TOML file with extra profiles.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,
        /// Overrides the profile's output directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Summarise the blocks in a directory.
    Inspect {
        dir: PathBuf,
        /// Write a chart of the selected series to this HTML file.
        #[arg(long)]
        html: Option<PathBuf>,
        /// Series keys to chart, comma separated.
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },
    /// List the available profiles.
    Profiles {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;
    match cli.command {
        Command::Generate {
            config,
            profile,
            out_dir,
        } => {
            let profiles = load_profiles(config.as_deref())?;
            let mut profile = profiles.get(&profile)?.clone();
            if let Some(out_dir) = out_dir {
                profile.out_dir = out_dir;
            }
            generate(profile).await
        }
        Command::Inspect { dir, html, keys } => inspect(&dir, html.as_deref(), keys).await,
        Command::Profiles { config } => {
            let profiles = load_profiles(config.as_deref())?;
            for profile in profiles.iter() {
                let generator = &profile.generator;
                println!(
                    "{}: {} x {} series, {} back from {}, every {}, blocks of {} -> {}",
                    profile.name,
                    profile.provider.metric_count,
                    profile.provider.target_count,
                    humantime::format_duration(generator.retention),
                    humantime::format_rfc3339(generator.start_time),
                    humantime::format_duration(generator.sample_interval),
                    humantime::format_duration(generator.flush_interval),
                    profile.out_dir.display(),
                );
            }
            Ok(())
        }
    }
}

fn load_profiles(config: Option<&Path>) -> anyhow::Result<Profiles> {
    let profiles = match config {
        Some(path) => Profiles::load(path)?,
        None => Profiles::builtin()?,
    };
    Ok(profiles)
}

async fn generate(profile: RunProfile) -> anyhow::Result<()> {
    profile.generator.window()?;
    let provider = MetricSetProvider::new(profile.provider.clone())?;
    if profile.delete_dir {
        tracing::info!(dir = %profile.out_dir.display(), "deleting output directory");
        remove_dir(&profile.out_dir)?;
    }
    let store = FileBlockStore::open(&profile.out_dir)?;
    tracing::info!(
        profile = %profile.name,
        dir = %profile.out_dir.display(),
        series_count = provider.series_count(),
        "writing blocks"
    );

    let generator = Generator::new(profile.generator);
    let stats = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut store = StoreGuard::new(store);
        let stats = generator.generate(&mut *store, &[&provider]);
        let closed = store.close();
        let stats = stats?;
        closed.context("close block store")?;
        Ok(stats)
    })
    .await
    .context("generation task")??;

    tracing::info!(
        dir = %profile.out_dir.display(),
        samples = stats.samples,
        blocks = stats.flushes,
        "done"
    );
    Ok(())
}

fn format_time(time: Time) -> humantime::Rfc3339Timestamp {
    humantime::format_rfc3339_millis(UNIX_EPOCH + Duration::from_millis(time))
}

async fn inspect(dir: &Path, html: Option<&Path>, keys: Vec<String>) -> anyhow::Result<()> {
    let blocks = read_blocks(dir)
        .await
        .with_context(|| format!("read blocks in {}", dir.display()))?;
    for (path, block) in &blocks {
        println!(
            "{}  {} .. {}  series={} samples={}",
            path.display(),
            format_time(block.mint),
            format_time(block.maxt),
            block.series.len(),
            block.sample_count(),
        );
    }
    let Some(html) = html else {
        return Ok(());
    };

    let blocks: Vec<Block> = blocks.into_iter().map(|(_, block)| block).collect();
    let keys = match keys.is_empty() {
        true => blocks
            .first()
            .map(|block| {
                block
                    .series
                    .iter()
                    .take(DEFAULT_CHART_SERIES)
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default(),
        false => keys,
    };
    let chart = scatter_chart_html(&blocks, keys.iter(), None, None).await;
    let page = format!(
        "<!DOCTYPE html><html><head><script src=\"https://cdn.plot.ly/plotly-2.12.1.min.js\"></script></head><body>{chart}</body></html>"
    );
    tokio::fs::write(html, page)
        .await
        .with_context(|| format!("write {}", html.display()))?;
    tracing::info!(path = %html.display(), series = keys.len(), "wrote chart");
    Ok(())
}
