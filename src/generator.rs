use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, GenerateError},
    provider::{LabeledSeries, SeriesProvider},
    store::BlockStore,
    Time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Newest sample; the window reaches back `retention` from here.
    #[serde(with = "humantime_serde")]
    pub start_time: SystemTime,
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
    /// Time span of one block.
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}
impl GeneratorConfig {
    /// 15s samples, 2h blocks.
    pub fn new(start_time: SystemTime, retention: Duration) -> Self {
        Self {
            start_time,
            retention,
            sample_interval: Duration::from_secs(15),
            flush_interval: Duration::from_secs(2 * 60 * 60),
        }
    }

    /// Checks the block-alignment rules and resolves the window to
    /// millisecond timestamps.
    pub fn window(&self) -> Result<Window, ConfigError> {
        let retention = millis("retention", self.retention)?;
        let sample_interval = millis("sample_interval", self.sample_interval)?;
        let flush_interval = millis("flush_interval", self.flush_interval)?;
        if flush_interval % sample_interval != 0 {
            return Err(ConfigError::NotMultiple {
                field: "flush_interval",
                value: self.flush_interval,
                of: "sample_interval",
                of_value: self.sample_interval,
            });
        }
        if retention % flush_interval != 0 {
            return Err(ConfigError::NotMultiple {
                field: "retention",
                value: self.retention,
                of: "flush_interval",
                of_value: self.flush_interval,
            });
        }
        let maxt = self
            .start_time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| ConfigError::BeforeEpoch)?
            .as_millis();
        let maxt = Time::try_from(maxt).map_err(|_| ConfigError::BeforeEpoch)?;
        let mint = maxt
            .checked_sub(retention)
            .ok_or(ConfigError::BeforeEpoch)?;
        Ok(Window {
            mint,
            maxt,
            sample_interval,
            flush_interval,
        })
    }
}

fn millis(field: &'static str, value: Duration) -> Result<u64, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::NonPositive { field });
    }
    if value.subsec_nanos() % 1_000_000 != 0 {
        return Err(ConfigError::SubMillisecond { field, value });
    }
    u64::try_from(value.as_millis()).map_err(|_| ConfigError::SubMillisecond { field, value })
}

/// Validated generation window in milliseconds. `mint` and `maxt` are both
/// sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub mint: Time,
    pub maxt: Time,
    pub sample_interval: u64,
    pub flush_interval: u64,
}
impl Window {
    pub fn tick_count(&self) -> u64 {
        (self.maxt - self.mint) / self.sample_interval + 1
    }
    pub fn ticks(&self) -> impl Iterator<Item = Time> {
        let (step, maxt) = (self.sample_interval, self.maxt);
        std::iter::successors(Some(self.mint), move |t| {
            t.checked_add(step).filter(|next| *next <= maxt)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateStats {
    pub ticks: u64,
    pub series: usize,
    pub samples: u64,
    pub flushes: u64,
}

#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
}
impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Writes every series of every provider from `start_time - retention`
    /// through `start_time`, flushing the store once per flush interval and
    /// once more at the end.
    ///
    /// The store is left open; closing it is up to the caller.
    pub fn generate<S>(
        &self,
        store: &mut S,
        providers: &[&dyn SeriesProvider],
    ) -> Result<GenerateStats, GenerateError>
    where
        S: BlockStore + ?Sized,
    {
        let window = self.config.window()?;
        let mut series: Vec<LabeledSeries> =
            providers.iter().flat_map(|p| p.series()).collect();
        let keys: Vec<String> = series.iter().map(|s| s.labels().key()).collect();
        tracing::info!(
            mint = window.mint,
            maxt = window.maxt,
            ticks = window.tick_count(),
            series_count = series.len(),
            "generating"
        );

        let mut stats = GenerateStats {
            series: series.len(),
            ..Default::default()
        };
        let mut elapsed = 0;
        let mut last = window.mint;
        for time in window.ticks() {
            for (entry, key) in series.iter_mut().zip(&keys) {
                let value = entry.next_value();
                store
                    .write(time, entry.labels(), value)
                    .map_err(|source| GenerateError::StoreWrite {
                        time,
                        series: key.clone(),
                        source,
                    })?;
                stats.samples += 1;
            }
            stats.ticks += 1;
            last = time;

            elapsed += window.sample_interval;
            if elapsed >= window.flush_interval {
                flush(store, time, &mut stats)?;
                elapsed = 0;
            }
        }
        flush(store, last, &mut stats)?;

        tracing::info!(
            ticks = stats.ticks,
            samples = stats.samples,
            flushes = stats.flushes,
            "generated"
        );
        Ok(stats)
    }
}

fn flush<S>(store: &mut S, time: Time, stats: &mut GenerateStats) -> Result<(), GenerateError>
where
    S: BlockStore + ?Sized,
{
    store
        .flush()
        .map_err(|source| GenerateError::StoreFlush { time, source })?;
    stats.flushes += 1;
    tracing::debug!(time, flushes = stats.flushes, "flushed");
    Ok(())
}
