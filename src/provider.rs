use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    randval::{RandCounter, RandGauge, ValueConfig, ValueSequence},
    SeriesKey,
};

pub const METRIC_NAME_LABEL: &str = "__name__";
pub const INSTANCE_LABEL: &str = "instance";
pub const JOB_LABEL: &str = "job";

/// Label pairs sorted by name. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Labels {
    pairs: Vec<(String, String)>,
}
impl Labels {
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        pairs.sort();
        pairs.dedup_by(|a, b| a.0 == b.0);
        Self { pairs }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// `name{label="value",...}`
    pub fn key(&self) -> SeriesKey {
        self.to_string()
    }
}
impl core::fmt::Display for Labels {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.metric_name() {
            f.write_str(name)?;
        }
        f.write_str("{")?;
        let mut first = true;
        for (name, value) in self.iter().filter(|(n, _)| *n != METRIC_NAME_LABEL) {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{name}={value:?}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug)]
pub struct LabeledSeries {
    labels: Labels,
    sequence: Box<dyn ValueSequence>,
}
impl LabeledSeries {
    pub fn new(labels: Labels, sequence: Box<dyn ValueSequence>) -> Self {
        Self { labels, sequence }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }
    pub fn next_value(&mut self) -> f64 {
        self.sequence.next_value()
    }
}

/// Source of the series a generation run writes.
pub trait SeriesProvider {
    /// Builds a new, independent set of series on every call.
    fn series(&self) -> Vec<LabeledSeries>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricMix {
    Counters,
    Gauges,
    /// Even metric indexes are counters, odd ones gauges.
    #[default]
    Alternating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub metric_count: usize,
    pub target_count: usize,
    pub mix: MetricMix,
    pub metric_prefix: String,
    pub job: String,
    pub values: ValueConfig,
}
impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metric_count == 0 {
            return Err(ConfigError::ZeroCount {
                field: "metric_count",
            });
        }
        if self.target_count == 0 {
            return Err(ConfigError::ZeroCount {
                field: "target_count",
            });
        }
        self.values.validate()
    }
}
impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            metric_count: 200,
            target_count: 100,
            mix: MetricMix::default(),
            metric_prefix: "blockgen_metric".into(),
            job: "blockgen".into(),
            values: ValueConfig::default(),
        }
    }
}

/// Every metric crossed with every target, one sequence per pair.
#[derive(Debug, Clone)]
pub struct MetricSetProvider {
    config: ProviderConfig,
}
impl MetricSetProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
    pub fn series_count(&self) -> usize {
        self.config.metric_count * self.config.target_count
    }

    fn is_counter(&self, metric: usize) -> bool {
        match self.config.mix {
            MetricMix::Counters => true,
            MetricMix::Gauges => false,
            MetricMix::Alternating => metric % 2 == 0,
        }
    }
    /// The configured seed mixed with this provider's identity, so two
    /// providers sharing a seed still draw different values. `0` stays `0`.
    fn value_config(&self) -> ValueConfig {
        let mut values = self.config.values;
        if values.change_rand_seed != 0 {
            let identity = fnv1a([
                self.config.metric_prefix.as_bytes(),
                b"\0",
                self.config.job.as_bytes(),
            ]);
            values.change_rand_seed = match values.change_rand_seed ^ identity {
                0 => identity,
                seed => seed,
            };
        }
        values
    }
    fn metric_name(&self, metric: usize) -> String {
        let name = format!("{}_{metric:04}", self.config.metric_prefix);
        match self.is_counter(metric) {
            true => name + "_total",
            false => name,
        }
    }
}
impl SeriesProvider for MetricSetProvider {
    fn series(&self) -> Vec<LabeledSeries> {
        let values = self.value_config();
        let mut series = Vec::with_capacity(self.series_count());
        for metric in 0..self.config.metric_count {
            let name = self.metric_name(metric);
            for target in 0..self.config.target_count {
                let labels = Labels::from_pairs([
                    (METRIC_NAME_LABEL, name.clone()),
                    (INSTANCE_LABEL, format!("target-{target:04}")),
                    (JOB_LABEL, self.config.job.clone()),
                ]);
                let stream = (metric * self.config.target_count + target) as u64;
                let sequence: Box<dyn ValueSequence> = match self.is_counter(metric) {
                    true => Box::new(RandCounter::with_stream(values, stream)),
                    false => Box::new(RandGauge::with_stream(values, stream)),
                };
                series.push(LabeledSeries::new(labels, sequence));
            }
        }
        series
    }
}

/// 64-bit FNV-1a; stable across platforms and releases.
fn fnv1a<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in parts.into_iter().flatten() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
