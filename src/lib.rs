//! Synthetic time-series block generator for benchmarking storage backends.
//!
//! A [`provider::MetricSetProvider`] expands metrics × targets into labeled
//! value sequences, a [`generator::Generator`] walks them across a fixed
//! window and hands every sample to a [`store::BlockStore`], flushing one
//! block per flush interval.

pub mod codec;
pub mod error;
pub mod generator;
pub mod head;
pub mod logging;
pub mod profile;
pub mod provider;
pub mod randval;
pub mod reader;
pub mod store;
pub mod view;
pub mod writer;

pub use error::{ConfigError, GenerateError};
pub use generator::{GenerateStats, Generator, GeneratorConfig};
pub use provider::{Labels, LabeledSeries, MetricSetProvider, ProviderConfig, SeriesProvider};
pub use store::{BlockStore, StoreGuard};

/// Milliseconds since the Unix epoch.
pub type Time = u64;
pub type SeriesKey = String;

pub const SAMPLE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: Time,
    pub value: f64,
}
