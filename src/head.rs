use std::collections::BTreeMap;

use crate::{Sample, SeriesKey, Time};

#[derive(Debug, thiserror::Error)]
#[error("sample at {time} is older than the newest buffered sample at {newest}")]
pub struct OutOfOrder {
    pub time: Time,
    pub newest: Time,
}

/// Samples not yet sealed into a block, grouped by series.
#[derive(Debug, Clone, Default)]
pub struct Head {
    series: BTreeMap<SeriesKey, Vec<Sample>>,
    range: Option<(Time, Time)>,
    sample_count: usize,
}
impl Head {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, sample: Sample) -> Result<(), OutOfOrder> {
        let range = match self.range {
            Some((_, newest)) if sample.time < newest => {
                return Err(OutOfOrder {
                    time: sample.time,
                    newest,
                })
            }
            Some((mint, _)) => (mint, sample.time),
            None => (sample.time, sample.time),
        };
        match self.series.get_mut(key) {
            Some(samples) => samples.push(sample),
            None => {
                self.series.insert(key.to_owned(), vec![sample]);
            }
        }
        self.range = Some(range);
        self.sample_count += 1;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
    pub fn series_count(&self) -> usize {
        self.series.len()
    }
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
    /// `(mint, maxt)`, both inclusive.
    pub fn time_range(&self) -> Option<(Time, Time)> {
        self.range
    }
    pub fn series(&self) -> impl Iterator<Item = (&SeriesKey, &[Sample])> {
        self.series.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Empties the head, returning what it held.
    pub fn take(&mut self) -> Head {
        core::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time: Time) -> Sample {
        Sample {
            time,
            value: time as f64,
        }
    }

    #[test]
    fn groups_by_series_and_tracks_range() {
        let mut head = Head::new();
        head.push("b", sample(10)).unwrap();
        head.push("a", sample(10)).unwrap();
        head.push("b", sample(20)).unwrap();
        assert_eq!(head.series_count(), 2);
        assert_eq!(head.sample_count(), 3);
        assert_eq!(head.time_range(), Some((10, 20)));
        let keys: Vec<_> = head.series().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b"]);
        let (_, b) = head.series().nth(1).unwrap();
        assert_eq!(b, [sample(10), sample(20)]);
    }

    #[test]
    fn rejects_older_samples() {
        let mut head = Head::new();
        head.push("a", sample(20)).unwrap();
        let err = head.push("b", sample(19)).unwrap_err();
        assert_eq!((err.time, err.newest), (19, 20));
        assert_eq!(head.sample_count(), 1);
    }

    #[test]
    fn take_resets() {
        let mut head = Head::new();
        head.push("a", sample(1)).unwrap();
        let taken = head.take();
        assert!(head.is_empty());
        assert_eq!(head.time_range(), None);
        assert_eq!(taken.sample_count(), 1);
        head.push("a", sample(0)).unwrap();
    }
}
