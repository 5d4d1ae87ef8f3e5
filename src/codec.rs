//! Block layout, all integers big-endian:
//!
//! ```text
//! magic "BGB1" | mint u64 | maxt u64 | series_count u32
//! per series: key_len u16 | key | sample_count u32 | (time u64, value f64)*
//! ```

use std::io::{self, Write};

use crate::{head::Head, Sample, SeriesKey, Time, SAMPLE_SIZE};

pub const BLOCK_MAGIC: [u8; 4] = *b"BGB1";

/// Counts come from the file; reserve no more than this up front.
const MAX_PREALLOC: usize = 1024;

/// One sealed block, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub mint: Time,
    pub maxt: Time,
    pub series: Vec<(SeriesKey, Vec<Sample>)>,
}
impl Block {
    pub fn sample_count(&self) -> usize {
        self.series.iter().map(|(_, samples)| samples.len()).sum()
    }
    pub fn samples(&self, key: &str) -> Option<&[Sample]> {
        self.series
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, samples)| samples.as_slice())
    }
}

pub fn encode_key(wtr: &mut impl Write, key: &str) -> io::Result<()> {
    let len = u16::try_from(key.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "series key too long"))?;
    wtr.write_all(&len.to_be_bytes())?;
    wtr.write_all(key.as_bytes())
}
pub async fn decode_key<R>(rdr: &mut R, key: &mut SeriesKey) -> io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;
    let len = rdr.read_u16().await?;
    let mut buf = std::mem::take(key).into_bytes();
    buf.clear();
    buf.resize(usize::from(len), 0);
    rdr.read_exact(&mut buf).await?;
    *key = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(())
}

pub fn encode_sample_count(count: u32) -> [u8; 4] {
    count.to_be_bytes()
}
pub fn decode_sample_count(buf: [u8; 4]) -> u32 {
    u32::from_be_bytes(buf)
}

pub fn encode_sample(sample: Sample) -> [u8; SAMPLE_SIZE] {
    let mut buf = [0; SAMPLE_SIZE];
    buf[..8].copy_from_slice(&sample.time.to_be_bytes());
    buf[8..].copy_from_slice(&sample.value.to_be_bytes());
    buf
}
pub fn decode_sample(buf: [u8; SAMPLE_SIZE]) -> Sample {
    let mut time = [0; 8];
    time.copy_from_slice(&buf[..8]);
    let mut value = [0; 8];
    value.copy_from_slice(&buf[8..]);
    Sample {
        time: u64::from_be_bytes(time),
        value: f64::from_be_bytes(value),
    }
}

/// Writes everything `head` holds as one block. An empty head has no time
/// range and is rejected.
pub fn encode_block(wtr: &mut impl Write, head: &Head) -> io::Result<()> {
    let Some((mint, maxt)) = head.time_range() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty head"));
    };
    let series_count = u32::try_from(head.series_count())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many series"))?;
    wtr.write_all(&BLOCK_MAGIC)?;
    wtr.write_all(&mint.to_be_bytes())?;
    wtr.write_all(&maxt.to_be_bytes())?;
    wtr.write_all(&series_count.to_be_bytes())?;
    for (key, samples) in head.series() {
        encode_key(wtr, key)?;
        let count = u32::try_from(samples.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many samples"))?;
        wtr.write_all(&encode_sample_count(count))?;
        for sample in samples {
            wtr.write_all(&encode_sample(*sample))?;
        }
    }
    Ok(())
}

pub async fn decode_block<R>(rdr: &mut R) -> io::Result<Block>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;
    let mut magic = [0; 4];
    rdr.read_exact(&mut magic).await?;
    if magic != BLOCK_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a block"));
    }
    let mint = rdr.read_u64().await?;
    let maxt = rdr.read_u64().await?;
    let series_count = rdr.read_u32().await?;
    let mut series = Vec::with_capacity((series_count as usize).min(MAX_PREALLOC));
    for _ in 0..series_count {
        let mut key = SeriesKey::new();
        decode_key(rdr, &mut key).await?;
        let mut sample_count = [0; 4];
        rdr.read_exact(&mut sample_count).await?;
        let sample_count = decode_sample_count(sample_count);
        let mut samples = Vec::with_capacity((sample_count as usize).min(MAX_PREALLOC));
        for _ in 0..sample_count {
            let mut sample = [0; SAMPLE_SIZE];
            rdr.read_exact(&mut sample).await?;
            samples.push(decode_sample(sample));
        }
        series.push((key, samples));
    }
    Ok(Block { mint, maxt, series })
}
