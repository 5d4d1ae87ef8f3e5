use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{codec::encode_block, head::Head, provider::Labels, store::BlockStore, Sample, Time};

pub const BLOCK_EXTENSION: &str = "bgb";

pub fn block_file_name(mint: Time, maxt: Time) -> String {
    format!("block-{mint}-{maxt}.{BLOCK_EXTENSION}")
}

/// [`BlockStore`] that seals one block file into `dir` per flush.
///
/// Whatever was written since the last flush lives in memory. The directory
/// is never cleaned; blocks from earlier runs stay and a block whose name is
/// already taken fails the flush.
#[derive(Debug)]
pub struct FileBlockStore {
    dir: PathBuf,
    head: Head,
    buf: Vec<u8>,
    blocks: Vec<PathBuf>,
    written: u64,
    closed: bool,
}
impl FileBlockStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self {
            dir,
            head: Head::new(),
            buf: vec![],
            blocks: vec![],
            written: 0,
            closed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
    /// Block files sealed by this store, oldest first.
    pub fn blocks(&self) -> &[PathBuf] {
        &self.blocks
    }
    pub fn head(&self) -> &Head {
        &self.head
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        if self.closed {
            anyhow::bail!("block store {} is closed", self.dir.display());
        }
        Ok(())
    }

    fn write_block(&mut self, head: &Head, mint: Time, maxt: Time) -> anyhow::Result<PathBuf> {
        self.buf.clear();
        encode_block(&mut self.buf, head).context("encode block")?;

        let path = self.dir.join(block_file_name(mint, maxt));
        let tmp = self.dir.join(format!(".{}.tmp", block_file_name(mint, maxt)));
        if path.exists() {
            anyhow::bail!("block {} already exists", path.display());
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        let res = file.write_all(&self.buf).and_then(|()| file.sync_all());
        drop(file);
        if let Err(e) = res {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("write {}", tmp.display()));
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
        Ok(path)
    }
}
impl BlockStore for FileBlockStore {
    fn write(&mut self, time: Time, labels: &Labels, value: f64) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.head
            .push(&labels.key(), Sample { time, value })
            .with_context(|| format!("append {labels}"))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        let Some((mint, maxt)) = self.head.time_range() else {
            tracing::debug!(dir = %self.dir.display(), "nothing to flush");
            return Ok(());
        };
        let head = self.head.take();
        let path = match self.write_block(&head, mint, maxt) {
            Ok(path) => path,
            Err(e) => {
                self.head = head;
                return Err(e);
            }
        };
        tracing::info!(
            path = %path.display(),
            series_count = head.series_count(),
            sample_count = head.sample_count(),
            written = self.written,
            mint,
            maxt,
            "sealed block"
        );
        self.blocks.push(path);
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.closed = true;
        if !self.head.is_empty() {
            tracing::warn!(
                dir = %self.dir.display(),
                sample_count = self.head.sample_count(),
                "dropping unflushed samples"
            );
        }
        self.head = Head::new();
        self.buf = vec![];
        Ok(())
    }
}

/// Removes `dir` and everything under it. A missing directory is fine.
pub fn remove_dir(dir: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("delete {}", dir.display()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(instance: &str) -> Labels {
        Labels::from_pairs([("__name__", "up"), ("instance", instance)])
    }

    #[test]
    fn flush_seals_one_file_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlockStore::open(dir.path().join("out")).unwrap();
        for time in [0, 1_000] {
            store.write(time, &labels("a"), 1.).unwrap();
            store.write(time, &labels("b"), 2.).unwrap();
        }
        store.flush().unwrap();
        store.write(2_000, &labels("a"), 3.).unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        let names: Vec<_> = store
            .blocks()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["block-0-1000.bgb", "block-2000-2000.bgb"]);
        for path in store.blocks() {
            assert!(path.is_file());
        }
        let leftovers = fs::read_dir(store.dir())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlockStore::open(dir.path()).unwrap();
        store.flush().unwrap();
        assert!(store.blocks().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn out_of_order_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlockStore::open(dir.path()).unwrap();
        store.write(5_000, &labels("a"), 1.).unwrap();
        assert!(store.write(4_000, &labels("b"), 1.).is_err());
        store.flush().unwrap();
        store.write(4_000, &labels("b"), 1.).unwrap();
    }

    #[test]
    fn existing_block_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(block_file_name(0, 0)), b"keep").unwrap();
        let mut store = FileBlockStore::open(dir.path()).unwrap();
        store.write(0, &labels("a"), 1.).unwrap();
        assert!(store.flush().is_err());
        assert_eq!(store.head().sample_count(), 1);
        assert_eq!(fs::read(dir.path().join(block_file_name(0, 0))).unwrap(), b"keep");
    }

    #[test]
    fn closed_store_rejects_use() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBlockStore::open(dir.path()).unwrap();
        store.write(0, &labels("a"), 1.).unwrap();
        store.close().unwrap();
        assert!(store.write(1, &labels("a"), 1.).is_err());
        assert!(store.flush().is_err());
        assert!(store.close().is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn remove_dir_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone");
        remove_dir(&target).unwrap();
        fs::create_dir_all(target.join("nested")).unwrap();
        remove_dir(&target).unwrap();
        assert!(!target.exists());
    }
}
