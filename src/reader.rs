use std::{
    io,
    path::{Path, PathBuf},
};

use crate::{
    codec::{decode_block, Block},
    writer::BLOCK_EXTENSION,
};

pub async fn open_block(path: &Path) -> io::Result<Block> {
    let file = tokio::fs::File::open(path).await?;
    let mut rdr = tokio::io::BufReader::new(file);
    decode_block(&mut rdr).await
}

/// Every block file directly under `dir`, decoded and ordered by `mint`.
pub async fn read_blocks(dir: &Path) -> io::Result<Vec<(PathBuf, Block)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut blocks = vec![];
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(BLOCK_EXTENSION) {
            continue;
        }
        let block = open_block(&path).await.map_err(|e| {
            io::Error::new(e.kind(), format!("{}: {e}", path.display()))
        })?;
        blocks.push((path, block));
    }
    blocks.sort_by_key(|(_, block)| (block.mint, block.maxt));
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use crate::{provider::Labels, store::BlockStore, writer::FileBlockStore};

    use super::*;

    #[tokio::test]
    async fn reads_back_what_was_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let labels = Labels::from_pairs([("__name__", "up"), ("instance", "a")]);
        let mut store = FileBlockStore::open(dir.path()).unwrap();
        for epoch in 0..3u64 {
            store.write(epoch * 10, &labels, epoch as f64).unwrap();
            store.write(epoch * 10 + 5, &labels, epoch as f64).unwrap();
            store.flush().unwrap();
        }
        store.close().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let blocks = read_blocks(dir.path()).await.unwrap();
        let ranges: Vec<_> = blocks.iter().map(|(_, b)| (b.mint, b.maxt)).collect();
        assert_eq!(ranges, [(0, 5), (10, 15), (20, 25)]);
        let samples = blocks[1].1.samples(&labels.key()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time, 15);
        assert_eq!(samples[1].value, 1.);
    }

    #[tokio::test]
    async fn corrupt_block_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("broken.{BLOCK_EXTENSION}"));
        std::fs::write(&path, b"garbage garbage garbage").unwrap();
        let err = read_blocks(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("broken.bgb"));
    }
}
