use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hashing::{infohash_of, sha256_hex};

/// The self-describing record for a shared file: enough to verify every
/// piece and to derive a content-addressed infohash.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub filename: String,
    pub size: u64,
    pub piece_size: u64,
    pub piece_hashes: Vec<String>,
}

impl Meta {
    pub fn total_pieces(&self) -> usize {
        self.piece_hashes.len()
    }

    pub fn infohash(&self) -> Result<String> {
        infohash_of(self)
    }
}

/// Read `path` in strict `piece_size`-sized chunks from offset 0, hashing
/// each with SHA-256. Stops on the first short-or-empty read. The last
/// chunk may be shorter than `piece_size`; every other chunk is exactly
/// `piece_size` bytes.
pub fn build_meta(path: &Path, piece_size: u64) -> Result<(String, Meta)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut piece_hashes = Vec::new();
    let mut buf = vec![0u8; piece_size as usize];
    loop {
        let read = read_fill(&mut file, &mut buf)?;
        if read == 0 {
            break;
        }
        piece_hashes.push(sha256_hex(&buf[..read]));
        if read < buf.len() {
            break;
        }
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let meta = Meta {
        filename,
        size,
        piece_size,
        piece_hashes,
    };
    let infohash = meta.infohash()?;
    Ok((infohash, meta))
}

/// Fill `buf` from `reader`, stopping short only at EOF (unlike a single
/// `Read::read` call, which may return fewer bytes than requested even
/// mid-stream).
fn read_fill(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_has_no_pieces() {
        let dir = std::env::temp_dir().join(format!("corkswarm-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.bin");
        File::create(&path).unwrap();

        let (_, meta) = build_meta(&path, 1024).unwrap();
        assert_eq!(meta.size, 0);
        assert_eq!(meta.total_pieces(), 0);
        assert!(meta.piece_hashes.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn exact_multiple_of_piece_size_has_no_short_final_piece() {
        let dir = std::env::temp_dir().join(format!("corkswarm-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("exact.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(&vec![7u8; 20]).unwrap();
        drop(f);

        let (_, meta) = build_meta(&path, 10).unwrap();
        assert_eq!(meta.total_pieces(), 2);
        assert_eq!(meta.piece_hashes[0], meta.piece_hashes[1]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn same_bytes_same_piece_size_yield_same_infohash() {
        let dir = std::env::temp_dir().join(format!("corkswarm-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hello.bin");
        std::fs::write(&path, b"hello world, this is a test file").unwrap();

        let (ih1, _) = build_meta(&path, 8).unwrap();
        let (ih2, _) = build_meta(&path, 8).unwrap();
        assert_eq!(ih1, ih2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn differing_piece_size_changes_infohash() {
        let dir = std::env::temp_dir().join(format!("corkswarm-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hello.bin");
        std::fs::write(&path, b"hello world, this is a test file").unwrap();

        let (ih1, _) = build_meta(&path, 8).unwrap();
        let (ih2, _) = build_meta(&path, 16).unwrap();
        assert_ne!(ih1, ih2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
