use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use base64::Engine;

use crate::error::Result;
use crate::message::PeerMessage;
use crate::meta::{build_meta, Meta};
use crate::warn_line;

#[derive(Clone)]
pub struct SeedEntry {
    pub path: PathBuf,
    pub meta: Meta,
}

/// An infohash -> path index over the seed directory. Rebuilt on a
/// rescan (startup, and whenever the caller chooses to refresh it)
/// rather than recomputed per `GET_PIECE`, which would be O(file size)
/// on every request.
pub struct SeedIndex {
    entries: RwLock<HashMap<String, SeedEntry>>,
}

impl SeedIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn rescan(&self, dir: &Path, piece_size: u64) -> Result<()> {
        let fresh = scan_dir(dir, piece_size)?;
        if let Ok(mut entries) = self.entries.write() {
            *entries = fresh;
        }
        Ok(())
    }

    pub fn get(&self, infohash: &str) -> Option<SeedEntry> {
        self.entries.read().ok().and_then(|entries| entries.get(infohash).cloned())
    }

    pub fn infohashes(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for SeedIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn scan_dir(dir: &Path, piece_size: u64) -> Result<HashMap<String, SeedEntry>> {
    std::fs::create_dir_all(dir)?;
    let mut entries = HashMap::new();
    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        match build_meta(&path, piece_size) {
            Ok((infohash, meta)) => {
                entries.insert(infohash, SeedEntry { path, meta });
            }
            Err(e) => warn_line!("PEER", "failed to hash {}: {e}", path.display()),
        }
    }
    Ok(entries)
}

/// Answer one `GET_PIECE`, streaming `PIECE_BLOCK` datagrams back to
/// `reply_to`. A miss (unknown infohash or out-of-range piece index)
/// sends nothing, matching the wire contract.
pub fn serve_get_piece(socket: &UdpSocket, index: &SeedIndex, ih: &str, piece: usize, block_size: usize, reply_to: SocketAddr) {
    let Some(entry) = index.get(ih) else { return };
    if piece >= entry.meta.total_pieces() {
        return;
    }

    let offset = piece as u64 * entry.meta.piece_size;
    let piece_len = if piece + 1 == entry.meta.total_pieces() {
        entry.meta.size - offset
    } else {
        entry.meta.piece_size
    } as usize;

    let bytes = match read_piece(&entry.path, offset, piece_len) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn_line!("PEER", "read piece {piece} of {}: {e}", entry.path.display());
            return;
        }
    };

    let total_blocks = bytes.len().div_ceil(block_size).max(1);
    for (block_idx, chunk) in bytes.chunks(block_size).enumerate() {
        let msg = PeerMessage::PieceBlock {
            ih: ih.to_string(),
            piece,
            block: block_idx,
            total_blocks,
            data: base64::engine::general_purpose::STANDARD.encode(chunk),
        };
        match serde_json::to_vec(&msg) {
            Ok(datagram) => {
                if let Err(e) = socket.send_to(&datagram, reply_to) {
                    warn_line!("PEER", "send piece block failed: {e}");
                    break;
                }
            }
            Err(e) => warn_line!("PEER", "encode piece block failed: {e}"),
        }
    }
}

fn read_piece(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_get_piece_streams_one_datagram_per_block() {
        let dir = std::env::temp_dir().join(format!("corkswarm-serve-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("f.bin"), vec![1u8; 10]).unwrap();

        let index = SeedIndex::new();
        index.rescan(&dir, 10).unwrap();
        let ih = index.infohashes().into_iter().next().unwrap();

        let server_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client_addr = client_sock.local_addr().unwrap();

        serve_get_piece(&server_sock, &index, &ih, 0, 4, client_addr);

        let mut seen_blocks = Vec::new();
        for _ in 0..3 {
            let mut buf = [0u8; 65535];
            let (n, _) = client_sock.recv_from(&mut buf).unwrap();
            match serde_json::from_slice::<PeerMessage>(&buf[..n]).unwrap() {
                PeerMessage::PieceBlock {
                    piece, block, total_blocks, ..
                } => {
                    assert_eq!(piece, 0);
                    assert_eq!(total_blocks, 3);
                    seen_blocks.push(block);
                }
                _ => panic!("wrong message"),
            }
        }
        seen_blocks.sort();
        assert_eq!(seen_blocks, vec![0, 1, 2]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn serve_get_piece_on_unknown_infohash_sends_nothing() {
        let index = SeedIndex::new();
        let server_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        client_sock.set_read_timeout(Some(std::time::Duration::from_millis(100))).unwrap();
        let client_addr = client_sock.local_addr().unwrap();

        serve_get_piece(&server_sock, &index, "missing", 0, 4, client_addr);

        let mut buf = [0u8; 64];
        assert!(client_sock.recv_from(&mut buf).is_err());
    }
}
