use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::state::DownloadState;

/// The JSON-serializable slice of a `DownloadState`. Deliberately excludes
/// `buffers` (raw piece bytes, transient) and the absolute paths (derived
/// fresh from `filename` and the configured download directory on load).
#[derive(Debug, Serialize, Deserialize)]
pub struct ResumeSidecar {
    pub infohash: String,
    pub filename: String,
    pub size: u64,
    pub piece_size: u64,
    pub piece_hashes: Vec<String>,
    pub completed: Vec<bool>,
    pub done: usize,
    pub total_pieces: usize,
}

impl ResumeSidecar {
    pub fn from_state(state: &DownloadState) -> Self {
        Self {
            infohash: state.infohash.clone(),
            filename: state.filename.clone(),
            size: state.size,
            piece_size: state.piece_size,
            piece_hashes: state.piece_hashes.clone(),
            completed: state.completed.clone(),
            done: state.done,
            total_pieces: state.total_pieces,
        }
    }
}

pub fn load(path: &Path) -> Result<ResumeSidecar> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write `sidecar` to `path` via a sibling `.tmp` file and an atomic
/// rename.
pub fn save(path: &Path, sidecar: &ResumeSidecar) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = Path::new(&tmp);

    let bytes = serde_json::to_vec_pretty(sidecar)?;
    std::fs::write(tmp_path, bytes)?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}

/// Best-effort delete: a download that finalizes no longer needs its
/// sidecar, but a missing file here is not an error worth surfacing.
pub fn delete(path: &Path) {
    std::fs::remove_file(path).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("corkswarm-resume-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("f.bin.resume.json");

        let sidecar = ResumeSidecar {
            infohash: "ih".into(),
            filename: "f.bin".into(),
            size: 10,
            piece_size: 10,
            piece_hashes: vec!["h".into()],
            completed: vec![true],
            done: 1,
            total_pieces: 1,
        };
        save(&path, &sidecar).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.infohash, "ih");
        assert_eq!(loaded.done, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_of_missing_file_does_not_panic() {
        let path = std::env::temp_dir().join(format!("corkswarm-missing-resume-{}.json", rand::random::<u64>()));
        delete(&path);
    }
}
