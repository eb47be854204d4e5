use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

use super::swarm::SwarmEntry;

pub fn load(path: &Path) -> Result<HashMap<String, SwarmEntry>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write `entries` to `path` via a sibling `.tmp` file and an atomic
/// rename, so a crash mid-write never leaves a truncated snapshot behind.
pub fn save(path: &Path, entries: &HashMap<String, SwarmEntry>) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = Path::new(&tmp);

    let bytes = serde_json::to_vec_pretty(entries)?;
    std::fs::write(tmp_path, bytes)?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Owner;
    use crate::meta::Meta;

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("corkswarm-persist-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("swarm.json");

        let mut entries = HashMap::new();
        entries.insert(
            "ih1".to_string(),
            SwarmEntry {
                meta: Meta {
                    filename: "a.bin".into(),
                    size: 10,
                    piece_size: 10,
                    piece_hashes: vec!["h".into()],
                },
                owners: vec![Owner {
                    node_id: 1,
                    host: "127.0.0.1".into(),
                    port: 9000,
                }],
                last_seen: HashMap::new(),
            },
        );

        save(&path, &entries).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["ih1"].meta.filename, "a.bin");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_of_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("corkswarm-missing-{}.json", rand::random::<u64>()));
        assert!(load(&path).is_err());
    }
}
