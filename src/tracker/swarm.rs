use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{FindByNameResponse, ListItem, ListResponse, NeedResponse, Owner};
use crate::meta::Meta;

use super::persistence;

/// One tracked file: its descriptor and the owners currently serving it.
/// `last_seen` is keyed by the owner's `node_id` (as a string, to match the
/// JSON snapshot shape) rather than embedded on `Owner` itself, since
/// liveness is tracker-local bookkeeping, not part of the swarm a peer
/// receives back from `NEED`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwarmEntry {
    pub meta: Meta,
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub last_seen: HashMap<String, u64>,
}

/// The tracker's in-memory swarm directory, backed by a JSON snapshot on
/// disk. All mutation goes through a single mutex; the tracker handles one
/// datagram at a time per swarm anyway, so there is no finer-grained
/// locking to bother with.
pub struct Swarm {
    entries: Mutex<HashMap<String, SwarmEntry>>,
    db_path: PathBuf,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Swarm {
    pub fn new(db_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("swarm.json");
        let entries = persistence::load(&db_path).unwrap_or_default();
        Ok(Self {
            entries: Mutex::new(entries),
            db_path,
        })
    }

    pub fn save(&self) -> Result<()> {
        let entries = self.entries.lock()?;
        persistence::save(&self.db_path, &entries)
    }

    /// Create or refresh a swarm's descriptor and upsert its owner.
    pub fn own(&self, node_id: u64, host: String, port: u16, infohash: String, meta: Meta) {
        let owner = Owner { node_id, host, port };
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let entry = entries.entry(infohash).or_insert_with(|| SwarmEntry {
            meta: meta.clone(),
            owners: Vec::new(),
            last_seen: HashMap::new(),
        });
        entry.meta = meta;
        if !entry.owners.contains(&owner) {
            entry.owners.push(owner.clone());
        }
        entry.last_seen.insert(owner.node_id.to_string(), now_secs());
    }

    /// Refresh an existing owner's liveness. A no-op if the swarm is
    /// unknown: `REGISTER` is a heartbeat, not an announce, so there is
    /// nothing to create.
    pub fn register(&self, node_id: u64, infohash: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(infohash) {
                entry.last_seen.insert(node_id.to_string(), now_secs());
            }
        }
    }

    pub fn need(&self, infohash: &str) -> NeedResponse {
        let not_found = || NeedResponse::NotFound {
            ok: false,
            error: "NOT_FOUND".to_string(),
            infohash: infohash.to_string(),
        };
        match self.entries.lock() {
            Ok(entries) => match entries.get(infohash) {
                Some(entry) => NeedResponse::Ok {
                    ok: true,
                    infohash: infohash.to_string(),
                    meta: entry.meta.clone(),
                    peers: entry.owners.clone(),
                },
                None => not_found(),
            },
            Err(_) => not_found(),
        }
    }

    pub fn list(&self) -> ListResponse {
        let items = match self.entries.lock() {
            Ok(entries) => entries.iter().map(|(ih, e)| to_list_item(ih, e)).collect(),
            Err(_) => Vec::new(),
        };
        ListResponse { ok: true, items }
    }

    pub fn find_by_name(&self, filename: &str) -> FindByNameResponse {
        let matches: Vec<ListItem> = match self.entries.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, e)| e.meta.filename == filename)
                .map(|(ih, e)| to_list_item(ih, e))
                .collect(),
            Err(_) => Vec::new(),
        };
        match matches.len() {
            0 => FindByNameResponse::NotFoundOrAmbiguous {
                ok: false,
                error: "NOT_FOUND".to_string(),
                filename: filename.to_string(),
                matches,
            },
            1 => FindByNameResponse::Match {
                ok: true,
                filename: filename.to_string(),
                matched: matches.into_iter().next().expect("len checked above"),
            },
            _ => FindByNameResponse::NotFoundOrAmbiguous {
                ok: false,
                error: "AMBIGUOUS".to_string(),
                filename: filename.to_string(),
                matches,
            },
        }
    }

    /// Drop `node_id` from `infohash`'s owner list, dropping the swarm
    /// entirely if it is left with no owners.
    pub fn exit(&self, node_id: u64, infohash: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            let mut drop_entry = false;
            if let Some(entry) = entries.get_mut(infohash) {
                entry.owners.retain(|o| o.node_id != node_id);
                entry.last_seen.remove(&node_id.to_string());
                drop_entry = entry.owners.is_empty();
            }
            if drop_entry {
                entries.remove(infohash);
            }
        }
    }

    /// Drop owners that haven't `REGISTER`ed (or `OWN`ed) within
    /// `ttl_secs`, then drop any swarm left with no owners. Returns
    /// whether anything changed, so the caller can skip an unnecessary
    /// snapshot write.
    pub fn reap(&self, ttl_secs: u64) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let now = now_secs();
        let mut changed = false;

        for entry in entries.values_mut() {
            let before = entry.owners.len();
            let last_seen = entry.last_seen.clone();
            entry.owners.retain(|o| {
                let seen = last_seen.get(&o.node_id.to_string()).copied().unwrap_or(0);
                now.saturating_sub(seen) <= ttl_secs
            });
            if entry.owners.len() != before {
                changed = true;
            }
        }

        let empty: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.owners.is_empty())
            .map(|(ih, _)| ih.clone())
            .collect();
        for ih in empty {
            entries.remove(&ih);
            changed = true;
        }

        changed
    }
}

fn to_list_item(infohash: &str, entry: &SwarmEntry) -> ListItem {
    ListItem {
        infohash: infohash.to_string(),
        filename: entry.meta.filename.clone(),
        size: entry.meta.size,
        pieces: entry.meta.total_pieces(),
        peers: entry.owners.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> Meta {
        Meta {
            filename: "movie.mkv".to_string(),
            size: 100,
            piece_size: 50,
            piece_hashes: vec!["a".to_string(), "b".to_string()],
        }
    }

    fn temp_swarm() -> Swarm {
        let dir = std::env::temp_dir().join(format!("corkswarm-swarm-test-{}", rand::random::<u64>()));
        Swarm::new(&dir).unwrap()
    }

    #[test]
    fn own_then_need_returns_owner() {
        let swarm = temp_swarm();
        swarm.own(1, "127.0.0.1".into(), 9001, "ih1".into(), sample_meta());

        match swarm.need("ih1") {
            NeedResponse::Ok { peers, .. } => assert_eq!(peers.len(), 1),
            NeedResponse::NotFound { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn need_on_unknown_infohash_is_not_found() {
        let swarm = temp_swarm();
        match swarm.need("missing") {
            NeedResponse::NotFound { error, .. } => assert_eq!(error, "NOT_FOUND"),
            NeedResponse::Ok { .. } => panic!("expected NOT_FOUND"),
        }
    }

    #[test]
    fn register_on_unknown_swarm_is_a_no_op() {
        let swarm = temp_swarm();
        swarm.register(1, "missing");
        match swarm.need("missing") {
            NeedResponse::NotFound { .. } => {}
            NeedResponse::Ok { .. } => panic!("register should not have created a swarm"),
        }
    }

    #[test]
    fn exit_drops_the_owner_and_then_the_empty_swarm() {
        let swarm = temp_swarm();
        swarm.own(1, "127.0.0.1".into(), 9001, "ih1".into(), sample_meta());
        swarm.exit(1, "ih1");
        match swarm.need("ih1") {
            NeedResponse::NotFound { .. } => {}
            NeedResponse::Ok { .. } => panic!("swarm should have been dropped"),
        }
    }

    #[test]
    fn reap_evicts_stale_owners_but_keeps_fresh_ones() {
        let swarm = temp_swarm();
        swarm.own(1, "127.0.0.1".into(), 9001, "ih1".into(), sample_meta());
        // Force node 1's last_seen far into the past.
        {
            let mut entries = swarm.entries.lock().unwrap();
            entries.get_mut("ih1").unwrap().last_seen.insert("1".into(), 0);
        }
        swarm.own(2, "127.0.0.1".into(), 9002, "ih1".into(), sample_meta());

        let changed = swarm.reap(60);
        assert!(changed);
        match swarm.need("ih1") {
            NeedResponse::Ok { peers, .. } => {
                assert_eq!(peers.len(), 1);
                assert_eq!(peers[0].node_id, 2);
            }
            NeedResponse::NotFound { .. } => panic!("node 2 should still be registered"),
        }
    }

    #[test]
    fn find_by_name_reports_ambiguous_matches() {
        let swarm = temp_swarm();
        swarm.own(1, "127.0.0.1".into(), 9001, "ih1".into(), sample_meta());
        swarm.own(2, "127.0.0.1".into(), 9002, "ih2".into(), sample_meta());

        match swarm.find_by_name("movie.mkv") {
            FindByNameResponse::NotFoundOrAmbiguous { error, matches, .. } => {
                assert_eq!(error, "AMBIGUOUS");
                assert_eq!(matches.len(), 2);
            }
            FindByNameResponse::Match { .. } => panic!("expected ambiguity"),
        }
    }
}
