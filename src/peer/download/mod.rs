pub mod resume;
pub mod state;
pub mod worker;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{Error, Result};
use crate::log_line;
use crate::message::{NeedResponse, Owner};
use crate::meta::Meta;
use crate::multithread::PieceNotify;

use self::state::DownloadState;
use self::worker::WorkQueue;

use super::tracker_client;

/// One active session: the state every worker and the receive path touch,
/// plus the condvar that wakes workers when a new block lands.
pub struct Session {
    pub state: Mutex<DownloadState>,
    pub notify: PieceNotify,
}

/// Owns every in-flight download session. Shared between the receive loop
/// (fills `buffers`) and the piece workers (drain them); there is exactly
/// one lock per session, plus one lock guarding the sessions map itself.
pub struct DownloadManager {
    socket: Arc<UdpSocket>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    download_dir: PathBuf,
}

impl DownloadManager {
    pub fn new(socket: Arc<UdpSocket>, download_dir: PathBuf) -> Self {
        Self {
            socket,
            sessions: Mutex::new(HashMap::new()),
            download_dir,
        }
    }

    pub fn active_infohashes(&self) -> Vec<String> {
        self.sessions
            .lock()
            .map(|sessions| sessions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Route one `PIECE_BLOCK` datagram to its session. Blocks for an
    /// unknown session, or for a piece already marked complete, are
    /// harmlessly dropped.
    pub fn handle_piece_block(&self, ih: &str, piece: usize, block: usize, total_blocks: usize, data: Vec<u8>) {
        let session = match self.sessions.lock() {
            Ok(sessions) => sessions.get(ih).cloned(),
            Err(_) => None,
        };
        let Some(session) = session else { return };

        if let Ok(mut state) = session.state.lock() {
            if state.completed.get(piece).copied().unwrap_or(true) {
                return;
            }
            let buf = state.buffers.entry(piece).or_default();
            buf.total_blocks = total_blocks;
            buf.blocks.insert(block, data);
        }
        session.notify.notify();
    }

    /// Resolve `infohash` against the tracker, materialize or resume the
    /// session, spawn one worker per owner, and block until the piece
    /// queue drains. On a shortfall the sidecar is left in place for the
    /// next run.
    pub fn download(
        &self,
        tracker_addr: SocketAddr,
        node_id: u64,
        infohash: &str,
        buffer_size: usize,
    ) -> Result<()> {
        let short_ih = &infohash[..infohash.len().min(10)];
        let need = tracker_client::need(tracker_addr, node_id, infohash, buffer_size)?;
        let (meta, peers) = match need {
            NeedResponse::Ok { meta, peers, .. } => (meta, peers),
            NeedResponse::NotFound { .. } => {
                log_line!("PEER", "tracker says NOT_FOUND ih={short_ih}..");
                return Err(Error::NotFound);
            }
        };
        if peers.is_empty() {
            log_line!("PEER", "no peers available for ih={short_ih}..");
            return Err(Error::NotFound);
        }

        let session = self.load_or_init_session(infohash, &meta, peers)?;
        log_line!(
            "PEER",
            "META ok: {} size={} pieces={} ih={short_ih}..",
            meta.filename,
            meta.size,
            meta.total_pieces()
        );

        let already_finished = session.state.lock()?.is_finished();
        if already_finished {
            return self.finalize(infohash);
        }

        let (missing, peers): (Vec<usize>, Vec<Owner>) = {
            let state = session.state.lock()?;
            (state.missing_pieces().collect(), state.active_peers.clone())
        };
        let queue = Arc::new(WorkQueue::new(missing));

        let handles: Vec<_> = peers
            .into_iter()
            .map(|peer| {
                let socket = Arc::clone(&self.socket);
                let session = Arc::clone(&session);
                let queue = Arc::clone(&queue);
                let ih = infohash.to_string();
                thread::spawn(move || worker::run(&socket, &session, &queue, &peer, &ih))
            })
            .collect();

        queue.wait_drained();
        for handle in handles {
            handle.join().ok();
        }

        let finished = session.state.lock()?.is_finished();
        if finished {
            self.finalize(infohash)
        } else {
            let state = session.state.lock()?;
            let missing = state.total_pieces - state.done;
            log_line!("PEER", "download finished but missing {missing} pieces (will resume on next run)");
            Ok(())
        }
    }

    fn load_or_init_session(&self, infohash: &str, meta: &Meta, peers: Vec<Owner>) -> Result<Arc<Session>> {
        std::fs::create_dir_all(&self.download_dir)?;
        let resume_path = self.download_dir.join(format!("{}.resume.json", meta.filename));
        let part_path = self.download_dir.join(format!("{}.part", meta.filename));

        let state = match resume::load(&resume_path) {
            Ok(sidecar) if sidecar.infohash == infohash && sidecar.piece_size == meta.piece_size => {
                let done = sidecar.completed.iter().filter(|c| **c).count();
                log_line!("PEER", "resume found: {} done={done}/{}", meta.filename, meta.total_pieces());
                DownloadState {
                    infohash: infohash.to_string(),
                    filename: meta.filename.clone(),
                    size: meta.size,
                    piece_size: meta.piece_size,
                    piece_hashes: meta.piece_hashes.clone(),
                    total_pieces: meta.total_pieces(),
                    completed: sidecar.completed,
                    done,
                    buffers: HashMap::new(),
                    part_path,
                    resume_path,
                    active_peers: peers,
                }
            }
            _ => {
                let total_pieces = meta.total_pieces();
                let state = DownloadState {
                    infohash: infohash.to_string(),
                    filename: meta.filename.clone(),
                    size: meta.size,
                    piece_size: meta.piece_size,
                    piece_hashes: meta.piece_hashes.clone(),
                    total_pieces,
                    completed: vec![false; total_pieces],
                    done: 0,
                    buffers: HashMap::new(),
                    part_path,
                    resume_path,
                    active_peers: peers,
                };
                ensure_part_file(&state.part_path, state.size)?;
                resume::save(&state.resume_path, &resume::ResumeSidecar::from_state(&state))?;
                state
            }
        };

        ensure_part_file(&state.part_path, state.size)?;

        let session = Arc::new(Session {
            state: Mutex::new(state),
            notify: PieceNotify::new(),
        });
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(infohash.to_string(), Arc::clone(&session));
        }
        Ok(session)
    }

    /// Truncate the `.part` file to its exact size, rename it into place,
    /// delete the sidecar (best-effort), and drop the session.
    fn finalize(&self, infohash: &str) -> Result<()> {
        let session = match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(infohash),
            Err(_) => None,
        };
        let Some(session) = session else { return Ok(()) };
        let state = session.state.lock()?;

        let file = OpenOptions::new().write(true).open(&state.part_path)?;
        file.set_len(state.size)?;
        drop(file);

        let final_path = self.download_dir.join(&state.filename);
        std::fs::rename(&state.part_path, &final_path)?;
        resume::delete(&state.resume_path);

        log_line!("PEER", "finalized {}", state.filename);
        Ok(())
    }
}

fn ensure_part_file(path: &Path, size: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        let file = File::create(path)?;
        file.set_len(size)?;
    }
    Ok(())
}
