use std::io::{Seek, SeekFrom, Write};
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::hashing::sha256_hex;
use crate::log_line;
use crate::message::{Owner, PeerMessage};
use crate::warn_line;

use super::resume;
use super::state::PieceBuffer;
use super::Session;

const PIECE_DEADLINE: Duration = Duration::from_secs(5);

/// Reimplements `queue.Queue` + `task_done()`/`join()` semantics directly:
/// `remaining` counts outstanding items (incremented by every seed or
/// requeue, decremented by every `ack`), and `wait_drained` blocks until
/// it reaches zero. A requeue nets to no change overall, since the item
/// is put back before its dequeue is acked.
pub struct WorkQueue {
    sender: crossbeam::channel::Sender<usize>,
    receiver: crossbeam::channel::Receiver<usize>,
    remaining: Mutex<i64>,
    cvar: Condvar,
}

impl WorkQueue {
    pub fn new(missing: impl IntoIterator<Item = usize>) -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let mut remaining = 0i64;
        for idx in missing {
            sender.send(idx).ok();
            remaining += 1;
        }
        Self {
            sender,
            receiver,
            remaining: Mutex::new(remaining),
            cvar: Condvar::new(),
        }
    }

    fn try_dequeue(&self) -> Option<usize> {
        self.receiver.try_recv().ok()
    }

    fn requeue(&self, idx: usize) {
        self.sender.send(idx).ok();
        if let Ok(mut remaining) = self.remaining.lock() {
            *remaining += 1;
        }
    }

    fn ack(&self) {
        if let Ok(mut remaining) = self.remaining.lock() {
            *remaining -= 1;
            if *remaining <= 0 {
                self.cvar.notify_all();
            }
        }
    }

    pub fn wait_drained(&self) {
        let Ok(mut remaining) = self.remaining.lock() else {
            return;
        };
        while *remaining > 0 {
            remaining = match self.cvar.wait(remaining) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

/// One piece-fetching worker, pinned to a single peer for its whole life.
/// Drains the shared queue until empty; a slow or dead peer simply times
/// out on every attempt and its worker exits early, while healthy workers
/// keep draining whatever gets requeued.
pub fn run(socket: &UdpSocket, session: &Arc<Session>, queue: &WorkQueue, peer: &Owner, ih: &str) {
    let addr: SocketAddr = match format!("{}:{}", peer.host, peer.port).parse() {
        Ok(addr) => addr,
        Err(_) => return,
    };

    while let Some(idx) = queue.try_dequeue() {
        let already_done = match session.state.lock() {
            Ok(mut state) => {
                if state.completed[idx] {
                    true
                } else {
                    state.buffers.remove(&idx);
                    false
                }
            }
            Err(_) => return,
        };
        if already_done {
            queue.ack();
            continue;
        }

        log_line!("PEER", "request piece {idx} from node {} @ {addr}", peer.node_id);
        let request = PeerMessage::GetPiece {
            ih: ih.to_string(),
            piece: idx,
        };
        let sent = serde_json::to_vec(&request)
            .ok()
            .and_then(|bytes| socket.send_to(&bytes, addr).ok());

        let deadline = Instant::now() + PIECE_DEADLINE;
        let success = sent.is_some() && fetch_piece(session, peer, idx, deadline);
        if !success {
            queue.requeue(idx);
        }
        queue.ack();
    }
}

/// Poll the shared buffer for piece `idx` until it is complete and
/// verified, or `deadline` passes. Returns whether the piece was written
/// successfully.
fn fetch_piece(session: &Arc<Session>, peer: &Owner, idx: usize, deadline: Instant) -> bool {
    loop {
        if Instant::now() >= deadline {
            return false;
        }
        session.notify.wait_until(deadline);

        let mut state = match session.state.lock() {
            Ok(state) => state,
            Err(_) => return false,
        };
        let Some(data) = state.buffers.get(&idx).and_then(PieceBuffer::assemble) else {
            continue;
        };

        if sha256_hex(&data) != state.piece_hashes[idx] {
            log_line!("PEER", "piece {idx} hash mismatch -> requeue");
            state.buffers.remove(&idx);
            return false;
        }

        if let Err(e) = write_piece(&state.part_path, idx as u64 * state.piece_size, &data) {
            warn_line!("PEER", "write piece {idx} failed: {e}");
            state.buffers.remove(&idx);
            return false;
        }

        state.mark_complete(idx);
        let sidecar = resume::ResumeSidecar::from_state(&state);
        let resume_path = state.resume_path.clone();
        let (done, total_pieces) = (state.done, state.total_pieces);
        drop(state);

        if let Err(e) = resume::save(&resume_path, &sidecar) {
            warn_line!("PEER", "save resume failed: {e}");
        }
        log_line!(
            "PEER",
            "completed piece {idx} from node {} @ {}:{}",
            peer.node_id,
            peer.host,
            peer.port
        );
        if done % 5 == 0 || done == total_pieces {
            log_line!("PEER", "progress {done}/{total_pieces} pieces");
        }
        return true;
    }
}

fn write_piece(path: &std::path::Path, offset: u64, data: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_queue_drains_after_every_item_acked() {
        let queue = WorkQueue::new(vec![0, 1, 2]);
        for _ in 0..3 {
            queue.try_dequeue().unwrap();
            queue.ack();
        }
        queue.wait_drained();
    }

    #[test]
    fn requeued_item_keeps_the_queue_outstanding() {
        let queue = WorkQueue::new(vec![0]);
        let idx = queue.try_dequeue().unwrap();
        queue.requeue(idx);
        queue.ack();
        assert_eq!(*queue.remaining.lock().unwrap(), 1);

        queue.try_dequeue().unwrap();
        queue.ack();
        queue.wait_drained();
    }
}
