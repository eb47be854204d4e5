use std::collections::HashSet;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::message::TrackerRequest;
use crate::warn_line;

use super::download::DownloadManager;
use super::server::SeedIndex;
use super::tracker_client;

/// Spawns the heartbeat loop as a detached thread: every `heartbeat_sec`
/// seconds, sends `REGISTER` for the union of infohashes this node is
/// seeding and actively downloading, so the tracker's TTL reaper never
/// drops a still-live owner.
pub fn spawn(
    socket: Arc<UdpSocket>,
    tracker_addr: SocketAddr,
    node_id: u64,
    seed_index: Arc<SeedIndex>,
    downloads: Arc<DownloadManager>,
    heartbeat_sec: u64,
    buffer_size: usize,
) {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(heartbeat_sec));

        let mut active: HashSet<String> = seed_index.infohashes().into_iter().collect();
        active.extend(downloads.active_infohashes());

        for infohash in active {
            let request = TrackerRequest::Register { node_id, infohash };
            if let Err(e) = tracker_client::send_tracker(&socket, tracker_addr, &request, buffer_size) {
                warn_line!("PEER", "heartbeat send failed: {e}");
            }
        }
    });
}
