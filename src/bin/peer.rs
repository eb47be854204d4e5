use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use base64::Engine;
use clap::Parser;

use corkswarm::config::PeerConfig;
use corkswarm::message::{PeerMessage, TrackerRequest};
use corkswarm::peer::download::DownloadManager;
use corkswarm::peer::server::{serve_get_piece, SeedIndex};
use corkswarm::peer::{heartbeat, tracker_client};
use corkswarm::{log_line, warn_line};

fn main() -> anyhow::Result<()> {
    let config = PeerConfig::parse();
    let node_id = config.resolved_node_id();

    let bind_addr = format!("0.0.0.0:{}", config.node_port);
    let socket = Arc::new(UdpSocket::bind(&bind_addr).with_context(|| format!("binding udp {bind_addr}"))?);
    socket.set_read_timeout(Some(Duration::from_millis(500)))?;

    let tracker_addr = format!("{}:{}", config.tracker_host, config.tracker_port)
        .parse()
        .context("parsing tracker address")?;

    log_line!("PEER", "bind=0.0.0.0:{} advertise={}:{}", config.node_port, config.advertise_host, config.node_port);
    log_line!(
        "PEER",
        "tracker={}:{} piece_size={} block_size={}",
        config.tracker_host,
        config.tracker_port,
        config.piece_size,
        config.block_size
    );

    let seed_index = Arc::new(SeedIndex::new());
    seed_index.rescan(&config.seed_dir, config.piece_size)?;
    announce_seeds(&socket, tracker_addr, node_id, &config, &seed_index);

    let downloads = Arc::new(DownloadManager::new(Arc::clone(&socket), config.download_dir.clone()));

    heartbeat::spawn(
        Arc::clone(&socket),
        tracker_addr,
        node_id,
        Arc::clone(&seed_index),
        Arc::clone(&downloads),
        config.heartbeat_sec,
        config.buffer_size,
    );
    if let Some(infohash) = config.download_infohash.clone() {
        spawn_download_by_infohash(Arc::clone(&downloads), tracker_addr, node_id, infohash, config.buffer_size);
    } else if let Some(filename) = config.download_name.clone() {
        spawn_download_by_name(Arc::clone(&downloads), tracker_addr, node_id, filename, config.buffer_size);
    }

    let mut buf = vec![0u8; config.buffer_size];
    loop {
        let (n, addr) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn_line!("PEER", "recv failed: {e}");
                continue;
            }
        };

        let message: PeerMessage = match serde_json::from_slice(&buf[..n]) {
            Ok(message) => message,
            Err(_) => continue,
        };

        match message {
            PeerMessage::GetPiece { ih, piece } => {
                let socket = Arc::clone(&socket);
                let seed_index = Arc::clone(&seed_index);
                let block_size = config.block_size;
                thread::spawn(move || serve_get_piece(&socket, &seed_index, &ih, piece, block_size, addr));
            }
            PeerMessage::PieceBlock {
                ih,
                piece,
                block,
                total_blocks,
                data,
            } => {
                if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
                    downloads.handle_piece_block(&ih, piece, block, total_blocks, bytes);
                }
            }
        }
    }
}

fn announce_seeds(
    socket: &UdpSocket,
    tracker_addr: std::net::SocketAddr,
    node_id: u64,
    config: &PeerConfig,
    seed_index: &SeedIndex,
) {
    for infohash in seed_index.infohashes() {
        let Some(entry) = seed_index.get(&infohash) else { continue };
        let request = TrackerRequest::Own {
            node_id,
            host: config.advertise_host.clone(),
            port: config.node_port,
            infohash: infohash.clone(),
            meta: entry.meta.clone(),
        };
        match tracker_client::send_tracker(socket, tracker_addr, &request, config.buffer_size) {
            Ok(()) => log_line!(
                "PEER",
                "OWN announced: {} ih={}.. size={} pieces={}",
                entry.meta.filename,
                &infohash[..infohash.len().min(10)],
                entry.meta.size,
                entry.meta.total_pieces()
            ),
            Err(e) => warn_line!("PEER", "OWN failed for {}: {e}", entry.meta.filename),
        }
    }
}

fn spawn_download_by_infohash(
    downloads: Arc<DownloadManager>,
    tracker_addr: std::net::SocketAddr,
    node_id: u64,
    infohash: String,
    buffer_size: usize,
) {
    thread::spawn(move || {
        if let Err(e) = downloads.download(tracker_addr, node_id, &infohash, buffer_size) {
            warn_line!("PEER", "download {infohash} failed: {e}");
        }
    });
}

fn spawn_download_by_name(
    downloads: Arc<DownloadManager>,
    tracker_addr: std::net::SocketAddr,
    node_id: u64,
    filename: String,
    buffer_size: usize,
) {
    thread::spawn(move || {
        use corkswarm::message::FindByNameResponse;

        let resp = match tracker_client::find_by_name(tracker_addr, node_id, &filename, buffer_size) {
            Ok(resp) => resp,
            Err(e) => {
                warn_line!("PEER", "FIND_BY_NAME failed: {e}");
                return;
            }
        };

        let infohash = match resp {
            FindByNameResponse::Match { matched, .. } => matched.infohash,
            FindByNameResponse::NotFoundOrAmbiguous { error, matches, .. } => {
                if error == "AMBIGUOUS" {
                    warn_line!("PEER", "AMBIGUOUS filename '{filename}', {} matches; use infohash instead", matches.len());
                } else {
                    warn_line!("PEER", "file not found on tracker: {filename}");
                }
                return;
            }
        };

        if let Err(e) = downloads.download(tracker_addr, node_id, &infohash, buffer_size) {
            warn_line!("PEER", "download {filename} failed: {e}");
        }
    });
}
