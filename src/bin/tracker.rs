use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;

use corkswarm::config::TrackerConfig;
use corkswarm::message::TrackerRequest;
use corkswarm::tracker::{self, Swarm};
use corkswarm::{log_line, warn_line};

fn main() -> anyhow::Result<()> {
    let config = TrackerConfig::parse();

    let swarm = Arc::new(Swarm::new(&config.db_dir).context("opening swarm directory")?);
    tracker::reaper::spawn(Arc::clone(&swarm), config.ttl_sec);

    let bind_addr = format!("{}:{}", config.tracker_host, config.tracker_port);
    let socket = UdpSocket::bind(&bind_addr).with_context(|| format!("binding udp {bind_addr}"))?;
    log_line!("TRACKER", "listening udp {bind_addr}");

    let mut buf = vec![0u8; config.buffer_size];
    loop {
        let (n, addr) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) => {
                warn_line!("TRACKER", "recv failed: {e}");
                continue;
            }
        };

        let request: TrackerRequest = match serde_json::from_slice(&buf[..n]) {
            Ok(request) => request,
            Err(_) => continue,
        };

        let swarm = Arc::clone(&swarm);
        let reply_socket = socket.try_clone();
        thread::spawn(move || {
            let Ok(reply_socket) = reply_socket else { return };
            if let Some(response) = tracker::handle_request(&swarm, request) {
                if let Ok(bytes) = serde_json::to_vec(&response) {
                    let _ = reply_socket.send_to(&bytes, addr);
                }
            }
        });
    }
}
