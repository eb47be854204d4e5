use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::{FindByNameResponse, ListResponse, NeedResponse, TrackerRequest};

/// Request/response tracker calls (`NEED`, `LIST`, `FIND_BY_NAME`) each open
/// a fresh ephemeral socket rather than reusing the peer's main listening
/// socket, so a reply can never race with inbound `GET_PIECE`/
/// `PIECE_BLOCK` traffic on that socket.
const CALL_TIMEOUT: Duration = Duration::from_secs(3);

fn call(tracker_addr: SocketAddr, request: &TrackerRequest, buffer_size: usize) -> Result<Vec<u8>> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(CALL_TIMEOUT))?;
    let bytes = serde_json::to_vec(request)?;
    socket.send_to(&bytes, tracker_addr)?;

    let mut buf = vec![0u8; buffer_size];
    let (n, _) = socket.recv_from(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

pub fn need(tracker_addr: SocketAddr, node_id: u64, infohash: &str, buffer_size: usize) -> Result<NeedResponse> {
    let request = TrackerRequest::Need {
        node_id,
        infohash: infohash.to_string(),
    };
    let bytes = call(tracker_addr, &request, buffer_size)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn list(tracker_addr: SocketAddr, node_id: u64, buffer_size: usize) -> Result<ListResponse> {
    let request = TrackerRequest::List { node_id };
    let bytes = call(tracker_addr, &request, buffer_size)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn find_by_name(
    tracker_addr: SocketAddr,
    node_id: u64,
    filename: &str,
    buffer_size: usize,
) -> Result<FindByNameResponse> {
    let request = TrackerRequest::FindByName {
        node_id,
        filename: filename.to_string(),
    };
    let bytes = call(tracker_addr, &request, buffer_size)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Fire-and-forget announce/heartbeat/exit messages sent from the peer's
/// main socket; no reply is expected. Oversized metadata is rejected
/// locally before send rather than left for the OS to fail on.
pub fn send_tracker(
    socket: &UdpSocket,
    tracker_addr: SocketAddr,
    request: &TrackerRequest,
    buffer_size: usize,
) -> Result<()> {
    let bytes = serde_json::to_vec(request)?;
    if bytes.len() > buffer_size {
        return Err(Error::OversizedMessage {
            size: bytes.len(),
            limit: buffer_size,
        });
    }
    socket.send_to(&bytes, tracker_addr)?;
    Ok(())
}
