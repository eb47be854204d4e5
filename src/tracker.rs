//! Swarm directory: each infohash maps to its `Meta` and the set of owners
//! currently announcing it. `swarm` holds the registry and request
//! handlers, `reaper` evicts owners that stop announcing, and
//! `persistence` durably snapshots the registry to disk.

pub mod persistence;
pub mod reaper;
pub mod swarm;

pub use swarm::{Swarm, SwarmEntry};

use crate::log_line;
use crate::message::{TrackerRequest, TrackerResponse};

/// Apply one inbound request to the registry. `OWN`, `REGISTER`, and
/// `EXIT` answer nothing (matching the reference tracker, which never
/// sends a reply for those modes); the rest return the response datagram
/// to send back to the requester.
pub fn handle_request(swarm: &Swarm, request: TrackerRequest) -> Option<TrackerResponse> {
    match request {
        TrackerRequest::Own {
            node_id,
            host,
            port,
            infohash,
            meta,
        } => {
            log_line!(
                "TRACKER",
                "OWN ih={}.. file={} owner={host}:{port}",
                &infohash[..infohash.len().min(10)],
                meta.filename
            );
            swarm.own(node_id, host, port, infohash, meta);
            if let Err(e) = swarm.save() {
                crate::warn_line!("TRACKER", "save db failed: {e}");
            }
            None
        }
        TrackerRequest::Register { node_id, infohash } => {
            swarm.register(node_id, &infohash);
            None
        }
        TrackerRequest::Need { infohash, .. } => Some(TrackerResponse::Need(swarm.need(&infohash))),
        TrackerRequest::List { .. } => Some(TrackerResponse::List(swarm.list())),
        TrackerRequest::FindByName { filename, .. } => {
            Some(TrackerResponse::FindByName(swarm.find_by_name(&filename)))
        }
        TrackerRequest::Exit { node_id, infohash } => {
            log_line!(
                "TRACKER",
                "EXIT node={node_id} ih={}..",
                &infohash[..infohash.len().min(10)]
            );
            swarm.exit(node_id, &infohash);
            if let Err(e) = swarm.save() {
                crate::warn_line!("TRACKER", "save db failed: {e}");
            }
            None
        }
    }
}
