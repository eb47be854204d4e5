//! Peer process: serves the pieces it owns over UDP, re-announces itself
//! to the tracker on a heartbeat, and downloads missing content through
//! `download`.

pub mod download;
pub mod heartbeat;
pub mod server;
pub mod tracker_client;
