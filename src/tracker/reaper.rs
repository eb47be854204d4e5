use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::DEFAULT_TRACKER_REAP_INTERVAL_SEC;
use crate::warn_line;

use super::swarm::Swarm;

/// Spawns the background liveness reaper as a detached thread: wakes every
/// `DEFAULT_TRACKER_REAP_INTERVAL_SEC`, drops owners that haven't
/// `REGISTER`ed within `ttl_secs`, and persists a snapshot only when the
/// registry actually changed.
pub fn spawn(swarm: Arc<Swarm>, ttl_secs: u64) {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_secs(DEFAULT_TRACKER_REAP_INTERVAL_SEC));
        if swarm.reap(ttl_secs) {
            if let Err(e) = swarm.save() {
                warn_line!("TRACKER", "save db failed: {e}");
            }
        }
    });
}
