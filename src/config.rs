use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_TRACKER_HOST: &str = "0.0.0.0";
pub const DEFAULT_TRACKER_PORT: u16 = 12345;
pub const DEFAULT_NODE_PORT: u16 = 20001;
pub const DEFAULT_BUFFER_SIZE: usize = 65535;
pub const DEFAULT_PIECE_SIZE: u64 = 256 * 1024;
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;
pub const DEFAULT_HEARTBEAT_SEC: u64 = 10;
pub const DEFAULT_TRACKER_TTL_SEC: u64 = 60;
pub const DEFAULT_TRACKER_REAP_INTERVAL_SEC: u64 = 10;
pub const DEFAULT_SEED_DIR: &str = "node_files";
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
pub const DEFAULT_DB_DIR: &str = "tracker_db";

/// Tracker process configuration, with every knob overridable by env var or
/// CLI flag (env takes effect when the flag is omitted).
#[derive(Parser, Clone, Debug)]
#[clap(about = "corkswarm tracker: swarm directory and liveness reaper")]
pub struct TrackerConfig {
    #[arg(long, env = "TRACKER_HOST", default_value = DEFAULT_TRACKER_HOST)]
    pub tracker_host: String,

    #[arg(long, env = "TRACKER_PORT", default_value_t = DEFAULT_TRACKER_PORT)]
    pub tracker_port: u16,

    #[arg(long, env = "BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    #[arg(long, env = "TRACKER_TTL_SEC", default_value_t = DEFAULT_TRACKER_TTL_SEC)]
    pub ttl_sec: u64,

    #[arg(long, env = "TRACKER_DB_DIR", default_value = DEFAULT_DB_DIR)]
    pub db_dir: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracker_host: DEFAULT_TRACKER_HOST.to_string(),
            tracker_port: DEFAULT_TRACKER_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ttl_sec: DEFAULT_TRACKER_TTL_SEC,
            db_dir: PathBuf::from(DEFAULT_DB_DIR),
            verbose: false,
        }
    }
}

/// Peer process configuration.
#[derive(Parser, Clone, Debug)]
#[clap(about = "corkswarm peer: seeds, serves, and fetches pieces")]
pub struct PeerConfig {
    #[arg(long, env = "NODE_ID")]
    pub node_id: Option<u64>,

    #[arg(long, env = "TRACKER_HOST", default_value = DEFAULT_TRACKER_HOST)]
    pub tracker_host: String,

    #[arg(long, env = "TRACKER_PORT", default_value_t = DEFAULT_TRACKER_PORT)]
    pub tracker_port: u16,

    #[arg(long, env = "NODE_PORT", default_value_t = DEFAULT_NODE_PORT)]
    pub node_port: u16,

    #[arg(long, env = "ADVERTISE_HOST", default_value = "127.0.0.1")]
    pub advertise_host: String,

    #[arg(long, env = "BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,

    #[arg(long, env = "PIECE_SIZE", default_value_t = DEFAULT_PIECE_SIZE)]
    pub piece_size: u64,

    #[arg(long, env = "BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    #[arg(long, env = "HEARTBEAT_SEC", default_value_t = DEFAULT_HEARTBEAT_SEC)]
    pub heartbeat_sec: u64,

    #[arg(long, env = "SEED_DIR", default_value = DEFAULT_SEED_DIR)]
    pub seed_dir: PathBuf,

    #[arg(long, env = "DOWNLOAD_DIR", default_value = DEFAULT_DOWNLOAD_DIR)]
    pub download_dir: PathBuf,

    /// Fetch this infohash once at startup, then keep running as a seed
    /// and piece server. Mutually exclusive with `--download-name` in
    /// practice (the first one resolved wins); the interactive console
    /// for ad hoc downloads is a separate, external concern.
    #[arg(long)]
    pub download_infohash: Option<String>,

    /// Resolve this filename through `FIND_BY_NAME` and fetch it once at
    /// startup.
    #[arg(long)]
    pub download_name: Option<String>,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl PeerConfig {
    /// A random node id if none was configured; mirrors the reference
    /// peer, which always takes an explicit `-node_id`, but a library/CLI
    /// usable standalone needs a sensible default.
    pub fn resolved_node_id(&self) -> u64 {
        self.node_id.unwrap_or_else(|| rand::random::<u32>() as u64)
    }
}
