pub mod config;
pub mod error;
pub mod hashing;
pub mod message;
pub mod meta;
pub mod multithread;
pub mod peer;
pub mod tracker;
#[macro_use]
pub mod util;
