pub mod constants;
pub mod engine;
pub mod remote_sync;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod spatial;
pub mod types;
pub mod world;
