pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod rate_limit;
pub mod server;
