pub mod analyzer;
pub mod metrics;
pub mod models;
pub mod server;
pub mod utils;
