pub mod models;
pub mod packet;
pub mod capture;
pub mod analyze;
pub mod connections;
pub mod volume;
pub mod scan;
pub mod dns;
pub mod http;
pub mod stats;
pub mod config;
pub mod report;

#[cfg(test)]
pub(crate) mod testutil;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
