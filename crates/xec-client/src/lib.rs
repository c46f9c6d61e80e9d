//! # xec-client
//!
//! - [`config`] — endpoint list and network selection from the environment
//! - [`http`] — `HttpChainClient`, a reqwest-backed `ChainClient`

pub mod config;
pub mod http;

pub use config::{Config, ConfigError};
pub use http::HttpChainClient;

