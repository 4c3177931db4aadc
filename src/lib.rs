pub mod api;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod shutdown;
pub mod store;
pub mod utils;
