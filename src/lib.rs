// src/lib.rs
pub mod analysis;
pub mod api;
pub mod config;
pub mod errors;
pub mod market_data;
pub mod monitor;
pub mod prompt;
pub mod registry;
pub mod report;
pub mod snapshot;
pub mod types;
