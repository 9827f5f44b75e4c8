pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod records;
pub mod scoring;
pub mod store;
