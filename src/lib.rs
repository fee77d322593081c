// Library exports for the binary and integration tests
pub mod aggregate;
pub mod backfill;
pub mod commands;
pub mod config;
pub mod context;
pub mod counter;
pub mod error;
pub mod logging;
pub mod render;
pub mod serve;
pub mod store;
pub mod timefmt;
pub mod window;
