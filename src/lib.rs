pub mod cache;
pub mod cli;
pub mod config;
pub mod effects;
pub mod error;
pub mod files;
pub mod loader;
pub mod prefetch;
pub mod session;
pub mod sheet;
pub mod ui;
