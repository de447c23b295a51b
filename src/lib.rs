pub mod analytics;
pub mod app;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod import;
pub mod jobs;
pub mod middleware;
pub mod providers;
pub mod services;
pub mod state;
pub mod types;

pub use app::app;
pub use state::{AppState, Backends};

#[cfg(test)]
pub mod testing;
