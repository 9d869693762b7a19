pub mod api;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod identity;
pub mod models;
pub mod navigation;
pub mod observability;
pub mod state;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;
