//! Open Shot
//!
//! Residents ask questions about their locality, candidates answer them, and
//! editors keep the place tidy. Users get a periodic digest of what changed.
//!
//! - `apps`: entities, user, qa and home
//! - `config`: settings and the URL configuration
//! - `state`: [`state::AppState`], handed to every view

pub mod apps;
pub mod config;
pub mod db;
pub mod state;

#[cfg(test)]
pub mod test_utils;

pub use config::settings::get_settings;
pub use state::AppState;
