//! Front page and search.

pub mod urls;
pub mod views;
