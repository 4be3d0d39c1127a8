//! Test fixtures and factories shared by the app test modules.

pub mod factories;
pub mod fixtures;

pub use factories::*;
pub use fixtures::*;
