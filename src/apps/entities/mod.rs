//! Entities app: the places questions and candidates belong to.

pub mod models;

pub use models::{Division, Domain, Entity, LOCALITY_DIVISION_INDEX, NewEntity};

#[cfg(test)]
mod tests;
