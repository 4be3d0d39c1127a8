//! User app: accounts, profiles, candidates and editors.

pub mod auth;
pub mod commands;
pub mod forms;
pub mod models;
pub mod signals;
pub mod urls;
pub mod views;

pub use models::{
	ACTIVATED, Gender, MIN_EDITORS_PER_LOCALITY, Membership, NEVER_SENT, NotificationPeriod, Profile,
	RegistrationProfile, User,
};

#[cfg(test)]
mod tests;
