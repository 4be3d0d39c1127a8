pub mod entities;
pub mod home;
pub mod qa;
pub mod user;
