pub mod settings;
pub mod urls;
