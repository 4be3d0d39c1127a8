//! Project settings.
//!
//! Resolution order, lowest to highest: built-in defaults,
//! `settings/base.toml`, `settings/<OSHOT_ENV>.toml` (default `local`), then
//! `OSHOT_*` environment variables.

use oshot_web::mail::SmtpConfig;
use oshot_web::settings::{DefaultSource, EnvSource, SettingsBuilder, SettingsError, TomlFileSource};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

pub const ENV_PREFIX: &str = "OSHOT_";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub debug: bool,
	pub bind_address: String,
	pub database_url: String,
	pub templates_dir: String,
	pub site_name: String,
	/// Absolute site URL without trailing slash, used in emails
	pub root_url: String,
	pub default_from_email: String,
	/// `console`, `memory` or `smtp`
	pub email_backend: String,
	pub smtp_host: String,
	pub smtp_port: u16,
	#[serde(default)]
	pub smtp_username: Option<String>,
	#[serde(default)]
	pub smtp_password: Option<String>,
	pub smtp_use_tls: bool,
	pub language_code: String,
	pub account_activation_days: i64,
	pub email_update_header: String,
	pub email_footer: String,
	pub login_url: String,
	pub session_age_days: i64,
	pub log_level: String,
}

impl Settings {
	pub fn smtp_config(&self) -> SmtpConfig {
		SmtpConfig {
			host: self.smtp_host.clone(),
			port: self.smtp_port,
			username: self.smtp_username.clone(),
			password: self.smtp_password.clone(),
			use_tls: self.smtp_use_tls,
		}
	}

	/// Settings for tests: in-memory database and mail outbox.
	pub fn for_tests() -> Result<Self, SettingsError> {
		let mut settings: Self = defaults().build()?.into_typed()?;
		settings.database_url = "sqlite::memory:".to_string();
		settings.email_backend = "memory".to_string();
		settings.templates_dir = format!("{}/templates", env!("CARGO_MANIFEST_DIR"));
		settings.root_url = "http://testserver".to_string();
		Ok(settings)
	}
}

fn defaults() -> SettingsBuilder {
	SettingsBuilder::new().add_source(
		DefaultSource::new()
			.with_value("debug", json!(false))
			.with_value("bind_address", json!("127.0.0.1:8000"))
			.with_value("database_url", json!("sqlite://oshot.db"))
			.with_value("templates_dir", json!("templates"))
			.with_value("site_name", json!("Open Shot"))
			.with_value("root_url", json!("http://localhost:8000"))
			.with_value("default_from_email", json!("noreply@oshot.example"))
			.with_value("email_backend", json!("console"))
			.with_value("smtp_host", json!("localhost"))
			.with_value("smtp_port", json!(25))
			.with_value("smtp_use_tls", json!(false))
			.with_value("language_code", json!("he"))
			.with_value("account_activation_days", json!(7))
			.with_value("email_update_header", json!("What's new on Open Shot"))
			.with_value("email_footer", json!("You are receiving this email because you signed up for updates."))
			.with_value("login_url", json!("/login/"))
			.with_value("session_age_days", json!(14))
			.with_value("log_level", json!("info")),
	)
}

/// Load settings from `dir` (usually the project root).
pub fn load_settings(dir: impl AsRef<Path>) -> Result<Settings, SettingsError> {
	let dir = dir.as_ref();
	let profile = std::env::var(format!("{}ENV", ENV_PREFIX)).unwrap_or_else(|_| "local".to_string());

	defaults()
		.add_source(TomlFileSource::new(dir.join("settings/base.toml")).optional().with_priority(40))
		.add_source(
			TomlFileSource::new(dir.join(format!("settings/{}.toml", profile)))
				.optional()
				.with_priority(50),
		)
		.add_source(EnvSource::new(ENV_PREFIX))
		.build()?
		.into_typed()
}

/// Settings for the current working directory.
pub fn get_settings() -> Result<Settings, SettingsError> {
	load_settings(".")
}
