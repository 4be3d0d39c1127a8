//! Application state shared by views, signal receivers and commands.

use oshot_web::mail::{EmailBackend, backend_from_settings};
use oshot_web::messages::get_messages;
use oshot_web::templates::Templates;
use oshot_web::{Request, Result};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::apps::user::models::User;
use crate::apps::user::signals;
use crate::config::settings::Settings;
use crate::db::Db;

pub struct AppState {
	pub settings: Settings,
	pub db: Db,
	pub templates: Templates,
	pub mailer: Arc<dyn EmailBackend>,
}

impl AppState {
	/// Connect to the database, load templates and pick the mail backend
	/// named in `settings`.
	pub async fn new(settings: Settings) -> Result<Arc<Self>> {
		let db = Db::connect(&settings.database_url).await?;
		let templates = Templates::from_dir(&settings.templates_dir)?;
		let mailer = backend_from_settings(&settings.email_backend, &settings.smtp_config())?;
		Ok(Self::from_parts(settings, db, templates, mailer))
	}

	/// Assemble the state and connect the signal receivers.
	pub fn from_parts(settings: Settings, db: Db, templates: Templates, mailer: Arc<dyn EmailBackend>) -> Arc<Self> {
		let state = Self {
			settings,
			db,
			templates,
			mailer,
		};
		signals::connect(&state);
		Arc::new(state)
	}

	/// `ROOT_URL` as templates see it.
	pub fn root_url(&self) -> &str {
		self.settings.root_url.trim_end_matches('/')
	}

	/// Context every page starts from: site, viewer and flash messages.
	pub fn context(&self, request: &Request, user: Option<&User>) -> Value {
		json!({
			"site_name": self.settings.site_name,
			"LANGUAGE_CODE": self.settings.language_code,
			"ROOT_URL": self.root_url(),
			"user": user,
			"messages": get_messages(request),
			"base_template": "base.html",
			"path": request.full_path(),
		})
	}
}
