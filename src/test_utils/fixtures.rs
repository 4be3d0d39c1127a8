//! Application fixtures for tests.
//!
//! A [`TestContext`] is a full application on an in-memory database with the
//! project templates and a memory mail outbox. Requests go straight through
//! the URL configuration, no sockets involved.

use chrono::{Duration, Utc};
use oshot_web::mail::MemoryBackend;
use oshot_web::messages::{MESSAGES_COOKIE, get_messages};
use oshot_web::templates::Templates;
use oshot_web::{Handler, Request, Response};
use rstest::*;
use std::sync::Arc;

use crate::apps::user::auth::{self, SESSION_COOKIE};
use crate::apps::user::models::User;
use crate::config::settings::Settings;
use crate::config::urls::url_patterns;
use crate::db::Db;
use crate::state::AppState;

pub struct TestContext {
	pub state: Arc<AppState>,
	pub app: Arc<dyn Handler>,
	pub outbox: MemoryBackend,
}

impl TestContext {
	pub async fn new() -> Self {
		let settings = Settings::for_tests().expect("test settings should load");
		let db = Db::connect(&settings.database_url)
			.await
			.expect("in-memory database should open");
		let templates = Templates::from_dir(&settings.templates_dir).expect("templates should parse");
		let outbox = MemoryBackend::new();
		let state = AppState::from_parts(settings, db, templates, Arc::new(outbox.clone()));
		let app = url_patterns(state.clone());
		Self { state, app, outbox }
	}

	pub fn db(&self) -> &Db {
		&self.state.db
	}

	/// Run `request` through the middlewares and router.
	pub async fn request(&self, request: Request) -> Response {
		self.app.handle(request).await.unwrap_or_else(Response::from)
	}

	pub async fn get(&self, path: &str, session: Option<&str>) -> Response {
		let mut builder = Request::builder().uri(path);
		if let Some(key) = session {
			builder = builder.header("cookie", format!("{}={}", SESSION_COOKIE, key));
		}
		self.request(builder.build().expect("valid request")).await
	}

	pub async fn post(&self, path: &str, form: &[(&str, &str)], session: Option<&str>) -> Response {
		let mut builder = Request::builder().uri(path).form(form);
		if let Some(key) = session {
			builder = builder.header("cookie", format!("{}={}", SESSION_COOKIE, key));
		}
		self.request(builder.build().expect("valid request")).await
	}

	/// Session key for `user`, to pass as `session`.
	pub async fn login(&self, user: &User) -> String {
		auth::login(self.db(), user, Duration::days(1), Utc::now())
			.await
			.expect("session should be created")
	}
}

/// Flash message texts a response queues for the next page.
pub fn flash_messages(response: &Response) -> Vec<String> {
	let Some((_, raw)) = response.cookies().into_iter().find(|(name, _)| name == MESSAGES_COOKIE) else {
		return Vec::new();
	};
	let next = Request::builder()
		.header("cookie", format!("{}={}", MESSAGES_COOKIE, raw))
		.build()
		.expect("valid request");
	get_messages(&next).into_iter().map(|m| m.message).collect()
}

/// Fresh application per test.
#[fixture]
pub async fn test_context() -> TestContext {
	TestContext::new().await
}
