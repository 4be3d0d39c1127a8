//! Shared setup for the integration tests: the whole site on an in-memory
//! database, driven through its public API.

use oshot::apps::entities::{Division, Domain, Entity, LOCALITY_DIVISION_INDEX, NewEntity};
use oshot::config::settings::Settings;
use oshot::config::urls::url_patterns;
use oshot::db::Db;
use oshot::AppState;
use oshot_web::mail::MemoryBackend;
use oshot_web::templates::Templates;
use oshot_web::{Handler, Request, Response};
use rstest::fixture;
use std::sync::Arc;

pub struct Site {
	pub state: Arc<AppState>,
	pub app: Arc<dyn Handler>,
	pub outbox: MemoryBackend,
}

impl Site {
	pub async fn new() -> Self {
		let settings = Settings::for_tests().expect("test settings should load");
		let db = Db::connect(&settings.database_url).await.expect("database should open");
		let templates = Templates::from_dir(&settings.templates_dir).expect("templates should parse");
		let outbox = MemoryBackend::new();
		let state = AppState::from_parts(settings, db, templates, Arc::new(outbox.clone()));
		let app = url_patterns(state.clone());
		Self { state, app, outbox }
	}

	pub async fn locality(&self, name: &str) -> Entity {
		let domain = Domain::create(&self.state.db, name).await.expect("domain should be created");
		let division = Division::create(&self.state.db, &domain, "city", LOCALITY_DIVISION_INDEX)
			.await
			.expect("division should be created");
		Entity::create(
			&self.state.db,
			NewEntity {
				name: name.to_string(),
				division_id: division.id,
				parent_id: None,
			},
		)
		.await
		.expect("entity should be created")
	}

	pub async fn get(&self, path: &str, session: Option<&str>) -> Response {
		let mut builder = Request::builder().uri(path);
		if let Some(key) = session {
			builder = builder.header("cookie", format!("sessionid={}", key));
		}
		self.send(builder.build().expect("valid request")).await
	}

	pub async fn post(&self, path: &str, form: &[(&str, &str)], session: Option<&str>) -> Response {
		let mut builder = Request::builder().uri(path).form(form);
		if let Some(key) = session {
			builder = builder.header("cookie", format!("sessionid={}", key));
		}
		self.send(builder.build().expect("valid request")).await
	}

	/// Log in through the login page and return the session key.
	pub async fn log_in(&self, username: &str, password: &str) -> String {
		let response = self
			.post("/login/", &[("username", username), ("password", password)], None)
			.await;
		assert_eq!(response.status, hyper::StatusCode::FOUND, "login of {} failed", username);
		response
			.cookies()
			.into_iter()
			.find(|(name, _)| name == "sessionid")
			.map(|(_, value)| value)
			.expect("login should set the session cookie")
	}

	async fn send(&self, request: Request) -> Response {
		self.app.handle(request).await.unwrap_or_else(Response::from)
	}
}

#[fixture]
pub async fn site() -> Site {
	Site::new().await
}
