//! Server-side sessions keyed by the `sessionid` cookie.

use chrono::{DateTime, Duration, Utc};
use oshot_web::shortcuts::redirect_to_login;
use oshot_web::{Request, Response, Result};
use sqlx::SqlitePool;

use super::models::User;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

/// Open a session for `user`, returning its key.
pub async fn login(pool: &SqlitePool, user: &User, age: Duration, now: DateTime<Utc>) -> Result<String> {
	let key = uuid::Uuid::new_v4().simple().to_string();
	sqlx::query("INSERT INTO sessions (key, user_id, expires_at) VALUES (?, ?, ?)")
		.bind(&key)
		.bind(user.id)
		.bind(now + age)
		.execute(pool)
		.await?;
	tracing::info!(user = %user.username, "logged in");
	Ok(key)
}

pub async fn logout(pool: &SqlitePool, key: &str) -> Result<()> {
	sqlx::query("DELETE FROM sessions WHERE key = ?")
		.bind(key)
		.execute(pool)
		.await?;
	Ok(())
}

/// The active user behind the request's session cookie.
pub async fn current_user(pool: &SqlitePool, request: &Request, now: DateTime<Utc>) -> Result<Option<User>> {
	let Some(key) = request.cookie(SESSION_COOKIE) else {
		return Ok(None);
	};
	let row: Option<(i64, DateTime<Utc>)> = sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE key = ?")
		.bind(&key)
		.fetch_optional(pool)
		.await?;

	match row {
		Some((user_id, expires_at)) if expires_at > now => {
			let user = User::get(pool, user_id).await?;
			Ok(user.filter(|u| u.is_active))
		}
		Some(_) => {
			logout(pool, &key).await?;
			Ok(None)
		}
		None => Ok(None),
	}
}

impl AppState {
	/// Shorthand for [`current_user`] at the current time.
	pub async fn user(&self, request: &Request) -> Result<Option<User>> {
		current_user(&self.db.pool, request, Utc::now()).await
	}

	/// Redirect to the login page, coming back to this request's URL.
	pub fn login_redirect(&self, request: &Request) -> Response {
		redirect_to_login(&self.settings.login_url, &request.full_path())
	}

	pub fn session_age(&self) -> Duration {
		Duration::days(self.settings.session_age_days)
	}
}
