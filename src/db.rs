//! Database handle: connection pool plus the model signals.

use oshot_web::signals::{PostSave, Signal};
use oshot_web::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::apps::qa::models::QuestionFlag;
use crate::apps::user::models::User;

/// `post_save` signals of the models other apps listen to.
pub struct ModelSignals {
	pub user_post_save: Signal<PostSave<User>>,
	pub question_flag_post_save: Signal<PostSave<QuestionFlag>>,
}

impl Default for ModelSignals {
	fn default() -> Self {
		Self {
			user_post_save: Signal::new("user.post_save"),
			question_flag_post_save: Signal::new("question_flag.post_save"),
		}
	}
}

/// Cheap to clone; clones share the pool and signals.
#[derive(Clone)]
pub struct Db {
	pub pool: SqlitePool,
	pub signals: Arc<ModelSignals>,
}

impl Db {
	/// Connect and apply pending migrations.
	pub async fn connect(url: &str) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(url)?
			.create_if_missing(true)
			.foreign_keys(true);

		let pool = if url.contains(":memory:") {
			// Every connection to :memory: is a separate database, keep exactly one alive
			SqlitePoolOptions::new()
				.max_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
				.connect_with(options)
				.await?
		} else {
			SqlitePoolOptions::new().max_connections(5).connect_with(options).await?
		};

		let db = Self {
			pool,
			signals: Arc::new(ModelSignals::default()),
		};
		db.migrate().await?;
		Ok(db)
	}

	pub async fn migrate(&self) -> Result<()> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		tracing::debug!("migrations applied");
		Ok(())
	}

	/// `post_save` payload carrying this pool.
	pub fn post_save<M>(&self, instance: M, created: bool) -> PostSave<M> {
		PostSave {
			instance,
			created,
			pool: self.pool.clone(),
		}
	}
}

impl Deref for Db {
	type Target = SqlitePool;

	fn deref(&self) -> &SqlitePool {
		&self.pool
	}
}
