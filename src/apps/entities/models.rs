//! Geographic taxonomy: domains, divisions and entities.
//!
//! A division's `index` is its depth in the domain: 0 is the country and
//! [`LOCALITY_DIVISION_INDEX`] marks localities, the level candidates run in.

use oshot_web::utils::slugify;
use oshot_web::{Result, ReverseError, reverse};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

pub const LOCALITY_DIVISION_INDEX: i64 = 3;

const ENTITY_COLUMNS: &str = "id, name, slug, division_id, parent_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Domain {
	pub id: i64,
	pub name: String,
}

impl Domain {
	pub async fn create(pool: &SqlitePool, name: &str) -> Result<Self> {
		let domain = sqlx::query_as::<_, Domain>("INSERT INTO domains (name) VALUES (?) RETURNING id, name")
			.bind(name)
			.fetch_one(pool)
			.await?;
		Ok(domain)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Division {
	pub id: i64,
	pub domain_id: i64,
	pub name: String,
	pub index: i64,
}

impl Division {
	pub async fn create(pool: &SqlitePool, domain: &Domain, name: &str, index: i64) -> Result<Self> {
		let division = sqlx::query_as::<_, Division>(
			r#"INSERT INTO divisions (domain_id, name, "index") VALUES (?, ?, ?)
			RETURNING id, domain_id, name, "index""#,
		)
		.bind(domain.id)
		.bind(name)
		.bind(index)
		.fetch_one(pool)
		.await?;
		Ok(division)
	}

	pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Self>> {
		let division =
			sqlx::query_as::<_, Division>(r#"SELECT id, domain_id, name, "index" FROM divisions WHERE id = ?"#)
				.bind(id)
				.fetch_optional(pool)
				.await?;
		Ok(division)
	}

	pub fn is_locality(&self) -> bool {
		self.index == LOCALITY_DIVISION_INDEX
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Entity {
	pub id: i64,
	pub name: String,
	pub slug: String,
	pub division_id: i64,
	pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewEntity {
	pub name: String,
	pub division_id: i64,
	pub parent_id: Option<i64>,
}

impl Entity {
	/// Insert an entity with a slug derived from its name.
	///
	/// Unicode letters are kept in the slug. Taken slugs get a `-2`, `-3`...
	/// suffix, and a name without any slug-able characters becomes `entity`.
	pub async fn create(pool: &SqlitePool, new: NewEntity) -> Result<Self> {
		let slug = unique_slug(pool, &new.name).await?;
		let entity = sqlx::query_as::<_, Entity>(&format!(
			"INSERT INTO entities (name, slug, division_id, parent_id) VALUES (?, ?, ?, ?) RETURNING {}",
			ENTITY_COLUMNS
		))
		.bind(&new.name)
		.bind(&slug)
		.bind(new.division_id)
		.bind(new.parent_id)
		.fetch_one(pool)
		.await?;
		tracing::debug!(entity = %entity.slug, "entity created");
		Ok(entity)
	}

	pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Self>> {
		let entity = sqlx::query_as::<_, Entity>(&format!("SELECT {} FROM entities WHERE id = ?", ENTITY_COLUMNS))
			.bind(id)
			.fetch_optional(pool)
			.await?;
		Ok(entity)
	}

	pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>> {
		let entity =
			sqlx::query_as::<_, Entity>(&format!("SELECT {} FROM entities WHERE slug = ?", ENTITY_COLUMNS))
				.bind(slug)
				.fetch_optional(pool)
				.await?;
		Ok(entity)
	}

	pub async fn all(pool: &SqlitePool) -> Result<Vec<Self>> {
		let entities = sqlx::query_as::<_, Entity>(&format!("SELECT {} FROM entities ORDER BY name, id", ENTITY_COLUMNS))
			.fetch_all(pool)
			.await?;
		Ok(entities)
	}

	/// Entities at the locality level, by name.
	pub async fn localities(pool: &SqlitePool) -> Result<Vec<Self>> {
		let entities = sqlx::query_as::<_, Entity>(
			r#"SELECT e.id, e.name, e.slug, e.division_id, e.parent_id
			FROM entities e JOIN divisions d ON d.id = e.division_id
			WHERE d."index" = ?
			ORDER BY e.name, e.id"#,
		)
		.bind(LOCALITY_DIVISION_INDEX)
		.fetch_all(pool)
		.await?;
		Ok(entities)
	}

	pub async fn children(&self, pool: &SqlitePool) -> Result<Vec<Self>> {
		let entities = sqlx::query_as::<_, Entity>(&format!(
			"SELECT {} FROM entities WHERE parent_id = ? ORDER BY name, id",
			ENTITY_COLUMNS
		))
		.bind(self.id)
		.fetch_all(pool)
		.await?;
		Ok(entities)
	}

	/// Parents up to the root, root first.
	pub async fn ancestors(&self, pool: &SqlitePool) -> Result<Vec<Self>> {
		let mut chain: Vec<Entity> = Vec::new();
		let mut next = self.parent_id;
		while let Some(id) = next {
			if id == self.id || chain.iter().any(|e| e.id == id) {
				tracing::warn!(entity = %self.slug, "cycle in entity hierarchy");
				break;
			}
			let Some(parent) = Self::get(pool, id).await? else {
				break;
			};
			next = parent.parent_id;
			chain.push(parent);
		}
		chain.reverse();
		Ok(chain)
	}

	pub async fn division(&self, pool: &SqlitePool) -> Result<Option<Division>> {
		Division::get(pool, self.division_id).await
	}

	/// Candidate list of this entity.
	pub fn get_absolute_url(&self) -> std::result::Result<String, ReverseError> {
		reverse("candidate-list", &[&self.slug])
	}
}

async fn unique_slug(pool: &SqlitePool, name: &str) -> Result<String> {
	let mut base = slugify(name, true);
	if base.is_empty() {
		base = "entity".to_string();
	}

	let mut candidate = base.clone();
	let mut suffix = 2;
	loop {
		let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE slug = ?")
			.bind(&candidate)
			.fetch_one(pool)
			.await?;
		if taken == 0 {
			return Ok(candidate);
		}
		candidate = format!("{}-{}", base, suffix);
		suffix += 1;
	}
}
