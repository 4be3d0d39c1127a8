//! Factories for the records most tests need.

use chrono::Utc;

use crate::apps::entities::{Division, Domain, Entity, LOCALITY_DIVISION_INDEX, NewEntity};
use crate::apps::qa::models::{NewQuestion, Question};
use crate::apps::user::models::{Membership, Profile, User};
use crate::db::Db;

pub const TEST_PASSWORD: &str = "secret123";

/// A locality in a domain of its own.
pub async fn create_locality(db: &Db, name: &str) -> Entity {
	let domain = Domain::create(db, &format!("{} domain", name))
		.await
		.expect("domain should be created");
	let division = Division::create(db, &domain, "city", LOCALITY_DIVISION_INDEX)
		.await
		.expect("division should be created");
	Entity::create(
		db,
		NewEntity {
			name: name.to_string(),
			division_id: division.id,
			parent_id: None,
		},
	)
	.await
	.expect("entity should be created")
}

/// Active user with [`TEST_PASSWORD`] and an email derived from the username.
pub async fn create_user(db: &Db, username: &str) -> User {
	User::create_user(db, username, &format!("{}@example.com", username), TEST_PASSWORD)
		.await
		.expect("user should be created")
}

pub async fn profile_of(db: &Db, user: &User) -> Profile {
	Profile::for_user(db, user.id)
		.await
		.expect("profile query should succeed")
		.expect("profile should exist")
}

pub async fn create_candidate(db: &Db, username: &str, locality: &Entity) -> User {
	let user = create_user(db, username).await;
	let mut profile = profile_of(db, &user).await;
	profile.locality_id = Some(locality.id);
	profile.is_candidate = true;
	profile.save(db).await.expect("profile should be saved");
	user
}

/// User with an editor membership in `locality`.
pub async fn create_editor(db: &Db, username: &str, locality: &Entity) -> User {
	let user = create_user(db, username).await;
	let mut profile = profile_of(db, &user).await;
	profile.locality_id = Some(locality.id);
	profile.save(db).await.expect("profile should be saved");
	Membership::create(db, user.id, locality.id, true, false)
		.await
		.expect("membership should be created");
	user
}

pub async fn create_question(db: &Db, author: &User, entity: &Entity, subject: &str) -> Question {
	Question::create(
		db,
		NewQuestion {
			author_id: author.id,
			entity_id: entity.id,
			subject: subject.to_string(),
			content: format!("Asked on {}", Utc::now().date_naive()),
			tags: Vec::new(),
		},
	)
	.await
	.expect("question should be created")
}
