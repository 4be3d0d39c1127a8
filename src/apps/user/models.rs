//! Accounts, profiles, memberships and registration keys.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use oshot_web::{Error, Result, ReverseError, reverse};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};

use crate::apps::entities::Entity;
use crate::db::Db;

/// `last_email_update` of a profile that never got a digest.
pub static NEVER_SENT: Lazy<DateTime<Utc>> = Lazy::new(|| DateTime::<Utc>::UNIX_EPOCH + Duration::days(217));

/// Localities with fewer editors than this ask for volunteers.
pub const MIN_EDITORS_PER_LOCALITY: i64 = 3;

/// Activation key of a registration that has been used.
pub const ACTIVATED: &str = "ALREADY_ACTIVATED";

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, is_active, date_joined";
const PROFILE_COLUMNS: &str = "id, user_id, locality_id, is_candidate, is_editor, public_profile, gender, bio, url, \
	 email_notification, avatar_uri, last_email_update, verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum NotificationPeriod {
	#[serde(rename = "N")]
	#[sqlx(rename = "N")]
	NoEmail,
	#[serde(rename = "D")]
	#[sqlx(rename = "D")]
	Daily,
	#[serde(rename = "W")]
	#[sqlx(rename = "W")]
	Weekly,
}

impl NotificationPeriod {
	pub const CHOICES: [(NotificationPeriod, &'static str); 3] = [
		(NotificationPeriod::NoEmail, "No Email"),
		(NotificationPeriod::Daily, "Daily"),
		(NotificationPeriod::Weekly, "Weekly"),
	];

	/// Minimum time between two digests. An hour of slack keeps a daily cron
	/// run from skipping a day.
	pub fn frequency(self) -> Option<Duration> {
		match self {
			Self::NoEmail => None,
			Self::Daily => Some(Duration::hours(23)),
			Self::Weekly => Some(Duration::hours(23 + 6 * 24)),
		}
	}

	pub fn code(self) -> &'static str {
		match self {
			Self::NoEmail => "N",
			Self::Daily => "D",
			Self::Weekly => "W",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Gender {
	#[serde(rename = "M")]
	#[sqlx(rename = "M")]
	Male,
	#[serde(rename = "F")]
	#[sqlx(rename = "F")]
	Female,
}

impl Gender {
	pub fn code(self) -> &'static str {
		match self {
			Self::Male => "M",
			Self::Female => "F",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum VerificationStage {
	#[serde(rename = "0")]
	#[sqlx(rename = "0")]
	NotNeeded,
	#[serde(rename = "S")]
	#[sqlx(rename = "S")]
	Started,
	#[serde(rename = "V")]
	#[sqlx(rename = "V")]
	Verified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
	pub id: i64,
	pub username: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	#[serde(skip)]
	pub password_hash: String,
	pub is_active: bool,
	pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
	pub username: String,
	pub email: String,
	pub password: String,
	pub first_name: String,
	pub last_name: String,
	pub is_active: bool,
}

fn hash_password(raw: &str) -> Result<String> {
	let mut salt_bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut salt_bytes);
	let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| Error::Internal(e.to_string()))?;

	Argon2::default()
		.hash_password(raw.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| Error::Internal(e.to_string()))
}

impl User {
	/// Insert a user and announce it on `user_post_save`.
	pub async fn create(db: &Db, new: NewUser) -> Result<Self> {
		let password_hash = hash_password(&new.password)?;
		let user = sqlx::query_as::<_, User>(&format!(
			"INSERT INTO users (username, email, first_name, last_name, password_hash, is_active, date_joined)
			VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
			USER_COLUMNS
		))
		.bind(&new.username)
		.bind(&new.email)
		.bind(&new.first_name)
		.bind(&new.last_name)
		.bind(&password_hash)
		.bind(new.is_active)
		.bind(Utc::now())
		.fetch_one(&db.pool)
		.await?;

		tracing::info!(user = %user.username, "user created");
		db.signals.user_post_save.send(db.post_save(user.clone(), true)).await?;
		Ok(user)
	}

	/// Active user with a password.
	pub async fn create_user(db: &Db, username: &str, email: &str, password: &str) -> Result<Self> {
		Self::create(
			db,
			NewUser {
				username: username.to_string(),
				email: email.to_string(),
				password: password.to_string(),
				is_active: true,
				..NewUser::default()
			},
		)
		.await
	}

	pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Self>> {
		let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
			.bind(id)
			.fetch_optional(pool)
			.await?;
		Ok(user)
	}

	pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<Option<Self>> {
		let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
			.bind(username)
			.fetch_optional(pool)
			.await?;
		Ok(user)
	}

	/// First user (by id) with this email, compared case-insensitively.
	pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>> {
		let user = sqlx::query_as::<_, User>(&format!(
			"SELECT {} FROM users WHERE lower(email) = lower(?) ORDER BY id LIMIT 1",
			USER_COLUMNS
		))
		.bind(email)
		.fetch_optional(pool)
		.await?;
		Ok(user)
	}

	/// The active user with these credentials.
	pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<Option<Self>> {
		let Some(user) = Self::get_by_username(pool, username).await? else {
			return Ok(None);
		};
		if user.is_active && user.check_password(password) {
			Ok(Some(user))
		} else {
			Ok(None)
		}
	}

	pub fn set_password(&mut self, raw: &str) -> Result<()> {
		self.password_hash = hash_password(raw)?;
		Ok(())
	}

	pub fn check_password(&self, raw: &str) -> bool {
		match PasswordHash::new(&self.password_hash) {
			Ok(parsed) => Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok(),
			Err(_) => false,
		}
	}

	/// Write every column back and announce the update.
	pub async fn save(&self, db: &Db) -> Result<()> {
		sqlx::query(
			"UPDATE users SET username = ?, email = ?, first_name = ?, last_name = ?, password_hash = ?,
			is_active = ?, date_joined = ? WHERE id = ?",
		)
		.bind(&self.username)
		.bind(&self.email)
		.bind(&self.first_name)
		.bind(&self.last_name)
		.bind(&self.password_hash)
		.bind(self.is_active)
		.bind(self.date_joined)
		.bind(self.id)
		.execute(&db.pool)
		.await?;

		db.signals.user_post_save.send(db.post_save(self.clone(), false)).await?;
		Ok(())
	}

	/// Delete the user; profile, memberships, questions and answers go with it.
	pub async fn delete(self, pool: &SqlitePool) -> Result<()> {
		sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(self.id)
			.execute(pool)
			.await?;
		tracing::info!(user = %self.username, "user deleted");
		Ok(())
	}

	pub fn get_full_name(&self) -> String {
		format!("{} {}", self.first_name, self.last_name).trim().to_string()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Profile {
	pub id: i64,
	pub user_id: i64,
	pub locality_id: Option<i64>,
	pub is_candidate: bool,
	pub is_editor: bool,
	pub public_profile: bool,
	pub gender: Option<Gender>,
	pub bio: Option<String>,
	pub url: Option<String>,
	pub email_notification: Option<NotificationPeriod>,
	pub avatar_uri: Option<String>,
	pub last_email_update: DateTime<Utc>,
	pub verification: VerificationStage,
}

impl Profile {
	/// Insert a profile with default settings for `user_id`.
	pub async fn create_default(pool: &SqlitePool, user_id: i64) -> Result<Self> {
		let profile = sqlx::query_as::<_, Profile>(&format!(
			"INSERT INTO profiles (user_id, email_notification, last_email_update) VALUES (?, ?, ?) RETURNING {}",
			PROFILE_COLUMNS
		))
		.bind(user_id)
		.bind(NotificationPeriod::Daily)
		.bind(*NEVER_SENT)
		.fetch_one(pool)
		.await?;
		Ok(profile)
	}

	pub async fn for_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>> {
		let profile = sqlx::query_as::<_, Profile>(&format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS))
			.bind(user_id)
			.fetch_optional(pool)
			.await?;
		Ok(profile)
	}

	/// Every profile, by id.
	pub async fn all(pool: &SqlitePool) -> Result<Vec<Self>> {
		let profiles = sqlx::query_as::<_, Profile>(&format!("SELECT {} FROM profiles ORDER BY id", PROFILE_COLUMNS))
			.fetch_all(pool)
			.await?;
		Ok(profiles)
	}

	pub async fn save(&self, pool: &SqlitePool) -> Result<()> {
		sqlx::query(
			"UPDATE profiles SET locality_id = ?, is_candidate = ?, is_editor = ?, public_profile = ?, gender = ?,
			bio = ?, url = ?, email_notification = ?, avatar_uri = ?, last_email_update = ?, verification = ?
			WHERE id = ?",
		)
		.bind(self.locality_id)
		.bind(self.is_candidate)
		.bind(self.is_editor)
		.bind(self.public_profile)
		.bind(self.gender)
		.bind(&self.bio)
		.bind(&self.url)
		.bind(self.email_notification)
		.bind(&self.avatar_uri)
		.bind(self.last_email_update)
		.bind(self.verification)
		.bind(self.id)
		.execute(pool)
		.await?;
		Ok(())
	}

	/// `avatar_uri` when set, otherwise an identicon Gravatar for `email`.
	///
	/// # Examples
	///
	/// ```ignore
	/// let url = profile.avatar_url("dana@example.com");
	/// assert!(url.starts_with("http://www.gravatar.com/avatar/"));
	/// ```
	pub fn avatar_url(&self, email: &str) -> String {
		match self.avatar_uri.as_deref() {
			Some(uri) if !uri.is_empty() => uri.to_string(),
			_ => gravatar_url(email),
		}
	}

	pub fn get_absolute_url(&self, username: &str) -> std::result::Result<String, ReverseError> {
		reverse("public-profile", &[username])
	}

	pub async fn locality(&self, pool: &SqlitePool) -> Result<Option<Entity>> {
		match self.locality_id {
			Some(id) => Entity::get(pool, id).await,
			None => Ok(None),
		}
	}

	pub fn is_candidate_in(&self, entity: &Entity) -> bool {
		self.is_candidate && self.locality_id == Some(entity.id)
	}

	/// Editor through the profile flag in its own locality, or through an
	/// editor membership.
	pub async fn is_editor_of(&self, pool: &SqlitePool, entity: &Entity) -> Result<bool> {
		if self.is_editor && self.locality_id == Some(entity.id) {
			return Ok(true);
		}
		let count: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM memberships WHERE user_id = ? AND entity_id = ? AND is_editor = 1")
				.bind(self.user_id)
				.bind(entity.id)
				.fetch_one(pool)
				.await?;
		Ok(count > 0)
	}

	/// Ids of the entities this user is a member of.
	pub async fn entities(&self, pool: &SqlitePool) -> Result<Vec<i64>> {
		let ids = sqlx::query_scalar("SELECT entity_id FROM memberships WHERE user_id = ? ORDER BY entity_id")
			.bind(self.user_id)
			.fetch_all(pool)
			.await?;
		Ok(ids)
	}

	/// Ids of the entities this user edits through memberships.
	pub async fn editor_in(&self, pool: &SqlitePool) -> Result<Vec<i64>> {
		let ids = sqlx::query_scalar(
			"SELECT entity_id FROM memberships WHERE user_id = ? AND is_editor = 1 ORDER BY entity_id",
		)
		.bind(self.user_id)
		.fetch_all(pool)
		.await?;
		Ok(ids)
	}

	pub async fn add_entity(&self, pool: &SqlitePool, entity: &Entity, is_editor: bool) -> Result<Membership> {
		Membership::create(pool, self.user_id, entity.id, is_editor, false).await
	}

	/// Candidates of a locality, the most answering first.
	pub async fn candidates(pool: &SqlitePool, entity: &Entity) -> Result<Vec<Candidate>> {
		let rows: Vec<(i64, i64)> = sqlx::query_as(
			"SELECT p.user_id, (SELECT COUNT(*) FROM answers a WHERE a.author_id = p.user_id) AS answer_count
			FROM profiles p JOIN users u ON u.id = p.user_id
			WHERE p.locality_id = ? AND p.is_candidate = 1
			ORDER BY answer_count DESC, u.username",
		)
		.bind(entity.id)
		.fetch_all(pool)
		.await?;

		let mut candidates = Vec::with_capacity(rows.len());
		for (user_id, answer_count) in rows {
			let (Some(user), Some(profile)) = (User::get(pool, user_id).await?, Self::for_user(pool, user_id).await?)
			else {
				continue;
			};
			candidates.push(Candidate {
				avatar_url: profile.avatar_url(&user.email),
				full_name: profile_full_name(&user),
				user,
				profile,
				answer_count,
			});
		}
		Ok(candidates)
	}

	/// Distinct editors of `entity`, by flag or membership.
	pub async fn editor_count(pool: &SqlitePool, entity: &Entity) -> Result<i64> {
		let count = sqlx::query_scalar(
			"SELECT COUNT(*) FROM (
				SELECT user_id FROM memberships WHERE entity_id = ? AND is_editor = 1
				UNION
				SELECT user_id FROM profiles WHERE locality_id = ? AND is_editor = 1
			)",
		)
		.bind(entity.id)
		.bind(entity.id)
		.fetch_one(pool)
		.await?;
		Ok(count)
	}

	pub async fn need_editors(pool: &SqlitePool, entity: &Entity) -> Result<bool> {
		Ok(Self::editor_count(pool, entity).await? < MIN_EDITORS_PER_LOCALITY)
	}

	/// Email addresses of everyone editing `entity`.
	pub async fn editor_emails(pool: &SqlitePool, entity_id: i64) -> Result<Vec<String>> {
		let emails = sqlx::query_scalar(
			"SELECT DISTINCT u.email FROM users u
			WHERE u.email != ''
			AND (u.id IN (SELECT user_id FROM memberships WHERE entity_id = ? AND is_editor = 1)
				OR u.id IN (SELECT user_id FROM profiles WHERE locality_id = ? AND is_editor = 1))
			ORDER BY u.email",
		)
		.bind(entity_id)
		.bind(entity_id)
		.fetch_all(pool)
		.await?;
		Ok(emails)
	}
}

/// "first last", or the username when both are empty.
pub fn profile_full_name(user: &User) -> String {
	let full = user.get_full_name();
	if full.is_empty() { user.username.clone() } else { full }
}

pub fn gravatar_url(email: &str) -> String {
	let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
	format!("http://www.gravatar.com/avatar/{:x}?d=identicon&s=40", digest)
}

/// A candidate row for the candidate list.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
	pub user: User,
	pub profile: Profile,
	pub full_name: String,
	pub avatar_url: String,
	pub answer_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Membership {
	pub id: i64,
	pub user_id: i64,
	pub entity_id: i64,
	pub is_editor: bool,
	pub can_answer: bool,
}

impl Membership {
	pub async fn create(
		pool: &SqlitePool,
		user_id: i64,
		entity_id: i64,
		is_editor: bool,
		can_answer: bool,
	) -> Result<Self> {
		let membership = sqlx::query_as::<_, Membership>(
			"INSERT INTO memberships (user_id, entity_id, is_editor, can_answer) VALUES (?, ?, ?, ?)
			RETURNING id, user_id, entity_id, is_editor, can_answer",
		)
		.bind(user_id)
		.bind(entity_id)
		.bind(is_editor)
		.bind(can_answer)
		.fetch_one(pool)
		.await?;
		Ok(membership)
	}

	pub async fn get(pool: &SqlitePool, user_id: i64, entity_id: i64) -> Result<Option<Self>> {
		let membership = sqlx::query_as::<_, Membership>(
			"SELECT id, user_id, entity_id, is_editor, can_answer FROM memberships WHERE user_id = ? AND entity_id = ?",
		)
		.bind(user_id)
		.bind(entity_id)
		.fetch_optional(pool)
		.await?;
		Ok(membership)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RegistrationProfile {
	pub id: i64,
	pub user_id: i64,
	pub activation_key: String,
}

impl RegistrationProfile {
	/// New registration with a random activation key.
	pub async fn create_for(pool: &SqlitePool, user: &User) -> Result<Self> {
		let mut salt = [0u8; 16];
		rand::thread_rng().fill_bytes(&mut salt);
		let mut hasher = Sha256::new();
		hasher.update(salt);
		hasher.update(user.username.as_bytes());
		let key = format!("{:x}", hasher.finalize());

		let registration = sqlx::query_as::<_, RegistrationProfile>(
			"INSERT INTO registration_profiles (user_id, activation_key) VALUES (?, ?)
			RETURNING id, user_id, activation_key",
		)
		.bind(user.id)
		.bind(&key)
		.fetch_one(pool)
		.await?;
		Ok(registration)
	}

	pub async fn get_by_key(pool: &SqlitePool, key: &str) -> Result<Option<Self>> {
		let registration = sqlx::query_as::<_, RegistrationProfile>(
			"SELECT id, user_id, activation_key FROM registration_profiles WHERE activation_key = ?",
		)
		.bind(key)
		.fetch_optional(pool)
		.await?;
		Ok(registration)
	}

	pub async fn for_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>> {
		let registration = sqlx::query_as::<_, RegistrationProfile>(
			"SELECT id, user_id, activation_key FROM registration_profiles WHERE user_id = ?",
		)
		.bind(user_id)
		.fetch_optional(pool)
		.await?;
		Ok(registration)
	}

	pub fn is_activated(&self) -> bool {
		self.activation_key == ACTIVATED
	}

	/// Used, or older than `activation_days` counted from `date_joined`.
	pub fn activation_key_expired(&self, user: &User, activation_days: i64, now: DateTime<Utc>) -> bool {
		self.is_activated() || user.date_joined + Duration::days(activation_days) <= now
	}

	/// Activate the user owning `key` and burn the key.
	///
	/// Unknown and already used keys give `None`.
	pub async fn activate_user(db: &Db, key: &str) -> Result<Option<User>> {
		if key == ACTIVATED {
			return Ok(None);
		}
		let Some(registration) = Self::get_by_key(&db.pool, key).await? else {
			return Ok(None);
		};
		let Some(mut user) = User::get(&db.pool, registration.user_id).await? else {
			return Ok(None);
		};

		user.is_active = true;
		user.save(db).await?;
		sqlx::query("UPDATE registration_profiles SET activation_key = ? WHERE id = ?")
			.bind(ACTIVATED)
			.bind(registration.id)
			.execute(&db.pool)
			.await?;
		tracing::info!(user = %user.username, "user activated");
		Ok(Some(user))
	}
}

#[derive(Debug, Clone, Default)]
pub struct InviteUser {
	pub username: String,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub locality: Option<Entity>,
}

/// Create an inactive account to be claimed through the invitation view.
pub async fn invite_user(db: &Db, invite: InviteUser) -> Result<(User, RegistrationProfile)> {
	let user = User::create(
		db,
		NewUser {
			username: invite.username,
			email: invite.email,
			password: uuid::Uuid::new_v4().simple().to_string(),
			first_name: invite.first_name,
			last_name: invite.last_name,
			is_active: false,
		},
	)
	.await?;
	let registration = RegistrationProfile::create_for(&db.pool, &user).await?;

	if let Some(locality) = invite.locality {
		let mut profile = Profile::for_user(&db.pool, user.id)
			.await?
			.ok_or_else(|| Error::Internal(format!("no profile for user {}", user.username)))?;
		profile.locality_id = Some(locality.id);
		profile.save(&db.pool).await?;
	}

	tracing::info!(user = %user.username, "user invited");
	Ok((user, registration))
}
