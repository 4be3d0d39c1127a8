//! Forms of the user app.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use oshot_web::forms::{Form, FormErrors, empty_as_none, trimmed};
use oshot_web::Result;
use regex::Regex;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use super::models::{Gender, NotificationPeriod, Profile, User};
use crate::apps::entities::Entity;
use crate::db::Db;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));

fn validate_notification(value: &str) -> std::result::Result<(), ValidationError> {
	parse_notification(value)
		.map(|_| ())
		.ok_or_else(|| invalid_choice("invalid_notification"))
}

fn validate_gender(value: &str) -> std::result::Result<(), ValidationError> {
	parse_gender(value).map(|_| ()).ok_or_else(|| invalid_choice("invalid_gender"))
}

fn invalid_choice(code: &'static str) -> ValidationError {
	ValidationError::new(code).with_message(Cow::Borrowed(
		"Select a valid choice. That choice is not one of the available choices.",
	))
}

fn parse_notification(value: &str) -> Option<NotificationPeriod> {
	NotificationPeriod::CHOICES
		.iter()
		.map(|(period, _)| *period)
		.find(|period| period.code() == value)
}

fn parse_gender(value: &str) -> Option<Gender> {
	[Gender::Male, Gender::Female].into_iter().find(|g| g.code() == value)
}

/// The user being edited, for the uniqueness check.
pub struct EditingUser {
	pub pool: SqlitePool,
	pub user_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileForm {
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(
		length(min = 1, max = 30, message = "Required. 30 characters or fewer."),
		regex(
			path = *USERNAME_RE,
			message = "This value may contain only letters, numbers and @/./+/-/_ characters."
		)
	)]
	pub username: String,

	#[serde(default, deserialize_with = "trimmed")]
	#[validate(email(message = "Enter a valid email address."))]
	pub email: String,

	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(max = 30, message = "Ensure this value has at most 30 characters."))]
	pub first_name: String,

	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(max = 30, message = "Ensure this value has at most 30 characters."))]
	pub last_name: String,

	#[serde(default, deserialize_with = "empty_as_none")]
	pub bio: Option<String>,

	#[serde(default, deserialize_with = "empty_as_none")]
	#[validate(url(message = "Enter a valid URL."))]
	pub url: Option<String>,

	#[serde(default, deserialize_with = "empty_as_none")]
	#[validate(url(message = "Enter a valid URL."))]
	pub avatar_uri: Option<String>,

	#[serde(default, deserialize_with = "empty_as_none")]
	#[validate(custom(function = "validate_notification"))]
	pub email_notification: Option<String>,

	#[serde(default, deserialize_with = "empty_as_none")]
	#[validate(custom(function = "validate_gender"))]
	pub gender: Option<String>,

	/// Slug of the user's locality
	#[serde(default, deserialize_with = "empty_as_none")]
	pub locality: Option<String>,

	#[serde(skip)]
	locality_id: Option<i64>,
}

#[async_trait]
impl Form for ProfileForm {
	type Context = EditingUser;

	async fn clean(&mut self, ctx: &EditingUser, errors: &mut FormErrors) -> Result<()> {
		if !self.username.is_empty()
			&& let Some(other) = User::get_by_username(&ctx.pool, &self.username).await?
			&& other.id != ctx.user_id
		{
			errors.add("username", "A user with that username already exists.");
		}

		if let Some(slug) = &self.locality {
			match Entity::get_by_slug(&ctx.pool, slug).await? {
				Some(entity) => self.locality_id = Some(entity.id),
				None => errors.add(
					"locality",
					"Select a valid choice. That choice is not one of the available choices.",
				),
			}
		}
		Ok(())
	}
}

impl ProfileForm {
	/// Values shown when the form is first rendered.
	pub fn initial(user: &User, profile: &Profile, locality: Option<&Entity>) -> BTreeMap<String, String> {
		let mut initial = BTreeMap::new();
		initial.insert("username".to_string(), user.username.clone());
		initial.insert("email".to_string(), user.email.clone());
		initial.insert("first_name".to_string(), user.first_name.clone());
		initial.insert("last_name".to_string(), user.last_name.clone());
		initial.insert("bio".to_string(), profile.bio.clone().unwrap_or_default());
		initial.insert("url".to_string(), profile.url.clone().unwrap_or_default());
		initial.insert("avatar_uri".to_string(), profile.avatar_uri.clone().unwrap_or_default());
		initial.insert(
			"email_notification".to_string(),
			profile.email_notification.map(|p| p.code()).unwrap_or("").to_string(),
		);
		initial.insert(
			"gender".to_string(),
			profile.gender.map(|g| g.code()).unwrap_or("").to_string(),
		);
		initial.insert(
			"locality".to_string(),
			locality.map(|e| e.slug.clone()).unwrap_or_default(),
		);
		initial
	}

	/// Write the cleaned values to the user and profile.
	pub async fn save(&self, db: &Db, user: &mut User, profile: &mut Profile) -> Result<()> {
		user.username = self.username.clone();
		user.email = self.email.clone();
		user.first_name = self.first_name.clone();
		user.last_name = self.last_name.clone();
		user.save(db).await?;

		profile.bio = self.bio.clone();
		profile.url = self.url.clone();
		profile.avatar_uri = self.avatar_uri.clone();
		profile.email_notification = self.email_notification.as_deref().and_then(parse_notification);
		profile.gender = self.gender.as_deref().and_then(parse_gender);
		profile.locality_id = self.locality_id;
		profile.save(&db.pool).await?;

		tracing::info!(user = %user.username, "profile updated");
		Ok(())
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvitationForm {
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(max = 30, message = "Ensure this value has at most 30 characters."))]
	pub first_name: String,

	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(max = 30, message = "Ensure this value has at most 30 characters."))]
	pub last_name: String,

	#[serde(default, deserialize_with = "empty_as_none")]
	#[validate(custom(function = "validate_notification"))]
	pub email_notification: Option<String>,

	#[serde(default)]
	#[validate(length(min = 6, message = "Ensure this value has at least 6 characters."))]
	pub password1: String,

	#[serde(default)]
	#[validate(length(min = 1, message = "This field is required."))]
	pub password2: String,
}

#[async_trait]
impl Form for InvitationForm {
	type Context = ();

	async fn clean(&mut self, _ctx: &(), errors: &mut FormErrors) -> Result<()> {
		if !self.password2.is_empty() && self.password1 != self.password2 {
			errors.add_form_error("The two password fields didn't match.");
		}
		Ok(())
	}
}

impl InvitationForm {
	pub fn initial(user: &User, profile: Option<&Profile>) -> BTreeMap<String, String> {
		BTreeMap::from([
			("first_name".to_string(), user.first_name.clone()),
			("last_name".to_string(), user.last_name.clone()),
			(
				"email_notification".to_string(),
				profile
					.and_then(|p| p.email_notification)
					.map(|p| p.code())
					.unwrap_or("")
					.to_string(),
			),
		])
	}

	/// Set the names, password and notification preference of `user`.
	pub async fn save(&self, db: &Db, user: &mut User) -> Result<()> {
		user.first_name = self.first_name.clone();
		user.last_name = self.last_name.clone();
		user.set_password(&self.password1)?;
		user.save(db).await?;

		if let Some(mut profile) = Profile::for_user(&db.pool, user.id).await? {
			profile.email_notification = self.email_notification.as_deref().and_then(parse_notification);
			profile.save(&db.pool).await?;
		}
		Ok(())
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(min = 1, message = "This field is required."))]
	pub username: String,

	#[serde(default)]
	#[validate(length(min = 1, message = "This field is required."))]
	pub password: String,

	#[serde(default, deserialize_with = "empty_as_none")]
	pub next: Option<String>,

	#[serde(skip)]
	pub user: Option<User>,
}

#[async_trait]
impl Form for LoginForm {
	type Context = SqlitePool;

	async fn clean(&mut self, pool: &SqlitePool, errors: &mut FormErrors) -> Result<()> {
		if self.username.is_empty() || self.password.is_empty() {
			return Ok(());
		}
		self.user = User::authenticate(pool, &self.username, &self.password).await?;
		if self.user.is_none() {
			errors.add_form_error(
				"Please enter a correct username and password. Note that both fields are case-sensitive.",
			);
		}
		Ok(())
	}
}
