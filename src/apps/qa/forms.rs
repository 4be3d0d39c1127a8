//! Question and answer forms.

use async_trait::async_trait;
use oshot_web::Result;
use oshot_web::forms::{Form, FormErrors, empty_as_none, trimmed};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use super::models::{NewQuestion, Question, parse_tags, unislug};
use crate::apps::entities::Entity;

fn validate_subject(subject: &str) -> std::result::Result<(), ValidationError> {
	if subject.chars().count() > 140 {
		return Err(ValidationError::new("length")
			.with_message(Cow::Borrowed("Ensure this value has at most 140 characters.")));
	}
	if subject == "post_q" {
		return Err(ValidationError::new("invalid_question").with_message(Cow::Borrowed("Invalid question")));
	}
	Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionForm {
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(
		length(min = 1, message = "This field is required."),
		custom(function = "validate_subject")
	)]
	pub subject: String,

	/// Slug of the entity the question is about
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(min = 1, message = "This field is required."))]
	pub entity: String,

	#[serde(default)]
	pub tags: String,

	#[serde(default, deserialize_with = "empty_as_none")]
	pub content: Option<String>,

	#[serde(skip)]
	resolved_entity: Option<Entity>,
}

#[async_trait]
impl Form for QuestionForm {
	type Context = SqlitePool;

	async fn clean(&mut self, pool: &SqlitePool, errors: &mut FormErrors) -> Result<()> {
		if self.entity.is_empty() {
			return Ok(());
		}
		let Some(entity) = Entity::get_by_slug(pool, &self.entity).await? else {
			errors.add(
				"entity",
				"Select a valid choice. That choice is not one of the available choices.",
			);
			return Ok(());
		};

		if !errors.has("subject") && Question::exists_with_unislug(pool, entity.id, &self.unislug()).await? {
			errors.add_form_error("Question already exists.");
		}
		self.resolved_entity = Some(entity);
		Ok(())
	}
}

impl QuestionForm {
	pub fn unislug(&self) -> String {
		unislug(&self.subject)
	}

	/// The entity named by the form, once cleaned.
	pub fn entity(&self) -> Option<&Entity> {
		self.resolved_entity.as_ref()
	}

	pub async fn save(&self, pool: &SqlitePool, author_id: i64) -> Result<Question> {
		let entity = self
			.resolved_entity
			.as_ref()
			.ok_or_else(|| oshot_web::Error::BadRequest("question form was not cleaned".to_string()))?;
		Question::create(
			pool,
			NewQuestion {
				author_id,
				entity_id: entity.id,
				subject: self.subject.clone(),
				content: self.content.clone().unwrap_or_default(),
				tags: parse_tags(&self.tags),
			},
		)
		.await
	}
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerForm {
	#[serde(default, deserialize_with = "trimmed")]
	#[validate(length(min = 1, message = "This field is required."))]
	pub content: String,
}

impl Form for AnswerForm {
	type Context = ();
}
