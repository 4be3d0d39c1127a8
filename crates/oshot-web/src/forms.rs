//! Form binding and validation.
//!
//! A form is a `Deserialize + Validate` struct. Binding decodes the submitted
//! urlencoded body, runs the `validator` rules, then the form's own
//! [`Form::clean`] hook which may query the database. Errors are collected per
//! field, with form-level errors stored under [`ALL_FIELDS_KEY`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationErrors};

use crate::error::Result;
use crate::http::Request;

/// Special key for form-level (non-field-specific) errors.
pub const ALL_FIELDS_KEY: &str = "_all";

/// Validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.0.entry(field.into()).or_default().push(message.into());
	}

	/// Record an error that belongs to the whole form.
	pub fn add_form_error(&mut self, message: impl Into<String>) {
		self.add(ALL_FIELDS_KEY, message);
	}

	pub fn get(&self, field: &str) -> &[String] {
		self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn has(&self, field: &str) -> bool {
		!self.get(field).is_empty()
	}

	pub fn non_field_errors(&self) -> &[String] {
		self.get(ALL_FIELDS_KEY)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn merge_validation(&mut self, errors: &ValidationErrors) {
		for (field, errs) in errors.field_errors() {
			for err in errs {
				let message = err
					.message
					.as_ref()
					.map(|m| m.to_string())
					.unwrap_or_else(|| default_message(&err.code).to_string());
				self.add(field.to_string(), message);
			}
		}
	}
}

impl fmt::Display for FormErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.0
			.iter()
			.map(|(field, msgs)| format!("{}: {}", field, msgs.join(" ")))
			.collect();
		write!(f, "{}", parts.join("; "))
	}
}

fn default_message(code: &str) -> &'static str {
	match code {
		"required" => "This field is required.",
		"email" => "Enter a valid email address.",
		"url" => "Enter a valid URL.",
		"length" => "Ensure this value has a valid length.",
		"regex" => "Enter a valid value.",
		_ => "Enter a valid value.",
	}
}

/// Form-level validation hook.
#[async_trait]
pub trait Form: DeserializeOwned + Validate + Send + Sync + Sized {
	/// Whatever the clean step needs to look things up, usually a pool.
	type Context: Sync + ?Sized;

	/// Cross-field and database checks, run after field validation.
	async fn clean(&mut self, _ctx: &Self::Context, _errors: &mut FormErrors) -> Result<()> {
		Ok(())
	}
}

/// A form together with the raw submitted values and its errors.
#[derive(Debug, Clone)]
pub struct BoundForm<F> {
	data: BTreeMap<String, String>,
	errors: FormErrors,
	cleaned: Option<F>,
	is_bound: bool,
}

impl<F: Form> BoundForm<F> {
	/// An unbound form showing `initial` values.
	pub fn unbound(initial: BTreeMap<String, String>) -> Self {
		Self {
			data: initial,
			errors: FormErrors::new(),
			cleaned: None,
			is_bound: false,
		}
	}

	/// Bind a decoded body and run every validation step.
	pub async fn bind(pairs: Vec<(String, String)>, ctx: &F::Context) -> Result<Self> {
		let data: BTreeMap<String, String> = pairs.iter().cloned().collect();
		let mut errors = FormErrors::new();

		let encoded = serde_urlencoded::to_string(&pairs)
			.map_err(|e| crate::Error::BadRequest(e.to_string()))?;
		let cleaned = match serde_urlencoded::from_str::<F>(&encoded) {
			Ok(mut form) => {
				if let Err(validation) = form.validate() {
					errors.merge_validation(&validation);
				}
				form.clean(ctx, &mut errors).await?;
				Some(form)
			}
			Err(err) => {
				errors.add_form_error(format!("Invalid form data: {}", err));
				None
			}
		};

		Ok(Self {
			data,
			errors,
			cleaned,
			is_bound: true,
		})
	}

	/// Bind the urlencoded body of `request`.
	pub async fn from_request(request: &Request, ctx: &F::Context) -> Result<Self> {
		Self::bind(request.form_data()?, ctx).await
	}

	pub fn is_bound(&self) -> bool {
		self.is_bound
	}

	pub fn is_valid(&self) -> bool {
		self.is_bound && self.cleaned.is_some() && self.errors.is_empty()
	}

	pub fn errors(&self) -> &FormErrors {
		&self.errors
	}

	/// The validated form, `None` unless [`is_valid`](Self::is_valid).
	pub fn cleaned_data(&self) -> Option<&F> {
		self.cleaned.as_ref().filter(|_| self.errors.is_empty())
	}

	pub fn value(&self, field: &str) -> &str {
		self.data.get(field).map(String::as_str).unwrap_or("")
	}

	/// Template view of the form: `{"data": {...}, "errors": {...}}`.
	pub fn to_context(&self) -> serde_json::Value {
		serde_json::json!({
			"data": self.data,
			"errors": self.errors,
			"non_field_errors": self.errors.non_field_errors(),
		})
	}
}

/// Deserialize a text input, turning blank values into `None`.
pub fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<String>::deserialize(deserializer)?;
	Ok(value.and_then(|v| {
		let trimmed = v.trim();
		(!trimmed.is_empty()).then(|| trimmed.to_string())
	}))
}

/// Deserialize a text input, trimming surrounding whitespace.
pub fn trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(String::deserialize(deserializer)?.trim().to_string())
}

/// Deserialize an HTML checkbox: any submitted value except `false`/`off` is checked.
pub fn checkbox<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<String>::deserialize(deserializer)?;
	Ok(matches!(value.as_deref(), Some(v) if !matches!(v, "" | "false" | "off" | "0")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[derive(Debug, Deserialize, Validate)]
	struct SignupForm {
		#[serde(default, deserialize_with = "trimmed")]
		#[validate(length(min = 1, message = "This field is required."))]
		username: String,
		#[serde(default, deserialize_with = "empty_as_none")]
		#[validate(email(message = "Enter a valid email address."))]
		email: Option<String>,
		#[serde(default, deserialize_with = "checkbox")]
		newsletter: bool,
	}

	#[async_trait]
	impl Form for SignupForm {
		type Context = Vec<String>;

		async fn clean(&mut self, taken: &Vec<String>, errors: &mut FormErrors) -> Result<()> {
			if taken.contains(&self.username) {
				errors.add_form_error("Username already taken.");
			}
			Ok(())
		}
	}

	fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
		items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[rstest]
	#[tokio::test]
	async fn test_valid_form() {
		let form = BoundForm::<SignupForm>::bind(
			pairs(&[("username", " dana "), ("email", ""), ("newsletter", "on")]),
			&vec![],
		)
		.await
		.unwrap();

		assert!(form.is_valid(), "unexpected errors: {}", form.errors());
		let cleaned = form.cleaned_data().unwrap();
		assert_eq!(cleaned.username, "dana");
		assert_eq!(cleaned.email, None);
		assert!(cleaned.newsletter);
	}

	#[rstest]
	#[tokio::test]
	async fn test_field_errors_are_collected() {
		let form = BoundForm::<SignupForm>::bind(pairs(&[("email", "not-an-email")]), &vec![])
			.await
			.unwrap();

		assert!(!form.is_valid());
		assert_eq!(form.errors().get("username"), ["This field is required."]);
		assert_eq!(form.errors().get("email"), ["Enter a valid email address."]);
		assert_eq!(form.value("email"), "not-an-email");
		assert!(form.cleaned_data().is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_clean_adds_form_level_error() {
		let form = BoundForm::<SignupForm>::bind(pairs(&[("username", "dana")]), &vec!["dana".to_string()])
			.await
			.unwrap();

		assert!(!form.is_valid());
		assert_eq!(form.errors().non_field_errors(), ["Username already taken."]);
		assert_eq!(
			form.to_context()["errors"][ALL_FIELDS_KEY][0],
			"Username already taken."
		);
	}

	#[rstest]
	fn test_unbound_form_is_not_valid() {
		let form = BoundForm::<SignupForm>::unbound(BTreeMap::from([(
			"username".to_string(),
			"dana".to_string(),
		)]));

		assert!(!form.is_bound());
		assert!(!form.is_valid());
		assert_eq!(form.value("username"), "dana");
	}
}
