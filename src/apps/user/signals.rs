//! Signal receivers of the user app.
//!
//! - `create_profile`: every new user gets a [`Profile`].
//! - `new_flag`: editors of a question's entity are mailed when it is flagged.

use oshot_web::mail::{EmailBackend, EmailMessage, validate_email};
use oshot_web::signals::{PostSave, SignalError};
use oshot_web::templates::Templates;
use serde_json::json;
use std::sync::Arc;

use super::models::{Profile, User};
use crate::apps::qa::models::{Question, QuestionFlag};
use crate::state::AppState;

pub const FLAG_SUBJECT: &str = "A question has been flagged";
pub const HTML_ONLY_BODY: &str = "Sorry, we only support html based email";

const FLAG_TEMPLATE: &str = "user/emails/editors_question_flagged.html";

/// Attach the receivers to the model signals of `state`.
pub fn connect(state: &AppState) {
	state
		.db
		.signals
		.user_post_save
		.connect_with_options(create_profile, Some("user.create_profile".to_string()), 0);

	let notifier = Arc::new(FlagNotifier {
		templates: state.templates.clone(),
		mailer: state.mailer.clone(),
		root_url: state.root_url().to_string(),
		from_email: state.settings.default_from_email.clone(),
	});
	state.db.signals.question_flag_post_save.connect_with_options(
		move |event: Arc<PostSave<QuestionFlag>>| {
			let notifier = notifier.clone();
			async move { notifier.new_flag(&event).await }
		},
		Some("user.new_flag".to_string()),
		0,
	);
}

pub async fn create_profile(event: Arc<PostSave<User>>) -> Result<(), SignalError> {
	if !event.created {
		return Ok(());
	}
	Profile::create_default(&event.pool, event.instance.id)
		.await
		.map_err(|e| SignalError::receiver_failed("create_profile", e))?;
	tracing::debug!(user = %event.instance.username, "profile created");
	Ok(())
}

/// Mails the editors of a flagged question's entity.
pub struct FlagNotifier {
	templates: Templates,
	mailer: Arc<dyn EmailBackend>,
	root_url: String,
	from_email: String,
}

impl FlagNotifier {
	pub async fn new_flag(&self, event: &PostSave<QuestionFlag>) -> Result<(), SignalError> {
		if !event.created {
			return Ok(());
		}
		let failed = |e: oshot_web::Error| SignalError::receiver_failed("new_flag", e);
		let flag = &event.instance;

		let Some(question) = Question::get(&event.pool, flag.question_id).await.map_err(failed)? else {
			return Ok(());
		};
		let reporter = User::get(&event.pool, flag.reporter_id).await.map_err(failed)?;

		let editors: Vec<String> = Profile::editor_emails(&event.pool, question.entity_id)
			.await
			.map_err(failed)?
			.into_iter()
			.filter(|email| match validate_email(email) {
				Ok(()) => true,
				Err(err) => {
					tracing::warn!(question = question.id, error = %err, "skipping editor address");
					false
				}
			})
			.collect();
		if editors.is_empty() {
			tracing::info!(question = question.id, "question flagged, entity has no editors");
			return Ok(());
		}

		let html = self
			.templates
			.render(
				FLAG_TEMPLATE,
				&json!({
					"question": question,
					"reporter": reporter,
					"ROOT_URL": self.root_url,
				}),
			)
			.map_err(failed)?;

		let message = EmailMessage::builder()
			.from(&self.from_email)
			.to(editors)
			.subject(FLAG_SUBJECT)
			.body(HTML_ONLY_BODY)
			.html(html)
			.build()
			.map_err(|e| SignalError::receiver_failed("new_flag", e))?;
		self.mailer
			.send(&message)
			.await
			.map_err(|e| SignalError::receiver_failed("new_flag", e))?;

		tracing::info!(question = question.id, recipients = message.to().len(), "editors notified of flag");
		Ok(())
	}
}
