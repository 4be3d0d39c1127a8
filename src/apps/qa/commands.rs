//! `send_emails`: the periodic digest of new and updated questions.
//!
//! Meant to run from cron. Each profile is mailed at most once per its
//! notification period, and only when the rendered digest has something
//! fresh in it. Inactive users whose invitation expired without ever getting
//! mail are sent the digest with an activation link instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use oshot_web::commands::{BaseCommand, CommandContext, CommandResult};
use oshot_web::mail::EmailMessage;
use oshot_web::{Result, reverse};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;

use super::models::{Question, QuestionOrder, QuestionSummary};
use crate::apps::user::models::{NEVER_SENT, Profile, RegistrationProfile, User};
use crate::apps::user::signals::HTML_ONLY_BODY;
use crate::state::AppState;

pub const DIGEST_TEMPLATE: &str = "qa/email_update.html";

static FRESH_CONTENT: Lazy<Regex> =
	Lazy::new(|| Regex::new("(new-content)|(updated-content)").expect("valid regex"));

/// What a digest run did, per username.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigestReport {
	pub sent: Vec<String>,
	pub nothing_fresh: Vec<String>,
	pub skipped: Vec<String>,
	pub failed: Vec<String>,
	/// Progress lines for the scheduler log
	pub lines: Vec<String>,
}

fn matches_filter(user: &User, filter: &[String]) -> bool {
	filter.is_empty()
		|| filter
			.iter()
			.any(|f| *f == user.username || f.eq_ignore_ascii_case(&user.email))
}

fn freshness(question: &QuestionSummary, last_sent: DateTime<Utc>) -> &'static str {
	if question.question.created_at > last_sent {
		"new"
	} else if question.question.updated_at > last_sent {
		"updated"
	} else {
		""
	}
}

fn digest_questions(questions: &[QuestionSummary], last_sent: DateTime<Utc>) -> Value {
	let items: Vec<Value> = questions
		.iter()
		.map(|q| {
			let mut item = json!(q);
			item["freshness"] = json!(freshness(q, last_sent));
			item
		})
		.collect();
	Value::Array(items)
}

/// Mail the digest to every profile that is due at `now`.
///
/// `filter` restricts the run to the given usernames or email addresses.
pub async fn send_updates(state: &AppState, filter: &[String], now: DateTime<Utc>) -> Result<DigestReport> {
	let mut report = DigestReport::default();
	report.lines.push(format!("> sending updates at {}", now));
	tracing::info!(%now, "sending updates");

	let questions = Question::all_ordered(&state.db, QuestionOrder::Updated).await?;
	let header = state.settings.email_update_header.clone();
	let subject = format!("{} | {}", state.settings.site_name, header.trim_end());

	for mut profile in Profile::all(&state.db).await? {
		let Some(mut user) = User::get(&state.db, profile.user_id).await? else {
			continue;
		};
		if !matches_filter(&user, filter) {
			continue;
		}
		let Some(frequency) = profile.email_notification.and_then(|p| p.frequency()) else {
			report.skipped.push(user.username);
			continue;
		};
		let last_sent = profile.last_email_update;

		let mut context = json!({
			"header": header,
			"footer": state.settings.email_footer,
			"site_name": state.settings.site_name,
			"ROOT_URL": state.root_url(),
			"user": user,
			"is_active": user.is_active,
			"last_sent": last_sent,
			"questions": digest_questions(&questions, last_sent),
		});

		if !user.is_active {
			let registration = RegistrationProfile::for_user(&state.db, user.id).await?;
			let invitation = registration.filter(|r| {
				!r.is_activated()
					&& r.activation_key_expired(&user, state.settings.account_activation_days, now)
					&& last_sent == *NEVER_SENT
			});
			let Some(registration) = invitation else {
				report.skipped.push(user.username);
				continue;
			};
			let activation_url = format!(
				"{}{}",
				state.root_url(),
				reverse("accept-invitation", &[&registration.activation_key])?
			);
			context["key"] = json!(registration.activation_key);
			context["activation_url"] = json!(activation_url);

			// a fresh date_joined gives the invitee another activation window
			user.date_joined = now;
			user.save(&state.db).await?;
		} else if now - last_sent < frequency {
			report.skipped.push(user.username);
			continue;
		}

		let html = state.templates.render(DIGEST_TEMPLATE, &context)?;
		if !FRESH_CONTENT.is_match(&html) {
			report.lines.push(format!(
				"--- nothing fresh for {} at {} is_active={}",
				user.username, user.email, user.is_active
			));
			report.nothing_fresh.push(user.username);
			continue;
		}

		let sent = match EmailMessage::builder()
			.from(&state.settings.default_from_email)
			.to(vec![user.email.clone()])
			.subject(&subject)
			.body(HTML_ONLY_BODY)
			.html(html)
			.build()
		{
			Ok(message) => state.mailer.send(&message).await,
			Err(err) => Err(err),
		};
		if let Err(err) = sent {
			tracing::error!(user = %user.username, error = %err, "digest not sent");
			report.failed.push(user.username);
			continue;
		}

		report.lines.push(format!(
			">>> sent update to {} at {} is_active={}",
			user.username, user.email, user.is_active
		));
		profile.last_email_update = now;
		profile.save(&state.db).await?;
		report.sent.push(user.username);
	}

	tracing::info!(
		sent = report.sent.len(),
		nothing_fresh = report.nothing_fresh.len(),
		skipped = report.skipped.len(),
		failed = report.failed.len(),
		"updates done"
	);
	Ok(report)
}

/// `manage send_emails [USERNAME_OR_EMAIL...]`
pub struct SendEmailsCommand {
	state: Arc<AppState>,
}

impl SendEmailsCommand {
	pub fn new(state: Arc<AppState>) -> Self {
		Self { state }
	}
}

#[async_trait]
impl BaseCommand for SendEmailsCommand {
	fn name(&self) -> &str {
		"send_emails"
	}

	fn description(&self) -> &str {
		"send email updates to users that want it"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let report = send_updates(&self.state, &ctx.args, Utc::now()).await?;
		for line in &report.lines {
			ctx.success(line);
		}
		if !report.failed.is_empty() {
			ctx.warning(&format!("failed to mail: {}", report.failed.join(", ")));
		}
		Ok(())
	}
}
