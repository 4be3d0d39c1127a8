//! Email messages and delivery backends.
//!
//! ## Backends
//!
//! - [`ConsoleBackend`]: prints messages to stdout (development)
//! - [`MemoryBackend`]: keeps messages in memory (tests)
//! - [`SmtpBackend`]: delivers through `lettre`'s async SMTP transport
//!
//! ```
//! use oshot_web::mail::{EmailMessage, MemoryBackend, EmailBackend};
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! let message = EmailMessage::builder()
//!     .from("noreply@oshot.example")
//!     .to(vec!["dana@example.com".to_string()])
//!     .subject("Hello")
//!     .body("Sorry, we only support html based email")
//!     .html("<p>Hello</p>")
//!     .build()
//!     .unwrap();
//!
//! backend.send(&message).await.unwrap();
//! assert_eq!(backend.count(), 1);
//! # });
//! ```

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
	#[error("Invalid email address: {0}")]
	InvalidAddress(String),

	#[error("Missing required field: {0}")]
	MissingField(String),

	#[error("Header injection attempt detected: {0}")]
	HeaderInjection(String),

	#[error("Backend error: {0}")]
	BackendError(String),

	#[error("SMTP error: {0}")]
	SmtpError(String),
}

pub type EmailResult<T> = std::result::Result<T, EmailError>;

/// An outgoing email with an optional HTML alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
	subject: String,
	body: String,
	from_email: String,
	to: Vec<String>,
	html_body: Option<String>,
}

impl EmailMessage {
	pub fn builder() -> EmailMessageBuilder {
		EmailMessageBuilder::default()
	}

	pub fn subject(&self) -> &str {
		&self.subject
	}

	pub fn body(&self) -> &str {
		&self.body
	}

	pub fn from_email(&self) -> &str {
		&self.from_email
	}

	pub fn to(&self) -> &[String] {
		&self.to
	}

	pub fn html_body(&self) -> Option<&str> {
		self.html_body.as_deref()
	}

	fn to_lettre(&self) -> EmailResult<Message> {
		let mailbox = |addr: &str| {
			addr.parse::<Mailbox>()
				.map_err(|_| EmailError::InvalidAddress(addr.to_string()))
		};
		let mut builder = Message::builder()
			.from(mailbox(&self.from_email)?)
			.subject(self.subject.clone());
		for to in &self.to {
			builder = builder.to(mailbox(to)?);
		}
		let message = match &self.html_body {
			Some(html) => builder.multipart(MultiPart::alternative_plain_html(
				self.body.clone(),
				html.clone(),
			)),
			None => builder.header(ContentType::TEXT_PLAIN).body(self.body.clone()),
		};
		message.map_err(|e| EmailError::BackendError(e.to_string()))
	}
}

#[derive(Debug, Default)]
pub struct EmailMessageBuilder {
	subject: String,
	body: String,
	from_email: String,
	to: Vec<String>,
	html_body: Option<String>,
}

impl EmailMessageBuilder {
	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();
		self
	}

	pub fn body(mut self, body: impl Into<String>) -> Self {
		self.body = body.into();
		self
	}

	pub fn from(mut self, from: impl Into<String>) -> Self {
		self.from_email = from.into();
		self
	}

	pub fn to(mut self, to: Vec<String>) -> Self {
		self.to = to;
		self
	}

	/// Attach an HTML alternative to the plain-text body.
	pub fn html(mut self, html: impl Into<String>) -> Self {
		self.html_body = Some(html.into());
		self
	}

	/// Validate addresses and headers, then build the message.
	pub fn build(self) -> EmailResult<EmailMessage> {
		if self.to.is_empty() {
			return Err(EmailError::MissingField("to".into()));
		}
		if !self.from_email.is_empty() {
			validate_email(&self.from_email)?;
		}
		for addr in &self.to {
			validate_email(addr)?;
		}
		if self.subject.contains(['\r', '\n']) {
			return Err(EmailError::HeaderInjection(self.subject));
		}

		Ok(EmailMessage {
			subject: self.subject,
			body: self.body,
			from_email: self.from_email,
			to: self.to,
			html_body: self.html_body,
		})
	}
}

/// Check that `addr` looks deliverable: `local@domain.tld`, no whitespace.
pub fn validate_email(addr: &str) -> EmailResult<()> {
	let valid = match addr.rsplit_once('@') {
		Some((local, domain)) => {
			!local.is_empty()
				&& domain.contains('.')
				&& !domain.starts_with('.')
				&& !domain.ends_with('.')
				&& !addr.chars().any(|c| c.is_whitespace() || c.is_control())
		}
		None => false,
	};
	if valid {
		Ok(())
	} else {
		Err(EmailError::InvalidAddress(addr.to_string()))
	}
}

/// Delivery backend
#[async_trait]
pub trait EmailBackend: Send + Sync {
	/// Send every message, returning how many were delivered.
	async fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize>;

	async fn send(&self, message: &EmailMessage) -> EmailResult<usize> {
		self.send_messages(std::slice::from_ref(message)).await
	}
}

/// Writes messages to stdout.
#[derive(Debug, Default)]
pub struct ConsoleBackend;

#[async_trait]
impl EmailBackend for ConsoleBackend {
	async fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		for message in messages {
			println!("From: {}", message.from_email);
			println!("To: {}", message.to.join(", "));
			println!("Subject: {}", message.subject);
			println!();
			println!("{}", message.body);
			if let Some(html) = &message.html_body {
				println!("---- text/html ----");
				println!("{}", html);
			}
			println!("{}", "-".repeat(79));
		}
		Ok(messages.len())
	}
}

/// Keeps sent messages in memory for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
	outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn messages(&self) -> Vec<EmailMessage> {
		self.outbox.lock().clone()
	}

	pub fn count(&self) -> usize {
		self.outbox.lock().len()
	}

	pub fn clear(&self) {
		self.outbox.lock().clear();
	}
}

#[async_trait]
impl EmailBackend for MemoryBackend {
	async fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		self.outbox.lock().extend_from_slice(messages);
		Ok(messages.len())
	}
}

/// SMTP connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
	pub host: String,
	pub port: u16,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub password: Option<String>,
	/// STARTTLS when true, plain connection otherwise
	#[serde(default)]
	pub use_tls: bool,
}

/// Delivers through an SMTP relay.
pub struct SmtpBackend {
	transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpBackend {
	pub fn new(config: &SmtpConfig) -> EmailResult<Self> {
		let mut builder = if config.use_tls {
			AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
				.map_err(|e| EmailError::SmtpError(e.to_string()))?
		} else {
			AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
		}
		.port(config.port);

		if let (Some(user), Some(pass)) = (&config.username, &config.password) {
			builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
		}

		Ok(Self {
			transport: builder.build(),
		})
	}
}

#[async_trait]
impl EmailBackend for SmtpBackend {
	async fn send_messages(&self, messages: &[EmailMessage]) -> EmailResult<usize> {
		let mut sent = 0;
		for message in messages {
			let email = message.to_lettre()?;
			self.transport
				.send(email)
				.await
				.map_err(|e| EmailError::SmtpError(e.to_string()))?;
			sent += 1;
		}
		Ok(sent)
	}
}

/// Pick a backend by name: `console`, `memory` or `smtp`.
pub fn backend_from_settings(name: &str, smtp: &SmtpConfig) -> EmailResult<Arc<dyn EmailBackend>> {
	match name {
		"console" => Ok(Arc::new(ConsoleBackend)),
		"memory" => Ok(Arc::new(MemoryBackend::new())),
		"smtp" => Ok(Arc::new(SmtpBackend::new(smtp)?)),
		other => Err(EmailError::BackendError(format!("unknown email backend `{}`", other))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn message() -> EmailMessageBuilder {
		EmailMessage::builder()
			.from("noreply@oshot.example")
			.to(vec!["editor@example.com".to_string()])
			.subject("A question has been flagged")
			.body("Sorry, we only support html based email")
	}

	#[rstest]
	#[case("not-an-address")]
	#[case("a@b")]
	#[case("a b@example.com")]
	fn test_invalid_recipient_is_rejected(#[case] addr: &str) {
		let err = message().to(vec![addr.to_string()]).build().unwrap_err();

		assert!(matches!(err, EmailError::InvalidAddress(a) if a == addr));
	}

	#[rstest]
	fn test_subject_header_injection() {
		let err = message().subject("Hi\r\nBcc: x@example.com").build().unwrap_err();

		assert!(matches!(err, EmailError::HeaderInjection(_)));
	}

	#[rstest]
	fn test_missing_recipients() {
		let err = message().to(vec![]).build().unwrap_err();

		assert!(matches!(err, EmailError::MissingField(f) if f == "to"));
	}

	#[rstest]
	fn test_html_alternative_becomes_multipart() {
		let email = message().html("<p>flagged</p>").build().unwrap();

		let raw = String::from_utf8(email.to_lettre().unwrap().formatted()).unwrap();

		assert!(raw.contains("multipart/alternative"));
		assert!(raw.contains("text/html"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_memory_backend_collects() {
		let backend = MemoryBackend::new();
		let email = message().build().unwrap();

		let sent = backend.send_messages(&[email.clone(), email]).await.unwrap();

		assert_eq!(sent, 2);
		assert_eq!(backend.count(), 2);
		assert_eq!(backend.messages()[0].subject(), "A question has been flagged");
		backend.clear();
		assert_eq!(backend.count(), 0);
	}

	#[rstest]
	fn test_unknown_backend_name() {
		let smtp = SmtpConfig {
			host: "localhost".into(),
			port: 25,
			username: None,
			password: None,
			use_tls: false,
		};

		assert!(backend_from_settings("carrier-pigeon", &smtp).is_err());
		assert!(backend_from_settings("console", &smtp).is_ok());
	}
}
