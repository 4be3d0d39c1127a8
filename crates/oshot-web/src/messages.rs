//! One-shot flash messages carried in a `messages` cookie.
//!
//! A view attaches messages to its (usually redirect) response; the next page
//! reads them with [`get_messages`]. [`MessagesMiddleware`] clears the cookie
//! once a non-redirect response has been served for them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::handler::{Handler, Middleware};
use crate::http::{Request, Response};

pub const MESSAGES_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
	Info,
	Success,
	Warning,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub level: Level,
	pub message: String,
}

/// Messages sent by the client, empty when the cookie is absent or garbled.
pub fn get_messages(request: &Request) -> Vec<Message> {
	request
		.cookie(MESSAGES_COOKIE)
		.and_then(|raw| serde_json::from_str(&raw).ok())
		.unwrap_or_default()
}

/// Queue `text` for the next page the client loads.
pub fn add_message(response: Response, level: Level, text: impl Into<String>) -> Response {
	let messages = vec![Message {
		level,
		message: text.into(),
	}];
	match serde_json::to_string(&messages) {
		Ok(encoded) => response.with_cookie(MESSAGES_COOKIE, &encoded, None),
		Err(err) => {
			tracing::warn!(error = %err, "could not encode flash message");
			response
		}
	}
}

pub fn success(response: Response, text: impl Into<String>) -> Response {
	add_message(response, Level::Success, text)
}

pub fn error(response: Response, text: impl Into<String>) -> Response {
	add_message(response, Level::Error, text)
}

/// Deletes a consumed `messages` cookie.
#[derive(Debug, Default)]
pub struct MessagesMiddleware;

#[async_trait]
impl Middleware for MessagesMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let had_messages = request.cookie(MESSAGES_COOKIE).is_some();
		let response = next.handle(request).await?;
		let sets_messages = response.cookies().iter().any(|(name, _)| name == MESSAGES_COOKIE);
		if had_messages && !sets_messages && !response.is_redirect() {
			return Ok(response.delete_cookie(MESSAGES_COOKIE));
		}
		Ok(response)
	}
}
