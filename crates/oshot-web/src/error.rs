//! Error types shared by handlers, models and commands.

use hyper::StatusCode;

use crate::http::Response;
use crate::mail::EmailError;
use crate::routing::ReverseError;
use crate::signals::SignalError;

/// Errors raised while serving a request.
///
/// Every variant maps onto an HTTP status through [`Error::status_code`], so a
/// view can simply return `Err(Error::NotFound(..))` and let the router turn it
/// into a response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Forbidden: {0}")]
	Forbidden(String),

	#[error("Bad request: {0}")]
	BadRequest(String),

	#[error("Method not allowed: {0}")]
	MethodNotAllowed(String),

	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migration(#[from] sqlx::migrate::MigrateError),

	#[error("Template error: {0}")]
	Template(#[from] tera::Error),

	#[error("Email error: {0}")]
	Mail(#[from] EmailError),

	#[error(transparent)]
	Reverse(#[from] ReverseError),

	#[error(transparent)]
	Signal(#[from] SignalError),

	#[error("Internal error: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// HTTP status this error is reported with.
	///
	/// # Examples
	///
	/// ```
	/// use oshot_web::Error;
	/// use hyper::StatusCode;
	///
	/// let err = Error::NotFound("No Entity matches the given query".into());
	/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
	/// ```
	pub fn status_code(&self) -> StatusCode {
		match self {
			Error::NotFound(_) => StatusCode::NOT_FOUND,
			Error::Forbidden(_) => StatusCode::FORBIDDEN,
			Error::BadRequest(_) => StatusCode::BAD_REQUEST,
			Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
			Error::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<Error> for Response {
	fn from(err: Error) -> Self {
		let status = err.status_code();
		if status.is_server_error() {
			tracing::error!(error = %err, "request failed");
			// Internals are not leaked to the client
			return Response::new(status).with_body("Internal Server Error");
		}
		Response::new(status).with_body(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Error::NotFound("x".into()), StatusCode::NOT_FOUND)]
	#[case(Error::Forbidden("x".into()), StatusCode::FORBIDDEN)]
	#[case(Error::BadRequest("x".into()), StatusCode::BAD_REQUEST)]
	#[case(Error::MethodNotAllowed("x".into()), StatusCode::METHOD_NOT_ALLOWED)]
	#[case(Error::Database(sqlx::Error::RowNotFound), StatusCode::NOT_FOUND)]
	#[case(Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
	fn test_status_code_mapping(#[case] err: Error, #[case] expected: StatusCode) {
		assert_eq!(err.status_code(), expected);
	}

	#[rstest]
	fn test_server_error_body_is_generic() {
		let response: Response = Error::Internal("db password leaked".into()).into();

		assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(response.body_text(), "Internal Server Error");
	}

	#[rstest]
	fn test_client_error_body_carries_message() {
		let response: Response = Error::Forbidden("Invalid invitation key".into()).into();

		assert_eq!(response.status, StatusCode::FORBIDDEN);
		assert!(response.body_text().contains("Invalid invitation key"));
	}
}
