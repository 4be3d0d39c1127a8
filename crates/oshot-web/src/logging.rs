//! Logging setup and request logging.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::Result;
use crate::handler::{Handler, Middleware};
use crate::http::{Request, Response};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive` when set. Calling this twice is a
/// no-op.
pub fn init(default_directive: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
	let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Logs method, path, status and latency of every request.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
		let method = request.method.clone();
		let path = request.full_path();
		let started = Instant::now();

		let result = next.handle(request).await;
		let elapsed_ms = started.elapsed().as_millis() as u64;

		match &result {
			Ok(response) if response.status.is_server_error() => {
				tracing::error!(%method, %path, status = response.status.as_u16(), elapsed_ms, "request");
			}
			Ok(response) => {
				tracing::info!(%method, %path, status = response.status.as_u16(), elapsed_ms, "request");
			}
			Err(err) => {
				tracing::error!(%method, %path, error = %err, elapsed_ms, "request failed");
			}
		}
		result
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::{MiddlewareChain, handler_fn};
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_logging_middleware_passes_response_through() {
		init("debug");
		let chain = MiddlewareChain::new(handler_fn(|_| async { Ok(Response::not_found()) }))
			.with_middleware(Arc::new(LoggingMiddleware));

		let response = chain
			.handle(Request::builder().uri("/missing/").build().unwrap())
			.await
			.unwrap();

		assert_eq!(response.status, hyper::StatusCode::NOT_FOUND);
	}
}
