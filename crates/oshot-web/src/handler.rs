//! Handler and middleware traits.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::http::{Request, Response};

/// Handler trait for processing requests
#[async_trait]
pub trait Handler: Send + Sync {
	async fn handle(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request) -> Result<Response> {
		(**self).handle(request).await
	}
}

/// Middleware trait for request/response processing
#[async_trait]
pub trait Middleware: Send + Sync {
	async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response>;
}

/// Wraps a handler with middlewares; the first one added runs outermost.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request) -> Result<Response> {
		let mut current: Arc<dyn Handler> = self.handler.clone();
		for middleware in self.middlewares.iter().rev() {
			current = Arc::new(ComposedHandler {
				middleware: middleware.clone(),
				next: current,
			});
		}
		current.handle(request).await
	}
}

struct ComposedHandler {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ComposedHandler {
	async fn handle(&self, request: Request) -> Result<Response> {
		self.middleware.process(request, self.next.clone()).await
	}
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
	F: Fn(Request) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Response>> + Send,
{
	async fn handle(&self, request: Request) -> Result<Response> {
		(self.0)(request).await
	}
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
	F: Fn(Request) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	Arc::new(FnHandler(f))
}

/// Binds shared state to a view function of the form `async fn(Request, Arc<S>)`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use oshot_web::{Request, Response, Result, with_state};
///
/// struct State { greeting: String }
///
/// async fn hello(_req: Request, state: Arc<State>) -> Result<Response> {
///     Ok(Response::ok().with_body(state.greeting.clone()))
/// }
///
/// let handler = with_state(Arc::new(State { greeting: "hi".into() }), hello);
/// ```
pub fn with_state<S, F, Fut>(state: Arc<S>, view: F) -> Arc<dyn Handler>
where
	S: Send + Sync + 'static,
	F: Fn(Request, Arc<S>) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<Response>> + Send + 'static,
{
	handler_fn(move |request| view(request, state.clone()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use rstest::rstest;

	struct Recorder {
		name: &'static str,
		log: Arc<Mutex<Vec<String>>>,
	}

	#[async_trait]
	impl Middleware for Recorder {
		async fn process(&self, request: Request, next: Arc<dyn Handler>) -> Result<Response> {
			self.log.lock().push(format!("{} before", self.name));
			let response = next.handle(request).await;
			self.log.lock().push(format!("{} after", self.name));
			response
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_middleware_order() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let inner = log.clone();
		let handler = handler_fn(move |_req| {
			let inner = inner.clone();
			async move {
				inner.lock().push("handler".to_string());
				Ok(Response::ok())
			}
		});
		let chain = MiddlewareChain::new(handler)
			.with_middleware(Arc::new(Recorder { name: "outer", log: log.clone() }))
			.with_middleware(Arc::new(Recorder { name: "inner", log: log.clone() }));

		let response = chain.handle(Request::builder().build().unwrap()).await.unwrap();

		assert_eq!(response.status, hyper::StatusCode::OK);
		assert_eq!(
			*log.lock(),
			vec!["outer before", "inner before", "handler", "inner after", "outer after"]
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_with_state_passes_state() {
		async fn view(_req: Request, state: Arc<String>) -> Result<Response> {
			Ok(Response::ok().with_body(state.to_string()))
		}
		let handler = with_state(Arc::new("open shot".to_string()), view);

		let response = handler.handle(Request::builder().build().unwrap()).await.unwrap();

		assert_eq!(response.body_text(), "open shot");
	}
}
