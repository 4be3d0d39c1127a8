//! URL routing and reversing.
//!
//! Patterns are plain paths with `{name}` placeholders for whole segments,
//! e.g. `/user/{username}/`. Every named route is also recorded in a
//! process-wide table so templates, views and commands can build URLs with
//! [`reverse`].

use async_trait::async_trait;
use hyper::Method;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::http::{Request, Response};

/// Characters escaped inside a path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'{')
	.add(b'}')
	.add(b'/')
	.add(b'%');

static URL_NAMES: Lazy<RwLock<HashMap<String, RoutePattern>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReverseError {
	#[error("Reverse for '{0}' not found")]
	NoMatch(String),

	#[error("Reverse for '{name}' expects {expected} argument(s), got {got}")]
	ArgumentCount {
		name: String,
		expected: usize,
		got: usize,
	},
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Param(String),
}

#[derive(Debug, Clone)]
struct RoutePattern {
	segments: Vec<Segment>,
	trailing_slash: bool,
}

impl RoutePattern {
	fn parse(path: &str) -> Self {
		let segments = path
			.split('/')
			.filter(|s| !s.is_empty())
			.map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
				Some(name) => Segment::Param(name.to_string()),
				None => Segment::Literal(s.to_string()),
			})
			.collect();
		Self {
			segments,
			trailing_slash: path.ends_with('/') && path != "/",
		}
	}

	fn param_count(&self) -> usize {
		self.segments
			.iter()
			.filter(|s| matches!(s, Segment::Param(_)))
			.count()
	}

	fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
		let trailing = path.ends_with('/') && path != "/";
		if trailing != self.trailing_slash {
			return None;
		}
		let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
		if parts.len() != self.segments.len() {
			return None;
		}
		let mut params = HashMap::new();
		for (segment, part) in self.segments.iter().zip(parts) {
			let decoded = percent_decode_str(part).decode_utf8_lossy();
			match segment {
				Segment::Literal(lit) if *lit == decoded => {}
				Segment::Literal(_) => return None,
				Segment::Param(name) => {
					params.insert(name.clone(), decoded.to_string());
				}
			}
		}
		Some(params)
	}

	fn build(&self, args: &[&str]) -> String {
		let mut args = args.iter();
		let mut url = String::new();
		for segment in &self.segments {
			url.push('/');
			match segment {
				Segment::Literal(lit) => url.push_str(lit),
				Segment::Param(_) => {
					let value = args.next().copied().unwrap_or_default();
					url.push_str(&utf8_percent_encode(value, PATH_SEGMENT).to_string());
				}
			}
		}
		if self.trailing_slash || url.is_empty() {
			url.push('/');
		}
		url
	}
}

/// Build the URL of a named route from positional arguments.
///
/// # Examples
///
/// ```
/// use oshot_web::{Router, handler_fn, reverse, Response};
///
/// let mut router = Router::new();
/// router.get("public-profile", "/user/{username}/", handler_fn(|_| async { Ok(Response::ok()) }));
///
/// assert_eq!(reverse("public-profile", &["dana"]).unwrap(), "/user/dana/");
/// ```
pub fn reverse(name: &str, args: &[&str]) -> std::result::Result<String, ReverseError> {
	let names = URL_NAMES.read();
	let pattern = names
		.get(name)
		.ok_or_else(|| ReverseError::NoMatch(name.to_string()))?;
	let expected = pattern.param_count();
	if expected != args.len() {
		return Err(ReverseError::ArgumentCount {
			name: name.to_string(),
			expected,
			got: args.len(),
		});
	}
	Ok(pattern.build(args))
}

struct Route {
	pattern: RoutePattern,
	handlers: HashMap<Method, Arc<dyn Handler>>,
}

/// Method-aware router.
///
/// Unknown paths give 404, known paths with the wrong method give 405, and a
/// path missing its trailing slash is redirected (301) when the slashed form
/// exists. Errors returned by views are converted to responses here.
#[derive(Default)]
pub struct Router {
	routes: Vec<Route>,
}

impl Router {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `handler` for `method` on `path` under `name`.
	pub fn route(&mut self, name: &str, path: &str, method: Method, handler: Arc<dyn Handler>) -> &mut Self {
		let pattern = RoutePattern::parse(path);
		URL_NAMES.write().insert(name.to_string(), pattern.clone());

		match self
			.routes
			.iter_mut()
			.find(|r| r.pattern.segments == pattern.segments && r.pattern.trailing_slash == pattern.trailing_slash)
		{
			Some(route) => {
				route.handlers.insert(method, handler);
			}
			None => self.routes.push(Route {
				pattern,
				handlers: HashMap::from([(method, handler)]),
			}),
		}
		self
	}

	pub fn get(&mut self, name: &str, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
		self.route(name, path, Method::GET, handler)
	}

	pub fn post(&mut self, name: &str, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
		self.route(name, path, Method::POST, handler)
	}

	/// Same handler for GET and POST; the view branches on the method.
	pub fn get_post(&mut self, name: &str, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
		self.route(name, path, Method::GET, handler.clone());
		self.route(name, path, Method::POST, handler)
	}

	fn resolve(&self, path: &str) -> Option<(&Route, HashMap<String, String>)> {
		self.routes
			.iter()
			.find_map(|route| route.pattern.matches(path).map(|params| (route, params)))
	}

	async fn dispatch(&self, mut request: Request) -> Result<Response> {
		let path = request.path().to_string();
		let Some((route, params)) = self.resolve(&path) else {
			if !path.ends_with('/') && self.resolve(&format!("{}/", path)).is_some() {
				let target = match request.uri.query() {
					Some(q) => format!("{}/?{}", path, q),
					None => format!("{}/", path),
				};
				return Ok(Response::permanent_redirect(target));
			}
			return Err(Error::NotFound(format!("no route for {}", path)));
		};

		let method = if request.method == Method::HEAD {
			Method::GET
		} else {
			request.method.clone()
		};
		let handler = route
			.handlers
			.get(&method)
			.ok_or_else(|| Error::MethodNotAllowed(request.method.to_string()))?;

		for (key, value) in params {
			request.set_path_param(key, value);
		}
		handler.handle(request).await
	}
}

#[async_trait]
impl Handler for Router {
	async fn handle(&self, request: Request) -> Result<Response> {
		Ok(self.dispatch(request).await.unwrap_or_else(Response::from))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::handler_fn;
	use hyper::StatusCode;
	use rstest::{fixture, rstest};

	fn echo_param(name: &'static str) -> Arc<dyn Handler> {
		handler_fn(move |req: Request| async move {
			Ok(Response::ok().with_body(req.path_param(name).unwrap_or("").to_string()))
		})
	}

	#[fixture]
	fn router() -> Router {
		let mut router = Router::new();
		router
			.get("test-home", "/", handler_fn(|_| async { Ok(Response::ok().with_body("home")) }))
			.get("test-candidates", "/test/candidates/{entity_slug}/", echo_param("entity_slug"))
			.post("test-flag", "/test/q/{question_id}/flag/", echo_param("question_id"))
			.get("test-missing", "/test/missing/", handler_fn(|_| async {
				Err(Error::NotFound("No User matches the given query".into()))
			}));
		router
	}

	async fn call(router: &Router, method: Method, uri: &str) -> Response {
		let request = Request::builder().method(method).uri(uri).build().unwrap();
		router.handle(request).await.unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_path_params_are_decoded(router: Router) {
		let response = call(&router, Method::GET, "/test/candidates/%D7%AA%D7%9C-%D7%90%D7%91%D7%99%D7%91/").await;

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(response.body_text(), "תל-אביב");
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_path_is_404(router: Router) {
		let response = call(&router, Method::GET, "/nowhere/").await;

		assert_eq!(response.status, StatusCode::NOT_FOUND);
	}

	#[rstest]
	#[tokio::test]
	async fn test_wrong_method_is_405(router: Router) {
		let response = call(&router, Method::GET, "/test/q/3/flag/").await;

		assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_slash_redirects(router: Router) {
		let response = call(&router, Method::GET, "/test/candidates/haifa?page=2").await;

		assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
		assert_eq!(response.location(), Some("/test/candidates/haifa/?page=2"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_view_errors_become_responses(router: Router) {
		let response = call(&router, Method::GET, "/test/missing/").await;

		assert_eq!(response.status, StatusCode::NOT_FOUND);
	}

	#[rstest]
	fn test_reverse(_router: Router) {
		assert_eq!(reverse("test-home", &[]).unwrap(), "/");
		assert_eq!(
			reverse("test-candidates", &["תל אביב"]).unwrap(),
			"/test/candidates/%D7%AA%D7%9C%20%D7%90%D7%91%D7%99%D7%91/"
		);
		assert_eq!(
			reverse("test-flag", &[]),
			Err(ReverseError::ArgumentCount {
				name: "test-flag".into(),
				expected: 1,
				got: 0
			})
		);
		assert_eq!(
			reverse("test-nope", &[]),
			Err(ReverseError::NoMatch("test-nope".into()))
		);
	}
}
