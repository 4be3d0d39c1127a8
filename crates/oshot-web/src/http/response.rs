use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use hyper::{HeaderMap, StatusCode};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in cookie values
const COOKIE_VALUE: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b',')
	.add(b';')
	.add(b'\\')
	.add(b'%');

/// HTTP Response representation
///
/// Rendered responses also keep the template name and the context they were
/// rendered with, so tests can assert on what a view produced without parsing
/// HTML.
#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub headers: HeaderMap,
	pub body: Bytes,
	pub template_name: Option<String>,
	pub context: Option<serde_json::Value>,
}

impl Response {
	/// Create a new Response with the given status code
	///
	/// # Examples
	///
	/// ```
	/// use oshot_web::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::new(StatusCode::OK);
	/// assert_eq!(response.status, StatusCode::OK);
	/// assert!(response.body.is_empty());
	/// ```
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
			template_name: None,
			context: None,
		}
	}

	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	pub fn bad_request() -> Self {
		Self::new(StatusCode::BAD_REQUEST)
	}

	pub fn forbidden() -> Self {
		Self::new(StatusCode::FORBIDDEN)
	}

	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	pub fn method_not_allowed() -> Self {
		Self::new(StatusCode::METHOD_NOT_ALLOWED)
	}

	pub fn internal_server_error() -> Self {
		Self::new(StatusCode::INTERNAL_SERVER_ERROR)
	}

	/// Create a Response with HTTP 301 Moved Permanently (permanent redirect)
	pub fn permanent_redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::MOVED_PERMANENTLY).with_location(location.as_ref())
	}

	/// Create a Response with HTTP 302 Found (temporary redirect)
	///
	/// # Examples
	///
	/// ```
	/// use oshot_web::Response;
	/// use hyper::StatusCode;
	///
	/// let response = Response::temporary_redirect("/login/?next=/profile/edit/");
	/// assert_eq!(response.status, StatusCode::FOUND);
	/// assert_eq!(response.location(), Some("/login/?next=/profile/edit/"));
	/// ```
	pub fn temporary_redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::FOUND).with_location(location.as_ref())
	}

	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Set an HTML body along with its content type.
	pub fn with_html(self, html: impl Into<String>) -> Self {
		self.with_header(CONTENT_TYPE.as_str(), "text/html; charset=utf-8")
			.with_body(html.into())
	}

	/// Add a header; invalid names or values are dropped.
	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let Ok(header_name) = hyper::header::HeaderName::from_bytes(name.as_bytes())
			&& let Ok(header_value) = hyper::header::HeaderValue::from_str(value)
		{
			self.headers.append(header_name, header_value);
		}
		self
	}

	pub fn with_location(self, location: &str) -> Self {
		self.with_header(LOCATION.as_str(), location)
	}

	/// Attach a `Set-Cookie` header scoped to the whole site.
	///
	/// A `max_age` of zero deletes the cookie.
	pub fn with_cookie(self, name: &str, value: &str, max_age: Option<i64>) -> Self {
		let mut cookie = format!(
			"{}={}; Path=/; HttpOnly; SameSite=Lax",
			name,
			utf8_percent_encode(value, COOKIE_VALUE)
		);
		if let Some(age) = max_age {
			cookie.push_str(&format!("; Max-Age={}", age));
		}
		self.with_header(SET_COOKIE.as_str(), &cookie)
	}

	pub fn delete_cookie(self, name: &str) -> Self {
		self.with_cookie(name, "", Some(0))
	}

	/// Record the template and context a view rendered.
	pub fn with_template(mut self, name: impl Into<String>, context: serde_json::Value) -> Self {
		self.template_name = Some(name.into());
		self.context = Some(context);
		self
	}

	pub fn location(&self) -> Option<&str> {
		self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
	}

	/// Raw `name=value` pairs of every cookie this response sets.
	pub fn cookies(&self) -> Vec<(String, String)> {
		self.headers
			.get_all(SET_COOKIE)
			.iter()
			.filter_map(|v| v.to_str().ok())
			.filter_map(|v| {
				let pair = v.split(';').next()?;
				let (name, value) = pair.split_once('=')?;
				Some((name.to_string(), value.to_string()))
			})
			.collect()
	}

	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).to_string()
	}

	pub fn is_redirect(&self) -> bool {
		self.status.is_redirection()
	}
}
