use bytes::Bytes;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::{HeaderMap, Method, Uri, Version};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{Error, Result};

/// HTTP Request representation
#[derive(Debug, Clone)]
pub struct Request {
	pub method: Method,
	pub uri: Uri,
	pub version: Version,
	pub headers: HeaderMap,
	pub body: Bytes,
	pub path_params: HashMap<String, String>,
	pub query_params: HashMap<String, String>,
	pub remote_addr: Option<SocketAddr>,
}

impl Request {
	pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
		let query_params = Self::parse_query_params(&uri);
		Self {
			method,
			uri,
			version,
			headers,
			body,
			path_params: HashMap::new(),
			query_params,
			remote_addr: None,
		}
	}

	/// Start building a request, mostly useful in tests.
	///
	/// # Examples
	///
	/// ```
	/// use oshot_web::Request;
	/// use hyper::Method;
	///
	/// let request = Request::builder()
	///     .method(Method::GET)
	///     .uri("/search/?q=school")
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(request.path(), "/search/");
	/// assert_eq!(request.query("q"), Some("school".to_string()));
	/// ```
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	fn parse_query_params(uri: &Uri) -> HashMap<String, String> {
		uri.query()
			.and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
			.map(|pairs| pairs.into_iter().collect())
			.unwrap_or_default()
	}

	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// Path plus query string, as used for `?next=` redirects.
	pub fn full_path(&self) -> String {
		match self.uri.query() {
			Some(q) => format!("{}?{}", self.uri.path(), q),
			None => self.uri.path().to_string(),
		}
	}

	/// Decoded query parameter, `None` when absent.
	pub fn query(&self, key: &str) -> Option<String> {
		self.query_params.get(key).cloned()
	}

	/// Path parameter captured by the router.
	pub fn path_param(&self, key: &str) -> Option<&str> {
		self.path_params.get(key).map(String::as_str)
	}

	/// Path parameter that must be present, 404 otherwise.
	pub fn require_path_param(&self, key: &str) -> Result<&str> {
		self.path_param(key)
			.ok_or_else(|| Error::NotFound(format!("missing path parameter `{}`", key)))
	}

	pub fn set_path_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.path_params.insert(key.into(), value.into());
	}

	/// Deserialize the query string into `T`.
	pub fn query_as<T: DeserializeOwned>(&self) -> Result<T> {
		serde_urlencoded::from_str(self.uri.query().unwrap_or(""))
			.map_err(|e| Error::BadRequest(e.to_string()))
	}

	/// Decode an `application/x-www-form-urlencoded` body into key/value pairs.
	pub fn form_data(&self) -> Result<Vec<(String, String)>> {
		if let Some(ct) = self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
			&& !ct.starts_with("application/x-www-form-urlencoded")
		{
			return Err(Error::BadRequest(format!("unsupported content type `{}`", ct)));
		}
		serde_urlencoded::from_bytes(&self.body).map_err(|e| Error::BadRequest(e.to_string()))
	}

	/// Value of a cookie sent by the client.
	///
	/// # Examples
	///
	/// ```
	/// use oshot_web::Request;
	///
	/// let request = Request::builder()
	///     .uri("/")
	///     .header("cookie", "sessionid=abc; messages=x")
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(request.cookie("sessionid"), Some("abc".to_string()));
	/// assert_eq!(request.cookie("csrftoken"), None);
	/// ```
	pub fn cookie(&self, name: &str) -> Option<String> {
		self.headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|h| h.to_str().ok())
			.flat_map(|h| h.split(';'))
			.filter_map(|pair| {
				let (k, v) = pair.trim().split_once('=')?;
				(k.trim() == name).then(|| percent_decode_str(v.trim()).decode_utf8_lossy().to_string())
			})
			.next()
	}

	pub fn is_post(&self) -> bool {
		self.method == Method::POST
	}
}

/// Builder for [`Request`]
#[derive(Debug)]
pub struct RequestBuilder {
	method: Method,
	uri: String,
	version: Version,
	headers: Vec<(String, String)>,
	body: Bytes,
}

impl Default for RequestBuilder {
	fn default() -> Self {
		Self {
			method: Method::GET,
			uri: "/".to_string(),
			version: Version::HTTP_11,
			headers: Vec::new(),
			body: Bytes::new(),
		}
	}
}

impl RequestBuilder {
	pub fn method(mut self, method: Method) -> Self {
		self.method = method;
		self
	}

	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = uri.into();
		self
	}

	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}

	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// POST a urlencoded form built from `pairs`.
	pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
		self.method = Method::POST;
		self.headers.push((
			CONTENT_TYPE.as_str().to_string(),
			"application/x-www-form-urlencoded".to_string(),
		));
		self.body = Bytes::from(serde_urlencoded::to_string(pairs).unwrap_or_default());
		self
	}

	pub fn build(self) -> Result<Request> {
		let uri: Uri = self
			.uri
			.parse()
			.map_err(|e: hyper::http::uri::InvalidUri| Error::BadRequest(e.to_string()))?;
		let mut headers = HeaderMap::new();
		for (name, value) in self.headers {
			let name = hyper::header::HeaderName::try_from(name.as_str())
				.map_err(|e| Error::BadRequest(e.to_string()))?;
			let value = hyper::header::HeaderValue::try_from(value.as_str())
				.map_err(|e| Error::BadRequest(e.to_string()))?;
			headers.append(name, value);
		}
		Ok(Request::new(self.method, uri, self.version, headers, self.body))
	}
}
