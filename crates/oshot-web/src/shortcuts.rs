//! View shortcuts: 404 lookups, redirects and template rendering.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::Response;
use crate::routing::reverse;
use crate::templates::Templates;

/// Characters escaped in the `next` query parameter
const NEXT_PARAM: &AsciiSet = &NON_ALPHANUMERIC.remove(b'/').remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Unwrap a lookup result or fail with 404.
///
/// # Examples
///
/// ```
/// use oshot_web::shortcuts::get_or_404;
///
/// let found: Result<Option<i64>, sqlx::Error> = Ok(Some(3));
/// assert_eq!(get_or_404(found, "Entity").unwrap(), 3);
///
/// let missing: Result<Option<i64>, sqlx::Error> = Ok(None);
/// assert!(get_or_404(missing, "Entity").is_err());
/// ```
pub fn get_or_404<T, E>(result: std::result::Result<Option<T>, E>, model: &str) -> Result<T>
where
	E: Into<Error>,
{
	match result {
		Ok(Some(obj)) => Ok(obj),
		Ok(None) => Err(Error::NotFound(format!("No {} matches the given query.", model))),
		Err(e) => Err(e.into()),
	}
}

/// 302 to a literal path.
pub fn redirect(to: impl AsRef<str>) -> Response {
	Response::temporary_redirect(to)
}

/// 302 to a named route.
pub fn redirect_to(name: &str, args: &[&str]) -> Result<Response> {
	Ok(redirect(reverse(name, args)?))
}

/// 302 to the login page, coming back to `next` afterwards.
///
/// # Examples
///
/// ```
/// use oshot_web::shortcuts::redirect_to_login;
///
/// let response = redirect_to_login("/login/", "/profile/edit/");
/// assert_eq!(response.location(), Some("/login/?next=/profile/edit/"));
/// ```
pub fn redirect_to_login(login_url: &str, next: &str) -> Response {
	let next = utf8_percent_encode(next, NEXT_PARAM);
	let separator = if login_url.contains('?') { '&' } else { '?' };
	redirect(format!("{}{}next={}", login_url, separator, next))
}

/// Only local absolute paths are followed after login.
pub fn is_safe_redirect(target: &str) -> bool {
	target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Render a template into a 200 HTML response.
pub fn render(templates: &Templates, template_name: &str, context: Value) -> Result<Response> {
	let html = templates.render(template_name, &context)?;
	Ok(Response::ok()
		.with_html(html)
		.with_template(template_name, context))
}
