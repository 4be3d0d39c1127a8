//! Text helpers.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// Convert text into a URL slug.
///
/// Lowercases, drops punctuation and joins words with `-`. With
/// `allow_unicode` false, non-ASCII characters are dropped too.
///
/// # Examples
///
/// ```
/// use oshot_web::utils::slugify;
///
/// assert_eq!(slugify("Why are the roads broken?", false), "why-are-the-roads-broken");
/// assert_eq!(slugify("תל אביב", true), "תל-אביב");
/// assert_eq!(slugify("תל אביב", false), "");
/// ```
pub fn slugify(text: &str, allow_unicode: bool) -> String {
	let text: String = if allow_unicode {
		text.to_string()
	} else {
		text.chars().filter(char::is_ascii).collect()
	};
	let lowered = text.to_lowercase();
	let cleaned = NON_WORD.replace_all(&lowered, "");
	let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
	joined.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("  Hello,  World!  ", "hello-world")]
	#[case("a -- b", "a-b")]
	#[case("post_q", "post_q")]
	#[case("---", "")]
	fn test_slugify_ascii(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(slugify(input, false), expected);
	}

	#[rstest]
	fn test_slugify_unicode_keeps_letters() {
		assert_eq!(slugify("מה עם הגנים?", true), "מה-עם-הגנים");
	}
}
