//! Tera template loading and rendering.
//!
//! Templates get a `url(name=..., args=[...])` function backed by
//! [`reverse`](crate::routing::reverse), so links follow the URL
//! configuration.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tera::{Context, Tera};

use crate::error::Result;
use crate::routing::reverse;

/// Loaded template set
#[derive(Debug, Clone)]
pub struct Templates {
	tera: Tera,
}

impl Templates {
	/// Load every `*.html` template below `dir`.
	pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
		let glob = format!("{}/**/*.html", dir.as_ref().display());
		let tera = Tera::new(&glob)?;
		tracing::debug!(
			count = tera.get_template_names().count(),
			"loaded templates from {}",
			glob
		);
		Ok(Self::with_tera(tera))
	}

	/// Build from raw `(name, source)` pairs.
	pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self> {
		let mut tera = Tera::default();
		tera.add_raw_templates(templates.to_vec())?;
		Ok(Self::with_tera(tera))
	}

	fn with_tera(mut tera: Tera) -> Self {
		tera.autoescape_on(vec![".html"]);
		tera.register_function("url", url_function);
		Self { tera }
	}

	/// Render `name` with a JSON object as context.
	pub fn render(&self, name: &str, context: &Value) -> Result<String> {
		let ctx = Context::from_value(context.clone())?;
		Ok(self.tera.render(name, &ctx)?)
	}

	pub fn has_template(&self, name: &str) -> bool {
		self.tera.get_template_names().any(|t| t == name)
	}
}

fn url_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let name = args
		.get("name")
		.and_then(Value::as_str)
		.ok_or_else(|| tera::Error::msg("url() requires a `name` argument"))?;
	let params: Vec<String> = match args.get("args") {
		Some(Value::Array(items)) => items
			.iter()
			.map(|v| match v {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			})
			.collect(),
		Some(Value::Null) | None => Vec::new(),
		Some(other) => vec![match other {
			Value::String(s) => s.clone(),
			v => v.to_string(),
		}],
	};
	let refs: Vec<&str> = params.iter().map(String::as_str).collect();
	reverse(name, &refs)
		.map(Value::String)
		.map_err(|e| tera::Error::msg(e.to_string()))
}
