//! Layered settings.
//!
//! Sources are merged in ascending priority, later keys overriding earlier
//! ones, and the result is deserialized into a typed settings struct.
//!
//! ```
//! use oshot_web::settings::{DefaultSource, EnvSource, SettingsBuilder};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct Settings { debug: bool, site_name: String }
//!
//! let settings: Settings = SettingsBuilder::new()
//!     .add_source(DefaultSource::new().with_value("debug", json!(false)).with_value("site_name", json!("Open Shot")))
//!     .add_source(EnvSource::from_vars("OSHOT_", vec![("OSHOT_DEBUG".to_string(), "1".to_string())]))
//!     .build()
//!     .unwrap()
//!     .into_typed()
//!     .unwrap();
//!
//! assert!(settings.debug);
//! assert_eq!(settings.site_name, "Open Shot");
//! ```

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("IO error reading {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Parse error in {0}: {1}")]
	Parse(String, String),

	#[error("Invalid settings: {0}")]
	Invalid(#[from] serde_json::Error),
}

/// A source of configuration values
pub trait ConfigSource: Send + Sync {
	fn load(&self) -> Result<Map<String, Value>, SettingsError>;

	/// Higher priority wins on conflicting keys.
	fn priority(&self) -> u8;

	fn description(&self) -> String;
}

/// Hard-coded defaults (lowest priority)
#[derive(Debug, Default)]
pub struct DefaultSource {
	values: Map<String, Value>,
}

impl DefaultSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_value(mut self, key: &str, value: Value) -> Self {
		self.values.insert(key.to_string(), value);
		self
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<Map<String, Value>, SettingsError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"defaults".to_string()
	}
}

/// A TOML file
#[derive(Debug)]
pub struct TomlFileSource {
	path: PathBuf,
	required: bool,
	priority: u8,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
			priority: 50,
		}
	}

	/// A missing file loads as empty instead of failing.
	pub fn optional(mut self) -> Self {
		self.required = false;
		self
	}

	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = priority;
		self
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<Map<String, Value>, SettingsError> {
		let display = self.path.display().to_string();
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound && !self.required => {
				return Ok(Map::new());
			}
			Err(source) => {
				return Err(SettingsError::Io {
					path: display,
					source,
				});
			}
		};
		let table: toml::Table =
			toml::from_str(&content).map_err(|e| SettingsError::Parse(display.clone(), e.to_string()))?;
		match serde_json::to_value(table)? {
			Value::Object(map) => Ok(map),
			_ => Err(SettingsError::Parse(display, "top level is not a table".to_string())),
		}
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn description(&self) -> String {
		format!("toml file {}", self.path.display())
	}
}

/// Environment variables sharing a prefix, e.g. `OSHOT_DATABASE_URL`.
///
/// Keys lose the prefix and are lowercased. Values stay strings; the builder
/// converts them when a lower priority source set the key to a number or a
/// boolean.
#[derive(Debug)]
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
			vars: None,
		}
	}

	/// Read from the given pairs instead of the process environment.
	pub fn from_vars(prefix: impl Into<String>, vars: Vec<(String, String)>) -> Self {
		Self {
			prefix: prefix.into(),
			vars: Some(vars),
		}
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<Map<String, Value>, SettingsError> {
		let vars = match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		};
		let mut config = Map::new();
		for (key, value) in vars {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			config.insert(clean_key.to_lowercase(), Value::String(value));
		}
		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("environment variables {}*", self.prefix)
	}
}

/// Collects sources and merges them
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	pub fn build(mut self) -> Result<MergedSettings, SettingsError> {
		// Stable sort keeps insertion order among equal priorities
		self.sources.sort_by_key(|s| s.priority());
		let mut values = Map::new();
		for source in &self.sources {
			let loaded = source.load()?;
			tracing::debug!(source = %source.description(), keys = loaded.len(), "loaded settings source");
			for (key, value) in loaded {
				let value = match values.get(&key) {
					Some(existing) => coerce_like(existing, value),
					None => value,
				};
				values.insert(key, value);
			}
		}
		Ok(MergedSettings { values })
	}
}

/// Convert a string override to the type of the value it replaces.
///
/// Strings that do not parse are kept, so deserialization reports the key.
fn coerce_like(existing: &Value, incoming: Value) -> Value {
	let Value::String(raw) = &incoming else {
		return incoming;
	};
	let raw = raw.trim();
	match existing {
		Value::Bool(_) => match raw.to_lowercase().as_str() {
			"true" | "1" | "yes" | "on" => Value::Bool(true),
			"false" | "0" | "no" | "off" => Value::Bool(false),
			_ => incoming,
		},
		Value::Number(n) if n.is_i64() || n.is_u64() => raw.parse::<i64>().map(Value::from).unwrap_or(incoming),
		Value::Number(_) => raw.parse::<f64>().map(Value::from).unwrap_or(incoming),
		_ => incoming,
	}
}

/// Result of merging every source
#[derive(Debug, Clone)]
pub struct MergedSettings {
	values: Map<String, Value>,
}

impl MergedSettings {
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, SettingsError> {
		Ok(serde_json::from_value(Value::Object(self.values))?)
	}
}
