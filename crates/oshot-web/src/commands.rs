//! Management commands.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
	#[error("Invalid arguments: {0}")]
	InvalidArguments(String),

	#[error("Unknown command: {0}")]
	NotFound(String),

	#[error("Command failed: {0}")]
	ExecutionError(String),

	#[error(transparent)]
	Framework(#[from] crate::Error),
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Command execution context
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
	pub args: Vec<String>,
	pub options: HashMap<String, Vec<String>>,
	pub verbosity: u8,
}

impl CommandContext {
	pub fn new(args: Vec<String>) -> Self {
		Self {
			args,
			..Self::default()
		}
	}

	pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.options.insert(key.into(), vec![value.into()]);
		self
	}

	pub fn with_verbosity(mut self, verbosity: u8) -> Self {
		self.verbosity = verbosity;
		self
	}

	pub fn arg(&self, index: usize) -> Option<&String> {
		self.args.get(index)
	}

	/// Positional argument that must be present.
	pub fn require_arg(&self, index: usize, name: &str) -> CommandResult<&str> {
		self.arg(index)
			.map(String::as_str)
			.ok_or_else(|| CommandError::InvalidArguments(format!("missing <{}>", name)))
	}

	pub fn option(&self, key: &str) -> Option<&String> {
		self.options.get(key).and_then(|v| v.first())
	}

	pub fn has_option(&self, key: &str) -> bool {
		self.options.contains_key(key)
	}

	pub fn info(&self, message: &str) {
		if self.verbosity > 0 {
			println!("{}", message);
		}
	}

	pub fn success(&self, message: &str) {
		println!("{}", message);
	}

	pub fn warning(&self, message: &str) {
		eprintln!("[WARNING] {}", message);
	}

	pub fn verbose(&self, message: &str) {
		if self.verbosity > 1 {
			println!("{}", message);
		}
	}
}

/// A command run from `manage`.
#[async_trait]
pub trait BaseCommand: Send + Sync {
	fn name(&self) -> &str;

	fn description(&self) -> &str {
		""
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()>;
}

/// Commands by name
#[derive(Default)]
pub struct CommandRegistry {
	commands: HashMap<String, Arc<dyn BaseCommand>>,
}

impl CommandRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, command: Arc<dyn BaseCommand>) {
		self.commands.insert(command.name().to_string(), command);
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn BaseCommand>> {
		self.commands.get(name).cloned()
	}

	/// Names and descriptions, sorted by name.
	pub fn list(&self) -> Vec<(String, String)> {
		let mut list: Vec<_> = self
			.commands
			.values()
			.map(|c| (c.name().to_string(), c.description().to_string()))
			.collect();
		list.sort();
		list
	}

	pub async fn run(&self, name: &str, ctx: &CommandContext) -> CommandResult<()> {
		let command = self
			.get(name)
			.ok_or_else(|| CommandError::NotFound(name.to_string()))?;
		tracing::debug!(command = name, args = ?ctx.args, "running command");
		command.execute(ctx).await
	}
}
