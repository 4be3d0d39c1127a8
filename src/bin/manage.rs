//! Open Shot management CLI (the project's `manage.py`).

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use oshot::apps::qa::commands::SendEmailsCommand;
use oshot::apps::user::commands::{CreateUserCommand, InviteCommand};
use oshot::config::urls::{routes, url_patterns};
use oshot::{AppState, get_settings};
use oshot_web::commands::{CommandContext, CommandRegistry};
use oshot_web::logging;
use oshot_web::{HttpServer, shutdown_signal};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "manage", about = "Open Shot management commands")]
struct Cli {
	/// Verbosity; repeat for more
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Serve the site
	Runserver {
		/// Address to bind, defaults to the `bind_address` setting
		address: Option<SocketAddr>,
	},
	/// Apply pending database migrations
	Migrate,
	/// Mail the digest of new and updated questions
	SendEmails {
		/// Only these usernames or email addresses
		users: Vec<String>,
	},
	/// Create an active user
	Createuser {
		username: String,
		email: String,
		password: String,
		#[arg(long)]
		locality: Option<String>,
		#[arg(long)]
		candidate: bool,
		#[arg(long)]
		editor: bool,
	},
	/// Create an inactive user and print the invitation link
	Invite {
		username: String,
		email: String,
		first_name: Option<String>,
		last_name: Option<String>,
		#[arg(long)]
		locality: Option<String>,
	},
}

fn registry(state: &Arc<AppState>) -> CommandRegistry {
	let mut registry = CommandRegistry::new();
	registry.register(Arc::new(SendEmailsCommand::new(state.clone())));
	registry.register(Arc::new(CreateUserCommand::new(state.clone())));
	registry.register(Arc::new(InviteCommand::new(state.clone())));
	registry
}

fn with_flag(ctx: CommandContext, name: &str, set: bool) -> CommandContext {
	if set { ctx.with_option(name, "") } else { ctx }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let settings = get_settings().context("loading settings")?;
	logging::init(&settings.log_level);

	let state = AppState::new(settings).await.context("starting application")?;

	let (name, ctx) = match cli.command {
		Command::Runserver { address } => {
			let addr = match address {
				Some(addr) => addr,
				None => state
					.settings
					.bind_address
					.parse()
					.with_context(|| format!("invalid bind_address {}", state.settings.bind_address))?,
			};
			let server = HttpServer::new(url_patterns(state.clone()));
			return server.listen(addr, shutdown_signal()).await.map_err(|e| anyhow!(e));
		}
		Command::Migrate => {
			state.db.migrate().await.context("migrating database")?;
			println!("migrations applied");
			return Ok(());
		}
		Command::SendEmails { users } => ("send_emails", CommandContext::new(users)),
		Command::Createuser {
			username,
			email,
			password,
			locality,
			candidate,
			editor,
		} => {
			let mut ctx = CommandContext::new(vec![username, email, password]);
			if let Some(slug) = locality {
				ctx = ctx.with_option("locality", slug);
			}
			ctx = with_flag(ctx, "candidate", candidate);
			("createuser", with_flag(ctx, "editor", editor))
		}
		Command::Invite {
			username,
			email,
			first_name,
			last_name,
			locality,
		} => {
			let args = [Some(username), Some(email), first_name, last_name]
				.into_iter()
				.flatten()
				.collect();
			let mut ctx = CommandContext::new(args);
			if let Some(slug) = locality {
				ctx = ctx.with_option("locality", slug);
			}
			("invite", ctx)
		}
	};

	// Commands reverse URLs too
	routes(&state);
	registry(&state)
		.run(name, &ctx.with_verbosity(cli.verbose))
		.await
		.map_err(|e| anyhow!(e))
}
