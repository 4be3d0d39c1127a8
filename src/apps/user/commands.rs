//! Account management commands: `createuser` and `invite`.

use async_trait::async_trait;
use oshot_web::commands::{BaseCommand, CommandContext, CommandError, CommandResult};
use oshot_web::reverse;
use std::sync::Arc;

use super::models::{InviteUser, Profile, User, invite_user};
use crate::apps::entities::Entity;
use crate::state::AppState;

async fn locality_option(state: &AppState, ctx: &CommandContext) -> CommandResult<Option<Entity>> {
	let Some(slug) = ctx.option("locality") else {
		return Ok(None);
	};
	Entity::get_by_slug(&state.db, slug)
		.await?
		.map(Some)
		.ok_or_else(|| CommandError::InvalidArguments(format!("no entity with slug {}", slug)))
}

/// `manage createuser USERNAME EMAIL PASSWORD [--locality SLUG] [--candidate] [--editor]`
pub struct CreateUserCommand {
	state: Arc<AppState>,
}

impl CreateUserCommand {
	pub fn new(state: Arc<AppState>) -> Self {
		Self { state }
	}
}

#[async_trait]
impl BaseCommand for CreateUserCommand {
	fn name(&self) -> &str {
		"createuser"
	}

	fn description(&self) -> &str {
		"create an active user, optionally a candidate or editor of a locality"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let username = ctx.require_arg(0, "username")?;
		let email = ctx.require_arg(1, "email")?;
		let password = ctx.require_arg(2, "password")?;
		let locality = locality_option(&self.state, ctx).await?;

		let user = User::create_user(&self.state.db, username, email, password).await?;
		let mut profile = Profile::for_user(&self.state.db, user.id)
			.await?
			.ok_or_else(|| CommandError::ExecutionError(format!("no profile for {}", user.username)))?;

		if let Some(locality) = &locality {
			profile.locality_id = Some(locality.id);
			profile.is_candidate = ctx.has_option("candidate");
			profile.save(&self.state.db).await?;
			if ctx.has_option("editor") {
				profile.add_entity(&self.state.db, locality, true).await?;
			}
		} else if ctx.has_option("candidate") || ctx.has_option("editor") {
			ctx.warning("--candidate and --editor need --locality, ignored");
		}

		ctx.success(&format!("created user {}", user.username));
		Ok(())
	}
}

/// `manage invite USERNAME EMAIL [FIRST_NAME] [LAST_NAME] [--locality SLUG]`
pub struct InviteCommand {
	state: Arc<AppState>,
}

impl InviteCommand {
	pub fn new(state: Arc<AppState>) -> Self {
		Self { state }
	}
}

#[async_trait]
impl BaseCommand for InviteCommand {
	fn name(&self) -> &str {
		"invite"
	}

	fn description(&self) -> &str {
		"create an inactive account and print its invitation link"
	}

	async fn execute(&self, ctx: &CommandContext) -> CommandResult<()> {
		let invite = InviteUser {
			username: ctx.require_arg(0, "username")?.to_string(),
			email: ctx.require_arg(1, "email")?.to_string(),
			first_name: ctx.arg(2).cloned().unwrap_or_default(),
			last_name: ctx.arg(3).cloned().unwrap_or_default(),
			locality: locality_option(&self.state, ctx).await?,
		};

		let (user, registration) = invite_user(&self.state.db, invite).await?;
		let path = reverse("accept-invitation", &[&registration.activation_key]).map_err(oshot_web::Error::from)?;
		ctx.success(&format!("invited {}: {}{}", user.username, self.state.root_url(), path));
		Ok(())
	}
}
