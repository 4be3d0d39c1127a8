//! Account management command tests

use oshot_web::commands::{BaseCommand, CommandContext, CommandError};
use rstest::rstest;

use crate::apps::user::commands::{CreateUserCommand, InviteCommand};
use crate::apps::user::models::{Membership, RegistrationProfile, User};
use crate::test_utils::*;

fn args(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| v.to_string()).collect()
}

#[rstest]
#[tokio::test]
async fn test_createuser_candidate_editor(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let haifa = create_locality(ctx.db(), "Haifa").await;
	let command = CreateUserCommand::new(ctx.state.clone());
	let cmd_ctx = CommandContext::new(args(&["dana", "dana@example.com", TEST_PASSWORD]))
		.with_option("locality", "haifa")
		.with_option("candidate", "")
		.with_option("editor", "");

	command.execute(&cmd_ctx).await.unwrap();

	let dana = User::authenticate(ctx.db(), "dana", TEST_PASSWORD).await.unwrap().unwrap();
	let profile = profile_of(ctx.db(), &dana).await;
	assert!(dana.is_active);
	assert!(profile.is_candidate);
	assert_eq!(profile.locality_id, Some(haifa.id));
	let membership = Membership::get(ctx.db(), dana.id, haifa.id).await.unwrap().unwrap();
	assert!(membership.is_editor);
}

#[rstest]
#[tokio::test]
async fn test_createuser_plain(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let command = CreateUserCommand::new(ctx.state.clone());
	let cmd_ctx = CommandContext::new(args(&["dana", "dana@example.com", TEST_PASSWORD])).with_option("candidate", "");

	command.execute(&cmd_ctx).await.unwrap();

	let dana = User::get_by_username(ctx.db(), "dana").await.unwrap().unwrap();
	let profile = profile_of(ctx.db(), &dana).await;
	assert!(!profile.is_candidate);
	assert!(profile.locality_id.is_none());
}

#[rstest]
#[case(&["dana", "dana@example.com"], None)]
#[case(&["dana", "dana@example.com", "pw"], Some("atlantis"))]
#[tokio::test]
async fn test_createuser_bad_arguments(
	#[future] test_context: TestContext,
	#[case] positional: &[&str],
	#[case] locality: Option<&str>,
) {
	let ctx = test_context.await;
	let command = CreateUserCommand::new(ctx.state.clone());
	let mut cmd_ctx = CommandContext::new(args(positional));
	if let Some(slug) = locality {
		cmd_ctx = cmd_ctx.with_option("locality", slug);
	}

	let result = command.execute(&cmd_ctx).await;

	assert!(matches!(result, Err(CommandError::InvalidArguments(_))));
	assert!(User::get_by_username(ctx.db(), "dana").await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_invite(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let haifa = create_locality(ctx.db(), "Haifa").await;
	let command = InviteCommand::new(ctx.state.clone());
	let cmd_ctx = CommandContext::new(args(&["noa", "noa@example.com", "Noa", "Levi"])).with_option("locality", "haifa");

	command.execute(&cmd_ctx).await.unwrap();

	let noa = User::get_by_username(ctx.db(), "noa").await.unwrap().unwrap();
	assert!(!noa.is_active);
	assert_eq!(noa.get_full_name(), "Noa Levi");
	assert_eq!(profile_of(ctx.db(), &noa).await.locality_id, Some(haifa.id));
	let registration = RegistrationProfile::for_user(ctx.db(), noa.id).await.unwrap().unwrap();
	assert!(!registration.is_activated());
}
