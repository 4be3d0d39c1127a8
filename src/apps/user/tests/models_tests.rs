//! Account and profile model tests

use chrono::{Duration, Utc};
use rstest::rstest;

use crate::apps::qa::models::Answer;
use crate::apps::user::models::*;
use crate::test_utils::*;

#[rstest]
#[tokio::test]
async fn test_new_user_gets_default_profile(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let user = create_user(ctx.db(), "dana").await;

	let profile = profile_of(ctx.db(), &user).await;
	assert_eq!(profile.email_notification, Some(NotificationPeriod::Daily));
	assert_eq!(profile.last_email_update, *NEVER_SENT);
	assert!(!profile.is_candidate);
	assert!(!profile.is_editor);
	assert_eq!(profile.locality_id, None);
}

#[rstest]
#[tokio::test]
async fn test_saving_user_does_not_duplicate_profile(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let mut user = create_user(ctx.db(), "dana").await;

	user.first_name = "Dana".to_string();
	user.save(ctx.db()).await.unwrap();

	assert_eq!(Profile::all(ctx.db()).await.unwrap().len(), 1);
	assert_eq!(profile_full_name(&user), "Dana");
}

#[rstest]
#[tokio::test]
async fn test_authenticate(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let mut user = create_user(ctx.db(), "dana").await;

	assert!(User::authenticate(ctx.db(), "dana", TEST_PASSWORD).await.unwrap().is_some());
	assert!(User::authenticate(ctx.db(), "dana", "wrong").await.unwrap().is_none());
	assert!(User::authenticate(ctx.db(), "nobody", TEST_PASSWORD).await.unwrap().is_none());

	user.is_active = false;
	user.save(ctx.db()).await.unwrap();
	assert!(User::authenticate(ctx.db(), "dana", TEST_PASSWORD).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_get_by_email_ignores_case(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let user = create_user(ctx.db(), "dana").await;

	let found = User::get_by_email(ctx.db(), "DANA@Example.com").await.unwrap();
	assert_eq!(found.map(|u| u.id), Some(user.id));
}

#[rstest]
#[case(NotificationPeriod::NoEmail, None)]
#[case(NotificationPeriod::Daily, Some(Duration::hours(23)))]
#[case(NotificationPeriod::Weekly, Some(Duration::hours(167)))]
fn test_notification_frequency(#[case] period: NotificationPeriod, #[case] expected: Option<Duration>) {
	assert_eq!(period.frequency(), expected);
}

#[rstest]
fn test_never_sent_sentinel() {
	assert_eq!(NEVER_SENT.to_rfc3339(), "1970-08-06T00:00:00+00:00");
}

#[rstest]
fn test_avatar_falls_back_to_gravatar() {
	let url = gravatar_url(" Dana@Example.com ");
	assert!(url.starts_with("http://www.gravatar.com/avatar/"));
	assert!(url.ends_with("?d=identicon&s=40"));
	assert_eq!(url, gravatar_url("dana@example.com"));
}

#[rstest]
#[tokio::test]
async fn test_candidates_ordered_by_answers(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let haifa = create_locality(ctx.db(), "Haifa").await;
	let other = create_locality(ctx.db(), "Acre").await;
	let quiet = create_candidate(ctx.db(), "aaron", &haifa).await;
	let busy = create_candidate(ctx.db(), "zohar", &haifa).await;
	create_candidate(ctx.db(), "elsewhere", &other).await;

	let asker = create_user(ctx.db(), "asker").await;
	let mut question = create_question(ctx.db(), &asker, &haifa, "Parks?").await;
	Answer::create(ctx.db(), busy.id, &mut question, "More parks").await.unwrap();

	let candidates = Profile::candidates(ctx.db(), &haifa).await.unwrap();
	let names: Vec<_> = candidates.iter().map(|c| c.user.username.as_str()).collect();
	assert_eq!(names, vec!["zohar", "aaron"]);
	assert_eq!(candidates[0].answer_count, 1);
	assert_eq!(candidates[1].user.id, quiet.id);
}

#[rstest]
#[tokio::test]
async fn test_editors_by_flag_or_membership(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let haifa = create_locality(ctx.db(), "Haifa").await;
	assert!(Profile::need_editors(ctx.db(), &haifa).await.unwrap());

	let member = create_editor(ctx.db(), "member", &haifa).await;
	let flagged = create_user(ctx.db(), "flagged").await;
	let mut profile = profile_of(ctx.db(), &flagged).await;
	profile.locality_id = Some(haifa.id);
	profile.is_editor = true;
	profile.save(ctx.db()).await.unwrap();
	// editor both ways counts once
	Membership::create(ctx.db(), flagged.id, haifa.id, true, false).await.unwrap();

	assert_eq!(Profile::editor_count(ctx.db(), &haifa).await.unwrap(), 2);
	assert!(Profile::need_editors(ctx.db(), &haifa).await.unwrap());
	assert!(profile.is_editor_of(ctx.db(), &haifa).await.unwrap());
	assert!(profile_of(ctx.db(), &member).await.is_editor_of(ctx.db(), &haifa).await.unwrap());
	assert_eq!(
		Profile::editor_emails(ctx.db(), haifa.id).await.unwrap(),
		vec!["flagged@example.com".to_string(), "member@example.com".to_string()]
	);

	create_editor(ctx.db(), "third", &haifa).await;
	assert!(!Profile::need_editors(ctx.db(), &haifa).await.unwrap());
}

#[rstest]
#[tokio::test]
async fn test_invite_and_activate(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let haifa = create_locality(ctx.db(), "Haifa").await;

	let (user, registration) = invite_user(
		ctx.db(),
		InviteUser {
			username: "newbie".to_string(),
			email: "newbie@example.com".to_string(),
			locality: Some(haifa.clone()),
			..InviteUser::default()
		},
	)
	.await
	.unwrap();
	assert!(!user.is_active);
	assert_eq!(registration.activation_key.len(), 64);
	assert_eq!(profile_of(ctx.db(), &user).await.locality_id, Some(haifa.id));

	let activated = RegistrationProfile::activate_user(ctx.db(), &registration.activation_key)
		.await
		.unwrap()
		.unwrap();
	assert!(activated.is_active);

	let burned = RegistrationProfile::for_user(ctx.db(), user.id).await.unwrap().unwrap();
	assert!(burned.is_activated());
	assert!(
		RegistrationProfile::activate_user(ctx.db(), &registration.activation_key)
			.await
			.unwrap()
			.is_none()
	);
	assert!(RegistrationProfile::activate_user(ctx.db(), ACTIVATED).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_activation_key_expiry(#[future] test_context: TestContext) {
	let ctx = test_context.await;
	let (user, registration) = invite_user(
		ctx.db(),
		InviteUser {
			username: "newbie".to_string(),
			email: "newbie@example.com".to_string(),
			..InviteUser::default()
		},
	)
	.await
	.unwrap();

	let joined = user.date_joined;
	assert!(!registration.activation_key_expired(&user, 7, joined + Duration::days(6)));
	assert!(registration.activation_key_expired(&user, 7, joined + Duration::days(7)));
	assert!(registration.activation_key_expired(&user, 7, Utc::now() + Duration::days(30)));
}
