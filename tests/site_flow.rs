//! End to end: an invitee joins, asks, a candidate answers and the digest
//! picks it all up.

mod common;

use chrono::{Duration, Utc};
use hyper::StatusCode;
use oshot::apps::qa::commands::send_updates;
use oshot::apps::user::models::{InviteUser, Profile, User, invite_user};
use rstest::rstest;

use common::{Site, site};

#[rstest]
#[tokio::test]
async fn test_invitee_asks_and_candidate_answers(#[future] site: Site) {
	let site = site.await;
	let haifa = site.locality("Haifa").await;

	let (_, registration) = invite_user(
		&site.state.db,
		InviteUser {
			username: "noa".to_string(),
			email: "noa@example.com".to_string(),
			locality: Some(haifa.clone()),
			..Default::default()
		},
	)
	.await
	.unwrap();
	let invitation = format!("/invitation/{}/", registration.activation_key);
	assert_eq!(site.get(&invitation, None).await.status, StatusCode::OK);

	let accepted = site
		.post(
			&invitation,
			&[
				("first_name", "Noa"),
				("last_name", "Levi"),
				("email_notification", "D"),
				("password1", "parks4all"),
				("password2", "parks4all"),
			],
			None,
		)
		.await;
	assert_eq!(accepted.status, StatusCode::FOUND);
	assert_eq!(accepted.location(), Some("/login/"));
	assert_eq!(site.get(&invitation, None).await.status, StatusCode::FORBIDDEN);

	let noa_session = site.log_in("noa", "parks4all").await;
	let asked = site
		.post(
			"/q/new/",
			&[("subject", "Where are the new parks?"), ("entity", "haifa"), ("tags", "parks")],
			Some(&noa_session),
		)
		.await;
	assert_eq!(asked.status, StatusCode::FOUND);
	let question_url = asked.location().unwrap().to_string();

	let candidate = User::create_user(&site.state.db, "dana", "dana@example.com", "answers1").await.unwrap();
	let mut profile = Profile::for_user(&site.state.db, candidate.id).await.unwrap().unwrap();
	profile.locality_id = Some(haifa.id);
	profile.is_candidate = true;
	profile.save(&site.state.db).await.unwrap();

	let candidates = site.get("/candidates/haifa/", None).await;
	assert!(candidates.body_text().contains("dana"));

	let dana_session = site.log_in("dana", "answers1").await;
	let answered = site
		.post(
			&format!("{}answer/", question_url),
			&[("content", "Next to the port, next spring.")],
			Some(&dana_session),
		)
		.await;
	assert_eq!(answered.status, StatusCode::FOUND);

	let page = site.get(&question_url, None).await;
	let body = page.body_text();
	assert!(body.contains("Where are the new parks?"));
	assert!(body.contains("Next to the port, next spring."));

	let report = send_updates(&site.state, &[], Utc::now() + Duration::minutes(1)).await.unwrap();
	let mut sent = report.sent.clone();
	sent.sort();
	assert_eq!(sent, ["dana", "noa"]);
	assert_eq!(site.outbox.count(), 2);
}

#[rstest]
#[tokio::test]
async fn test_flag_reaches_editors(#[future] site: Site) {
	let site = site.await;
	let haifa = site.locality("Haifa").await;
	let editor = User::create_user(&site.state.db, "editor", "editor@example.com", "moderate1").await.unwrap();
	let profile = Profile::for_user(&site.state.db, editor.id).await.unwrap().unwrap();
	profile.add_entity(&site.state.db, &haifa, true).await.unwrap();
	User::create_user(&site.state.db, "dana", "dana@example.com", "secret12").await.unwrap();

	let session = site.log_in("dana", "secret12").await;
	let asked = site
		.post("/q/new/", &[("subject", "Why so loud?"), ("entity", "haifa")], Some(&session))
		.await;
	let flagged = site
		.post(&format!("{}flag/", asked.location().unwrap()), &[], Some(&session))
		.await;

	assert_eq!(flagged.status, StatusCode::FOUND);
	let mail = site.outbox.messages();
	assert_eq!(mail.len(), 1);
	assert_eq!(mail[0].to(), ["editor@example.com"]);
	assert_eq!(mail[0].subject(), "A question has been flagged");
}

#[rstest]
#[tokio::test]
async fn test_unknown_pages(#[future] site: Site) {
	let site = site.await;

	assert_eq!(site.get("/candidates/atlantis/", None).await.status, StatusCode::NOT_FOUND);
	assert_eq!(site.get("/user/nobody/", None).await.status, StatusCode::NOT_FOUND);
	assert_eq!(site.get("/no/such/page/", None).await.status, StatusCode::NOT_FOUND);
	assert_eq!(site.get("/search", None).await.status, StatusCode::MOVED_PERMANENTLY);
}
