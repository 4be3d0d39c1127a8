//! User views: candidates, public profiles, profile editing, invitations and
//! login.

use chrono::Utc;
use oshot_web::forms::BoundForm;
use oshot_web::messages;
use oshot_web::shortcuts::{get_or_404, is_safe_redirect, redirect, redirect_to, render};
use oshot_web::{Error, Request, Response, Result};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::{self, SESSION_COOKIE};
use super::forms::{EditingUser, InvitationForm, LoginForm, ProfileForm};
use super::models::{Profile, RegistrationProfile, User, profile_full_name};
use crate::apps::entities::Entity;
use crate::apps::qa::models::{Answer, Question};
use crate::state::AppState;

fn base_template(entity: Option<&Entity>) -> &'static str {
	if entity.is_some() { "place_base.html" } else { "base.html" }
}

async fn profile_of(state: &AppState, user: &User) -> Result<Profile> {
	get_or_404(Profile::for_user(&state.db, user.id).await, "Profile")
}

/// Candidates of a locality, ordered by number of answers.
pub async fn candidate_list(request: Request, state: Arc<AppState>) -> Result<Response> {
	let slug = request.require_path_param("entity_slug")?;
	let entity = get_or_404(Entity::get_by_slug(&state.db, slug).await, "Entity")?;
	let viewer = state.user(&request).await?;

	let candidates = Profile::candidates(&state.db, &entity).await?;
	let need_editors = Profile::need_editors(&state.db, &entity).await?;
	let can_edit = match &viewer {
		Some(user) => profile_of(&state, user).await?.is_editor_of(&state.db, &entity).await?,
		None => false,
	};

	let mut context = state.context(&request, viewer.as_ref());
	context["entity"] = json!(entity);
	context["candidates"] = json!(candidates);
	context["need_editors"] = json!(need_editors);
	context["can_edit"] = json!(can_edit);
	context["base_template"] = json!("place_base.html");
	render(&state.templates, "candidate/candidate_list.html", context)
}

/// Public page of a user with their questions and answers.
pub async fn user_detail(request: Request, state: Arc<AppState>) -> Result<Response> {
	let username = request.require_path_param("username")?;
	let user = get_or_404(User::get_by_username(&state.db, username).await, "User")?;
	let profile = profile_of(&state, &user).await?;
	let viewer = state.user(&request).await?;

	let questions = Question::by_author(&state.db, user.id).await?;
	let answers = Answer::by_author(&state.db, user.id).await?;
	let entity = profile.locality(&state.db).await?;

	let mut context = state.context(&request, viewer.as_ref());
	context["candidate"] = json!({
		"id": user.id,
		"username": user.username,
		"full_name": profile_full_name(&user),
		"avatar_url": profile.avatar_url(&user.email),
		"bio": profile.bio,
		"url": profile.url,
		"is_candidate": profile.is_candidate,
	});
	context["profile"] = json!(profile);
	context["questions"] = json!(questions);
	context["answers"] = json!(answers);
	context["entity"] = json!(entity);
	context["base_template"] = json!(base_template(entity.as_ref()));
	render(&state.templates, "user/user_detail.html", context)
}

/// Edit the viewer's own account and profile.
pub async fn edit_profile(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(mut user) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};
	let mut profile = profile_of(&state, &user).await?;
	let locality = profile.locality(&state.db).await?;

	let form = if request.is_post() {
		let ctx = EditingUser {
			pool: state.db.pool.clone(),
			user_id: user.id,
		};
		let form = BoundForm::<ProfileForm>::from_request(&request, &ctx).await?;
		if let Some(cleaned) = form.cleaned_data() {
			cleaned.save(&state.db, &mut user, &mut profile).await?;
			let target = profile.get_absolute_url(&user.username)?;
			return Ok(messages::success(redirect(target), "Your profile has been updated."));
		}
		form
	} else {
		BoundForm::<ProfileForm>::unbound(ProfileForm::initial(&user, &profile, locality.as_ref()))
	};

	let localities = Entity::localities(&state.db).await?;
	let mut context = state.context(&request, Some(&user));
	context["form"] = form.to_context();
	context["localities"] = json!(localities);
	context["entity"] = json!(locality);
	context["base_template"] = json!(base_template(locality.as_ref()));
	render(&state.templates, "user/edit_profile.html", context)
}

/// Let an invited user pick a password and activate the account.
pub async fn accept_invitation(request: Request, state: Arc<AppState>) -> Result<Response> {
	let key = request.require_path_param("invitation_key")?;
	let registration = RegistrationProfile::get_by_key(&state.db, key)
		.await?
		.filter(|r| !r.is_activated())
		.ok_or_else(|| Error::Forbidden("invalid or used invitation key".to_string()))?;
	let invited = User::get(&state.db, registration.user_id)
		.await?
		.ok_or_else(|| Error::Forbidden("invitation without a user".to_string()))?;

	let form = if request.is_post() {
		let form = BoundForm::<InvitationForm>::from_request(&request, &()).await?;
		if let Some(cleaned) = form.cleaned_data() {
			let mut user = RegistrationProfile::activate_user(&state.db, key)
				.await?
				.ok_or_else(|| Error::Forbidden("invalid or used invitation key".to_string()))?;
			cleaned.save(&state.db, &mut user).await?;
			return redirect_to("login", &[]);
		}
		form
	} else {
		let profile = Profile::for_user(&state.db, invited.id).await?;
		BoundForm::<InvitationForm>::unbound(InvitationForm::initial(&invited, profile.as_ref()))
	};

	let mut context = state.context(&request, None);
	context["invited"] = json!(invited);
	context["invitation_key"] = json!(key);
	context["form"] = form.to_context();
	render(&state.templates, "user/accept_invitation.html", context)
}

/// Drop a candidate from the list of their locality. Editors only.
pub async fn remove_candidate(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(editor) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};
	let candidate_id: i64 = request
		.require_path_param("user_id")?
		.parse()
		.map_err(|_| Error::NotFound("No User matches the given query.".to_string()))?;
	let candidate = get_or_404(User::get(&state.db, candidate_id).await, "User")?;
	let mut candidate_profile = profile_of(&state, &candidate).await?;
	let locality = get_or_404(candidate_profile.locality(&state.db).await, "Entity")?;
	let back = redirect(locality.get_absolute_url()?);

	let editor_profile = profile_of(&state, &editor).await?;
	if !editor_profile.is_editor_of(&state.db, &locality).await? {
		tracing::warn!(editor = %editor.username, candidate = %candidate.username, "candidate removal refused");
		return Ok(messages::error(back, "You are not an editor of this locality."));
	}

	candidate_profile.is_candidate = false;
	candidate_profile.save(&state.db).await?;
	tracing::info!(editor = %editor.username, candidate = %candidate.username, "candidate removed");
	Ok(messages::success(
		back,
		format!("{} is no longer a candidate.", profile_full_name(&candidate)),
	))
}

pub async fn login(request: Request, state: Arc<AppState>) -> Result<Response> {
	let form = if request.is_post() {
		let form = BoundForm::<LoginForm>::from_request(&request, &state.db.pool).await?;
		if let Some(cleaned) = form.cleaned_data()
			&& let Some(user) = &cleaned.user
		{
			let key = auth::login(&state.db, user, state.session_age(), Utc::now()).await?;
			let target = match cleaned.next.as_deref().filter(|next| is_safe_redirect(next)) {
				Some(next) => next.to_string(),
				None => profile_of(&state, user).await?.get_absolute_url(&user.username)?,
			};
			let max_age = state.session_age().num_seconds();
			return Ok(redirect(target).with_cookie(SESSION_COOKIE, &key, Some(max_age)));
		}
		form
	} else {
		let next = request.query("next").unwrap_or_default();
		BoundForm::<LoginForm>::unbound(BTreeMap::from([("next".to_string(), next)]))
	};

	let mut context = state.context(&request, None);
	context["form"] = form.to_context();
	render(&state.templates, "user/login.html", context)
}

pub async fn logout(request: Request, state: Arc<AppState>) -> Result<Response> {
	if let Some(key) = request.cookie(SESSION_COOKIE) {
		auth::logout(&state.db, &key).await?;
	}
	Ok(redirect_to("home", &[])?.delete_cookie(SESSION_COOKIE))
}
