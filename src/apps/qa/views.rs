//! Question pages and the actions taken on them.

use oshot_web::forms::BoundForm;
use oshot_web::messages;
use oshot_web::shortcuts::{get_or_404, redirect, render};
use oshot_web::{Error, Request, Response, Result};
use serde_json::json;
use std::sync::Arc;

use super::forms::{AnswerForm, QuestionForm};
use super::models::{Answer, Question, QuestionFlag};
use crate::apps::entities::Entity;
use crate::apps::user::models::{Membership, Profile, User};
use crate::state::AppState;

async fn question_from_path(request: &Request, state: &AppState) -> Result<Question> {
	let id: i64 = request
		.require_path_param("question_id")?
		.parse()
		.map_err(|_| Error::NotFound("No Question matches the given query.".to_string()))?;
	get_or_404(Question::get(&state.db, id).await, "Question")
}

/// Candidates of the question's locality and members allowed to answer.
async fn can_answer(state: &AppState, user: &User, question: &Question) -> Result<bool> {
	if let Some(profile) = Profile::for_user(&state.db, user.id).await?
		&& profile.is_candidate
		&& profile.locality_id == Some(question.entity_id)
	{
		return Ok(true);
	}
	let membership = Membership::get(&state.db, user.id, question.entity_id).await?;
	Ok(membership.is_some_and(|m| m.can_answer))
}

async fn detail_page(
	request: &Request,
	state: &AppState,
	viewer: Option<&User>,
	question: &Question,
	answer_form: Option<&BoundForm<AnswerForm>>,
) -> Result<Response> {
	let entity = get_or_404(Entity::get(&state.db, question.entity_id).await, "Entity")?;
	let author = User::get(&state.db, question.author_id).await?;
	let answers = question.answers(&state.db).await?;
	let tags = question.tags(&state.db).await?;
	let viewer_can_answer = match viewer {
		Some(user) => can_answer(state, user, question).await?,
		None => false,
	};

	let mut context = state.context(request, viewer);
	context["question"] = json!(question);
	context["author"] = json!(author);
	context["answers"] = json!(answers);
	context["tags"] = json!(tags);
	context["entity"] = json!(entity);
	context["can_answer"] = json!(viewer_can_answer);
	context["answer_form"] = answer_form.map(BoundForm::to_context).unwrap_or_else(|| json!({}));
	context["base_template"] = json!("place_base.html");
	render(&state.templates, "qa/question_detail.html", context)
}

pub async fn question_detail(request: Request, state: Arc<AppState>) -> Result<Response> {
	let question = question_from_path(&request, &state).await?;
	let viewer = state.user(&request).await?;
	detail_page(&request, &state, viewer.as_ref(), &question, None).await
}

/// Ask a new question. Invalid submissions re-render the asking page.
pub async fn post_question(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(user) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};

	let form = BoundForm::<QuestionForm>::from_request(&request, &state.db.pool).await?;
	if let Some(cleaned) = form.cleaned_data() {
		let question = cleaned.save(&state.db, user.id).await?;
		return Ok(messages::success(
			redirect(question.get_absolute_url()?),
			"Your question has been posted.",
		));
	}

	let entity = Entity::get_by_slug(&state.db, form.value("entity")).await?;
	let mut context = state.context(&request, Some(&user));
	context["form"] = form.to_context();
	context["entity"] = json!(entity);
	context["base_template"] = json!(if entity.is_some() { "place_base.html" } else { "base.html" });
	render(&state.templates, "qa/post_question.html", context)
}

pub async fn post_answer(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(user) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};
	let mut question = question_from_path(&request, &state).await?;
	if !can_answer(&state, &user, &question).await? {
		return Err(Error::Forbidden(format!(
			"{} may not answer question {}",
			user.username, question.id
		)));
	}

	let form = BoundForm::<AnswerForm>::from_request(&request, &()).await?;
	if let Some(cleaned) = form.cleaned_data() {
		Answer::create(&state.db, user.id, &mut question, &cleaned.content).await?;
		return Ok(messages::success(
			redirect(question.get_absolute_url()?),
			"Your answer has been posted.",
		));
	}
	detail_page(&request, &state, Some(&user), &question, Some(&form)).await
}

pub async fn flag_question(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(user) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};
	let question = question_from_path(&request, &state).await?;

	QuestionFlag::create(&state.db, &question, user.id).await?;
	Ok(messages::success(
		redirect(question.get_absolute_url()?),
		"Thank you for flagging the question. One of our editors will look at it shortly.",
	))
}

pub async fn upvote_question(request: Request, state: Arc<AppState>) -> Result<Response> {
	let Some(user) = state.user(&request).await? else {
		return Ok(state.login_redirect(&request));
	};
	let mut question = question_from_path(&request, &state).await?;

	let back = redirect(question.get_absolute_url()?);
	if question.upvote(&state.db, user.id).await? {
		Ok(messages::success(back, "Thanks for your vote."))
	} else {
		Ok(messages::error(back, "You already voted for this question."))
	}
}
