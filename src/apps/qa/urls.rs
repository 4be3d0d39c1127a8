//! URL configuration for the qa app

use oshot_web::{Router, with_state};
use std::sync::Arc;

use super::views;
use crate::state::AppState;

pub fn routes(router: &mut Router, state: &Arc<AppState>) {
	// `/q/new/` goes first so `{question_id}` does not swallow it
	router
		.post("post-question", "/q/new/", with_state(state.clone(), views::post_question))
		.get("question-detail", "/q/{question_id}/", with_state(state.clone(), views::question_detail))
		.post(
			"post-answer",
			"/q/{question_id}/answer/",
			with_state(state.clone(), views::post_answer),
		)
		.post(
			"flag-question",
			"/q/{question_id}/flag/",
			with_state(state.clone(), views::flag_question),
		)
		.post(
			"upvote-question",
			"/q/{question_id}/upvote/",
			with_state(state.clone(), views::upvote_question),
		);
}
