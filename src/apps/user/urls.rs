//! URL configuration for the user app

use oshot_web::{Router, with_state};
use std::sync::Arc;

use super::views;
use crate::state::AppState;

pub fn routes(router: &mut Router, state: &Arc<AppState>) {
	router
		.get(
			"candidate-list",
			"/candidates/{entity_slug}/",
			with_state(state.clone(), views::candidate_list),
		)
		.get("public-profile", "/user/{username}/", with_state(state.clone(), views::user_detail))
		.get_post("edit-profile", "/profile/edit/", with_state(state.clone(), views::edit_profile))
		.get_post(
			"accept-invitation",
			"/invitation/{invitation_key}/",
			with_state(state.clone(), views::accept_invitation),
		)
		.post(
			"remove-candidate",
			"/candidate/{user_id}/remove/",
			with_state(state.clone(), views::remove_candidate),
		)
		.get_post("login", "/login/", with_state(state.clone(), views::login))
		.post("logout", "/logout/", with_state(state.clone(), views::logout));
}
