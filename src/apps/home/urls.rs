//! URL configuration for the home app

use oshot_web::{Router, with_state};
use std::sync::Arc;

use super::views;
use crate::state::AppState;

pub fn routes(router: &mut Router, state: &Arc<AppState>) {
	router
		.get("home", "/", with_state(state.clone(), views::home))
		.get("place-search", "/search/", with_state(state.clone(), views::place_search));
}
