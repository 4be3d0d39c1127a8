//! Front page and place search.

use oshot_web::shortcuts::{get_or_404, render};
use oshot_web::{Request, Response, Result};
use serde_json::json;
use std::sync::Arc;

use crate::apps::entities::Entity;
use crate::apps::qa::models::{Question, QuestionOrder};
use crate::state::AppState;

/// All questions in the requested order, plus the locality picker.
pub async fn home(request: Request, state: Arc<AppState>) -> Result<Response> {
	let viewer = state.user(&request).await?;
	let order = QuestionOrder::from_param(request.query("order").as_deref());
	let questions = Question::all_ordered(&state.db, order).await?;
	let localities = Entity::localities(&state.db).await?;

	let mut context = state.context(&request, viewer.as_ref());
	context["questions"] = json!(questions);
	context["order"] = json!(order);
	context["order_options"] = json!(QuestionOrder::ORDER_OPTIONS);
	context["place_form"] = json!({ "localities": localities });
	render(&state.templates, "home.html", context)
}

/// Substring search over questions, optionally within one place.
pub async fn place_search(request: Request, state: Arc<AppState>) -> Result<Response> {
	let viewer = state.user(&request).await?;
	let query = request.query("q").unwrap_or_default();

	let entity = match request.query("place").filter(|slug| !slug.is_empty()) {
		Some(slug) => Some(get_or_404(Entity::get_by_slug(&state.db, &slug).await, "Entity")?),
		None => None,
	};
	let results = Question::search(&state.db, entity.as_ref().map(|e| e.id), &query).await?;

	let mut context = state.context(&request, viewer.as_ref());
	context["q"] = json!(query);
	context["results"] = json!(results);
	context["base_template"] = json!(if entity.is_some() { "place_base.html" } else { "base.html" });
	context["entity"] = json!(entity);
	render(&state.templates, "search.html", context)
}
