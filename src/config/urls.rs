//! URL configuration.
//!
//! Every app contributes its routes; the result is wrapped with the request
//! logging and flash message middlewares.

use oshot_web::logging::LoggingMiddleware;
use oshot_web::messages::MessagesMiddleware;
use oshot_web::{Handler, MiddlewareChain, Router};
use std::sync::Arc;

use crate::apps;
use crate::state::AppState;

/// Router with the routes of every app. Also fills the reverse table.
pub fn routes(state: &Arc<AppState>) -> Router {
	let mut router = Router::new();
	apps::home::urls::routes(&mut router, state);
	apps::user::urls::routes(&mut router, state);
	apps::qa::urls::routes(&mut router, state);
	router
}

/// The request handler the server runs.
pub fn url_patterns(state: Arc<AppState>) -> Arc<dyn Handler> {
	let chain = MiddlewareChain::new(Arc::new(routes(&state)))
		.with_middleware(Arc::new(LoggingMiddleware))
		.with_middleware(Arc::new(MessagesMiddleware));
	Arc::new(chain)
}
