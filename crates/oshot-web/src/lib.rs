//! # oshot-web
//!
//! A small Django-style web layer for the Open Shot project.
//!
//! ## Features
//!
//! - **HTTP**: [`Request`] and [`Response`] types over `hyper`/`http`
//! - **Routing**: [`Router`] with `{param}` segments and named-route [`reverse`]
//! - **Server**: [`HttpServer`] on hyper with graceful shutdown
//! - **Forms**: binding urlencoded bodies into `validator`-checked structs
//! - **Templates**: Tera rendering with template name and context kept on the response
//! - **Mail**: [`mail::EmailMessage`] and console, memory and SMTP backends
//! - **Signals**: async model signals such as `post_save`
//! - **Settings**: layered defaults, TOML files and environment variables
//! - **Commands**: management command trait with a verbosity-aware context
//!
//! ## Quick Start
//!
//! ```no_run
//! use oshot_web::{Request, Response, Router, handler_fn};
//!
//! let mut router = Router::new();
//! router.get("index", "/", handler_fn(|_req: Request| async {
//!     Ok(Response::ok().with_body("Hello"))
//! }));
//! ```

pub mod commands;
pub mod error;
pub mod forms;
pub mod handler;
pub mod http;
pub mod logging;
pub mod mail;
pub mod messages;
pub mod routing;
pub mod server;
pub mod settings;
pub mod shortcuts;
pub mod signals;
pub mod templates;
pub mod utils;

pub use error::{Error, Result};
pub use handler::{FnHandler, Handler, Middleware, MiddlewareChain, handler_fn, with_state};
pub use http::{Request, Response};
pub use routing::{ReverseError, Router, reverse};
pub use server::{HttpServer, shutdown_signal};
