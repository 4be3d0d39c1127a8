//! HTTP request and response types.

mod request;
mod response;

pub use request::{Request, RequestBuilder};
pub use response::Response;
