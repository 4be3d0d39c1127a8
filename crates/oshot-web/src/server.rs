//! HTTP server on hyper.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::handler::Handler;
use crate::http::{Request, Response};

/// Serves one [`Handler`] over HTTP/1.1. Wrap it in a
/// [`MiddlewareChain`](crate::MiddlewareChain) first when it needs middlewares.
pub struct HttpServer {
	pub handler: Arc<dyn Handler>,
}

impl HttpServer {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self { handler }
	}

	/// Accept connections until `shutdown` resolves.
	///
	/// In-flight connections are left to finish on their own tasks.
	///
	/// # Examples
	///
	/// ```no_run
	/// use std::sync::Arc;
	/// use oshot_web::{HttpServer, Router, shutdown_signal};
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	/// let server = HttpServer::new(Arc::new(Router::new()));
	/// server.listen("127.0.0.1:8000".parse()?, shutdown_signal()).await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn listen<F>(
		self,
		addr: SocketAddr,
		shutdown: F,
	) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
	where
		F: Future<Output = ()> + Send,
	{
		let listener = TcpListener::bind(addr).await?;
		tracing::info!(%addr, "server listening on http://{}", addr);

		let handler = self.handler;
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				result = listener.accept() => {
					let (stream, socket_addr) = result?;
					let handler = handler.clone();
					tokio::task::spawn(async move {
						if let Err(err) = Self::handle_connection(stream, socket_addr, handler).await {
							tracing::warn!(error = %err, peer = %socket_addr, "error handling connection");
						}
					});
				}
				_ = &mut shutdown => {
					tracing::info!("shutdown signal received, stopping server");
					break;
				}
			}
		}

		Ok(())
	}

	async fn handle_connection(
		stream: TcpStream,
		socket_addr: SocketAddr,
		handler: Arc<dyn Handler>,
	) -> Result<(), hyper::Error> {
		let io = TokioIo::new(stream);
		let service = RequestService {
			handler,
			remote_addr: socket_addr,
		};
		http1::Builder::new().serve_connection(io, service).await
	}
}

struct RequestService {
	handler: Arc<dyn Handler>,
	remote_addr: SocketAddr,
}

impl Service<hyper::Request<Incoming>> for RequestService {
	type Response = hyper::Response<Full<Bytes>>;
	type Error = Box<dyn std::error::Error + Send + Sync>;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

	fn call(&self, req: hyper::Request<Incoming>) -> Self::Future {
		let handler = self.handler.clone();
		let remote_addr = self.remote_addr;

		Box::pin(async move {
			let (parts, body) = req.into_parts();
			let body_bytes = body.collect().await?.to_bytes();

			let mut request = Request::new(parts.method, parts.uri, parts.version, parts.headers, body_bytes);
			request.remote_addr = Some(remote_addr);

			let response = handler.handle(request).await.unwrap_or_else(Response::from);

			let mut hyper_response = hyper::Response::builder().status(response.status);
			for (key, value) in response.headers.iter() {
				hyper_response = hyper_response.header(key, value);
			}
			Ok(hyper_response.body(Full::new(response.body))?)
		})
	}
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "failed to listen for ctrl-c");
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut sig) => {
				sig.recv().await;
			}
			Err(err) => {
				tracing::error!(error = %err, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handler::handler_fn;
	use rstest::rstest;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};

	#[rstest]
	#[tokio::test]
	async fn test_serves_request_and_shuts_down() {
		// Reserve a free port, then hand it to the server
		let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = placeholder.local_addr().unwrap();
		drop(placeholder);

		let handler = handler_fn(|req: Request| async move {
			Ok(Response::ok().with_body(format!("path={}", req.path())))
		});
		let (tx, rx) = tokio::sync::oneshot::channel::<()>();
		let server = tokio::spawn(HttpServer::new(handler).listen(addr, async {
			let _ = rx.await;
		}));

		let mut stream = loop {
			if let Ok(stream) = TcpStream::connect(addr).await {
				break stream;
			}
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		};
		stream
			.write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
			.await
			.unwrap();
		let mut raw = String::new();
		stream.read_to_string(&mut raw).await.unwrap();

		assert!(raw.starts_with("HTTP/1.1 200 OK"), "unexpected response: {}", raw);
		assert!(raw.ends_with("path=/ping"));

		tx.send(()).unwrap();
		server.await.unwrap().unwrap();
	}
}
