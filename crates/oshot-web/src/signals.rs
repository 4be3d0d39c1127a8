//! Async signals.
//!
//! A [`Signal`] holds receivers that are awaited in priority order when the
//! signal is sent. Models use [`PostSave`] to let other apps react to rows
//! being created or updated.

use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
	#[error("Receiver '{receiver}' failed: {message}")]
	ReceiverFailed { receiver: String, message: String },
}

impl SignalError {
	pub fn receiver_failed(receiver: impl Into<String>, err: impl std::fmt::Display) -> Self {
		Self::ReceiverFailed {
			receiver: receiver.into(),
			message: err.to_string(),
		}
	}
}

pub type ReceiverFn<T> =
	Arc<dyn Fn(Arc<T>) -> Pin<Box<dyn Future<Output = Result<(), SignalError>> + Send>> + Send + Sync>;

struct ReceiverInfo<T> {
	receiver: ReceiverFn<T>,
	dispatch_uid: Option<String>,
	priority: i32,
}

impl<T> Clone for ReceiverInfo<T> {
	fn clone(&self) -> Self {
		Self {
			receiver: Arc::clone(&self.receiver),
			dispatch_uid: self.dispatch_uid.clone(),
			priority: self.priority,
		}
	}
}

/// A signal that can dispatch events to connected receivers
pub struct Signal<T: Send + Sync + 'static> {
	name: String,
	receivers: Arc<RwLock<Vec<ReceiverInfo<T>>>>,
}

impl<T: Send + Sync + 'static> Signal<T> {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			receivers: Arc::new(RwLock::new(Vec::new())),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Connect a receiver function to this signal (simple version)
	pub fn connect<F, Fut>(&self, receiver: F)
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		self.connect_with_options(receiver, None, 0);
	}

	/// Connect a receiver, replacing any receiver with the same `dispatch_uid`.
	///
	/// Higher `priority` values run first.
	pub fn connect_with_options<F, Fut>(&self, receiver: F, dispatch_uid: Option<String>, priority: i32)
	where
		F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<(), SignalError>> + Send + 'static,
	{
		let boxed: ReceiverFn<T> = Arc::new(move |instance| Box::pin(receiver(instance)));
		let mut receivers = self.receivers.write();

		if let Some(ref uid) = dispatch_uid {
			receivers.retain(|r| r.dispatch_uid.as_ref() != Some(uid));
		}

		receivers.push(ReceiverInfo {
			receiver: boxed,
			dispatch_uid,
			priority,
		});
		receivers.sort_by(|a, b| b.priority.cmp(&a.priority));
	}

	pub fn disconnect(&self, dispatch_uid: &str) -> bool {
		let mut receivers = self.receivers.write();
		let original_len = receivers.len();
		receivers.retain(|r| r.dispatch_uid.as_deref() != Some(dispatch_uid));
		receivers.len() < original_len
	}

	/// Await every receiver; the first error stops the dispatch.
	pub async fn send(&self, instance: T) -> Result<(), SignalError> {
		let instance = Arc::new(instance);
		let receivers = self.receivers.read().clone();
		for info in receivers {
			(info.receiver)(instance.clone()).await?;
		}
		Ok(())
	}

	/// Await every receiver, logging failures instead of propagating them.
	pub async fn send_robust(&self, instance: T) -> Vec<Result<(), SignalError>> {
		let instance = Arc::new(instance);
		let receivers = self.receivers.read().clone();
		let mut results = Vec::with_capacity(receivers.len());
		for info in receivers {
			let result = (info.receiver)(instance.clone()).await;
			if let Err(ref err) = result {
				tracing::error!(signal = %self.name, error = %err, "signal receiver failed");
			}
			results.push(result);
		}
		results
	}

	pub fn receiver_count(&self) -> usize {
		self.receivers.read().len()
	}
}

/// Payload of a `post_save` signal.
///
/// `pool` is the connection pool the instance was saved through, so receivers
/// can run their own queries.
#[derive(Debug, Clone)]
pub struct PostSave<M> {
	pub instance: M,
	pub created: bool,
	pub pool: sqlx::SqlitePool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_receivers_run_by_priority() {
		let signal = Signal::<u32>::new("test");
		let seen = Arc::new(Mutex::new(Vec::new()));

		let low = seen.clone();
		signal.connect_with_options(
			move |v: Arc<u32>| {
				let low = low.clone();
				async move {
					low.lock().push(format!("low {}", v));
					Ok(())
				}
			},
			None,
			0,
		);
		let high = seen.clone();
		signal.connect_with_options(
			move |v: Arc<u32>| {
				let high = high.clone();
				async move {
					high.lock().push(format!("high {}", v));
					Ok(())
				}
			},
			None,
			10,
		);

		signal.send(7).await.unwrap();

		assert_eq!(*seen.lock(), vec!["high 7", "low 7"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_dispatch_uid_replaces_and_disconnects() {
		let signal = Signal::<u32>::new("test");
		signal.connect_with_options(|_| async { Ok(()) }, Some("uid".into()), 0);
		signal.connect_with_options(|_| async { Ok(()) }, Some("uid".into()), 0);

		assert_eq!(signal.receiver_count(), 1);
		assert!(signal.disconnect("uid"));
		assert_eq!(signal.receiver_count(), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_send_stops_on_error_but_robust_continues() {
		let signal = Signal::<u32>::new("test");
		let calls = Arc::new(Mutex::new(0));
		signal.connect_with_options(
			|_| async { Err(SignalError::receiver_failed("boom", "failed")) },
			None,
			5,
		);
		let counter = calls.clone();
		signal.connect(move |_| {
			let counter = counter.clone();
			async move {
				*counter.lock() += 1;
				Ok(())
			}
		});

		assert!(signal.send(1).await.is_err());
		assert_eq!(*calls.lock(), 0);

		let results = signal.send_robust(1).await;
		assert_eq!(results.len(), 2);
		assert!(results[0].is_err());
		assert_eq!(*calls.lock(), 1);
	}
}
