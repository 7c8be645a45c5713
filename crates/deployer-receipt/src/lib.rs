//! Receipt watching for submitted transactions.
//!
//! A receipt source answers a single question: what does the node currently
//! say about this identifier. The [`ReceiptWatcher`] turns repeated answers
//! into a forward-only stream of outcomes that ends once the transaction is
//! decided or the watch times out.

use async_trait::async_trait;
use deployer_types::{
	truncate_id, ConfigSchema, ImplementationRegistry, NetworkConfig, ReceiptOutcome,
	TransactionIdentifier,
};
use futures::Stream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod rpc;
}

/// Errors raised while querying a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
	/// The node or resolver could not be reached.
	#[error("Network error: {0}")]
	Network(String),
	/// The identifier cannot be mapped to an on-chain hash.
	#[error("Cannot resolve identifier {0}")]
	Unresolvable(String),
	/// The source is misconfigured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining a receipt source.
#[async_trait]
pub trait ReceiptInterface: Send + Sync {
	/// Returns the configuration schema for this receipt implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Queries the current outcome of `identifier` once.
	async fn status_of(
		&self,
		identifier: &TransactionIdentifier,
	) -> Result<ReceiptOutcome, ReceiptError>;
}

/// Type alias for receipt source factory functions.
///
/// The last argument is the application id, forwarded to identifier
/// resolution.
pub type ReceiptFactory =
	fn(&toml::Value, &NetworkConfig, &str) -> Result<Box<dyn ReceiptInterface>, ReceiptError>;

/// Registry trait for receipt implementations.
pub trait ReceiptRegistry: ImplementationRegistry<Factory = ReceiptFactory> {}

/// Get all registered receipt implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ReceiptFactory)> {
	use implementations::rpc;

	vec![(rpc::Registry::NAME, rpc::Registry::factory())]
}

/// Polls a receipt source until a transaction is decided.
#[derive(Clone)]
pub struct ReceiptWatcher {
	source: Arc<dyn ReceiptInterface>,
	poll_interval: Duration,
	timeout: Duration,
	/// Last terminal outcome observed through `status_of`.
	decided: Arc<Mutex<Option<(TransactionIdentifier, ReceiptOutcome)>>>,
}

impl ReceiptWatcher {
	pub fn new(source: Arc<dyn ReceiptInterface>, poll_interval: Duration, timeout: Duration) -> Self {
		Self {
			source,
			poll_interval,
			timeout,
			decided: Arc::new(Mutex::new(None)),
		}
	}

	/// Queries `identifier` once.
	///
	/// Once a terminal outcome has been seen for an identifier it is returned
	/// again on every later query, whatever the node answers.
	pub async fn status_of(
		&self,
		identifier: &TransactionIdentifier,
	) -> Result<ReceiptOutcome, ReceiptError> {
		if let Some(outcome) = self.decided_outcome(identifier) {
			return Ok(outcome);
		}

		let outcome = self.source.status_of(identifier).await?;
		if outcome.is_terminal() {
			let mut decided = self.decided.lock().unwrap_or_else(|e| e.into_inner());
			*decided = Some((identifier.clone(), outcome.clone()));
		}
		Ok(outcome)
	}

	fn decided_outcome(&self, identifier: &TransactionIdentifier) -> Option<ReceiptOutcome> {
		let decided = self.decided.lock().unwrap_or_else(|e| e.into_inner());
		decided
			.as_ref()
			.filter(|(id, _)| id == identifier)
			.map(|(_, outcome)| outcome.clone())
	}

	/// Watches `identifier` until it is decided.
	///
	/// Each change of outcome is yielded once, in forward order. The stream
	/// ends right after a terminal outcome. Query errors are logged and polling
	/// continues; a watch outliving the timeout yields `Errored("timeout")`.
	pub fn watch(
		&self,
		identifier: &TransactionIdentifier,
	) -> impl Stream<Item = ReceiptOutcome> + Send + 'static {
		let watcher = self.clone();
		let identifier = identifier.clone();

		async_stream::stream! {
			let deadline = tokio::time::Instant::now() + watcher.timeout;
			let mut observed: Option<ReceiptOutcome> = None;

			loop {
				let polled = match tokio::time::timeout_at(deadline, watcher.status_of(&identifier)).await {
					Ok(polled) => polled,
					Err(_) => {
						tracing::warn!(transaction_id = %truncate_id(identifier.as_str()), "Receipt watch timed out");
						yield ReceiptOutcome::Errored("timeout".to_string());
						break;
					},
				};

				match polled {
					Ok(outcome) => {
						let next = match &observed {
							Some(previous) => previous.clone().advance(outcome),
							None => outcome,
						};
						let changed = observed.as_ref() != Some(&next);
						observed = Some(next.clone());

						if changed {
							tracing::debug!(
								transaction_id = %truncate_id(identifier.as_str()),
								outcome = %next,
								"Receipt outcome changed"
							);
						}
						if next.is_terminal() {
							yield next;
							break;
						}
						if changed {
							yield next;
						}
					},
					Err(e) => {
						tracing::warn!(
							transaction_id = %truncate_id(identifier.as_str()),
							error = %e,
							"Receipt query failed, retrying"
						);
					},
				}

				if tokio::time::Instant::now() + watcher.poll_interval >= deadline {
					tokio::time::sleep_until(deadline).await;
					tracing::warn!(transaction_id = %truncate_id(identifier.as_str()), "Receipt watch timed out");
					yield ReceiptOutcome::Errored("timeout".to_string());
					break;
				}
				tokio::time::sleep(watcher.poll_interval).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_types::{Schema, ValidationError};
	use futures::StreamExt;
	use std::collections::VecDeque;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	/// Answers from a script, repeating the last answer once exhausted.
	struct ScriptedSource {
		script: Mutex<VecDeque<Result<ReceiptOutcome, ()>>>,
		last: Mutex<Option<ReceiptOutcome>>,
		queries: AtomicUsize,
	}

	impl ScriptedSource {
		fn new(script: Vec<Result<ReceiptOutcome, ()>>) -> Arc<Self> {
			Arc::new(Self {
				script: Mutex::new(script.into()),
				last: Mutex::new(None),
				queries: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl ReceiptInterface for ScriptedSource {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn status_of(
			&self,
			_identifier: &TransactionIdentifier,
		) -> Result<ReceiptOutcome, ReceiptError> {
			self.queries.fetch_add(1, Ordering::SeqCst);
			let next = self.script.lock().unwrap().pop_front();
			match next {
				Some(Ok(outcome)) => {
					*self.last.lock().unwrap() = Some(outcome.clone());
					Ok(outcome)
				},
				Some(Err(())) => Err(ReceiptError::Network("node unavailable".into())),
				None => Ok(self
					.last
					.lock()
					.unwrap()
					.clone()
					.unwrap_or(ReceiptOutcome::Confirming)),
			}
		}
	}

	fn id(value: &str) -> TransactionIdentifier {
		TransactionIdentifier::new(value).unwrap()
	}

	fn watcher(source: Arc<ScriptedSource>) -> ReceiptWatcher {
		ReceiptWatcher::new(source, Duration::from_secs(2), Duration::from_secs(60))
	}

	#[tokio::test(start_paused = true)]
	async fn test_watch_yields_changes_once_and_ends() {
		let source = ScriptedSource::new(vec![
			Ok(ReceiptOutcome::Confirming),
			Ok(ReceiptOutcome::Confirming),
			Err(()),
			Ok(ReceiptOutcome::Confirming),
			Ok(ReceiptOutcome::Confirmed),
		]);
		let outcomes: Vec<_> = watcher(source.clone()).watch(&id("tx_1")).collect().await;

		assert_eq!(
			outcomes,
			vec![ReceiptOutcome::Confirming, ReceiptOutcome::Confirmed]
		);
		assert_eq!(source.queries.load(Ordering::SeqCst), 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_watch_reports_revert() {
		let source = ScriptedSource::new(vec![Ok(ReceiptOutcome::Errored("reverted".into()))]);
		let outcomes: Vec<_> = watcher(source).watch(&id("tx_2")).collect().await;

		assert_eq!(outcomes, vec![ReceiptOutcome::Errored("reverted".into())]);
	}

	#[tokio::test(start_paused = true)]
	async fn test_watch_times_out() {
		let source = ScriptedSource::new(vec![Ok(ReceiptOutcome::Confirming)]);
		let watcher = ReceiptWatcher::new(source, Duration::from_secs(2), Duration::from_secs(10));
		let start = tokio::time::Instant::now();

		let outcomes: Vec<_> = watcher.watch(&id("tx_3")).collect().await;

		assert_eq!(
			outcomes,
			vec![
				ReceiptOutcome::Confirming,
				ReceiptOutcome::Errored("timeout".into())
			]
		);
		assert_eq!(start.elapsed(), Duration::from_secs(10));
	}

	#[tokio::test]
	async fn test_status_of_never_moves_back() {
		let source = ScriptedSource::new(vec![
			Ok(ReceiptOutcome::Confirmed),
			Ok(ReceiptOutcome::Confirming),
		]);
		let watcher = watcher(source.clone());
		let tx = id("tx_4");

		assert_eq!(watcher.status_of(&tx).await.unwrap(), ReceiptOutcome::Confirmed);
		assert_eq!(watcher.status_of(&tx).await.unwrap(), ReceiptOutcome::Confirmed);
		assert_eq!(source.queries.load(Ordering::SeqCst), 1);

		// Another identifier is queried afresh.
		assert_eq!(
			watcher.status_of(&id("tx_5")).await.unwrap(),
			ReceiptOutcome::Confirming
		);
	}

	#[test]
	fn test_registry_lists_rpc_source() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["rpc"]);
	}
}
