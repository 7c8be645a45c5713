//! Transaction status machine.
//!
//! Drives one deployment at a time through `Idle -> Pending -> Success | Failed`
//! and back to `Idle` after the reset delay. Each trigger opens a new cycle:
//! the request is built, submitted through the wallet, and its receipt is
//! watched until decided. Outcomes are applied only when they belong to the
//! current cycle and the stored identifier; anything else is discarded.
//!
//! All state sits behind one mutex that is never held across an await. The
//! in-flight cycle and the reset timer are tokio tasks owned by the machine
//! and aborted on a new trigger, on shutdown and on drop.

use crate::event_bus::EventBus;
use deployer_encoder::RequestBuilder;
use deployer_receipt::ReceiptWatcher;
use deployer_types::{
	truncate_id, LifecycleEvent, ReceiptOutcome, RejectReason, SubmissionResult,
	TransactionIdentifier, TransactionStatus,
};
use deployer_wallet::TransactionSubmitter;
use futures::StreamExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::instrument;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
	#[error("Status machine must be created inside a tokio runtime")]
	NoRuntime,
	#[error("Status machine has been shut down")]
	ShutDown,
}

/// Result of a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
	/// A new cycle started.
	Started { cycle: u64 },
	/// A transaction is already pending; nothing happened.
	Ignored,
}

/// Whether an outcome handed to the machine was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	Applied,
	/// The outcome belongs to a previous cycle or identifier.
	Discarded,
}

/// Point-in-time view of the machine, as rendered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
	pub status: TransactionStatus,
	pub label: Option<&'static str>,
	pub transaction_id: Option<TransactionIdentifier>,
	pub can_trigger: bool,
	pub cycle: u64,
}

#[derive(Default)]
struct LifecycleState {
	status: TransactionStatus,
	transaction_id: Option<TransactionIdentifier>,
	cycle: u64,
	cycle_task: Option<JoinHandle<()>>,
	reset_task: Option<JoinHandle<()>>,
	shut_down: bool,
}

impl LifecycleState {
	/// Moves to `to` and returns the matching event.
	fn transition(&mut self, to: TransactionStatus) -> LifecycleEvent {
		let from = std::mem::replace(&mut self.status, to);
		LifecycleEvent::StatusChanged { from, to }
	}

	fn abort_tasks(&mut self) {
		if let Some(task) = self.reset_task.take() {
			task.abort();
		}
		if let Some(task) = self.cycle_task.take() {
			task.abort();
		}
	}
}

struct Shared {
	state: Mutex<LifecycleState>,
	builder: Arc<dyn RequestBuilder>,
	submitter: TransactionSubmitter,
	watcher: ReceiptWatcher,
	event_bus: EventBus,
	reset_delay: Duration,
	runtime: Handle,
}

/// Authoritative owner of the deployment status and identifier.
pub struct TransactionStatusMachine {
	shared: Arc<Shared>,
}

impl std::fmt::Debug for TransactionStatusMachine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransactionStatusMachine").finish_non_exhaustive()
	}
}

impl TransactionStatusMachine {
	/// Creates an idle machine. Must be called inside a tokio runtime, which
	/// then runs the machine's tasks.
	pub fn new(
		builder: Arc<dyn RequestBuilder>,
		submitter: TransactionSubmitter,
		watcher: ReceiptWatcher,
		reset_delay: Duration,
	) -> Result<Self, LifecycleError> {
		let runtime = Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;

		Ok(Self {
			shared: Arc::new(Shared {
				state: Mutex::new(LifecycleState::default()),
				builder,
				submitter,
				watcher,
				event_bus: EventBus::new(EVENT_CAPACITY),
				reset_delay,
				runtime,
			}),
		})
	}

	/// Starts a new deployment unless one is pending.
	///
	/// From `Success` or `Failed` the scheduled reset is cancelled and the
	/// previous identifier cleared before the new cycle starts.
	pub fn trigger(&self) -> Result<TriggerOutcome, LifecycleError> {
		self.shared.trigger()
	}

	pub fn status(&self) -> TransactionStatus {
		self.shared.lock().status
	}

	pub fn transaction_id(&self) -> Option<TransactionIdentifier> {
		self.shared.lock().transaction_id.clone()
	}

	pub fn can_trigger(&self) -> bool {
		let state = self.shared.lock();
		!state.shut_down && state.status.can_trigger()
	}

	pub fn snapshot(&self) -> StatusSnapshot {
		let state = self.shared.lock();
		StatusSnapshot {
			status: state.status,
			label: state.status.label(),
			transaction_id: state.transaction_id.clone(),
			can_trigger: !state.shut_down && state.status.can_trigger(),
			cycle: state.cycle,
		}
	}

	/// Applies the result of the submission made in `cycle`.
	pub fn apply_submission(&self, cycle: u64, result: SubmissionResult) -> Disposition {
		self.shared.apply_submission(cycle, result)
	}

	/// Applies a receipt outcome observed for `identifier`.
	pub fn apply_receipt_outcome(
		&self,
		identifier: &TransactionIdentifier,
		outcome: ReceiptOutcome,
	) -> Disposition {
		self.shared.apply_receipt_outcome(identifier, outcome)
	}

	pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LifecycleEvent> {
		self.shared.event_bus.subscribe()
	}

	/// Cancels the reset timer and the in-flight cycle. Later triggers fail.
	///
	/// The current status is kept as is.
	pub fn shutdown(&self) {
		let mut state = self.shared.lock();
		if !state.shut_down {
			tracing::info!(status = %state.status, "Shutting down status machine");
		}
		state.shut_down = true;
		state.abort_tasks();
	}
}

impl Drop for TransactionStatusMachine {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl Shared {
	fn lock(&self) -> MutexGuard<'_, LifecycleState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn publish(&self, event: LifecycleEvent) {
		self.event_bus.publish(event).ok();
	}

	fn trigger(self: &Arc<Self>) -> Result<TriggerOutcome, LifecycleError> {
		let mut state = self.lock();
		if state.shut_down {
			return Err(LifecycleError::ShutDown);
		}
		if !state.status.can_trigger() {
			tracing::debug!(cycle = state.cycle, "Trigger ignored while pending");
			return Ok(TriggerOutcome::Ignored);
		}

		state.abort_tasks();
		state.cycle += 1;
		state.transaction_id = None;
		let cycle = state.cycle;
		let event = state.transition(TransactionStatus::Pending);

		let shared = Arc::clone(self);
		state.cycle_task = Some(self.runtime.spawn(async move { shared.run_cycle(cycle).await }));

		self.publish(event);
		tracing::info!(cycle, "Deployment triggered");
		Ok(TriggerOutcome::Started { cycle })
	}

	#[instrument(skip_all, fields(cycle = cycle))]
	async fn run_cycle(self: Arc<Self>, cycle: u64) {
		let builder = Arc::clone(&self.builder);
		let request = match std::panic::catch_unwind(AssertUnwindSafe(|| builder.build())) {
			Ok(Ok(request)) => request,
			Ok(Err(e)) => {
				tracing::error!(error = %e, "Failed to encode deployment");
				self.apply_submission(
					cycle,
					SubmissionResult::Rejected(RejectReason::Encoding(e.to_string())),
				);
				return;
			},
			Err(_) => {
				tracing::error!("Request builder panicked");
				self.apply_submission(
					cycle,
					SubmissionResult::Rejected(RejectReason::Internal(
						"request builder panicked".to_string(),
					)),
				);
				return;
			},
		};

		let result = self
			.submitter
			.submit(&request, self.builder.payload_format())
			.await;
		let identifier = match result {
			SubmissionResult::Submitted(id) => {
				let submitted = SubmissionResult::Submitted(id.clone());
				if self.apply_submission(cycle, submitted) == Disposition::Discarded {
					return;
				}
				id
			},
			rejected => {
				self.apply_submission(cycle, rejected);
				return;
			},
		};

		let mut outcomes = Box::pin(self.watcher.watch(&identifier));
		while let Some(outcome) = outcomes.next().await {
			let terminal = outcome.is_terminal();
			if self.apply_receipt_outcome(&identifier, outcome) == Disposition::Discarded
				|| terminal
			{
				break;
			}
		}
	}

	fn apply_submission(self: &Arc<Self>, cycle: u64, result: SubmissionResult) -> Disposition {
		let mut state = self.lock();
		if state.shut_down
			|| state.cycle != cycle
			|| state.status != TransactionStatus::Pending
			|| state.transaction_id.is_some()
		{
			tracing::warn!(
				cycle,
				current_cycle = state.cycle,
				"Discarding submission result of a past cycle"
			);
			if let SubmissionResult::Submitted(transaction_id) = result {
				drop(state);
				self.publish(LifecycleEvent::StaleOutcomeDiscarded { transaction_id });
			}
			return Disposition::Discarded;
		}

		match result {
			SubmissionResult::Submitted(transaction_id) => {
				tracing::info!(
					cycle,
					transaction_id = %truncate_id(transaction_id.as_str()),
					"Watching transaction"
				);
				state.transaction_id = Some(transaction_id.clone());
				drop(state);
				self.publish(LifecycleEvent::TransactionSubmitted { transaction_id });
			},
			SubmissionResult::Rejected(reason) => {
				tracing::warn!(cycle, reason = %reason, "Submission rejected");
				let event = state.transition(TransactionStatus::Failed);
				self.schedule_reset(&mut state);
				drop(state);
				self.publish(LifecycleEvent::SubmissionRejected { reason });
				self.publish(event);
			},
		}
		Disposition::Applied
	}

	fn apply_receipt_outcome(
		self: &Arc<Self>,
		identifier: &TransactionIdentifier,
		outcome: ReceiptOutcome,
	) -> Disposition {
		let mut state = self.lock();
		if state.shut_down
			|| state.status != TransactionStatus::Pending
			|| state.transaction_id.as_ref() != Some(identifier)
		{
			tracing::warn!(
				transaction_id = %truncate_id(identifier.as_str()),
				outcome = %outcome,
				"Discarding receipt outcome of an untracked transaction"
			);
			drop(state);
			self.publish(LifecycleEvent::StaleOutcomeDiscarded {
				transaction_id: identifier.clone(),
			});
			return Disposition::Discarded;
		}

		let to = match &outcome {
			ReceiptOutcome::Confirming => return Disposition::Applied,
			ReceiptOutcome::Confirmed => {
				tracing::info!(
					transaction_id = %truncate_id(identifier.as_str()),
					"Deployment confirmed"
				);
				TransactionStatus::Success
			},
			ReceiptOutcome::Errored(reason) => {
				tracing::error!(
					transaction_id = %truncate_id(identifier.as_str()),
					reason = %reason,
					"Deployment failed on chain"
				);
				TransactionStatus::Failed
			},
		};

		let event = state.transition(to);
		self.schedule_reset(&mut state);
		drop(state);
		self.publish(LifecycleEvent::ReceiptResolved {
			transaction_id: identifier.clone(),
			outcome,
		});
		self.publish(event);
		Disposition::Applied
	}

	/// Replaces the reset timer of the current cycle.
	fn schedule_reset(self: &Arc<Self>, state: &mut LifecycleState) {
		if let Some(task) = state.reset_task.take() {
			task.abort();
		}

		let shared = Arc::clone(self);
		let cycle = state.cycle;
		let delay = self.reset_delay;
		state.reset_task = Some(self.runtime.spawn(async move {
			tokio::time::sleep(delay).await;
			shared.reset(cycle);
		}));
	}

	fn reset(&self, cycle: u64) {
		let mut state = self.lock();
		if state.shut_down || state.cycle != cycle || !state.status.is_terminal() {
			return;
		}

		state.transaction_id = None;
		state.reset_task = None;
		let event = state.transition(TransactionStatus::Idle);
		drop(state);
		tracing::debug!(cycle, "Status reset to idle");
		self.publish(event);
	}
}
