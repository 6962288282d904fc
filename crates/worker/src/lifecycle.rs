//! Start/stop/destroy protocol for dedicated worker threads.
//!
//! A worker owns one OS thread running a [`WorkerLoop`]. Stopping is a
//! cooperative handshake: [`Worker::stop`] raises the [`StopSignal`], waits on
//! the loop's completion [`Latch`], and only then joins the thread. There is
//! no forced termination; a loop that never returns to its stop check keeps
//! `stop()` blocked.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::latch::Latch;
use crate::registry::{WorkerProbe, WorkerStatusRegistry};
use crate::signal::StopSignal;
use crate::spawn::{panic_message, spawn_named_thread};
use crate::{WorkerClass, WorkerError};

/// Lifecycle state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	Created,
	Running,
	StopRequested,
	Stopped,
}

impl WorkerState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::Running => "running",
			Self::StopRequested => "stop_requested",
			Self::Stopped => "stopped",
		}
	}
}

impl std::fmt::Display for WorkerState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
	/// Stopped before `start()` was ever called.
	NeverStarted,
	/// Observed the stop request, or the loop asked to exit.
	Stopped,
	/// A tick returned an error.
	Failed(String),
	/// The loop panicked.
	Panicked(String),
}

impl WorkerExit {
	pub fn is_failure(&self) -> bool {
		matches!(self, Self::Failed(_) | Self::Panicked(_))
	}
}

impl std::fmt::Display for WorkerExit {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::NeverStarted => f.write_str("never started"),
			Self::Stopped => f.write_str("stopped"),
			Self::Failed(msg) => write!(f, "failed: {msg}"),
			Self::Panicked(msg) => write!(f, "panicked: {msg}"),
		}
	}
}

/// Result of a [`Worker::stop`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
	/// Called from the worker's own thread: the request is raised but not awaited.
	Requested,
	/// Termination was confirmed and the thread has been joined.
	Stopped(WorkerExit),
}

impl StopOutcome {
	pub fn exit(&self) -> Option<&WorkerExit> {
		match self {
			Self::Requested => None,
			Self::Stopped(exit) => Some(exit),
		}
	}
}

/// Continuation directive returned by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
	Continue,
	Exit,
}

/// Per-tick view of the worker running a loop.
pub struct TickContext<'a> {
	name: &'a str,
	signal: &'a StopSignal,
}

impl TickContext<'_> {
	pub fn worker_name(&self) -> &str {
		self.name
	}

	/// Re-checks the stop request, e.g. after taking a lock the tick waited on.
	pub fn stop_requested(&self) -> bool {
		self.signal.is_stop_requested()
	}
}

/// Body of a worker thread.
///
/// The driver sleeps for [`WorkerLoop::delay`] (when non-zero), checks the
/// stop request, then calls [`WorkerLoop::tick`].
pub trait WorkerLoop: Send + 'static {
	fn delay(&self) -> Duration;

	fn tick(&mut self, ctx: &TickContext<'_>) -> Result<TickFlow, String>;
}

struct Shared {
	probe: Arc<WorkerProbe>,
	signal: StopSignal,
	done: Latch<WorkerExit>,
}

/// Join coordination: the first stopper to see `Handle` becomes the leader
/// and joins; later stoppers wait until the leader moves to `Done`.
enum JoinState {
	Idle,
	Handle(JoinHandle<()>),
	Joining,
	Done,
}

struct Inner {
	state: WorkerState,
	body: Option<Box<dyn WorkerLoop>>,
	thread: Option<ThreadId>,
	join: JoinState,
	status: Option<WorkerStatusRegistry>,
}

/// Handle owning one worker thread and its lifecycle.
pub struct Worker {
	shared: Arc<Shared>,
	inner: Mutex<Inner>,
	joined: Condvar,
}

impl std::fmt::Debug for Worker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Worker")
			.field("name", &self.name())
			.field("class", &self.class())
			.field("state", &self.state())
			.finish()
	}
}

impl Worker {
	pub fn new(name: impl Into<String>, class: WorkerClass, body: impl WorkerLoop) -> Self {
		Self {
			shared: Arc::new(Shared {
				probe: Arc::new(WorkerProbe::new(name.into(), class)),
				signal: StopSignal::new(),
				done: Latch::new(),
			}),
			inner: Mutex::new(Inner {
				state: WorkerState::Created,
				body: Some(Box::new(body)),
				thread: None,
				join: JoinState::Idle,
				status: None,
			}),
			joined: Condvar::new(),
		}
	}

	/// Publishes this worker's status until it is destroyed.
	#[must_use]
	pub fn with_status(self, status: &WorkerStatusRegistry) -> Self {
		status.register(Arc::clone(&self.shared.probe));
		self.inner.lock().status = Some(status.clone());
		self
	}

	pub fn name(&self) -> &str {
		self.shared.probe.name()
	}

	pub fn class(&self) -> WorkerClass {
		self.shared.probe.class()
	}

	/// `Stopped` as soon as the loop has confirmed termination, whether or
	/// not `stop()` has joined its thread yet.
	pub fn state(&self) -> WorkerState {
		let state = self.inner.lock().state;
		if self.shared.done.is_complete() {
			WorkerState::Stopped
		} else {
			state
		}
	}

	/// Number of completed ticks.
	pub fn ticks(&self) -> u64 {
		self.shared.probe.ticks()
	}

	/// Exit confirmed by the loop, if it has ended.
	pub fn exit(&self) -> Option<WorkerExit> {
		self.shared.done.get()
	}

	/// Waits up to `timeout` for the loop to confirm termination, without
	/// requesting a stop.
	pub fn wait_exit_timeout(&self, timeout: Duration) -> Option<WorkerExit> {
		self.shared.done.wait_timeout(timeout)
	}

	pub fn stop_signal(&self) -> &StopSignal {
		&self.shared.signal
	}

	fn set_state(&self, inner: &mut MutexGuard<'_, Inner>, state: WorkerState) {
		inner.state = state;
		self.shared.probe.set_state(state);
	}

	/// Spawns the worker thread. Valid only from [`WorkerState::Created`].
	pub fn start(&self) -> Result<(), WorkerError> {
		let mut inner = self.inner.lock();
		let body = match (inner.state, inner.body.take()) {
			(WorkerState::Created, Some(body)) => body,
			(state, body) => {
				inner.body = body;
				return Err(WorkerError::InvalidState {
					worker: self.name().to_string(),
					state,
				});
			}
		};

		let shared = Arc::clone(&self.shared);
		match spawn_named_thread(self.class(), self.name(), move || run_loop(body, shared)) {
			Ok(handle) => {
				inner.thread = Some(handle.thread().id());
				inner.join = JoinState::Handle(handle);
				self.set_state(&mut inner, WorkerState::Running);
				tracing::debug!(worker = %self.name(), worker_class = self.class().as_str(), "worker.start");
				Ok(())
			}
			Err(source) => {
				let exit = WorkerExit::Failed(format!("thread spawn failed: {source}"));
				self.shared.probe.set_exit(exit.clone());
				self.shared.done.complete(exit);
				inner.join = JoinState::Done;
				self.set_state(&mut inner, WorkerState::Stopped);
				Err(WorkerError::Spawn {
					worker: self.name().to_string(),
					source,
				})
			}
		}
	}

	/// Requests a stop and blocks until the loop confirms termination.
	///
	/// Idempotent: later calls return the same outcome. Called from the
	/// worker's own thread it only raises the request.
	pub fn stop(&self) -> StopOutcome {
		let leader = {
			let mut inner = self.inner.lock();
			match inner.state {
				WorkerState::Created => {
					inner.body = None;
					self.shared.probe.set_exit(WorkerExit::NeverStarted);
					self.shared.done.complete(WorkerExit::NeverStarted);
					inner.join = JoinState::Done;
					self.set_state(&mut inner, WorkerState::Stopped);
					return StopOutcome::Stopped(WorkerExit::NeverStarted);
				}
				WorkerState::Running => {
					self.set_state(&mut inner, WorkerState::StopRequested);
					self.shared.signal.request_stop();
					tracing::debug!(worker = %self.name(), "worker.stop_requested");
				}
				WorkerState::StopRequested | WorkerState::Stopped => {}
			}

			if inner.thread == Some(std::thread::current().id()) {
				return StopOutcome::Requested;
			}

			match std::mem::replace(&mut inner.join, JoinState::Joining) {
				JoinState::Handle(handle) => Some(handle),
				other => {
					inner.join = other;
					None
				}
			}
		};

		let exit = self.shared.done.wait();

		let mut inner = self.inner.lock();
		if let Some(handle) = leader {
			drop(inner);
			if handle.join().is_err() {
				tracing::warn!(worker = %self.name(), "worker.join_failed");
			}
			inner = self.inner.lock();
			inner.join = JoinState::Done;
			self.set_state(&mut inner, WorkerState::Stopped);
			self.joined.notify_all();
			tracing::debug!(worker = %self.name(), exit = %exit, "worker.stopped");
		} else {
			while matches!(inner.join, JoinState::Joining) {
				self.joined.wait(&mut inner);
			}
		}
		StopOutcome::Stopped(exit)
	}

	/// Stops the worker, then releases its loop state and status entry.
	pub fn destroy(&self) -> StopOutcome {
		let outcome = self.stop();
		if outcome == StopOutcome::Requested {
			return outcome;
		}
		let mut inner = self.inner.lock();
		inner.body = None;
		inner.thread = None;
		if let Some(status) = inner.status.take() {
			status.remove(self.name());
		}
		outcome
	}
}

impl Drop for Worker {
	fn drop(&mut self) {
		// Never block in drop; a running loop sees the request and exits detached.
		self.shared.signal.request_stop();
	}
}

/// Completes the latch if the thread unwinds past `run_loop` without confirming.
struct ConfirmOnExit<'a>(&'a Shared);

impl Drop for ConfirmOnExit<'_> {
	fn drop(&mut self) {
		if !self.0.done.is_complete() {
			let exit = WorkerExit::Panicked("worker thread unwound before confirming".to_string());
			self.0.probe.set_exit(exit.clone());
			self.0.probe.set_state(WorkerState::Stopped);
			self.0.done.complete(exit);
		}
	}
}

fn run_loop(mut body: Box<dyn WorkerLoop>, shared: Arc<Shared>) {
	let confirm = ConfirmOnExit(&shared);
	let exit = match catch_unwind(AssertUnwindSafe(|| drive(body.as_mut(), &shared))) {
		Ok(exit) => exit,
		Err(payload) => WorkerExit::Panicked(panic_message(payload.as_ref())),
	};
	// Release loop-owned records and sets before confirming.
	drop(body);

	match &exit {
		WorkerExit::Failed(msg) => tracing::error!(worker = %shared.probe.name(), error = %msg, "worker.loop_failed"),
		WorkerExit::Panicked(msg) => tracing::error!(worker = %shared.probe.name(), panic = %msg, "worker.loop_panicked"),
		_ => tracing::debug!(worker = %shared.probe.name(), "worker.loop_exit"),
	}
	shared.probe.set_exit(exit.clone());
	shared.probe.set_state(WorkerState::Stopped);
	shared.done.complete(exit);
	drop(confirm);
}

fn drive(body: &mut dyn WorkerLoop, shared: &Shared) -> WorkerExit {
	let ctx = TickContext {
		name: shared.probe.name(),
		signal: &shared.signal,
	};
	loop {
		let delay = body.delay();
		if !delay.is_zero() {
			shared.signal.sleep(delay);
		}
		if shared.signal.is_stop_requested() {
			return WorkerExit::Stopped;
		}
		match body.tick(&ctx) {
			Ok(TickFlow::Continue) => shared.probe.record_tick(),
			Ok(TickFlow::Exit) => return WorkerExit::Stopped,
			Err(err) => return WorkerExit::Failed(err),
		}
	}
}
