//! Named, independently lockable units of state.
//!
//! Every payload mutation happens through a [`RecordGuard`] inside a
//! `begin_transaction`/`end_transaction` pair. Listeners are told about a
//! record only when the outermost transaction ends, so they never observe a
//! partially updated payload.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use crate::{CommandFields, Payload, PayloadKind, ProcessError};

pub type Timestamp = DateTime<Utc>;

/// Access-security assignment carried by a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSecurity {
	pub level: i32,
	pub group: String,
}

impl Default for AccessSecurity {
	fn default() -> Self {
		Self {
			level: 0,
			group: "DEFAULT".to_string(),
		}
	}
}

/// Mutable view handed to a [`ProcessHandler`].
pub struct ProcessContext<'a> {
	name: &'a str,
	payload: &'a mut Payload,
	timestamp: &'a mut Option<Timestamp>,
}

impl ProcessContext<'_> {
	pub fn name(&self) -> &str {
		self.name
	}

	pub fn payload(&self) -> &Payload {
		self.payload
	}

	pub fn payload_mut(&mut self) -> &mut Payload {
		self.payload
	}

	pub fn timestamp(&self) -> Option<Timestamp> {
		*self.timestamp
	}

	pub fn set_timestamp(&mut self, ts: Timestamp) {
		*self.timestamp = Some(ts);
	}

	pub fn stamp_now(&mut self) {
		self.set_timestamp(Utc::now());
	}

	/// Command fields of a command record.
	pub fn command_mut(&mut self) -> Result<&mut CommandFields, ProcessError> {
		let found = self.payload.kind();
		let name = self.name;
		self.payload.as_command_mut().ok_or_else(|| ProcessError::InvalidPayload {
			record: name.to_string(),
			expected: PayloadKind::Command,
			found,
		})
	}
}

/// Behavior run by `process()`.
///
/// Called with the record lock held; implementations must not lock their
/// own record again.
pub trait ProcessHandler: Send + 'static {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError>;
}

impl<F> ProcessHandler for F
where
	F: FnMut(&mut ProcessContext<'_>) -> Result<(), ProcessError> + Send + 'static,
{
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		self(cx)
	}
}

/// Default handler: stamps the current time.
#[derive(Debug, Default, Clone, Copy)]
pub struct StampTime;

impl ProcessHandler for StampTime {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		cx.stamp_now();
		Ok(())
	}
}

/// Committed state of a record, delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSnapshot {
	pub name: Arc<str>,
	pub payload: Payload,
	pub timestamp: Option<Timestamp>,
	/// Number of committed transactions, starting at 1.
	pub sequence: u64,
}

/// Observer of committed record updates.
///
/// Invoked with the record lock held: implementations must not block and
/// must not lock the record.
pub trait RecordListener: Send + Sync + 'static {
	fn committed(&self, snapshot: &RecordSnapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct RecordState {
	payload: Payload,
	timestamp: Option<Timestamp>,
	handler: Box<dyn ProcessHandler>,
	depth: u32,
	/// Committed payload and timestamp, saved by the outermost begin.
	rollback: Option<(Payload, Option<Timestamp>)>,
	sequence: u64,
	listeners: Vec<(ListenerId, Arc<dyn RecordListener>)>,
	next_listener: u64,
}

/// A named unit of state with its own mutex.
pub struct Record {
	name: Arc<str>,
	access: AccessSecurity,
	trace_level: AtomicU8,
	state: Mutex<RecordState>,
}

impl std::fmt::Debug for Record {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Record").field("name", &self.name).field("access", &self.access).finish_non_exhaustive()
	}
}

/// Builder for [`Record`].
pub struct RecordBuilder {
	name: String,
	payload: Payload,
	handler: Box<dyn ProcessHandler>,
	access: AccessSecurity,
}

impl RecordBuilder {
	#[must_use]
	pub fn payload(mut self, payload: Payload) -> Self {
		self.payload = payload;
		self
	}

	#[must_use]
	pub fn handler(mut self, handler: impl ProcessHandler) -> Self {
		self.handler = Box::new(handler);
		self
	}

	#[must_use]
	pub fn access(mut self, level: i32, group: impl Into<String>) -> Self {
		self.access = AccessSecurity {
			level,
			group: group.into(),
		};
		self
	}

	pub fn build(self) -> Arc<Record> {
		Arc::new(Record {
			name: self.name.into(),
			access: self.access,
			trace_level: AtomicU8::new(0),
			state: Mutex::new(RecordState {
				payload: self.payload,
				timestamp: None,
				handler: self.handler,
				depth: 0,
				rollback: None,
				sequence: 0,
				listeners: Vec::new(),
				next_listener: 0,
			}),
		})
	}
}

impl Record {
	pub fn builder(name: impl Into<String>) -> RecordBuilder {
		RecordBuilder {
			name: name.into(),
			payload: Payload::Empty,
			handler: Box::new(StampTime),
			access: AccessSecurity::default(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn access(&self) -> &AccessSecurity {
		&self.access
	}

	pub fn trace_level(&self) -> u8 {
		self.trace_level.load(Ordering::Relaxed)
	}

	pub fn set_trace_level(&self, level: u8) {
		self.trace_level.store(level, Ordering::Relaxed);
	}

	/// Acquires the record mutex. Not reentrant.
	pub fn lock(&self) -> RecordGuard<'_> {
		RecordGuard {
			record: self,
			state: self.state.lock(),
		}
	}

	pub fn try_lock(&self) -> Option<RecordGuard<'_>> {
		self.state.try_lock().map(|state| RecordGuard { record: self, state })
	}

	/// Copy of the current state, taken under the lock.
	pub fn snapshot(&self) -> RecordSnapshot {
		self.lock().snapshot()
	}

	pub fn add_listener(&self, listener: Arc<dyn RecordListener>) -> ListenerId {
		let mut state = self.state.lock();
		let id = ListenerId(state.next_listener);
		state.next_listener = state.next_listener.wrapping_add(1);
		state.listeners.push((id, listener));
		id
	}

	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut state = self.state.lock();
		let before = state.listeners.len();
		state.listeners.retain(|(listener_id, _)| *listener_id != id);
		state.listeners.len() != before
	}
}

/// Exclusive access to one record. Dropping the guard unlocks it.
pub struct RecordGuard<'a> {
	record: &'a Record,
	state: MutexGuard<'a, RecordState>,
}

impl RecordGuard<'_> {
	pub fn record(&self) -> &Record {
		self.record
	}

	pub fn begin_transaction(&mut self) {
		let state = &mut *self.state;
		if state.depth == 0 {
			state.rollback = Some((state.payload.clone(), state.timestamp));
		}
		state.depth = state.depth.saturating_add(1);
	}

	/// Closes one transaction level; the outermost close notifies listeners.
	pub fn end_transaction(&mut self) {
		let state = &mut *self.state;
		match state.depth {
			0 => tracing::warn!(record = %self.record.name, "record.unbalanced_end_transaction"),
			1 => {
				state.depth = 0;
				state.rollback = None;
				state.sequence = state.sequence.wrapping_add(1);
				if !state.listeners.is_empty() {
					let snapshot = RecordSnapshot {
						name: Arc::clone(&self.record.name),
						payload: state.payload.clone(),
						timestamp: state.timestamp,
						sequence: state.sequence,
					};
					for (_, listener) in &state.listeners {
						listener.committed(&snapshot);
					}
				}
			}
			_ => state.depth -= 1,
		}
	}

	pub fn in_transaction(&self) -> bool {
		self.state.depth > 0
	}

	/// Runs the record's handler.
	pub fn process(&mut self) -> Result<(), ProcessError> {
		let trace = self.record.trace_level();
		let RecordState {
			payload, timestamp, handler, ..
		} = &mut *self.state;
		let mut cx = ProcessContext {
			name: &self.record.name,
			payload,
			timestamp,
		};
		let result = handler.process(&mut cx);
		if trace > 0 {
			tracing::debug!(record = %self.record.name, trace, ok = result.is_ok(), "record.process");
		}
		result
	}

	pub fn payload(&self) -> &Payload {
		&self.state.payload
	}

	pub fn timestamp(&self) -> Option<Timestamp> {
		self.state.timestamp
	}

	fn require_transaction(&self) -> Result<(), ProcessError> {
		if self.in_transaction() {
			Ok(())
		} else {
			Err(ProcessError::NoTransaction {
				record: self.record.name.to_string(),
			})
		}
	}

	/// Swaps in a new payload, returning the previous one.
	pub fn replace_payload(&mut self, payload: Payload) -> Result<Payload, ProcessError> {
		self.require_transaction()?;
		Ok(std::mem::replace(&mut self.state.payload, payload))
	}

	/// Wholesale array replacement.
	pub fn replace_array(&mut self, values: Arc<[i64]>) -> Result<(), ProcessError> {
		self.replace_payload(Payload::Array(values)).map(drop)
	}

	pub fn set_timestamp(&mut self, ts: Timestamp) -> Result<(), ProcessError> {
		self.require_transaction()?;
		self.state.timestamp = Some(ts);
		Ok(())
	}

	/// Command fields, for writing a command into a command record.
	pub fn command_mut(&mut self) -> Result<&mut CommandFields, ProcessError> {
		self.require_transaction()?;
		let found = self.state.payload.kind();
		let record = &self.record.name;
		self.state.payload.as_command_mut().ok_or_else(|| ProcessError::InvalidPayload {
			record: record.to_string(),
			expected: PayloadKind::Command,
			found,
		})
	}

	pub fn snapshot(&self) -> RecordSnapshot {
		RecordSnapshot {
			name: Arc::clone(&self.record.name),
			payload: self.state.payload.clone(),
			timestamp: self.state.timestamp,
			sequence: self.state.sequence,
		}
	}
}

impl Drop for RecordGuard<'_> {
	fn drop(&mut self) {
		let state = &mut *self.state;
		if state.depth > 0 {
			// Abandoned transaction: restore the last committed state without notifying.
			tracing::warn!(record = %self.record.name, depth = state.depth, "record.transaction_abandoned");
			state.depth = 0;
			if let Some((payload, timestamp)) = state.rollback.take() {
				state.payload = payload;
				state.timestamp = timestamp;
			}
		}
	}
}

#[cfg(test)]
mod tests;
