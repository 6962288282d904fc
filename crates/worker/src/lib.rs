//! Worker threads and their lifecycle.
//!
//! Each long-lived worker runs a [`WorkerLoop`] on a dedicated named thread.
//! [`Worker`] implements the start/stop/destroy handshake; [`StopSignal`] and
//! [`Latch`] are the two halves of it (request and confirmation).

mod class;
mod error;
mod latch;
mod lifecycle;
mod registry;
mod signal;
mod spawn;

pub use class::WorkerClass;
pub use error::WorkerError;
pub use latch::Latch;
pub use lifecycle::{StopOutcome, TickContext, TickFlow, Worker, WorkerExit, WorkerLoop, WorkerState};
pub use registry::{WorkerProbe, WorkerRecord, WorkerStatusRegistry};
pub use signal::StopSignal;
pub use spawn::{panic_message, runtime_handle, spawn, spawn_blocking, spawn_named_thread};
