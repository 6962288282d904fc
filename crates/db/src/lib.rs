//! Record database primitives: [`Record`], its lock/transaction guard, and
//! the shared [`Registry`].

mod error;
mod payload;
mod record;
mod registry;

pub use error::ProcessError;
pub use payload::{CommandFields, Payload, PayloadKind};
pub use record::{
	AccessSecurity, ListenerId, ProcessContext, ProcessHandler, Record, RecordBuilder, RecordGuard, RecordListener, RecordSnapshot, StampTime, Timestamp,
};
pub use registry::{Registry, WeakRegistry};
