use std::sync::Arc;

/// Fields of a command record: an input command and target, plus a status
/// written back by `process()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFields {
	pub command: String,
	pub target: String,
	pub status: String,
}

impl CommandFields {
	pub fn new(command: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			target: target.into(),
			status: String::new(),
		}
	}
}

/// Discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
	Empty,
	Scalar,
	Array,
	Command,
}

impl PayloadKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Scalar => "scalar",
			Self::Array => "array",
			Self::Command => "command",
		}
	}
}

impl std::fmt::Display for PayloadKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Record payload.
///
/// Arrays are immutable and shared; writers replace the whole `Arc`, so a
/// reader holding the record lock never sees a half-written array.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
	#[default]
	Empty,
	Scalar(f64),
	Array(Arc<[i64]>),
	Command(CommandFields),
}

impl Payload {
	/// Array of `len` elements, all equal to `value`.
	pub fn filled(len: usize, value: i64) -> Self {
		Self::Array(vec![value; len].into())
	}

	pub fn command() -> Self {
		Self::Command(CommandFields::default())
	}

	pub const fn kind(&self) -> PayloadKind {
		match self {
			Self::Empty => PayloadKind::Empty,
			Self::Scalar(_) => PayloadKind::Scalar,
			Self::Array(_) => PayloadKind::Array,
			Self::Command(_) => PayloadKind::Command,
		}
	}

	pub fn as_array(&self) -> Option<&Arc<[i64]>> {
		match self {
			Self::Array(values) => Some(values),
			_ => None,
		}
	}

	pub fn as_command(&self) -> Option<&CommandFields> {
		match self {
			Self::Command(fields) => Some(fields),
			_ => None,
		}
	}

	pub fn as_command_mut(&mut self) -> Option<&mut CommandFields> {
		match self {
			Self::Command(fields) => Some(fields),
			_ => None,
		}
	}

	/// One-line description for console output.
	pub fn summary(&self) -> String {
		match self {
			Self::Empty => "empty".to_string(),
			Self::Scalar(value) => format!("scalar {value}"),
			Self::Array(values) => match (values.first(), values.last()) {
				(Some(first), Some(last)) => format!("array len={} first={first} last={last}", values.len()),
				_ => "array len=0".to_string(),
			},
			Self::Command(fields) => format!("command={:?} target={:?} status={:?}", fields.command, fields.target, fields.status),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn summaries() {
		assert_eq!(Payload::Empty.summary(), "empty");
		assert_eq!(Payload::filled(3, 7).summary(), "array len=3 first=7 last=7");
		assert_eq!(Payload::filled(0, 7).summary(), "array len=0");
		let cmd = Payload::Command(CommandFields::new("add", "r1"));
		assert_eq!(cmd.summary(), r#"command="add" target="r1" status="""#);
		assert_eq!(cmd.kind(), PayloadKind::Command);
	}
}
