//! Typed registrar arguments.

use strum_macros::Display;

use crate::ShellError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArgType {
	String,
	Double,
	Int,
}

/// One declared argument of a registrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgDef {
	pub name: &'static str,
	pub kind: ArgType,
}

impl ArgDef {
	pub const fn string(name: &'static str) -> Self {
		Self { name, kind: ArgType::String }
	}

	pub const fn double(name: &'static str) -> Self {
		Self { name, kind: ArgType::Double }
	}

	pub const fn int(name: &'static str) -> Self {
		Self { name, kind: ArgType::Int }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
	String(String),
	Double(f64),
	Int(i64),
}

/// Parsed arguments; trailing arguments that were not given are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
	command: &'static str,
	defs: &'static [ArgDef],
	values: Vec<Option<ArgValue>>,
}

impl Args {
	/// Converts raw words against `defs`. Words beyond the declared arguments
	/// are ignored with a warning.
	pub fn parse(command: &'static str, defs: &'static [ArgDef], words: &[String]) -> Result<Self, ShellError> {
		if words.len() > defs.len() {
			tracing::warn!(command, extra = words.len() - defs.len(), "shell.extra_args_ignored");
		}
		let values = defs
			.iter()
			.enumerate()
			.map(|(i, def)| words.get(i).map(|word| convert(command, def, word)).transpose())
			.collect::<Result<_, _>>()?;
		Ok(Self { command, defs, values })
	}

	pub fn command(&self) -> &'static str {
		self.command
	}

	fn missing(&self, index: usize) -> ShellError {
		ShellError::MissingArg {
			command: self.command,
			arg: self.defs.get(index).map_or("?", |def| def.name),
		}
	}

	/// A string argument that must be present and non-empty.
	pub fn required_string(&self, index: usize) -> Result<&str, ShellError> {
		self.string(index).filter(|value| !value.is_empty()).ok_or_else(|| self.missing(index))
	}

	pub fn required_int(&self, index: usize) -> Result<i64, ShellError> {
		self.int(index).ok_or_else(|| self.missing(index))
	}

	pub fn string(&self, index: usize) -> Option<&str> {
		match self.values.get(index)? {
			Some(ArgValue::String(value)) => Some(value),
			_ => None,
		}
	}

	pub fn double(&self, index: usize) -> Option<f64> {
		match self.values.get(index)? {
			Some(ArgValue::Double(value)) => Some(*value),
			_ => None,
		}
	}

	pub fn int(&self, index: usize) -> Option<i64> {
		match self.values.get(index)? {
			Some(ArgValue::Int(value)) => Some(*value),
			_ => None,
		}
	}
}

fn convert(command: &'static str, def: &ArgDef, word: &str) -> Result<ArgValue, ShellError> {
	let bad = || ShellError::BadArg {
		command,
		arg: def.name,
		kind: def.kind,
		value: word.to_string(),
	};
	match def.kind {
		ArgType::String => Ok(ArgValue::String(word.to_string())),
		ArgType::Double => word.parse().map(ArgValue::Double).map_err(|_| bad()),
		ArgType::Int => word.parse().map(ArgValue::Int).map_err(|_| bad()),
	}
}

/// Splits a shell line into words.
///
/// Whitespace, commas and parentheses separate words, so both
/// `processRecord sched 1.0` and `processRecord("sched", 1.0)` work. Double
/// quotes group a word and may contain separators.
pub fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
	let mut words = Vec::new();
	let mut current = String::new();
	let mut quoted = false;
	let mut in_word = false;

	for ch in line.chars() {
		match ch {
			'"' => {
				quoted = !quoted;
				in_word = true;
			}
			c if !quoted && (c.is_whitespace() || matches!(c, ',' | '(' | ')')) => {
				if in_word {
					words.push(std::mem::take(&mut current));
					in_word = false;
				}
			}
			c => {
				current.push(c);
				in_word = true;
			}
		}
	}
	if quoted {
		return Err(ShellError::Config(format!("unterminated quote in {line:?}")));
	}
	if in_word {
		words.push(current);
	}
	Ok(words)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	const DEFS: &[ArgDef] = &[ArgDef::string("recordName"), ArgDef::double("delay"), ArgDef::int("asLevel")];

	fn words(line: &str) -> Vec<String> {
		tokenize(line).unwrap()
	}

	#[test]
	fn tokenizes_both_call_styles() {
		assert_eq!(words("processRecord sched 1.0"), vec!["processRecord", "sched", "1.0"]);
		assert_eq!(words(r#"processRecord("sched", 1.0)"#), vec!["processRecord", "sched", "1.0"]);
		assert_eq!(words(r#"dbcmd "a b" add """#), vec!["dbcmd", "a b", "add", ""]);
		assert!(words("   ").is_empty());
		assert!(tokenize(r#"dbpr "open"#).is_err());
	}

	#[test]
	fn missing_trailing_args_are_none() {
		let args = Args::parse("t", DEFS, &words("r 0.5")).unwrap();
		assert_eq!(args.string(0), Some("r"));
		assert_eq!(args.double(1), Some(0.5));
		assert_eq!(args.int(2), None);
		assert_eq!(args.int(7), None);
	}

	#[test]
	fn malformed_number_is_reported() {
		let err = Args::parse("t", DEFS, &words("r fast")).unwrap_err();
		assert_eq!(err.to_string(), r#"t: argument delay: "fast" is not a valid double"#);
	}

	#[test]
	fn required_args_name_the_missing_one() {
		let args = Args::parse("t", DEFS, &[String::new()]).unwrap();
		let err = args.required_string(0).unwrap_err();
		assert_eq!(err.to_string(), "t: missing argument recordName");
		assert_eq!(args.required_int(2).unwrap_err().to_string(), "t: missing argument asLevel");
	}

	#[test]
	fn extra_words_are_ignored() {
		let args = Args::parse("t", DEFS, &words("r 1 2 3 4")).unwrap();
		assert_eq!(args.int(2), Some(2));
	}
}
