//! Registrar shell.
//!
//! A [`Shell`] interprets lines such as `processRecord sched 1.0` or
//! `dbcmd sched add r1` against a [`cadence_db::Registry`]. Commands come from a
//! static table of [`RegistrarDef`]s with typed arguments. Workers the shell
//! starts are owned by it until [`Shell::shutdown`].

mod args;
mod error;
mod registrar;
mod shell;

pub use args::{ArgDef, ArgType, ArgValue, Args, tokenize};
pub use error::ShellError;
pub use registrar::{REGISTRARS, RegistrarDef, RegistrarFn, find_registrar};
pub use shell::{Hosted, Shell};
