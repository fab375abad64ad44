//! Kernel of the Ulam proof language.
//!
//! Ulam is a small dependently-typed language: dependent functions, self
//! types for inductive encodings, unsigned 32-bit machine words, holes
//! solved by unification, and named references into a flat definition map.
//! This crate is the trusted core. It provides the term representation with
//! alpha-stable structural hashing, capture-avoiding substitution,
//! normalization by evaluation, definitional equality with hole assignment,
//! a bidirectional type checker, affinity and termination analyses, and two
//! runtimes for erased programs: a word-packed lazy graph machine and a
//! symmetric interaction-net machine.
//!
//! Parsing, sugar expansion, and file loading live outside this crate; the
//! kernel consumes fully-resolved [`Defs`] maps and hands back terms,
//! diagnostics, and reduction statistics.

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
#[cfg(test)]
extern crate rand;

pub mod kernel;
pub mod runtime;

pub use kernel::check::Checker;
pub use kernel::diag::{LogRecord, NullSink, Sink, VecSink};
pub use kernel::error::TypeError;
pub use kernel::reduce::{normalize, reduce, Opts};
pub use kernel::term::{Defs, Name, Oper, Term};
