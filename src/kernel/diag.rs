//! Structured diagnostics.
//!
//! Reduction-time `Log` messages and post-check hole reports flow through
//! a single [`Sink`] as typed records; the kernel never concatenates
//! diagnostic strings. Callers install a sink of their choice —
//! [`VecSink`] to collect, [`NullSink`] to ignore.

use std::fmt::{self, Display};

use crate::kernel::term::{Name, Term};

#[derive(Debug, Clone)]
pub enum LogRecord {
  /// A `Log` term fired during reduction; the message is normalized.
  Log { term: Term },
  /// The checker inferred the (erased) type of a `Log` message.
  LogType { term: Term, typ: Term },
  /// A hole report emitted after a top-level check.
  Hole {
    name: Name,
    goal: Option<Term>,
    ctx: Vec<(Name, Term)>,
    value: Option<Term>,
  },
}

impl Display for LogRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LogRecord::Log { term } => write!(f, "[LOG] {}", term),
      LogRecord::LogType { term, typ } => {
        write!(f, "[LOG] {} : {}", term, typ)
      },
      LogRecord::Hole { name, goal, ctx, value } => {
        write!(f, "[HOLE] ?{}", name)?;
        if let Some(goal) = goal {
          write!(f, " : {}", goal)?;
        }
        if let Some(value) = value {
          write!(f, " = {}", value)?;
        }
        for (name, typ) in ctx {
          write!(f, "\n  {} : {}", name, typ)?;
        }
        Ok(())
      },
    }
  }
}

pub trait Sink {
  fn emit(&mut self, rec: LogRecord);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
  fn emit(&mut self, _rec: LogRecord) {}
}

/// Collects records in order.
#[derive(Debug, Default)]
pub struct VecSink {
  pub records: Vec<LogRecord>,
}

impl Sink for VecSink {
  fn emit(&mut self, rec: LogRecord) {
    self.records.push(rec);
  }
}
