//! Kernel errors.
//!
//! Every error carries the offending term, a snapshot of the typing
//! context, and a source location when one is known.
//! [`TypeError::show_with_source`] renders the default formatter:
//! the offending span underlined within its surrounding source lines.

use std::fmt::{self, Display};

use crate::kernel::term::{Loc, Name, Term};

/// Context snapshot for diagnostics, outermost binder first.
pub type CtxDump = Vec<(Name, Term)>;

#[derive(Debug, Clone)]
pub enum TypeError {
  UnboundVariable { term: Term, ctx: CtxDump, loc: Option<Loc> },
  /// An erased variable used in a computationally-relevant position.
  ErasedUse { term: Term, ctx: CtxDump, loc: Option<Loc> },
  /// Application erasure does not match the function type's erasure.
  ErasureMismatch { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  NotFunction { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  LambdaNeedsAnnotation { term: Term, ctx: CtxDump, loc: Option<Loc> },
  /// A forall binder or body whose type is not `Type`.
  NotType { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  CondNotNum { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  NewNotSelf { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  UseNotSelf { term: Term, typ: Term, ctx: CtxDump, loc: Option<Loc> },
  UnknownReference { name: Name, loc: Option<Loc> },
  TypeMismatch {
    expect: Term,
    got: Term,
    term: Term,
    ctx: CtxDump,
    loc: Option<Loc>,
  },
}

impl TypeError {
  pub fn loc(&self) -> Option<&Loc> {
    match self {
      TypeError::UnboundVariable { loc, .. }
      | TypeError::ErasedUse { loc, .. }
      | TypeError::ErasureMismatch { loc, .. }
      | TypeError::NotFunction { loc, .. }
      | TypeError::LambdaNeedsAnnotation { loc, .. }
      | TypeError::NotType { loc, .. }
      | TypeError::CondNotNum { loc, .. }
      | TypeError::NewNotSelf { loc, .. }
      | TypeError::UseNotSelf { loc, .. }
      | TypeError::UnknownReference { loc, .. }
      | TypeError::TypeMismatch { loc, .. } => loc.as_ref(),
    }
  }

  /// Render the error over its source text, underlining the offending
  /// span within up to two lines of context on each side.
  pub fn show_with_source(&self, src: &str) -> String {
    let mut out = self.to_string();
    let Some(loc) = self.loc() else { return out };
    out.push('\n');
    let mut offset = 0;
    for (row, line) in src.lines().enumerate() {
      let end = offset + line.len();
      let near = loc.idx <= end + 2 * 80 && offset <= loc.idx + loc.len + 2 * 80;
      let hit = loc.idx < end + 1 && offset < loc.idx + loc.len.max(1);
      if near && row.abs_diff(loc.row) <= 2 {
        out.push_str(&format!("{:>4} | {}\n", row + 1, line));
        if hit {
          let from = loc.idx.saturating_sub(offset).min(line.len());
          let upto =
            (loc.idx + loc.len.max(1)).saturating_sub(offset).min(line.len());
          out.push_str("     | ");
          out.push_str(&" ".repeat(from));
          out.push_str(&"^".repeat((upto - from).max(1)));
          out.push('\n');
        }
      }
      offset = end + 1;
    }
    out
  }
}

impl Display for TypeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeError::UnboundVariable { term, .. } => {
        write!(f, "unbound variable: {}", term)
      },
      TypeError::ErasedUse { term, .. } => {
        write!(f, "erased variable used in relevant position: {}", term)
      },
      TypeError::ErasureMismatch { term, typ, .. } => {
        write!(f, "application erasure does not match {}: {}", typ, term)
      },
      TypeError::NotFunction { term, typ, .. } => {
        write!(f, "non-function of type {} applied: {}", typ, term)
      },
      TypeError::LambdaNeedsAnnotation { term, .. } => {
        write!(f, "lambda needs an annotation: {}", term)
      },
      TypeError::NotType { term, typ, .. } => {
        write!(f, "expected Type, found {}: {}", typ, term)
      },
      TypeError::CondNotNum { term, typ, .. } => {
        write!(f, "if-condition is {} instead of Number: {}", typ, term)
      },
      TypeError::NewNotSelf { term, typ, .. } => {
        write!(f, "new of non-self type {}: {}", typ, term)
      },
      TypeError::UseNotSelf { term, typ, .. } => {
        write!(f, "use of non-self value of type {}: {}", typ, term)
      },
      TypeError::UnknownReference { name, .. } => {
        write!(f, "unknown reference: {}", name)
      },
      TypeError::TypeMismatch { expect, got, term, .. } => {
        write!(
          f,
          "type mismatch: expected {}, got {}, on {}",
          expect, got, term
        )
      },
    }
  }
}

impl std::error::Error for TypeError {}
