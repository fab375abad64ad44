//! Runtimes for erased programs.
//!
//! Both machines consume erased terms and decompile their results back to
//! terms: the [`graph`] machine reduces a flat word-packed memory by lazy
//! copy-on-use rewriting, the [`net`] machine reduces a symmetric
//! interaction net by local rewrites. On closed, terminating, erased
//! programs both agree with the term-level normalizer.

use std::fmt::{self, Display};

use crate::kernel::term::Name;

pub mod graph;
pub mod net;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtError {
  /// A reference does not resolve in the definition map.
  UndefinedReference(Name),
  /// The net compiler met a reference inside its own expansion.
  RecursiveReference(Name),
  /// The term has no runtime meaning (types, holes).
  Unsupported(&'static str),
  /// A node carried an operator code outside the operator table.
  UnknownOperator(u16),
}

impl Display for RtError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RtError::UndefinedReference(name) => {
        write!(f, "undefined reference: {}", name)
      },
      RtError::RecursiveReference(name) => {
        write!(f, "recursive reference: {}", name)
      },
      RtError::Unsupported(what) => {
        write!(f, "term has no runtime form: {}", what)
      },
      RtError::UnknownOperator(code) => {
        write!(f, "unknown primitive operator code: {}", code)
      },
    }
  }
}

impl std::error::Error for RtError {}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::erase::erase;
  use crate::kernel::reduce::normalize;
  use crate::kernel::term::{Defs, Oper, Term};

  fn lam(name: &str, body: Term) -> Term {
    Term::lam(name.into(), None, body, false)
  }

  fn app(func: Term, argm: Term) -> Term {
    Term::app(func, argm, false)
  }

  /// Check that the term normalizer, the graph machine, and both net
  /// schedulers agree on the normal form of `main`.
  fn agree(defs: &Defs, main: &str) -> Term {
    let erased = erase(defs.get(main).unwrap());
    let reference = normalize(&erased, defs);

    let (graph_nf, _) = graph::run(defs, main).unwrap();
    assert_eq!(graph_nf, reference, "graph runtime disagrees");

    let (strict_nf, _) = net::run(defs, main, false).unwrap();
    assert_eq!(strict_nf, reference, "strict net disagrees");

    let (lazy_nf, _) = net::run(defs, main, true).unwrap();
    assert_eq!(lazy_nf, reference, "lazy net disagrees");

    reference
  }

  #[test]
  fn reducers_agree_on_identity_application() {
    let mut defs = Defs::default();
    defs.insert(
      "main".into(),
      app(lam("x", Term::var(0)), lam("y", Term::var(0))),
    );
    let nf = agree(&defs, "main");
    assert_eq!(nf, lam("y", Term::var(0)));
  }

  #[test]
  fn reducers_agree_on_erased_polymorphic_identity() {
    // id<Number>(5) with an erased type argument.
    let mut defs = Defs::default();
    let id = Term::lam(
      "A".into(),
      None,
      lam("x", Term::var(0)),
      true,
    );
    defs.insert("id".into(), id);
    defs.insert(
      "main".into(),
      app(
        Term::app(Term::refer("id", false), Term::num(), true),
        Term::val(5),
      ),
    );
    let nf = agree(&defs, "main");
    assert_eq!(nf, Term::val(5));
  }

  #[test]
  fn reducers_agree_on_numeric_folds() {
    // ((n) => |(|n .+. 1|) .*. 2|)(3)  ~>  8
    let mut defs = Defs::default();
    let body = Term::op2(
      Oper::Mul,
      Term::op2(Oper::Add, Term::var(0), Term::val(1)),
      Term::val(2),
    );
    defs.insert("main".into(), app(lam("n", body), Term::val(3)));
    assert_eq!(agree(&defs, "main"), Term::val(8));
  }

  #[test]
  fn reducers_agree_on_conditionals() {
    let mut defs = Defs::default();
    defs.insert(
      "main".into(),
      Term::ite(
        Term::op2(Oper::Gth, Term::val(3), Term::val(2)),
        Term::val(10),
        Term::val(20),
      ),
    );
    assert_eq!(agree(&defs, "main"), Term::val(10));
  }

  #[test]
  fn reducers_agree_on_shared_references() {
    // inc(inc(3)) with inc used twice through the definition map; each
    // use gets its own copy, so the program stays affine.
    let mut defs = Defs::default();
    defs.insert(
      "inc".into(),
      lam("n", Term::op2(Oper::Add, Term::var(0), Term::val(1))),
    );
    defs.insert(
      "main".into(),
      app(
        Term::refer("inc", false),
        app(Term::refer("inc", false), Term::val(3)),
      ),
    );
    assert_eq!(agree(&defs, "main"), Term::val(5));
  }

  #[test]
  fn nets_agree_on_church_arithmetic() {
    // (two two) s z applies s four times. The binders are used twice,
    // which only the net runtime can duplicate; the graph machine is for
    // affine code. The two numerals are separate definitions so their
    // duplicators carry distinct labels.
    let two = || {
      lam(
        "s",
        lam("z", app(Term::var(1), app(Term::var(1), Term::var(0)))),
      )
    };
    let mut defs = Defs::default();
    defs.insert("twoa".into(), two());
    defs.insert("twob".into(), two());
    // main := twoa(twob)((n) => |n .+. 1|)(0)
    defs.insert(
      "main".into(),
      app(
        app(
          app(Term::refer("twoa", false), Term::refer("twob", false)),
          lam("n", Term::op2(Oper::Add, Term::var(0), Term::val(1))),
        ),
        Term::val(0),
      ),
    );
    let erased = erase(defs.get("main").unwrap());
    let reference = normalize(&erased, &defs);
    assert_eq!(reference, Term::val(4));
    let (strict_nf, _) = net::run(&defs, "main", false).unwrap();
    assert_eq!(strict_nf, reference, "strict net disagrees");
    let (lazy_nf, _) = net::run(&defs, "main", true).unwrap();
    assert_eq!(lazy_nf, reference, "lazy net disagrees");
  }
}
