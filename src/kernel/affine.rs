//! Linearity and recursion analyses.
//!
//! Both are advisory: a front-end may warn or reject on their results,
//! but the type checker never consults them.

use rustc_hash::FxHashSet;

use crate::kernel::erase::erase;
use crate::kernel::term::{Defs, Name, Term, TermData};

/// Count computational occurrences of `Var dep` in `term`.
///
/// Erased applications and type positions contribute zero: only content
/// that survives erasure is counted.
pub fn uses(term: &Term, dep: usize) -> usize {
  match term.as_data() {
    TermData::Var { indx } => (*indx == dep) as usize,
    TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. }
    | TermData::Ref { .. }
    | TermData::All { .. }
    | TermData::Slf { .. } => 0,
    TermData::Lam { body, .. } => uses(body, dep + 1),
    TermData::App { func, argm, eras } => {
      uses(func, dep) + if *eras { 0 } else { uses(argm, dep) }
    },
    TermData::New { expr, .. } => uses(expr, dep),
    TermData::Use { expr } => uses(expr, dep),
    TermData::Op1 { num0, .. } => uses(num0, dep),
    TermData::Op2 { num0, num1, .. } => uses(num0, dep) + uses(num1, dep),
    TermData::Ite { cond, ift, iff } => {
      uses(cond, dep) + uses(ift, dep) + uses(iff, dep)
    },
    TermData::Ann { expr, .. } => uses(expr, dep),
    TermData::Log { expr, .. } => uses(expr, dep),
  }
}

/// Whether every lambda reachable through computational content binds a
/// variable used at most once. References are followed once each, so
/// mutual recursion terminates.
pub fn is_affine(term: &Term, defs: &Defs) -> bool {
  let mut seen = FxHashSet::default();
  affine_go(term, defs, &mut seen)
}

fn affine_go(term: &Term, defs: &Defs, seen: &mut FxHashSet<Name>) -> bool {
  match term.as_data() {
    TermData::Var { .. }
    | TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. }
    | TermData::All { .. }
    | TermData::Slf { .. } => true,
    TermData::Lam { body, eras, .. } => {
      if *eras {
        affine_go(body, defs, seen)
      } else {
        uses(body, 0) <= 1 && affine_go(body, defs, seen)
      }
    },
    TermData::App { func, argm, eras } => {
      affine_go(func, defs, seen)
        && (*eras || affine_go(argm, defs, seen))
    },
    TermData::New { expr, .. } => affine_go(expr, defs, seen),
    TermData::Use { expr } => affine_go(expr, defs, seen),
    TermData::Op1 { num0, .. } => affine_go(num0, defs, seen),
    TermData::Op2 { num0, num1, .. } => {
      affine_go(num0, defs, seen) && affine_go(num1, defs, seen)
    },
    TermData::Ite { cond, ift, iff } => {
      affine_go(cond, defs, seen)
        && affine_go(ift, defs, seen)
        && affine_go(iff, defs, seen)
    },
    TermData::Ann { expr, .. } => affine_go(expr, defs, seen),
    TermData::Log { expr, .. } => affine_go(expr, defs, seen),
    TermData::Ref { name, .. } => {
      if !seen.insert(name.clone()) {
        return true;
      }
      match defs.get(name) {
        Some(def) => affine_go(&erase(def), defs, seen),
        None => true,
      }
    },
  }
}

/// Conservative termination check: false as soon as a reference recurs
/// within its own transitive expansion. Terms without references are
/// considered terminating.
pub fn is_terminating(term: &Term, defs: &Defs) -> bool {
  let mut path = FxHashSet::default();
  terminating_go(term, defs, &mut path)
}

fn terminating_go(
  term: &Term,
  defs: &Defs,
  path: &mut FxHashSet<Name>,
) -> bool {
  match term.as_data() {
    TermData::Var { .. }
    | TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. } => true,
    TermData::All { bind, body, .. } => {
      terminating_go(bind, defs, path) && terminating_go(body, defs, path)
    },
    TermData::Lam { bind, body, .. } => {
      bind
        .as_ref()
        .map_or(true, |bind| terminating_go(bind, defs, path))
        && terminating_go(body, defs, path)
    },
    TermData::App { func, argm, .. } => {
      terminating_go(func, defs, path) && terminating_go(argm, defs, path)
    },
    TermData::Slf { typ, .. } => terminating_go(typ, defs, path),
    TermData::New { typ, expr } => {
      terminating_go(typ, defs, path) && terminating_go(expr, defs, path)
    },
    TermData::Use { expr } => terminating_go(expr, defs, path),
    TermData::Op1 { num0, .. } => terminating_go(num0, defs, path),
    TermData::Op2 { num0, num1, .. } => {
      terminating_go(num0, defs, path) && terminating_go(num1, defs, path)
    },
    TermData::Ite { cond, ift, iff } => {
      terminating_go(cond, defs, path)
        && terminating_go(ift, defs, path)
        && terminating_go(iff, defs, path)
    },
    TermData::Ann { typ, expr, .. } => {
      terminating_go(typ, defs, path) && terminating_go(expr, defs, path)
    },
    TermData::Log { msge, expr } => {
      terminating_go(msge, defs, path) && terminating_go(expr, defs, path)
    },
    TermData::Ref { name, .. } => {
      if path.contains(name) {
        return false;
      }
      match defs.get(name) {
        Some(def) => {
          path.insert(name.clone());
          let ok = terminating_go(def, defs, path);
          path.remove(name);
          ok
        },
        None => true,
      }
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::check::Checker;
  use crate::kernel::diag::NullSink;
  use crate::kernel::term::Oper;

  #[test]
  fn duplicate_use_fails_affinity() {
    // (x) => |x .+. x|
    let t = Term::lam(
      "x".into(),
      Some(Term::num()),
      Term::op2(Oper::Add, Term::var(0), Term::var(0)),
      false,
    );
    assert_eq!(uses(
      match t.as_data() {
        crate::kernel::term::TermData::Lam { body, .. } => body,
        _ => unreachable!(),
      },
      0,
    ), 2);
    assert!(!is_affine(&t, &Defs::default()));
  }

  #[test]
  fn non_affine_terms_still_typecheck() {
    // The analyses are advisory: |x .+. x| is rejected here but is a
    // perfectly fine Number -> Number function to the checker.
    let t = Term::lam(
      "x".into(),
      Some(Term::num()),
      Term::op2(Oper::Add, Term::var(0), Term::var(0)),
      false,
    );
    assert!(!is_affine(&t, &Defs::default()));
    let mut defs = Defs::default();
    defs.insert("main".into(), t);
    let mut sink = NullSink;
    let typ = Checker::new(defs, &mut sink).typecheck("main", None).unwrap();
    assert_eq!(
      typ,
      Term::all("x".into(), Term::num(), Term::num(), false)
    );
  }

  #[test]
  fn single_use_is_affine() {
    let id = Term::lam("x".into(), None, Term::var(0), false);
    assert!(is_affine(&id, &Defs::default()));
    let konst =
      Term::lam("x".into(), None, Term::lam("y".into(), None, Term::var(1), false), false);
    assert!(is_affine(&konst, &Defs::default()));
  }

  #[test]
  fn erased_arguments_do_not_count() {
    // (x) => f(x;)(x)  is affine: the erased use is free.
    let body = Term::app(
      Term::app(Term::refer("f", false), Term::var(0), true),
      Term::var(0),
      false,
    );
    let t = Term::lam("x".into(), None, body.clone(), false);
    assert_eq!(uses(&body, 0), 1);
    assert!(is_affine(&t, &Defs::default()));
  }

  #[test]
  fn reference_cycles_are_followed_once() {
    let mut defs = Defs::default();
    defs.insert(
      "loop".into(),
      Term::lam(
        "x".into(),
        None,
        Term::app(Term::refer("loop", false), Term::var(0), false),
        false,
      ),
    );
    // Affinity terminates on the cycle and accepts.
    assert!(is_affine(&Term::refer("loop", false), &defs));
    // The recursion check rejects it.
    assert!(!is_terminating(&Term::refer("loop", false), &defs));
  }

  #[test]
  fn pure_lambda_terms_terminate() {
    let omega_free = Term::lam(
      "x".into(),
      None,
      Term::app(Term::var(0), Term::var(0), false),
      false,
    );
    assert!(is_terminating(&omega_free, &Defs::default()));
  }

  #[test]
  fn distinct_references_may_repeat_on_different_paths() {
    let mut defs = Defs::default();
    defs.insert("a".into(), Term::val(1));
    defs.insert(
      "b".into(),
      Term::op2(
        Oper::Add,
        Term::refer("a", false),
        Term::refer("a", false),
      ),
    );
    assert!(is_terminating(&Term::refer("b", false), &defs));
  }
}
