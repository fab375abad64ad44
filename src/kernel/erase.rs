//! Erasure of computationally-irrelevant content.
//!
//! Both runtimes compile erased terms only, and definitional equality
//! erases both sides before comparing, so proof-level content never
//! influences computation.

use crate::kernel::subst::subst;
use crate::kernel::term::{Term, TermData};

/// Strip erased binders and arguments, ascriptions, self-type wrappers,
/// and binder annotations. Erased references stay as references but are
/// marked erased, so delta-reduction erases their bodies on expansion.
/// Idempotent.
pub fn erase(term: &Term) -> Term {
  match term.as_data() {
    TermData::Var { .. }
    | TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. } => term.clone(),
    TermData::All { name, bind, body, eras } => {
      Term::all(name.clone(), erase(bind), erase(body), *eras).at(term.loc())
    },
    TermData::Lam { name, body, eras, .. } => {
      if *eras {
        erase(&subst(body, &Term::erased_hole(), 0))
      } else {
        Term::lam(name.clone(), None, erase(body), false).at(term.loc())
      }
    },
    TermData::App { func, argm, eras } => {
      if *eras {
        erase(func)
      } else {
        Term::app(erase(func), erase(argm), false).at(term.loc())
      }
    },
    TermData::Slf { name, typ } => {
      Term::slf(name.clone(), erase(typ)).at(term.loc())
    },
    TermData::New { expr, .. } => erase(expr),
    TermData::Use { expr } => erase(expr),
    TermData::Op1 { oper, num0, num1 } => {
      Term::op1(*oper, erase(num0), *num1).at(term.loc())
    },
    TermData::Op2 { oper, num0, num1 } => {
      Term::op2(*oper, erase(num0), erase(num1)).at(term.loc())
    },
    TermData::Ite { cond, ift, iff } => {
      Term::ite(erase(cond), erase(ift), erase(iff)).at(term.loc())
    },
    TermData::Ann { expr, .. } => erase(expr),
    TermData::Log { msge, expr } => {
      Term::log(erase(msge), erase(expr)).at(term.loc())
    },
    TermData::Ref { name, .. } => {
      Term::refer(name.clone(), true).at(term.loc())
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::testgen::ArbTerm;

  #[quickcheck]
  fn erase_is_idempotent(t: ArbTerm) -> bool {
    let once = erase(&t.0);
    erase(&once) == once
  }

  #[test]
  fn erased_lambda_drops_to_body() {
    // (A;) => (x) => x   erases to   (x) => x
    let id = Term::lam("x".into(), None, Term::var(0), false);
    let poly = Term::lam("A".into(), Some(Term::typ()), id.clone(), true);
    assert_eq!(erase(&poly), id);
  }

  #[test]
  fn erased_application_drops_to_function() {
    let id = Term::lam("x".into(), None, Term::var(0), false);
    let appl = Term::app(id.clone(), Term::typ(), true);
    assert_eq!(erase(&appl), id);
  }

  #[test]
  fn erased_variable_leaves_sentinel_hole() {
    // (A;) => A   erases to   ?<erased>
    let t = Term::lam("A".into(), None, Term::var(0), true);
    assert_eq!(erase(&t), Term::erased_hole());
  }

  #[test]
  fn wrappers_are_stripped() {
    let five = Term::val(5);
    assert_eq!(erase(&Term::ann(Term::num(), five.clone(), false)), five);
    assert_eq!(erase(&Term::snew(Term::num(), five.clone())), five);
    assert_eq!(erase(&Term::suse(five.clone())), five);
  }

  #[test]
  fn references_become_erased_references() {
    let t = Term::refer("demo.id", false);
    assert_eq!(erase(&t), Term::refer("demo.id", true));
    assert_eq!(erase(&erase(&t)), Term::refer("demo.id", true));
  }
}
