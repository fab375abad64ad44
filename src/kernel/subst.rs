//! Capture-avoiding shift and substitution on de Bruijn terms.
//!
//! All traversals rebuild through the smart constructors of
//! [`Term`](crate::kernel::term::Term), so structural hashes stay
//! consistent, and re-attach source locations of the nodes they rebuild.

use crate::kernel::term::{Term, TermData};

/// Increment every free variable with index `>= cut` by `inc`.
pub fn shift(term: &Term, inc: usize, cut: usize) -> Term {
  if inc == 0 {
    return term.clone();
  }
  match term.as_data() {
    TermData::Var { indx } => {
      if *indx >= cut {
        Term::var(indx + inc).at(term.loc())
      } else {
        term.clone()
      }
    },
    TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. }
    | TermData::Ref { .. } => term.clone(),
    TermData::All { name, bind, body, eras } => Term::all(
      name.clone(),
      shift(bind, inc, cut),
      shift(body, inc, cut + 1),
      *eras,
    )
    .at(term.loc()),
    TermData::Lam { name, bind, body, eras } => Term::lam(
      name.clone(),
      bind.as_ref().map(|bind| shift(bind, inc, cut)),
      shift(body, inc, cut + 1),
      *eras,
    )
    .at(term.loc()),
    TermData::App { func, argm, eras } => {
      Term::app(shift(func, inc, cut), shift(argm, inc, cut), *eras)
        .at(term.loc())
    },
    TermData::Slf { name, typ } => {
      Term::slf(name.clone(), shift(typ, inc, cut + 1)).at(term.loc())
    },
    TermData::New { typ, expr } => {
      Term::snew(shift(typ, inc, cut), shift(expr, inc, cut)).at(term.loc())
    },
    TermData::Use { expr } => {
      Term::suse(shift(expr, inc, cut)).at(term.loc())
    },
    TermData::Op1 { oper, num0, num1 } => {
      Term::op1(*oper, shift(num0, inc, cut), *num1).at(term.loc())
    },
    TermData::Op2 { oper, num0, num1 } => {
      Term::op2(*oper, shift(num0, inc, cut), shift(num1, inc, cut))
        .at(term.loc())
    },
    TermData::Ite { cond, ift, iff } => Term::ite(
      shift(cond, inc, cut),
      shift(ift, inc, cut),
      shift(iff, inc, cut),
    )
    .at(term.loc()),
    TermData::Ann { typ, expr, done } => {
      Term::ann(shift(typ, inc, cut), shift(expr, inc, cut), done.get())
        .at(term.loc())
    },
    TermData::Log { msge, expr } => {
      Term::log(shift(msge, inc, cut), shift(expr, inc, cut)).at(term.loc())
    },
  }
}

/// Replace `Var dep` by `val` and decrement every variable above `dep`.
///
/// `val` is shifted once per binder crossed, so each occurrence receives a
/// copy adjusted to the depth it lives under.
pub fn subst(term: &Term, val: &Term, dep: usize) -> Term {
  match term.as_data() {
    TermData::Var { indx } => {
      if *indx == dep {
        val.clone()
      } else if *indx > dep {
        Term::var(indx - 1).at(term.loc())
      } else {
        term.clone()
      }
    },
    TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. }
    | TermData::Ref { .. } => term.clone(),
    TermData::All { name, bind, body, eras } => Term::all(
      name.clone(),
      subst(bind, val, dep),
      subst(body, &shift(val, 1, 0), dep + 1),
      *eras,
    )
    .at(term.loc()),
    TermData::Lam { name, bind, body, eras } => Term::lam(
      name.clone(),
      bind.as_ref().map(|bind| subst(bind, val, dep)),
      subst(body, &shift(val, 1, 0), dep + 1),
      *eras,
    )
    .at(term.loc()),
    TermData::App { func, argm, eras } => {
      Term::app(subst(func, val, dep), subst(argm, val, dep), *eras)
        .at(term.loc())
    },
    TermData::Slf { name, typ } => {
      Term::slf(name.clone(), subst(typ, &shift(val, 1, 0), dep + 1))
        .at(term.loc())
    },
    TermData::New { typ, expr } => {
      Term::snew(subst(typ, val, dep), subst(expr, val, dep)).at(term.loc())
    },
    TermData::Use { expr } => {
      Term::suse(subst(expr, val, dep)).at(term.loc())
    },
    TermData::Op1 { oper, num0, num1 } => {
      Term::op1(*oper, subst(num0, val, dep), *num1).at(term.loc())
    },
    TermData::Op2 { oper, num0, num1 } => {
      Term::op2(*oper, subst(num0, val, dep), subst(num1, val, dep))
        .at(term.loc())
    },
    TermData::Ite { cond, ift, iff } => Term::ite(
      subst(cond, val, dep),
      subst(ift, val, dep),
      subst(iff, val, dep),
    )
    .at(term.loc()),
    TermData::Ann { typ, expr, done } => {
      Term::ann(subst(typ, val, dep), subst(expr, val, dep), done.get())
        .at(term.loc())
    },
    TermData::Log { msge, expr } => {
      Term::log(subst(msge, val, dep), subst(expr, val, dep)).at(term.loc())
    },
  }
}

/// Substitute `vals` for the variables `dep .. dep + vals.len()`,
/// right-to-left with rolling shifts so independent bindings compose.
pub fn subst_many(term: &Term, vals: &[Term], dep: usize) -> Term {
  let mut term = term.clone();
  for (i, val) in vals.iter().enumerate().rev() {
    term = subst(&term, &shift(val, i, 0), dep + i);
  }
  term
}

/// Decrement every free variable with index `>= cut` by `dec`.
///
/// Fails when a variable in `cut .. cut + dec` occurs: that variable has no
/// representation below the removed binders. Used when a hole solution
/// found at one depth is recorded at the shallower depth the hole was
/// registered under.
pub fn unshift(term: &Term, dec: usize, cut: usize) -> Option<Term> {
  if dec == 0 {
    return Some(term.clone());
  }
  let out = match term.as_data() {
    TermData::Var { indx } => {
      if *indx >= cut + dec {
        Term::var(indx - dec)
      } else if *indx >= cut {
        return None;
      } else {
        term.clone()
      }
    },
    TermData::Typ
    | TermData::Num
    | TermData::Val { .. }
    | TermData::Hol { .. }
    | TermData::Ref { .. } => term.clone(),
    TermData::All { name, bind, body, eras } => Term::all(
      name.clone(),
      unshift(bind, dec, cut)?,
      unshift(body, dec, cut + 1)?,
      *eras,
    ),
    TermData::Lam { name, bind, body, eras } => Term::lam(
      name.clone(),
      match bind {
        Some(bind) => Some(unshift(bind, dec, cut)?),
        None => None,
      },
      unshift(body, dec, cut + 1)?,
      *eras,
    ),
    TermData::App { func, argm, eras } => {
      Term::app(unshift(func, dec, cut)?, unshift(argm, dec, cut)?, *eras)
    },
    TermData::Slf { name, typ } => {
      Term::slf(name.clone(), unshift(typ, dec, cut + 1)?)
    },
    TermData::New { typ, expr } => {
      Term::snew(unshift(typ, dec, cut)?, unshift(expr, dec, cut)?)
    },
    TermData::Use { expr } => Term::suse(unshift(expr, dec, cut)?),
    TermData::Op1 { oper, num0, num1 } => {
      Term::op1(*oper, unshift(num0, dec, cut)?, *num1)
    },
    TermData::Op2 { oper, num0, num1 } => {
      Term::op2(*oper, unshift(num0, dec, cut)?, unshift(num1, dec, cut)?)
    },
    TermData::Ite { cond, ift, iff } => Term::ite(
      unshift(cond, dec, cut)?,
      unshift(ift, dec, cut)?,
      unshift(iff, dec, cut)?,
    ),
    TermData::Ann { typ, expr, done } => {
      Term::ann(unshift(typ, dec, cut)?, unshift(expr, dec, cut)?, done.get())
    },
    TermData::Log { msge, expr } => {
      Term::log(unshift(msge, dec, cut)?, unshift(expr, dec, cut)?)
    },
  };
  Some(out.at(term.loc()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::testgen::ArbTerm;

  #[quickcheck]
  fn shift_composes(t: ArbTerm, a: u8, b: u8, d: u8) -> bool {
    let (a, b, d) = (a as usize % 4, b as usize % 4, d as usize % 4);
    shift(&shift(&t.0, a, d), b, d) == shift(&t.0, a + b, d)
  }

  #[quickcheck]
  fn subst_of_shifted_is_identity(t: ArbTerm, v: ArbTerm, d: u8) -> bool {
    let d = d as usize % 4;
    subst(&shift(&t.0, 1, d), &v.0, d) == t.0
  }

  #[quickcheck]
  fn unshift_inverts_shift(t: ArbTerm, a: u8, d: u8) -> bool {
    let (a, d) = (a as usize % 4, d as usize % 4);
    unshift(&shift(&t.0, a, d), a, d) == Some(t.0)
  }

  #[test]
  fn subst_under_binder_shifts_replacement() {
    // (x => #1) with #0 := y  gives  (x => y shifted under the lambda)
    let body = Term::lam("x".into(), None, Term::var(1), false);
    let val = Term::var(3);
    let out = subst(&body, &val, 0);
    assert_eq!(out, Term::lam("x".into(), None, Term::var(4), false));
  }

  #[test]
  fn subst_decrements_above_target() {
    let t = Term::app(Term::var(0), Term::var(2), false);
    let out = subst(&t, &Term::typ(), 0);
    assert_eq!(out, Term::app(Term::typ(), Term::var(1), false));
  }

  #[test]
  fn subst_many_pairs_each_variable() {
    // #0 and #1 receive a and b respectively.
    let t = Term::app(Term::var(0), Term::var(1), false);
    let a = Term::val(1);
    let b = Term::val(2);
    let out = subst_many(&t, &[a.clone(), b.clone()], 0);
    assert_eq!(out, Term::app(a, b, false));
  }

  #[test]
  fn unshift_rejects_escaping_variables() {
    assert_eq!(unshift(&Term::var(0), 1, 0), None);
    assert_eq!(unshift(&Term::var(1), 1, 0), Some(Term::var(0)));
  }
}
