//! Term generators for property tests.

use quickcheck::{Arbitrary, Gen};

use crate::kernel::term::{Oper, Term};

fn pick(g: &mut Gen, upto: usize) -> usize {
  usize::arbitrary(g) % upto
}

fn gen_oper(g: &mut Gen) -> Oper {
  Oper::ALL[pick(g, Oper::ALL.len())]
}

/// An arbitrary well-scoped term with up to `bound` free variables.
fn gen_term(g: &mut Gen, fuel: usize, bound: usize) -> Term {
  if fuel == 0 {
    return match pick(g, if bound > 0 { 4 } else { 3 }) {
      0 => Term::typ(),
      1 => Term::num(),
      2 => Term::val(u32::arbitrary(g)),
      _ => Term::var(pick(g, bound)),
    };
  }
  match pick(g, 12) {
    0 => Term::typ(),
    1 => Term::num(),
    2 => Term::val(u32::arbitrary(g)),
    3 if bound > 0 => Term::var(pick(g, bound)),
    3 => Term::hol("_g".to_string()),
    4 => Term::all(
      "a".into(),
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound + 1),
      bool::arbitrary(g),
    ),
    5 => Term::lam(
      "x".into(),
      if bool::arbitrary(g) {
        Some(gen_term(g, fuel - 1, bound))
      } else {
        None
      },
      gen_term(g, fuel - 1, bound + 1),
      bool::arbitrary(g),
    ),
    6 => Term::app(
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound),
      bool::arbitrary(g),
    ),
    7 => Term::slf("s".into(), gen_term(g, fuel - 1, bound + 1)),
    8 => Term::op2(
      gen_oper(g),
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound),
    ),
    9 => Term::ite(
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound),
    ),
    10 => Term::op1(gen_oper(g), gen_term(g, fuel - 1, bound), u32::arbitrary(g)),
    _ => Term::ann(
      gen_term(g, fuel - 1, bound),
      gen_term(g, fuel - 1, bound),
      false,
    ),
  }
}

/// A generated term with a handful of free variables available.
#[derive(Clone, Debug)]
pub struct ArbTerm(pub Term);

impl Arbitrary for ArbTerm {
  fn arbitrary(g: &mut Gen) -> Self {
    ArbTerm(gen_term(g, 3, 4))
  }
}

/// A generated term already in normal form: no β/δ/ν/ι redex, no
/// ascription, introduction, elimination, or log wrapper.
#[derive(Clone, Debug)]
pub struct NormalTerm(pub Term);

/// Neutral terms: stuck heads that cannot fire any reduction rule.
fn gen_neutral(g: &mut Gen, fuel: usize, bound: usize) -> Term {
  if fuel == 0 || bound == 0 {
    return if bound > 0 {
      Term::var(pick(g, bound))
    } else {
      Term::hol("_n".to_string())
    };
  }
  match pick(g, 5) {
    0 => Term::var(pick(g, bound)),
    1 => Term::app(
      gen_neutral(g, fuel - 1, bound),
      gen_normal(g, fuel - 1, bound),
      bool::arbitrary(g),
    ),
    2 => Term::op1(gen_oper(g), gen_neutral(g, fuel - 1, bound), u32::arbitrary(g)),
    3 => Term::ite(
      gen_neutral(g, fuel - 1, bound),
      gen_normal(g, fuel - 1, bound),
      gen_normal(g, fuel - 1, bound),
    ),
    _ => Term::hol("_n".to_string()),
  }
}

fn gen_normal(g: &mut Gen, fuel: usize, bound: usize) -> Term {
  if fuel == 0 {
    return match pick(g, if bound > 0 { 4 } else { 3 }) {
      0 => Term::typ(),
      1 => Term::num(),
      2 => Term::val(u32::arbitrary(g)),
      _ => Term::var(pick(g, bound)),
    };
  }
  match pick(g, 8) {
    0 => Term::typ(),
    1 => Term::num(),
    2 => Term::val(u32::arbitrary(g)),
    3 => Term::lam(
      "x".into(),
      if bool::arbitrary(g) {
        Some(gen_normal(g, fuel - 1, bound))
      } else {
        None
      },
      gen_normal(g, fuel - 1, bound + 1),
      bool::arbitrary(g),
    ),
    4 => Term::all(
      "a".into(),
      gen_normal(g, fuel - 1, bound),
      gen_normal(g, fuel - 1, bound + 1),
      bool::arbitrary(g),
    ),
    5 => Term::slf("s".into(), gen_normal(g, fuel - 1, bound + 1)),
    _ => gen_neutral(g, fuel - 1, bound),
  }
}

impl Arbitrary for NormalTerm {
  fn arbitrary(g: &mut Gen) -> Self {
    NormalTerm(gen_normal(g, 3, 0))
  }
}
