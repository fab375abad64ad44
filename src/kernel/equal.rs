//! Definitional equality and first-order hole unification.
//!
//! Equality of two (erased) terms is decided by stepping a search tree of
//! obligations until it collapses to a leaf. Each obligation reduces both
//! sides to weak head normal form twice — once without and once with
//! delta — and tries hash shortcuts before descending structurally. An
//! application pair adds a spine-comparison hint branch, OR-combined with
//! the structural branch. Holes met along the way are assigned the
//! opposing side, shifted to the depth they were registered under.

use tracing::trace;

use crate::kernel::diag::{NullSink, Sink};
use crate::kernel::erase::erase;
use crate::kernel::hole::{HoleValue, Holes};
use crate::kernel::reduce::{Opts, Reducer};
use crate::kernel::term::{Defs, Term, TermData, ERASED};

// ============================================================================
// The search tree
// ============================================================================

enum EqTree {
  Leaf(bool),
  /// An obligation `a = b` under `dep` binders.
  Eqs { a: Term, b: Term, dep: usize },
  /// Short-circuiting connective: a child collapsing to `circ` collapses
  /// the node; the opposite value yields the sibling. `circ = false` is
  /// AND, `circ = true` is OR.
  Bop { circ: bool, lhs: Box<EqTree>, rhs: Box<EqTree> },
}

fn leaf(v: bool) -> EqTree {
  EqTree::Leaf(v)
}

fn eqs(a: &Term, b: &Term, dep: usize) -> EqTree {
  EqTree::Eqs { a: a.clone(), b: b.clone(), dep }
}

fn band(lhs: EqTree, rhs: EqTree) -> EqTree {
  EqTree::Bop { circ: false, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

fn bor(lhs: EqTree, rhs: EqTree) -> EqTree {
  EqTree::Bop { circ: true, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

// ============================================================================
// The engine
// ============================================================================

pub struct Equality<'a> {
  defs: &'a Defs,
  holes: &'a mut Holes,
  sink: &'a mut dyn Sink,
}

impl<'a> Equality<'a> {
  pub fn new(
    defs: &'a Defs,
    holes: &'a mut Holes,
    sink: &'a mut dyn Sink,
  ) -> Self {
    Equality { defs, holes, sink }
  }

  /// Decide equality of two closed terms.
  pub fn equal(&mut self, a: &Term, b: &Term) -> bool {
    self.equal_at(a, b, 0)
  }

  /// Decide equality of two terms under `dep` binders.
  pub fn equal_at(&mut self, a: &Term, b: &Term, dep: usize) -> bool {
    trace!(dep, "equal {} == {}", a, b);
    let mut tree = eqs(&erase(a), &erase(b), dep);
    loop {
      match tree {
        EqTree::Leaf(v) => return v,
        other => tree = self.step(other),
      }
    }
  }

  /// Expand every obligation by one layer and collapse connectives.
  fn step(&mut self, tree: EqTree) -> EqTree {
    match tree {
      EqTree::Leaf(v) => leaf(v),
      EqTree::Eqs { a, b, dep } => self.expand(&a, &b, dep),
      EqTree::Bop { circ, lhs, rhs } => {
        let lhs = self.step(*lhs);
        if let EqTree::Leaf(v) = lhs {
          return if v == circ { leaf(circ) } else { *rhs };
        }
        let rhs = self.step(*rhs);
        if let EqTree::Leaf(v) = rhs {
          return if v == circ { leaf(circ) } else { lhs };
        }
        EqTree::Bop { circ, lhs: Box::new(lhs), rhs: Box::new(rhs) }
      },
    }
  }

  fn whnf(&mut self, term: &Term, dep: usize, delt: bool) -> Term {
    let opts = if delt {
      Opts { logs: false, ..Opts::whnf() }
    } else {
      Opts { logs: false, ..Opts::whnf_no_delta() }
    };
    Reducer::new(self.defs, opts, &mut *self.sink)
      .with_holes(&*self.holes)
      .reduce_at(term, dep)
  }

  /// One step of an obligation.
  fn expand(&mut self, a: &Term, b: &Term, dep: usize) -> EqTree {
    if a.get_hash() == b.get_hash() {
      return leaf(true);
    }

    let ax = self.whnf(a, dep, false);
    let bx = self.whnf(b, dep, false);
    if ax.get_hash() == bx.get_hash() {
      return leaf(true);
    }

    // Two references with the same name are equal without unfolding.
    if let (TermData::Ref { name: an, .. }, TermData::Ref { name: bn, .. }) =
      (ax.as_data(), bx.as_data())
    {
      if an == bn {
        return leaf(true);
      }
    }

    // Hole on either side: unify. The erasure sentinel is opaque.
    if let TermData::Hol { name } = ax.as_data() {
      if name != ERASED {
        let name = name.clone();
        return self.solve(&name, &bx, dep);
      }
    }
    if let TermData::Hol { name } = bx.as_data() {
      if name != ERASED {
        let name = name.clone();
        return self.solve(&name, &ax, dep);
      }
    }

    let ay = self.whnf(a, dep, true);
    let by = self.whnf(b, dep, true);
    if ay.get_hash() == by.get_hash() {
      return leaf(true);
    }

    let structural = self.structural(&ay, &by, dep);

    // Stuck applications also try spine equality as a hint, so that
    // `f(x) == f(y)` can succeed without unfolding `f`.
    if let (
      TermData::App { func: af, argm: aa, .. },
      TermData::App { func: bf, argm: ba, .. },
    ) = (ax.as_data(), bx.as_data())
    {
      let hint = band(eqs(af, bf, dep), eqs(aa, ba, dep));
      return bor(hint, structural);
    }

    structural
  }

  /// Unify a hole against a weak-head-normalized opposing side.
  fn solve(&mut self, name: &str, other: &Term, dep: usize) -> EqTree {
    let state = self.holes.get(name).map(|e| e.value.clone());
    match state {
      Some(HoleValue::Set(_)) => match self.holes.value_at(name, dep) {
        Some(existing) => {
          let ok = self.equal_at(&existing, other, dep);
          if !ok {
            self.holes.downgrade(name, dep);
          }
          leaf(ok)
        },
        None => leaf(false),
      },
      Some(HoleValue::Conflict) => leaf(false),
      _ => leaf(self.holes.assign(name, other, dep)),
    }
  }

  /// Structural comparison of two delta-reduced heads.
  fn structural(&mut self, a: &Term, b: &Term, dep: usize) -> EqTree {
    match (a.as_data(), b.as_data()) {
      (TermData::Var { indx: i }, TermData::Var { indx: j }) => leaf(i == j),
      (TermData::Typ, TermData::Typ) => leaf(true),
      (TermData::Num, TermData::Num) => leaf(true),
      (TermData::Val { numb: x }, TermData::Val { numb: y }) => leaf(x == y),
      (
        TermData::All { bind: ab, body: ay, eras: ae, .. },
        TermData::All { bind: bb, body: by, eras: be, .. },
      ) => {
        if ae != be {
          return leaf(false);
        }
        band(eqs(ab, bb, dep), eqs(ay, by, dep + 1))
      },
      (
        TermData::Lam { body: ay, eras: ae, .. },
        TermData::Lam { body: by, eras: be, .. },
      ) => {
        if ae != be {
          return leaf(false);
        }
        eqs(ay, by, dep + 1)
      },
      (
        TermData::App { func: af, argm: aa, eras: ae },
        TermData::App { func: bf, argm: ba, eras: be },
      ) => {
        if ae != be {
          return leaf(false);
        }
        band(eqs(af, bf, dep), eqs(aa, ba, dep))
      },
      (TermData::Slf { typ: at, .. }, TermData::Slf { typ: bt, .. }) => {
        eqs(at, bt, dep + 1)
      },
      (TermData::New { expr: ae, .. }, TermData::New { expr: be, .. }) => {
        eqs(ae, be, dep)
      },
      (TermData::Use { expr: ae }, TermData::Use { expr: be }) => {
        eqs(ae, be, dep)
      },
      (
        TermData::Op1 { oper: ao, num0: an, num1: al },
        TermData::Op1 { oper: bo, num0: bn, num1: bl },
      ) => {
        // Both sides must agree on the stored literal.
        if ao != bo || al != bl {
          return leaf(false);
        }
        eqs(an, bn, dep)
      },
      (
        TermData::Op2 { oper: ao, num0: a0, num1: a1 },
        TermData::Op2 { oper: bo, num0: b0, num1: b1 },
      ) => {
        if ao != bo {
          return leaf(false);
        }
        band(eqs(a0, b0, dep), eqs(a1, b1, dep))
      },
      (
        TermData::Ite { cond: ac, ift: at, iff: af },
        TermData::Ite { cond: bc, ift: bt, iff: bf },
      ) => band(
        eqs(ac, bc, dep),
        band(eqs(at, bt, dep), eqs(af, bf, dep)),
      ),
      (TermData::Ann { expr: ae, .. }, TermData::Ann { expr: be, .. }) => {
        eqs(ae, be, dep)
      },
      (TermData::Log { expr: ae, .. }, TermData::Log { expr: be, .. }) => {
        eqs(ae, be, dep)
      },
      (TermData::Hol { name: an }, TermData::Hol { name: bn }) => {
        leaf(an == bn)
      },
      (TermData::Ref { name: an, .. }, TermData::Ref { name: bn, .. }) => {
        leaf(an == bn)
      },
      _ => leaf(false),
    }
  }
}

/// Decide equality with a throwaway hole registry and no diagnostics.
pub fn equal(a: &Term, b: &Term, defs: &Defs) -> bool {
  let mut holes = Holes::new();
  let mut sink = NullSink;
  Equality::new(defs, &mut holes, &mut sink).equal(a, b)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::term::Oper;

  fn with_holes<R>(f: impl FnOnce(&mut Equality) -> R) -> (R, Holes) {
    let defs = Defs::default();
    let mut holes = Holes::new();
    let mut sink = NullSink;
    let r = {
      let mut eq = Equality::new(&defs, &mut holes, &mut sink);
      f(&mut eq)
    };
    (r, holes)
  }

  #[test]
  fn beta_equality() {
    let id = Term::lam("x".into(), None, Term::var(0), false);
    let a = Term::app(id, Term::num(), false);
    assert!(equal(&a, &Term::num(), &Defs::default()));
  }

  #[test]
  fn delta_equality() {
    let mut defs = Defs::default();
    let dbl = Term::lam(
      "n".into(),
      Some(Term::num()),
      Term::op2(Oper::Add, Term::var(0), Term::var(0)),
      false,
    );
    defs.insert("dbl".into(), dbl);
    let a = Term::app(Term::refer("dbl", false), Term::val(2), false);
    assert!(equal(&a, &Term::val(4), &defs));
    assert!(!equal(&a, &Term::val(5), &defs));
  }

  #[test]
  fn same_reference_without_unfolding() {
    // `f == f` holds even when `f` is not in the definition map.
    let f = Term::refer("opaque", false);
    assert!(equal(&f, &f.clone(), &Defs::default()));
  }

  #[test]
  fn op1_literals_must_agree() {
    let defs = Defs::default();
    let mut holes = Holes::new();
    let mut sink = NullSink;
    let mut eq = Equality::new(&defs, &mut holes, &mut sink);
    let a = Term::op1(Oper::Add, Term::var(0), 5);
    let b = Term::op1(Oper::Add, Term::var(0), 6);
    let c = Term::op1(Oper::Add, Term::var(0), 5);
    assert!(!eq.equal_at(&a, &b, 1));
    assert!(eq.equal_at(&a, &c, 1));
  }

  #[test]
  fn stuck_application_spines_compare() {
    let a = Term::app(Term::var(0), Term::val(1), false);
    let b = Term::app(Term::var(0), Term::val(1), false);
    let c = Term::app(Term::var(0), Term::val(2), false);
    let ((ab, ac), _) = with_holes(|eq| {
      (eq.equal_at(&a, &b, 1), eq.equal_at(&a, &c, 1))
    });
    assert!(ab);
    assert!(!ac);
  }

  #[test]
  fn holes_unify_with_the_other_side() {
    let (ok, holes) = with_holes(|eq| {
      eq.equal(&Term::hol("A"), &Term::num())
    });
    assert!(ok);
    assert_eq!(holes.value_at("A", 0), Some(Term::num()));
  }

  #[test]
  fn conflicting_solution_downgrades_but_keeps_others() {
    let ((first, again, other), holes) = with_holes(|eq| {
      let first = eq.equal(&Term::hol("A"), &Term::num());
      let other = eq.equal(&Term::hol("B"), &Term::typ());
      let again = eq.equal(&Term::hol("A"), &Term::typ());
      (first, again, other)
    });
    assert!(first);
    assert!(other);
    assert!(!again);
    assert_eq!(holes.value_at("A", 0), None);
    assert!(matches!(
      holes.get("A").unwrap().value,
      HoleValue::Conflict
    ));
    // The conflict left B's assignment untouched.
    assert_eq!(holes.value_at("B", 0), Some(Term::typ()));
  }

  #[test]
  fn consistent_resolution_is_stable() {
    let ((first, second), holes) = with_holes(|eq| {
      let first = eq.equal(&Term::hol("A"), &Term::val(1));
      let second = eq.equal(&Term::hol("A"), &Term::val(1));
      (first, second)
    });
    assert!(first && second);
    assert_eq!(holes.value_at("A", 0), Some(Term::val(1)));
  }

  #[test]
  fn erased_content_is_ignored() {
    // (x) => x  against  (A;) => (x) => x  applied erased.
    let id = Term::lam("x".into(), None, Term::var(0), false);
    let poly = Term::lam("A".into(), None, id.clone(), true);
    let inst = Term::app(poly, Term::num(), true);
    assert!(equal(&inst, &id, &Defs::default()));
  }
}
