//! The hole registry.
//!
//! Holes are named metavariables solved by the equality engine. Every
//! occurrence of the same name is the same metavariable. Entries settle
//! monotonically: unset, then assigned, and an assignment that later
//! disagrees with a required solution downgrades to a conflict without
//! touching any other entry.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::kernel::subst::{shift, unshift};
use crate::kernel::term::{Name, Term, TermData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoleValue {
  Unset,
  Set(Term),
  /// Unresolvable: two required solutions disagreed.
  Conflict,
}

#[derive(Debug, Clone)]
pub struct HoleEntry {
  /// Expected type at first sighting, if the checker had one.
  pub expect: Option<Term>,
  /// Context snapshot at first sighting, outermost first.
  pub ctx: Vec<(Name, Term)>,
  /// Binder depth the hole was first seen under; assignments are stored
  /// at this depth.
  pub depth: usize,
  pub value: HoleValue,
}

/// Registry of holes, in first-sighting order.
#[derive(Debug, Clone, Default)]
pub struct Holes {
  entries: IndexMap<Name, HoleEntry>,
}

impl Holes {
  pub fn new() -> Holes {
    Holes::default()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, name: &str) -> Option<&HoleEntry> {
    self.entries.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Name, &HoleEntry)> {
    self.entries.iter()
  }

  /// Record a sighting. The first sighting fixes context and depth; later
  /// ones only fill in a missing expected type.
  pub fn register(
    &mut self,
    name: &str,
    expect: Option<Term>,
    ctx: Vec<(Name, Term)>,
    depth: usize,
  ) {
    match self.entries.get_mut(name) {
      Some(entry) => {
        if entry.expect.is_none() {
          entry.expect = expect;
        }
      },
      None => {
        self.entries.insert(
          name.to_string(),
          HoleEntry { expect, ctx, depth, value: HoleValue::Unset },
        );
      },
    }
  }

  fn ensure(&mut self, name: &str, depth: usize) -> &mut HoleEntry {
    if !self.entries.contains_key(name) {
      self.entries.insert(
        name.to_string(),
        HoleEntry { expect: None, ctx: Vec::new(), depth, value: HoleValue::Unset },
      );
    }
    self.entries.get_mut(name).unwrap()
  }

  /// The current assignment, shifted from the entry's depth to `depth`.
  pub fn value_at(&self, name: &str, depth: usize) -> Option<Term> {
    let entry = self.entries.get(name)?;
    match &entry.value {
      HoleValue::Set(v) if depth >= entry.depth => {
        Some(shift(v, depth - entry.depth, 0))
      },
      _ => None,
    }
  }

  /// Try to assign `candidate` (a term at `depth`) to an unset hole.
  ///
  /// Returns false when the candidate mentions binders below the hole's
  /// own depth and therefore has no representation there; such holes are
  /// outside the first-order fragment and stay unsolved.
  pub fn assign(&mut self, name: &str, candidate: &Term, depth: usize) -> bool {
    let entry = self.ensure(name, depth);
    debug_assert!(matches!(entry.value, HoleValue::Unset));
    let stored = if depth >= entry.depth {
      unshift(candidate, depth - entry.depth, 0)
    } else {
      Some(shift(candidate, entry.depth - depth, 0))
    };
    match stored {
      Some(v) => {
        entry.value = HoleValue::Set(v);
        true
      },
      None => false,
    }
  }

  /// Mark a hole unresolvable. Other assignments are unaffected.
  pub fn downgrade(&mut self, name: &str, depth: usize) {
    let entry = self.ensure(name, depth);
    entry.value = HoleValue::Conflict;
  }

  /// Substitute every assigned hole into `term`.
  ///
  /// Assignments may refer to other holes; a seen-set breaks accidental
  /// cycles.
  pub fn fill(&self, term: &Term) -> Term {
    let mut seen = FxHashSet::default();
    self.fill_go(term, 0, &mut seen)
  }

  fn fill_go(
    &self,
    term: &Term,
    depth: usize,
    seen: &mut FxHashSet<Name>,
  ) -> Term {
    match term.as_data() {
      TermData::Hol { name } => match self.value_at(name, depth) {
        Some(v) if !seen.contains(name) => {
          seen.insert(name.clone());
          let out = self.fill_go(&v, depth, seen);
          seen.remove(name);
          out
        },
        _ => term.clone(),
      },
      TermData::Var { .. }
      | TermData::Typ
      | TermData::Num
      | TermData::Val { .. }
      | TermData::Ref { .. } => term.clone(),
      TermData::All { name, bind, body, eras } => Term::all(
        name.clone(),
        self.fill_go(bind, depth, seen),
        self.fill_go(body, depth + 1, seen),
        *eras,
      )
      .at(term.loc()),
      TermData::Lam { name, bind, body, eras } => Term::lam(
        name.clone(),
        bind.as_ref().map(|bind| self.fill_go(bind, depth, seen)),
        self.fill_go(body, depth + 1, seen),
        *eras,
      )
      .at(term.loc()),
      TermData::App { func, argm, eras } => Term::app(
        self.fill_go(func, depth, seen),
        self.fill_go(argm, depth, seen),
        *eras,
      )
      .at(term.loc()),
      TermData::Slf { name, typ } => {
        Term::slf(name.clone(), self.fill_go(typ, depth + 1, seen))
          .at(term.loc())
      },
      TermData::New { typ, expr } => Term::snew(
        self.fill_go(typ, depth, seen),
        self.fill_go(expr, depth, seen),
      )
      .at(term.loc()),
      TermData::Use { expr } => {
        Term::suse(self.fill_go(expr, depth, seen)).at(term.loc())
      },
      TermData::Op1 { oper, num0, num1 } => {
        Term::op1(*oper, self.fill_go(num0, depth, seen), *num1).at(term.loc())
      },
      TermData::Op2 { oper, num0, num1 } => Term::op2(
        *oper,
        self.fill_go(num0, depth, seen),
        self.fill_go(num1, depth, seen),
      )
      .at(term.loc()),
      TermData::Ite { cond, ift, iff } => Term::ite(
        self.fill_go(cond, depth, seen),
        self.fill_go(ift, depth, seen),
        self.fill_go(iff, depth, seen),
      )
      .at(term.loc()),
      TermData::Ann { typ, expr, done } => Term::ann(
        self.fill_go(typ, depth, seen),
        self.fill_go(expr, depth, seen),
        done.get(),
      )
      .at(term.loc()),
      TermData::Log { msge, expr } => Term::log(
        self.fill_go(msge, depth, seen),
        self.fill_go(expr, depth, seen),
      )
      .at(term.loc()),
    }
  }
}
