//! Bidirectional type checking.
//!
//! A [`Checker`] is one checking session: it owns the definition map, the
//! cache of inferred reference types, and the hole registry, and borrows a
//! diagnostic sink. Expected types are weak-head-normalized before use and
//! compared against inferred types with the equality engine after every
//! rule. Successfully checked references are rewritten in place to
//! `Ann(type, body, done = true)`, so each definition is checked once.

use tracing::{debug, trace};

use crate::kernel::diag::{LogRecord, Sink};
use crate::kernel::equal::Equality;
use crate::kernel::error::TypeError;
use crate::kernel::hole::{HoleValue, Holes};
use crate::kernel::reduce::{Opts, Reducer};
use crate::kernel::subst::{shift, subst};
use crate::kernel::term::{Defs, Loc, Name, Term, TermData, Types, ERASED};

// ============================================================================
// Typing contexts
// ============================================================================

/// One binder in scope.
#[derive(Debug, Clone)]
pub struct Frame {
  pub name: Name,
  /// Definition of the binder, for let-like frames; `None` for opaque
  /// binders.
  pub term: Option<Term>,
  /// Type of the binder, valid at its own binding depth.
  pub typ: Term,
  pub eras: bool,
}

/// Stack of binders, innermost last.
#[derive(Debug, Clone, Default)]
pub struct Context {
  frames: Vec<Frame>,
}

impl Context {
  pub fn new() -> Context {
    Context::default()
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn push(&mut self, frame: Frame) {
    self.frames.push(frame);
  }

  pub fn pop(&mut self) {
    self.frames.pop();
  }

  /// The `i`-th frame from the top, with type and term shifted to the
  /// current depth.
  pub fn get(&self, i: usize) -> Option<Frame> {
    let frame = self.frames.get(self.frames.len().checked_sub(i + 1)?)?;
    Some(Frame {
      name: frame.name.clone(),
      term: frame.term.as_ref().map(|t| shift(t, i + 1, 0)),
      typ: shift(&frame.typ, i + 1, 0),
      eras: frame.eras,
    })
  }

  /// Snapshot for diagnostics, outermost binder first.
  pub fn dump(&self) -> Vec<(Name, Term)> {
    self
      .frames
      .iter()
      .map(|frame| (frame.name.clone(), frame.typ.clone()))
      .collect()
  }
}

// ============================================================================
// The checker
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckStats {
  pub infer_calls: u64,
  pub equal_calls: u64,
}

pub struct Checker<'s> {
  pub defs: Defs,
  pub types: Types,
  pub holes: Holes,
  sink: &'s mut dyn Sink,
  pub stats: CheckStats,
}

type Result<T> = std::result::Result<T, TypeError>;

impl<'s> Checker<'s> {
  pub fn new(defs: Defs, sink: &'s mut dyn Sink) -> Checker<'s> {
    Checker {
      defs,
      types: Types::default(),
      holes: Holes::new(),
      sink,
      stats: CheckStats::default(),
    }
  }

  /// Hand back the (possibly rewritten) definition map.
  pub fn into_defs(self) -> Defs {
    self.defs
  }

  /// Check a top-level definition, then report named holes.
  pub fn typecheck(
    &mut self,
    name: &str,
    expect: Option<&Term>,
  ) -> Result<Term> {
    debug!(name, "typecheck");
    let typ = match self.types.get(name) {
      Some(typ) => typ.clone(),
      None => self.check_def(name, expect, None)?,
    };
    self.report_holes();
    Ok(typ)
  }

  /// Check the definition `name` in the empty context, substitute any
  /// holes resolved along the way into its type and body, cache the type,
  /// and rewrite the definition into a done ascription.
  fn check_def(
    &mut self,
    name: &str,
    expect: Option<&Term>,
    loc: Option<&Loc>,
  ) -> Result<Term> {
    let def = self.defs.get(name).cloned().ok_or_else(|| {
      TypeError::UnknownReference {
        name: name.to_string(),
        loc: loc.cloned(),
      }
    })?;
    let mut ctx = Context::new();
    let typ = self.infer(&def, expect, &mut ctx, false)?;
    let typ = self.holes.fill(&typ);
    // An already-ascribed definition contributes its expression, so the
    // rewrite below stays a single-level ascription.
    let body = match def.as_data() {
      TermData::Ann { expr, .. } => self.holes.fill(expr),
      _ => self.holes.fill(&def),
    };
    self.types.entry(name.to_string()).or_insert_with(|| typ.clone());
    self
      .defs
      .insert(name.to_string(), Term::ann(typ.clone(), body, true));
    Ok(typ)
  }

  fn report_holes(&mut self) {
    let records: Vec<LogRecord> = self
      .holes
      .iter()
      .filter(|(name, _)| !name.starts_with('_') && *name != ERASED)
      .map(|(name, entry)| LogRecord::Hole {
        name: name.clone(),
        goal: entry.expect.clone(),
        ctx: entry.ctx.clone(),
        value: match &entry.value {
          HoleValue::Set(value) => Some(value.clone()),
          _ => None,
        },
      })
      .collect();
    for rec in records {
      self.sink.emit(rec);
    }
  }

  // ==========================================================================
  // Helpers
  // ==========================================================================

  fn whnf_at(&mut self, term: &Term, dep: usize) -> Term {
    Reducer::new(
      &self.defs,
      Opts { logs: false, ..Opts::whnf() },
      &mut *self.sink,
    )
    .with_holes(&self.holes)
    .reduce_at(term, dep)
  }

  fn equal_at(&mut self, a: &Term, b: &Term, dep: usize) -> bool {
    self.stats.equal_calls += 1;
    Equality::new(&self.defs, &mut self.holes, &mut *self.sink)
      .equal_at(a, b, dep)
  }

  /// Accept `got` against the expected type, if any.
  fn expect_match(
    &mut self,
    got: Term,
    expect: Option<&Term>,
    term: &Term,
    ctx: &Context,
  ) -> Result<Term> {
    if let Some(exp) = expect {
      if !self.equal_at(&got, exp, ctx.len()) {
        let dep = ctx.len();
        return Err(TypeError::TypeMismatch {
          expect: self.whnf_at(exp, dep),
          got: self.whnf_at(&got, dep),
          term: term.clone(),
          ctx: ctx.dump(),
          loc: term.loc().cloned(),
        });
      }
    }
    Ok(got)
  }

  // ==========================================================================
  // Inference
  // ==========================================================================

  /// Infer (or, with `expect`, check) the type of `term`. `eras` is true
  /// in computationally-irrelevant positions, where erased variables may
  /// be used.
  pub fn infer(
    &mut self,
    term: &Term,
    expect: Option<&Term>,
    ctx: &mut Context,
    eras: bool,
  ) -> Result<Term> {
    self.stats.infer_calls += 1;
    trace!(eras, dep = ctx.len(), "infer {}", term);
    let expect_whnf = expect.map(|exp| self.whnf_at(exp, ctx.len()));
    let expect = expect_whnf.as_ref();
    match term.as_data() {
      TermData::Var { indx } => {
        let frame =
          ctx.get(*indx).ok_or_else(|| TypeError::UnboundVariable {
            term: term.clone(),
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          })?;
        if frame.eras && !eras {
          return Err(TypeError::ErasedUse {
            term: term.clone(),
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        }
        self.expect_match(frame.typ, expect, term, ctx)
      },

      TermData::Typ => self.expect_match(Term::typ(), expect, term, ctx),

      TermData::All { name, bind, body, eras: e } => {
        if let Some(exp) = expect {
          let exp = exp.clone();
          if !self.equal_at(&Term::typ(), &exp, ctx.len()) {
            return Err(TypeError::NotType {
              term: term.clone(),
              typ: exp,
              ctx: ctx.dump(),
              loc: term.loc().cloned(),
            });
          }
        }
        self.infer(bind, Some(&Term::typ()), ctx, true)?;
        ctx.push(Frame {
          name: name.clone(),
          term: None,
          typ: bind.clone(),
          eras: *e,
        });
        let body_t = self.infer(body, Some(&Term::typ()), ctx, true);
        ctx.pop();
        body_t?;
        Ok(Term::typ())
      },

      TermData::Lam { name, bind, body, eras: e } => {
        let (domain, body_expect) = match expect.map(Term::as_data) {
          Some(TermData::All { bind: ebind, body: ebody, .. }) => (
            bind.clone().unwrap_or_else(|| ebind.clone()),
            Some(ebody.clone()),
          ),
          _ => match bind {
            Some(bind) => (bind.clone(), None),
            None => {
              return Err(TypeError::LambdaNeedsAnnotation {
                term: term.clone(),
                ctx: ctx.dump(),
                loc: term.loc().cloned(),
              })
            },
          },
        };
        self.infer(&domain, Some(&Term::typ()), ctx, true)?;
        ctx.push(Frame {
          name: name.clone(),
          term: None,
          typ: domain.clone(),
          eras: *e,
        });
        let body_t = self.infer(body, body_expect.as_ref(), ctx, eras);
        ctx.pop();
        let body_t = body_t?;
        let got = Term::all(name.clone(), domain, body_t, *e);
        self.expect_match(got, expect, term, ctx)
      },

      TermData::App { func, argm, eras: e } => {
        let func_t = self.infer(func, None, ctx, eras)?;
        let func_tw = self.whnf_at(&func_t, ctx.len());
        let TermData::All { bind, body, eras: fe, .. } = func_tw.as_data()
        else {
          return Err(TypeError::NotFunction {
            term: term.clone(),
            typ: func_tw,
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        };
        if fe != e {
          return Err(TypeError::ErasureMismatch {
            term: term.clone(),
            typ: func_tw.clone(),
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        }
        self.infer(argm, Some(bind), ctx, eras || *e)?;
        let got =
          subst(body, &Term::ann(bind.clone(), argm.clone(), true), 0);
        self.expect_match(got, expect, term, ctx)
      },

      TermData::Slf { name, typ } => {
        ctx.push(Frame {
          name: name.clone(),
          term: None,
          typ: term.clone(),
          eras: false,
        });
        let typ_t = self.infer(typ, Some(&Term::typ()), ctx, true);
        ctx.pop();
        typ_t?;
        self.expect_match(Term::typ(), expect, term, ctx)
      },

      TermData::New { typ, expr } => {
        let typ_w = self.whnf_at(typ, ctx.len());
        let TermData::Slf { typ: styp, .. } = typ_w.as_data() else {
          return Err(TypeError::NewNotSelf {
            term: term.clone(),
            typ: typ_w,
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        };
        self.infer(typ, Some(&Term::typ()), ctx, true)?;
        // The self variable sees the value being introduced, memoized so
        // recursive unfoldings stop at the ascription.
        let ann = Term::ann(typ_w.clone(), term.clone(), true);
        let target = subst(styp, &ann, 0);
        self.infer(expr, Some(&target), ctx, eras)?;
        self.expect_match(typ.clone(), expect, term, ctx)
      },

      TermData::Use { expr } => {
        let expr_t = self.infer(expr, None, ctx, eras)?;
        let expr_tw = self.whnf_at(&expr_t, ctx.len());
        let TermData::Slf { typ: styp, .. } = expr_tw.as_data() else {
          return Err(TypeError::UseNotSelf {
            term: term.clone(),
            typ: expr_tw,
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        };
        let got = subst(styp, expr, 0);
        self.expect_match(got, expect, term, ctx)
      },

      TermData::Num => self.expect_match(Term::typ(), expect, term, ctx),

      TermData::Val { .. } => {
        self.expect_match(Term::num(), expect, term, ctx)
      },

      TermData::Op1 { num0, .. } => {
        self.infer(num0, Some(&Term::num()), ctx, eras)?;
        self.expect_match(Term::num(), expect, term, ctx)
      },

      TermData::Op2 { num0, num1, .. } => {
        self.infer(num0, Some(&Term::num()), ctx, eras)?;
        self.infer(num1, Some(&Term::num()), ctx, eras)?;
        self.expect_match(Term::num(), expect, term, ctx)
      },

      TermData::Ite { cond, ift, iff } => {
        let cond_t = self.infer(cond, None, ctx, eras)?;
        if !self.equal_at(&cond_t, &Term::num(), ctx.len()) {
          return Err(TypeError::CondNotNum {
            term: term.clone(),
            typ: cond_t,
            ctx: ctx.dump(),
            loc: term.loc().cloned(),
          });
        }
        let ift_t = self.infer(ift, expect, ctx, eras)?;
        self.infer(iff, Some(&ift_t), ctx, eras)?;
        Ok(match expect {
          Some(exp) => exp.clone(),
          None => ift_t,
        })
      },

      TermData::Ann { typ, expr, done } => {
        if done.get() {
          return self.expect_match(typ.clone(), expect, term, ctx);
        }
        // Set before the sub-checks so self-references short-circuit;
        // roll back when anything below throws.
        done.set(true);
        let checked = match self.infer(typ, Some(&Term::typ()), ctx, true) {
          Ok(_) => self.infer(expr, Some(typ), ctx, eras).map(|_| ()),
          Err(err) => Err(err),
        };
        if let Err(err) = checked {
          done.set(false);
          return Err(err);
        }
        self.expect_match(typ.clone(), expect, term, ctx)
      },

      TermData::Log { msge, expr } => {
        let msge_t = self.infer(msge, None, ctx, true)?;
        self
          .sink
          .emit(LogRecord::LogType { term: msge.clone(), typ: msge_t });
        self.infer(expr, expect, ctx, eras)
      },

      TermData::Hol { name } => {
        self.holes.register(name, expect.cloned(), ctx.dump(), ctx.len());
        Ok(match expect {
          Some(exp) => exp.clone(),
          None => Term::hol(format!("{}_type", name)),
        })
      },

      TermData::Ref { name, .. } => {
        if let Some(typ) = self.types.get(name) {
          let typ = typ.clone();
          return self.expect_match(typ, expect, term, ctx);
        }
        let name = name.clone();
        let got = self.check_def(&name, None, term.loc())?;
        self.expect_match(got, expect, term, ctx)
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::diag::{NullSink, VecSink};
  use crate::kernel::reduce::normalize;
  use crate::kernel::term::Oper;

  fn lam(name: &str, bind: Option<Term>, body: Term) -> Term {
    Term::lam(name.into(), bind, body, false)
  }

  fn elam(name: &str, bind: Option<Term>, body: Term) -> Term {
    Term::lam(name.into(), bind, body, true)
  }

  fn all(name: &str, bind: Term, body: Term) -> Term {
    Term::all(name.into(), bind, body, false)
  }

  fn eall(name: &str, bind: Term, body: Term) -> Term {
    Term::all(name.into(), bind, body, true)
  }

  fn check_closed(term: Term, expect: Option<Term>) -> Result<Term> {
    let mut sink = NullSink;
    let mut defs = Defs::default();
    defs.insert("main".into(), term);
    let mut checker = Checker::new(defs, &mut sink);
    checker.typecheck("main", expect.as_ref())
  }

  #[test]
  fn identity_application_checks_at_type() {
    // ((x : Type) => x)(Type) :: Type
    let id = lam("x", Some(Term::typ()), Term::var(0));
    let t = Term::app(id, Term::typ(), false);
    let typ = check_closed(t, Some(Term::typ())).unwrap();
    assert_eq!(typ, Term::typ());
  }

  #[test]
  fn dependent_apply_checks_and_normalizes() {
    // id : (A : Type;) -> (x : A) -> A
    let id_typ = eall("A", Term::typ(), all("x", Term::var(0), Term::var(1)));
    let id_fun = elam("A", None, lam("x", None, Term::var(0)));
    let mut defs = Defs::default();
    defs.insert("id".into(), Term::ann(id_typ, id_fun, false));
    defs.insert(
      "main".into(),
      Term::app(
        Term::app(Term::refer("id", false), Term::num(), true),
        Term::val(5),
        false,
      ),
    );
    let mut sink = NullSink;
    let mut checker = Checker::new(defs, &mut sink);
    let typ = checker.typecheck("main", Some(&Term::num())).unwrap();
    // The application rule leaves the argument ascribed inside the
    // codomain; normalization strips it.
    assert_eq!(normalize(&typ, &checker.defs), Term::num());
    let defs = checker.into_defs();
    let main = defs.get("main").unwrap().clone();
    assert_eq!(normalize(&main, &defs), Term::val(5));
  }

  #[test]
  fn numeric_fold_checks_as_number() {
    // ((n : Number) => |(|n .+. 1|) .*. 2|)(3)
    let body = Term::op2(
      Oper::Mul,
      Term::op2(Oper::Add, Term::var(0), Term::val(1)),
      Term::val(2),
    );
    let t = Term::app(lam("n", Some(Term::num()), body), Term::val(3), false);
    let typ = check_closed(t.clone(), Some(Term::num())).unwrap();
    assert_eq!(typ, Term::num());
    assert_eq!(normalize(&t, &Defs::default()), Term::val(8));
  }

  #[test]
  fn unannotated_lambda_needs_expected_type() {
    let id = lam("x", None, Term::var(0));
    match check_closed(id, None) {
      Err(TypeError::LambdaNeedsAnnotation { .. }) => {},
      other => panic!("unexpected {:?}", other.map(|t| t.to_string())),
    }
  }

  #[test]
  fn erased_variable_rejected_in_relevant_position() {
    // (A : Type;) => A  uses its erased binder relevantly.
    let t = Term::lam("A".into(), Some(Term::typ()), Term::var(0), true);
    match check_closed(t, None) {
      Err(TypeError::ErasedUse { .. }) => {},
      other => panic!("unexpected {:?}", other.map(|t| t.to_string())),
    }
  }

  #[test]
  fn erasure_mismatch_on_application() {
    let id = lam("x", Some(Term::num()), Term::var(0));
    let t = Term::app(id, Term::val(1), true);
    match check_closed(t, None) {
      Err(TypeError::ErasureMismatch { .. }) => {},
      other => panic!("unexpected {:?}", other.map(|t| t.to_string())),
    }
  }

  #[test]
  fn applying_a_number_is_rejected() {
    let t = Term::app(Term::val(1), Term::val(2), false);
    match check_closed(t, None) {
      Err(TypeError::NotFunction { .. }) => {},
      other => panic!("unexpected {:?}", other.map(|t| t.to_string())),
    }
  }

  #[test]
  fn ite_propagates_expected_type() {
    let t = Term::ite(Term::val(1), Term::val(2), Term::val(3));
    assert_eq!(check_closed(t, Some(Term::num())).unwrap(), Term::num());
    let bad = Term::ite(Term::typ(), Term::val(2), Term::val(3));
    match check_closed(bad, None) {
      Err(TypeError::CondNotNum { .. }) => {},
      other => panic!("unexpected {:?}", other.map(|t| t.to_string())),
    }
  }

  #[test]
  fn ann_memoizes_and_rolls_back() {
    // A failing ascription resets its done flag.
    let bad = Term::ann(Term::num(), Term::typ(), false);
    let TermData::Ann { done, .. } = bad.as_data() else { unreachable!() };
    assert!(check_closed(bad.clone(), None).is_err());
    assert!(!done.get());
    // A successful one leaves it set.
    let good = Term::ann(Term::num(), Term::val(1), false);
    let TermData::Ann { done, .. } = good.as_data() else { unreachable!() };
    assert!(check_closed(good.clone(), None).is_ok());
    assert!(done.get());
  }

  #[test]
  fn checked_definitions_are_rewritten_to_done_ascriptions() {
    let mut defs = Defs::default();
    defs.insert("one".into(), Term::val(1));
    defs.insert("main".into(), Term::refer("one", false));
    let mut sink = NullSink;
    let mut checker = Checker::new(defs, &mut sink);
    checker.typecheck("main", Some(&Term::num())).unwrap();
    assert_eq!(checker.types.get("one"), Some(&Term::num()));
    let defs = checker.into_defs();
    match defs.get("one").unwrap().as_data() {
      TermData::Ann { done, .. } => assert!(done.get()),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn annotated_definitions_rewrite_to_a_single_ascription() {
    // A definition stored as an ascription must not come back double
    // wrapped after checking.
    let mut defs = Defs::default();
    defs.insert("one".into(), Term::ann(Term::num(), Term::val(1), false));
    defs.insert("main".into(), Term::refer("one", false));
    let mut sink = NullSink;
    let mut checker = Checker::new(defs, &mut sink);
    checker.typecheck("main", Some(&Term::num())).unwrap();
    let defs = checker.into_defs();
    match defs.get("one").unwrap().as_data() {
      TermData::Ann { expr, done, .. } => {
        assert!(done.get());
        assert!(!matches!(expr.as_data(), TermData::Ann { .. }));
        assert_eq!(expr, &Term::val(1));
      },
      other => panic!("unexpected {:?}", other),
    }
    // The self-type fixture stores every definition pre-ascribed; after
    // a full check each entry is still a single-level ascription.
    let mut sink = NullSink;
    let mut checker = Checker::new(nat_defs(), &mut sink);
    checker.typecheck("succ", None).unwrap();
    let defs = checker.into_defs();
    for name in ["Nat", "zero", "succ"] {
      match defs.get(name).unwrap().as_data() {
        TermData::Ann { expr, done, .. } => {
          assert!(done.get(), "{} not memoized", name);
          assert!(
            !matches!(expr.as_data(), TermData::Ann { .. }),
            "{} double-wrapped",
            name
          );
        },
        other => panic!("unexpected {:?}", other),
      }
    }
  }

  #[test]
  fn holes_solve_from_the_enclosing_context() {
    // ((x) => x) :: (x : ?A) -> ?A, demanded at (x : Number) -> Number.
    let annotated = Term::ann(
      all("x", Term::hol("A"), Term::hol("A")),
      lam("x", None, Term::var(0)),
      false,
    );
    let expected = all("x", Term::num(), Term::num());
    let mut defs = Defs::default();
    defs.insert("main".into(), annotated);
    let mut sink = VecSink::default();
    let mut checker = Checker::new(defs, &mut sink);
    let typ = checker.typecheck("main", Some(&expected)).unwrap();
    assert!(checker.equal_at(&typ, &expected, 0));
    assert_eq!(checker.holes.value_at("A", 0), Some(Term::num()));
    // The named hole is reported, with its solution.
    assert!(sink.records.iter().any(|rec| matches!(
      rec,
      LogRecord::Hole { name, value: Some(v), .. }
        if name == "A" && *v == Term::num()
    )));
  }

  #[test]
  fn unsolved_anonymous_holes_are_not_reported() {
    let t = Term::ann(Term::num(), Term::hol("_x"), false);
    let mut defs = Defs::default();
    defs.insert("main".into(), t);
    let mut sink = VecSink::default();
    let mut checker = Checker::new(defs, &mut sink);
    checker.typecheck("main", None).unwrap();
    assert!(sink.records.is_empty());
  }

  // ==========================================================================
  // Self types: a unary Nat and its induction round trip
  // ==========================================================================

  /// `Nat := ${n} (P : Nat -> Type;) -> P(zero) -> ((k:Nat) -> P(k) ->
  /// P(succ(k))) -> P(n)`
  fn nat_defs() -> Defs {
    let nat_ref = || Term::refer("Nat", false);
    // Inside the Slf body, de Bruijn indices: n = the self var.
    // P : Nat -> Type (erased binder)
    let p_typ = all("m", nat_ref(), Term::typ());
    // z : P(zero)
    let z_typ = Term::app(Term::var(0), Term::refer("zero", false), false);
    // s : (k : Nat) -> P(k) -> P(succ(k))
    // Under k the binders are [k = #0, z = #1, P = #2, n = #3].
    let s_typ = all(
      "k",
      nat_ref(),
      all(
        "ih",
        Term::app(Term::var(2), Term::var(0), false),
        Term::app(
          Term::var(3),
          Term::app(Term::refer("succ", false), Term::var(1), false),
          false,
        ),
      ),
    );
    // P(n): P is #2 (under z and s binders... built below), n is the self.
    let nat = Term::slf(
      "n".into(),
      eall(
        "P",
        p_typ,
        all("z", z_typ, all("s", s_typ, {
          // P = #2, n = #3 (self binder).
          Term::app(Term::var(2), Term::var(3), false)
        })),
      ),
    );

    // zero := new(Nat) (P;) => (z) => (s) => z
    let zero = Term::snew(
      nat_ref(),
      elam("P", None, lam("z", None, lam("s", None, Term::var(1)))),
    );

    // succ := (n : Nat) => new(Nat) (P;) => (z) => (s) =>
    //           s(n)(use(n)(P;)(z)(s))
    let succ = Term::lam(
      "n".into(),
      Some(nat_ref()),
      Term::snew(
        nat_ref(),
        elam(
          "P",
          None,
          lam(
            "z",
            None,
            lam("s", None, {
              // n = #3, P = #2, z = #1, s = #0
              let use_n = Term::app(
                Term::app(
                  Term::app(
                    Term::suse(Term::var(3)),
                    Term::var(2),
                    true,
                  ),
                  Term::var(1),
                  false,
                ),
                Term::var(0),
                false,
              );
              Term::app(
                Term::app(Term::var(0), Term::var(3), false),
                use_n,
                false,
              )
            }),
          ),
        ),
      ),
      false,
    );

    let mut defs = Defs::default();
    defs.insert("Nat".into(), Term::ann(Term::typ(), nat, false));
    defs.insert("zero".into(), Term::ann(nat_ref(), zero, false));
    defs.insert(
      "succ".into(),
      Term::ann(all("n", nat_ref(), nat_ref()), succ, false),
    );
    defs
  }

  #[test]
  fn nat_encoding_typechecks() {
    let mut sink = NullSink;
    let mut checker = Checker::new(nat_defs(), &mut sink);
    checker.typecheck("Nat", None).unwrap();
    checker.typecheck("zero", None).unwrap();
    checker.typecheck("succ", None).unwrap();
  }

  #[test]
  fn nat_induction_round_trips() {
    // use(succ(zero))(P;)(z)(s) reduces to s(zero)(z) for opaque P, z, s.
    let defs = nat_defs();
    let one =
      Term::app(Term::refer("succ", false), Term::refer("zero", false), false);
    let applied = Term::app(
      Term::app(
        Term::app(Term::suse(one), Term::refer("P", false), true),
        Term::refer("z", false),
        false,
      ),
      Term::refer("s", false),
      false,
    );
    let expected = Term::app(
      Term::app(Term::refer("s", false), Term::refer("zero", false), false),
      Term::refer("z", false),
      false,
    );
    let mut holes = Holes::new();
    let mut sink = NullSink;
    let mut eq = Equality::new(&defs, &mut holes, &mut sink);
    assert!(eq.equal(&applied, &expected));
  }
}
