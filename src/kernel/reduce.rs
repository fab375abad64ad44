//! Normalization by evaluation.
//!
//! Terms are unquoted into a semantic domain where binders are closures
//! over linked environments of thunks, reduced according to the gates in
//! [`Opts`], and quoted back to de Bruijn terms. Weak reduction exposes
//! the head constructor and resolves binder bodies (environment
//! substitution) without reducing them; full reduction recurses
//! everywhere.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::kernel::diag::{LogRecord, NullSink, Sink};
use crate::kernel::erase::erase;
use crate::kernel::hole::Holes;
use crate::kernel::term::{Defs, Name, Oper, Term, TermData};

// ============================================================================
// Options
// ============================================================================

/// Reduction gates. Each class of rule can be disabled independently;
/// `weak` stops reduction under binders.
#[derive(Debug, Clone, Copy)]
pub struct Opts {
  /// Stop at weak head normal form.
  pub weak: bool,
  /// β: apply lambdas.
  pub beta: bool,
  /// δ: expand references through the definition map.
  pub delt: bool,
  /// ν: compute numeric operators on literals.
  pub numb: bool,
  /// ι: select branches of conditionals on literals.
  pub iota: bool,
  /// Collapse `use(new(T) e)` to `e`.
  pub unse: bool,
  /// Substitute assigned holes.
  pub hole: bool,
  /// Emit `Log` messages to the sink.
  pub logs: bool,
}

impl Opts {
  /// Full normalization with every rule enabled.
  pub fn normal() -> Opts {
    Opts {
      weak: false,
      beta: true,
      delt: true,
      numb: true,
      iota: true,
      unse: true,
      hole: true,
      logs: true,
    }
  }

  /// Weak head normal form.
  pub fn whnf() -> Opts {
    Opts { weak: true, ..Opts::normal() }
  }

  /// Weak head normal form without unfolding references.
  pub fn whnf_no_delta() -> Opts {
    Opts { weak: true, delt: false, ..Opts::normal() }
  }
}

impl Default for Opts {
  fn default() -> Opts {
    Opts::normal()
  }
}

/// Caller-visible work counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReduceStats {
  /// Evaluation steps (one per unquoted node).
  pub steps: u64,
  pub beta: u64,
  pub delt: u64,
}

// ============================================================================
// Semantic domain
// ============================================================================

/// Whether evaluation fires reduction rules or only resolves environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Reduce,
  Resolve,
}

/// De Bruijn environment as a shared linked list of thunks.
#[derive(Debug, Clone, Default)]
pub struct Env {
  node: Option<Rc<EnvNode>>,
  len: usize,
}

#[derive(Debug)]
struct EnvNode {
  thunk: Thunk,
  rest: Env,
}

impl Env {
  pub fn new() -> Env {
    Env::default()
  }

  /// Seed an environment for a term with `depth` free variables, mapping
  /// index `i` to level `depth - 1 - i`.
  pub fn free(depth: usize) -> Env {
    let mut env = Env::new();
    for levl in 0..depth {
      env = env.extend(Thunk::forced(Rc::new(Value::Var { levl })));
    }
    env
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn extend(&self, thunk: Thunk) -> Env {
    Env {
      node: Some(Rc::new(EnvNode { thunk, rest: self.clone() })),
      len: self.len + 1,
    }
  }

  fn get(&self, indx: usize) -> Option<&Thunk> {
    let mut cur = self;
    let mut indx = indx;
    loop {
      let node = cur.node.as_deref()?;
      if indx == 0 {
        return Some(&node.thunk);
      }
      indx -= 1;
      cur = &node.rest;
    }
  }
}

/// A suspended computation with memoization.
#[derive(Debug, Clone)]
pub struct Thunk(Rc<RefCell<ThunkNode>>);

#[derive(Debug)]
enum ThunkNode {
  Suspended(Term, Env),
  Forced(Rc<Value>),
}

impl Thunk {
  fn suspend(term: Term, env: Env) -> Thunk {
    Thunk(Rc::new(RefCell::new(ThunkNode::Suspended(term, env))))
  }

  fn forced(value: Rc<Value>) -> Thunk {
    Thunk(Rc::new(RefCell::new(ThunkNode::Forced(value))))
  }

  fn force(&self, rd: &mut Reducer, mode: Mode) -> Rc<Value> {
    let suspended = match &*self.0.borrow() {
      ThunkNode::Forced(value) => return value.clone(),
      ThunkNode::Suspended(term, env) => (term.clone(), env.clone()),
    };
    let value = rd.unquote(&suspended.0, &suspended.1, mode);
    *self.0.borrow_mut() = ThunkNode::Forced(value.clone());
    value
  }
}

/// A binder body paired with its captured environment.
#[derive(Debug, Clone)]
pub struct Closure {
  term: Term,
  env: Env,
}

impl Closure {
  fn apply(&self, arg: Thunk, rd: &mut Reducer, mode: Mode) -> Rc<Value> {
    rd.unquote(&self.term, &self.env.extend(arg), mode)
  }
}

/// Weak-head semantic values. Variables are de Bruijn levels.
#[derive(Debug, Clone)]
pub enum Value {
  Var { levl: usize },
  Typ,
  All { name: Name, bind: Thunk, body: Closure, eras: bool },
  Lam { name: Name, bind: Option<Thunk>, body: Closure, eras: bool },
  App { func: Rc<Value>, argm: Thunk, eras: bool },
  Slf { name: Name, typ: Closure },
  New { typ: Thunk, expr: Thunk },
  Use { expr: Rc<Value> },
  Num,
  Val { numb: u32 },
  Op1 { oper: Oper, num0: Rc<Value>, num1: u32 },
  Op2 { oper: Oper, num0: Rc<Value>, num1: Rc<Value> },
  Ite { cond: Rc<Value>, ift: Thunk, iff: Thunk },
  Ann { typ: Thunk, expr: Rc<Value>, done: bool },
  Log { msge: Thunk, expr: Rc<Value> },
  Hol { name: Name },
  Ref { name: Name, eras: bool },
}

// ============================================================================
// The reducer
// ============================================================================

pub struct Reducer<'a> {
  defs: &'a Defs,
  holes: Option<&'a Holes>,
  opts: Opts,
  sink: &'a mut dyn Sink,
  /// Erased bodies of delta-reduced references, keyed by (name, erased).
  erased_memo: FxHashMap<(Name, bool), Term>,
  pub stats: ReduceStats,
}

impl<'a> Reducer<'a> {
  pub fn new(defs: &'a Defs, opts: Opts, sink: &'a mut dyn Sink) -> Self {
    Reducer {
      defs,
      holes: None,
      opts,
      sink,
      erased_memo: FxHashMap::default(),
      stats: ReduceStats::default(),
    }
  }

  pub fn with_holes(mut self, holes: &'a Holes) -> Self {
    self.holes = Some(holes);
    self
  }

  /// Reduce a closed term.
  pub fn reduce(&mut self, term: &Term) -> Term {
    self.reduce_at(term, 0)
  }

  /// Reduce a term whose free variables index `depth` enclosing binders.
  pub fn reduce_at(&mut self, term: &Term, depth: usize) -> Term {
    trace!(depth, "reduce {}", term);
    let env = Env::free(depth);
    let value = self.unquote(term, &env, Mode::Reduce);
    self.quote_at(&value, depth, self.opts.weak)
  }

  // ==========================================================================
  // Unquote
  // ==========================================================================

  fn unquote(&mut self, term: &Term, env: &Env, mode: Mode) -> Rc<Value> {
    self.stats.steps += 1;
    match term.as_data() {
      TermData::Var { indx } => match env.get(*indx) {
        Some(thunk) => {
          let thunk = thunk.clone();
          thunk.force(self, mode)
        },
        // Out-of-scope variables only arise from ill-scoped input.
        None => Rc::new(Value::Var { levl: 0 }),
      },
      TermData::Typ => Rc::new(Value::Typ),
      TermData::All { name, bind, body, eras } => Rc::new(Value::All {
        name: name.clone(),
        bind: Thunk::suspend(bind.clone(), env.clone()),
        body: Closure { term: body.clone(), env: env.clone() },
        eras: *eras,
      }),
      TermData::Lam { name, bind, body, eras } => Rc::new(Value::Lam {
        name: name.clone(),
        bind: bind
          .as_ref()
          .map(|bind| Thunk::suspend(bind.clone(), env.clone())),
        body: Closure { term: body.clone(), env: env.clone() },
        eras: *eras,
      }),
      TermData::App { func, argm, eras } => {
        let func = self.unquote(func, env, mode);
        if mode == Mode::Reduce && self.opts.beta {
          if let Value::Lam { body, .. } = &*func {
            self.stats.beta += 1;
            let body = body.clone();
            return body.apply(
              Thunk::suspend(argm.clone(), env.clone()),
              self,
              mode,
            );
          }
        }
        Rc::new(Value::App {
          func,
          argm: Thunk::suspend(argm.clone(), env.clone()),
          eras: *eras,
        })
      },
      TermData::Slf { name, typ } => Rc::new(Value::Slf {
        name: name.clone(),
        typ: Closure { term: typ.clone(), env: env.clone() },
      }),
      TermData::New { typ, expr } => Rc::new(Value::New {
        typ: Thunk::suspend(typ.clone(), env.clone()),
        expr: Thunk::suspend(expr.clone(), env.clone()),
      }),
      TermData::Use { expr } => {
        let expr = self.unquote(expr, env, mode);
        if mode == Mode::Reduce && self.opts.unse {
          if let Value::New { expr: inner, .. } = &*expr {
            let inner = inner.clone();
            return inner.force(self, mode);
          }
        }
        Rc::new(Value::Use { expr })
      },
      TermData::Num => Rc::new(Value::Num),
      TermData::Val { numb } => Rc::new(Value::Val { numb: *numb }),
      TermData::Op1 { oper, num0, num1 } => {
        let num0 = self.unquote(num0, env, mode);
        if mode == Mode::Reduce && self.opts.numb {
          if let Value::Val { numb } = &*num0 {
            return Rc::new(Value::Val { numb: oper.eval(*numb, *num1) });
          }
        }
        Rc::new(Value::Op1 { oper: *oper, num0, num1: *num1 })
      },
      TermData::Op2 { oper, num0, num1 } => {
        // The right operand reduces first; a literal demotes the node to
        // a partial application, which then computes natively.
        let num1 = self.unquote(num1, env, mode);
        if mode == Mode::Reduce && self.opts.numb {
          if let Value::Val { numb: b } = &*num1 {
            let num0 = self.unquote(num0, env, mode);
            if let Value::Val { numb: a } = &*num0 {
              return Rc::new(Value::Val { numb: oper.eval(*a, *b) });
            }
            return Rc::new(Value::Op1 { oper: *oper, num0, num1: *b });
          }
        }
        let num0 = self.unquote(num0, env, mode);
        Rc::new(Value::Op2 { oper: *oper, num0, num1 })
      },
      TermData::Ite { cond, ift, iff } => {
        let cond = self.unquote(cond, env, mode);
        if mode == Mode::Reduce && self.opts.iota {
          if let Value::Val { numb } = &*cond {
            let branch = if *numb != 0 { ift } else { iff };
            return self.unquote(branch, env, mode);
          }
        }
        Rc::new(Value::Ite {
          cond,
          ift: Thunk::suspend(ift.clone(), env.clone()),
          iff: Thunk::suspend(iff.clone(), env.clone()),
        })
      },
      TermData::Ann { typ, expr, done } => match mode {
        Mode::Reduce => self.unquote(expr, env, mode),
        Mode::Resolve => Rc::new(Value::Ann {
          typ: Thunk::suspend(typ.clone(), env.clone()),
          expr: self.unquote(expr, env, mode),
          done: done.get(),
        }),
      },
      TermData::Log { msge, expr } => match mode {
        Mode::Reduce => {
          if self.opts.logs {
            let value = self.unquote(msge, env, Mode::Reduce);
            let depth = env.len();
            let term = self.quote_at(&value, depth, false);
            self.sink.emit(LogRecord::Log { term });
          }
          self.unquote(expr, env, mode)
        },
        Mode::Resolve => Rc::new(Value::Log {
          msge: Thunk::suspend(msge.clone(), env.clone()),
          expr: self.unquote(expr, env, mode),
        }),
      },
      TermData::Hol { name } => {
        if mode == Mode::Reduce && self.opts.hole {
          if let Some(value) =
            self.holes.and_then(|h| h.value_at(name, env.len()))
          {
            return self.unquote(&value, env, mode);
          }
        }
        Rc::new(Value::Hol { name: name.clone() })
      },
      TermData::Ref { name, eras } => {
        if mode == Mode::Reduce && self.opts.delt {
          let defs = self.defs;
          if let Some(def) = defs.get(name) {
            self.stats.delt += 1;
            let body = if *eras {
              match self.erased_memo.get(&(name.clone(), true)) {
                Some(cached) => cached.clone(),
                None => {
                  let erased = erase(def);
                  self
                    .erased_memo
                    .insert((name.clone(), true), erased.clone());
                  erased
                },
              }
            } else {
              def.clone()
            };
            return self.unquote(&body, &Env::new(), mode);
          }
        }
        Rc::new(Value::Ref { name: name.clone(), eras: *eras })
      },
    }
  }

  // ==========================================================================
  // Quote
  // ==========================================================================

  fn quote_at(&mut self, value: &Value, depth: usize, weak: bool) -> Term {
    match value {
      Value::Var { levl } => {
        debug_assert!(*levl < depth);
        Term::var(depth.saturating_sub(levl + 1))
      },
      Value::Typ => Term::typ(),
      Value::All { name, bind, body, eras } => Term::all(
        name.clone(),
        self.quote_thunk(bind, depth, weak),
        self.quote_closure(body, depth, weak),
        *eras,
      ),
      Value::Lam { name, bind, body, eras } => Term::lam(
        name.clone(),
        bind.as_ref().map(|bind| self.quote_thunk(bind, depth, weak)),
        self.quote_closure(body, depth, weak),
        *eras,
      ),
      Value::App { func, argm, eras } => Term::app(
        self.quote_at(func, depth, weak),
        self.quote_thunk(argm, depth, weak),
        *eras,
      ),
      Value::Slf { name, typ } => {
        Term::slf(name.clone(), self.quote_closure(typ, depth, weak))
      },
      Value::New { typ, expr } => Term::snew(
        self.quote_thunk(typ, depth, weak),
        self.quote_thunk(expr, depth, weak),
      ),
      Value::Use { expr } => Term::suse(self.quote_at(expr, depth, weak)),
      Value::Num => Term::num(),
      Value::Val { numb } => Term::val(*numb),
      Value::Op1 { oper, num0, num1 } => {
        Term::op1(*oper, self.quote_at(num0, depth, weak), *num1)
      },
      Value::Op2 { oper, num0, num1 } => Term::op2(
        *oper,
        self.quote_at(num0, depth, weak),
        self.quote_at(num1, depth, weak),
      ),
      Value::Ite { cond, ift, iff } => Term::ite(
        self.quote_at(cond, depth, weak),
        self.quote_thunk(ift, depth, weak),
        self.quote_thunk(iff, depth, weak),
      ),
      Value::Ann { typ, expr, done } => Term::ann(
        self.quote_thunk(typ, depth, weak),
        self.quote_at(expr, depth, weak),
        *done,
      ),
      Value::Log { msge, expr } => Term::log(
        self.quote_thunk(msge, depth, weak),
        self.quote_at(expr, depth, weak),
      ),
      Value::Hol { name } => Term::hol(name.clone()),
      Value::Ref { name, eras } => Term::refer(name.clone(), *eras),
    }
  }

  fn quote_thunk(&mut self, thunk: &Thunk, depth: usize, weak: bool) -> Term {
    let mode = if weak { Mode::Resolve } else { Mode::Reduce };
    let value = thunk.force(self, mode);
    self.quote_at(&value, depth, weak)
  }

  fn quote_closure(
    &mut self,
    closure: &Closure,
    depth: usize,
    weak: bool,
  ) -> Term {
    let mode = if weak { Mode::Resolve } else { Mode::Reduce };
    let var = Thunk::forced(Rc::new(Value::Var { levl: depth }));
    let value = closure.apply(var, self, mode);
    self.quote_at(&value, depth + 1, weak)
  }
}

// ============================================================================
// Convenience entry points
// ============================================================================

/// Reduce a closed term under the given options, discarding diagnostics.
pub fn reduce(term: &Term, defs: &Defs, opts: Opts) -> Term {
  let mut sink = NullSink;
  Reducer::new(defs, opts, &mut sink).reduce(term)
}

/// Fully normalize a closed term.
pub fn normalize(term: &Term, defs: &Defs) -> Term {
  reduce(term, defs, Opts::normal())
}
