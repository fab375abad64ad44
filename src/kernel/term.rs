//! Terms of the Ulam kernel.
//!
//! A [`Term`] is an immutable, reference-counted tree tagged with an
//! alpha-stable structural hash computed at construction and cached in the
//! node. Binder names are carried for display only and never enter the
//! hash, so alpha-equivalent terms hash identically; [`PartialEq`] compares
//! the cached hashes. The only mutable bit of a term is the `done` flag on
//! type ascriptions, which memoizes successful type checks.

use std::cell::Cell;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHasher};

/// A fully-qualified definition name.
pub type Name = String;

/// Flat map from qualified names to definitions.
///
/// Insertion order is preserved; it drives diagnostic order and the
/// definition ids of the runtimes.
pub type Defs = IndexMap<Name, Term>;

/// Cache of inferred types of checked references.
pub type Types = FxHashMap<Name, Term>;

// ============================================================================
// Source locations
// ============================================================================

/// A span within a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loc {
  pub file: Name,
  pub row: usize,
  pub col: usize,
  pub idx: usize,
  pub len: usize,
}

// ============================================================================
// Numeric operators
// ============================================================================

/// Primitive operators on unsigned 32-bit machine words.
///
/// The discriminants are the operator codes shared by the equality engine
/// and both runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Oper {
  Add = 0,
  Sub = 1,
  Mul = 2,
  Div = 3,
  Mod = 4,
  Pow = 5,
  And = 6,
  Bor = 7,
  Xor = 8,
  Not = 9,
  Shr = 10,
  Shl = 11,
  Gth = 12,
  Lth = 13,
  Eql = 14,
}

impl Oper {
  pub const ALL: [Oper; 15] = [
    Oper::Add,
    Oper::Sub,
    Oper::Mul,
    Oper::Div,
    Oper::Mod,
    Oper::Pow,
    Oper::And,
    Oper::Bor,
    Oper::Xor,
    Oper::Not,
    Oper::Shr,
    Oper::Shl,
    Oper::Gth,
    Oper::Lth,
    Oper::Eql,
  ];

  pub fn code(self) -> u16 {
    self as u16
  }

  pub fn from_code(code: u16) -> Option<Oper> {
    Oper::ALL.get(code as usize).copied()
  }

  /// Apply the operator in machine-word semantics.
  ///
  /// Division and modulo treat the operands as doubles and truncate the
  /// result back to a word; a zero divisor yields 0. Shift counts are
  /// masked to five bits. Comparisons return 1 or 0. `Not` complements the
  /// right operand only.
  pub fn eval(self, a: u32, b: u32) -> u32 {
    match self {
      Oper::Add => a.wrapping_add(b),
      Oper::Sub => a.wrapping_sub(b),
      Oper::Mul => a.wrapping_mul(b),
      Oper::Div => {
        if b == 0 {
          0
        } else {
          (a as f64 / b as f64) as u32
        }
      },
      Oper::Mod => {
        if b == 0 {
          0
        } else {
          a % b
        }
      },
      Oper::Pow => a.wrapping_pow(b),
      Oper::And => a & b,
      Oper::Bor => a | b,
      Oper::Xor => a ^ b,
      Oper::Not => !b,
      Oper::Shr => a.wrapping_shr(b),
      Oper::Shl => a.wrapping_shl(b),
      Oper::Gth => (a > b) as u32,
      Oper::Lth => (a < b) as u32,
      Oper::Eql => (a == b) as u32,
    }
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Oper::Add => ".+.",
      Oper::Sub => ".-.",
      Oper::Mul => ".*.",
      Oper::Div => "./.",
      Oper::Mod => ".%.",
      Oper::Pow => ".**.",
      Oper::And => ".&.",
      Oper::Bor => ".|.",
      Oper::Xor => ".^.",
      Oper::Not => ".~.",
      Oper::Shr => ".>>>.",
      Oper::Shl => ".<<.",
      Oper::Gth => ".>.",
      Oper::Lth => ".<.",
      Oper::Eql => ".==.",
    }
  }
}

impl Display for Oper {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

// ============================================================================
// Terms
// ============================================================================

/// The hole name erasure substitutes for erased bound variables.
pub const ERASED: &str = "<erased>";

#[derive(Debug, Clone)]
pub enum TermData {
  /// Bound variable (de Bruijn index).
  Var { indx: usize },
  /// The type of types.
  Typ,
  /// Dependent function type.
  All { name: Name, bind: Term, body: Term, eras: bool },
  /// Lambda abstraction; the bind annotation is optional.
  Lam { name: Name, bind: Option<Term>, body: Term, eras: bool },
  /// Application.
  App { func: Term, argm: Term, eras: bool },
  /// Self type; the body may mention the inhabitant through the binder.
  Slf { name: Name, typ: Term },
  /// Self-type introduction.
  New { typ: Term, expr: Term },
  /// Self-type elimination.
  Use { expr: Term },
  /// The type of machine words.
  Num,
  /// Word literal.
  Val { numb: u32 },
  /// Partially-applied binary operator; the right operand is a literal.
  Op1 { oper: Oper, num0: Term, num1: u32 },
  /// Binary operator on two terms.
  Op2 { oper: Oper, num0: Term, num1: Term },
  /// Numeric conditional; non-zero selects the first branch.
  Ite { cond: Term, ift: Term, iff: Term },
  /// Type ascription; `done` memoizes a successful check.
  Ann { typ: Term, expr: Term, done: Cell<bool> },
  /// Reduction-time log annotation.
  Log { msge: Term, expr: Term },
  /// Named metavariable.
  Hol { name: Name },
  /// Reference to a top-level definition.
  Ref { name: Name, eras: bool },
}

#[derive(Debug)]
pub struct TermNode {
  data: TermData,
  loc: Option<Loc>,
  hash: u64,
}

/// A kernel term. Cloning is cheap (reference count bump).
#[derive(Debug, Clone)]
pub struct Term(Rc<TermNode>);

fn hash_of(parts: impl Hash) -> u64 {
  let hasher = &mut FxHasher::default();
  parts.hash(hasher);
  hasher.finish()
}

impl Term {
  pub fn as_data(&self) -> &TermData {
    &self.0.data
  }

  pub fn loc(&self) -> Option<&Loc> {
    self.0.loc.as_ref()
  }

  pub fn get_hash(&self) -> u64 {
    self.0.hash
  }

  fn make(data: TermData, hash: u64) -> Term {
    Term(Rc::new(TermNode { data, loc: None, hash }))
  }

  /// Attach a source location, keeping data and hash.
  pub fn with_loc(self, loc: Loc) -> Term {
    Term(Rc::new(TermNode {
      data: self.0.data.clone(),
      loc: Some(loc),
      hash: self.0.hash,
    }))
  }

  /// Carry over the location of `from`, if any.
  pub fn at(self, from: Option<&Loc>) -> Term {
    match from {
      Some(loc) if self.0.loc.is_none() => self.with_loc(loc.clone()),
      _ => self,
    }
  }

  pub fn var(indx: usize) -> Term {
    Term::make(TermData::Var { indx }, hash_of((0u8, indx)))
  }

  pub fn typ() -> Term {
    Term::make(TermData::Typ, hash_of(1u8))
  }

  pub fn all(name: Name, bind: Term, body: Term, eras: bool) -> Term {
    let hash = hash_of((2u8, bind.get_hash(), body.get_hash(), eras));
    Term::make(TermData::All { name, bind, body, eras }, hash)
  }

  pub fn lam(name: Name, bind: Option<Term>, body: Term, eras: bool) -> Term {
    let bind_hash = bind.as_ref().map(Term::get_hash);
    let hash = hash_of((3u8, bind_hash, body.get_hash(), eras));
    Term::make(TermData::Lam { name, bind, body, eras }, hash)
  }

  pub fn app(func: Term, argm: Term, eras: bool) -> Term {
    let hash = hash_of((4u8, func.get_hash(), argm.get_hash(), eras));
    Term::make(TermData::App { func, argm, eras }, hash)
  }

  pub fn slf(name: Name, typ: Term) -> Term {
    let hash = hash_of((5u8, typ.get_hash()));
    Term::make(TermData::Slf { name, typ }, hash)
  }

  /// Self-type introduction: `new(typ) expr`.
  pub fn snew(typ: Term, expr: Term) -> Term {
    let hash = hash_of((6u8, typ.get_hash(), expr.get_hash()));
    Term::make(TermData::New { typ, expr }, hash)
  }

  /// Self-type elimination: `use(expr)`.
  pub fn suse(expr: Term) -> Term {
    let hash = hash_of((7u8, expr.get_hash()));
    Term::make(TermData::Use { expr }, hash)
  }

  pub fn num() -> Term {
    Term::make(TermData::Num, hash_of(8u8))
  }

  pub fn val(numb: u32) -> Term {
    Term::make(TermData::Val { numb }, hash_of((9u8, numb)))
  }

  pub fn op1(oper: Oper, num0: Term, num1: u32) -> Term {
    let hash = hash_of((10u8, oper.code(), num0.get_hash(), num1));
    Term::make(TermData::Op1 { oper, num0, num1 }, hash)
  }

  pub fn op2(oper: Oper, num0: Term, num1: Term) -> Term {
    let hash =
      hash_of((11u8, oper.code(), num0.get_hash(), num1.get_hash()));
    Term::make(TermData::Op2 { oper, num0, num1 }, hash)
  }

  pub fn ite(cond: Term, ift: Term, iff: Term) -> Term {
    let hash =
      hash_of((12u8, cond.get_hash(), ift.get_hash(), iff.get_hash()));
    Term::make(TermData::Ite { cond, ift, iff }, hash)
  }

  /// The `done` flag is excluded from the hash: memoization state must not
  /// change term identity.
  pub fn ann(typ: Term, expr: Term, done: bool) -> Term {
    let hash = hash_of((13u8, typ.get_hash(), expr.get_hash()));
    Term::make(
      TermData::Ann { typ, expr, done: Cell::new(done) },
      hash,
    )
  }

  pub fn log(msge: Term, expr: Term) -> Term {
    let hash = hash_of((14u8, msge.get_hash(), expr.get_hash()));
    Term::make(TermData::Log { msge, expr }, hash)
  }

  pub fn hol(name: impl Into<Name>) -> Term {
    let name = name.into();
    let hash = hash_of((15u8, &name));
    Term::make(TermData::Hol { name }, hash)
  }

  pub fn refer(name: impl Into<Name>, eras: bool) -> Term {
    let name = name.into();
    let hash = hash_of((16u8, &name, eras));
    Term::make(TermData::Ref { name, eras }, hash)
  }

  /// The sentinel a binder erased away leaves behind.
  pub fn erased_hole() -> Term {
    Term::hol(ERASED)
  }
}

impl PartialEq for Term {
  /// Alpha-equivalence through the structural hash.
  fn eq(&self, other: &Self) -> bool {
    self.get_hash() == other.get_hash()
  }
}

impl Eq for Term {}

impl Hash for Term {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.get_hash().hash(state);
  }
}

// ============================================================================
// Display
// ============================================================================

impl Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_data() {
      TermData::Var { indx } => write!(f, "#{}", indx),
      TermData::Typ => write!(f, "Type"),
      TermData::All { name, bind, body, eras } => {
        let semi = if *eras { ";" } else { "" };
        write!(f, "({} : {}{}) -> {}", name, bind, semi, body)
      },
      TermData::Lam { name, bind, body, eras } => {
        let semi = if *eras { ";" } else { "" };
        match bind {
          Some(bind) => write!(f, "({} : {}{}) => {}", name, bind, semi, body),
          None => write!(f, "({}{}) => {}", name, semi, body),
        }
      },
      TermData::App { func, argm, eras } => {
        let semi = if *eras { ";" } else { "" };
        write!(f, "{}({}{})", func, argm, semi)
      },
      TermData::Slf { name, typ } => write!(f, "${{{}}} {}", name, typ),
      TermData::New { typ, expr } => write!(f, "new({}) {}", typ, expr),
      TermData::Use { expr } => write!(f, "use({})", expr),
      TermData::Num => write!(f, "Number"),
      TermData::Val { numb } => write!(f, "{}", numb),
      TermData::Op1 { oper, num0, num1 } => {
        write!(f, "|{} {} {}|", num0, oper, num1)
      },
      TermData::Op2 { oper, num0, num1 } => {
        write!(f, "|{} {} {}|", num0, oper, num1)
      },
      TermData::Ite { cond, ift, iff } => {
        write!(f, "if {} then: {} else: {}", cond, ift, iff)
      },
      TermData::Ann { typ, expr, .. } => write!(f, "{} :: {}", expr, typ),
      TermData::Log { msge, expr } => write!(f, "log({}) {}", msge, expr),
      TermData::Hol { name } => write!(f, "?{}", name),
      TermData::Ref { name, .. } => write!(f, "{}", name),
    }
  }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use super::*;

  fn tvar(i: usize) -> Term {
    Term::var(i)
  }

  #[test]
  fn alpha_equivalent_terms_hash_identically() {
    let id_x =
      Term::lam("x".into(), Some(Term::typ()), tvar(0), false);
    let id_y =
      Term::lam("y".into(), Some(Term::typ()), tvar(0), false);
    assert_eq!(id_x.get_hash(), id_y.get_hash());
    assert_eq!(id_x, id_y);
  }

  #[test]
  fn distinct_structure_hashes_differently() {
    let id = Term::lam("x".into(), None, tvar(0), false);
    let konst = Term::lam("x".into(), None, Term::typ(), false);
    assert_ne!(id, konst);
    assert_ne!(
      Term::app(id.clone(), Term::typ(), false),
      Term::app(id, Term::typ(), true)
    );
  }

  #[test]
  fn done_flag_does_not_change_identity() {
    let a = Term::ann(Term::num(), Term::val(1), false);
    let b = Term::ann(Term::num(), Term::val(1), true);
    assert_eq!(a, b);
  }

  #[test]
  fn location_does_not_change_identity() {
    let plain = Term::val(7);
    let placed = Term::val(7).with_loc(Loc {
      file: "demo.ul".into(),
      row: 1,
      col: 2,
      idx: 2,
      len: 1,
    });
    assert_eq!(plain, placed);
    assert!(placed.loc().is_some());
  }

  #[test]
  fn oper_codes_round_trip() {
    for op in Oper::ALL {
      assert_eq!(Oper::from_code(op.code()), Some(op));
    }
    assert_eq!(Oper::from_code(15), None);
  }

  #[test]
  fn oper_eval_machine_word_semantics() {
    assert_eq!(Oper::Add.eval(u32::MAX, 1), 0);
    assert_eq!(Oper::Sub.eval(0, 1), u32::MAX);
    assert_eq!(Oper::Mul.eval(1 << 31, 2), 0);
    assert_eq!(Oper::Div.eval(7, 2), 3);
    assert_eq!(Oper::Div.eval(7, 0), 0);
    assert_eq!(Oper::Mod.eval(7, 3), 1);
    assert_eq!(Oper::Mod.eval(7, 0), 0);
    assert_eq!(Oper::Pow.eval(2, 10), 1024);
    assert_eq!(Oper::Not.eval(0, 0), u32::MAX);
    assert_eq!(Oper::Shr.eval(8, 2), 2);
    assert_eq!(Oper::Shl.eval(1, 3), 8);
    assert_eq!(Oper::Gth.eval(3, 2), 1);
    assert_eq!(Oper::Lth.eval(3, 2), 0);
    assert_eq!(Oper::Eql.eval(5, 5), 1);
  }
}
