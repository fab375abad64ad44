//! The word-packed lazy graph machine.
//!
//! An erased definition compiles to a flat memory of 32-bit words. A
//! pointer packs a 4-bit tag and a 28-bit address; node cells hold
//! pointers, raw words (literals, operator codes), or binder bookkeeping.
//! Reduction is a lazy walk driven by a back-stack of frames: β writes
//! the argument through the binder's back-link, references are expanded
//! by copying the referenced definition into the live memory, and memory
//! is compacted by retracing from the root once it grows past eight times
//! the last collected size.
//!
//! The machine targets affine erased code: each binder back-links at most
//! one occurrence of its variable. Sharing goes through references, which
//! are copied on use. Non-affine programs belong on the interaction-net
//! runtime; `kernel::affine` tells the two apart.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use crate::kernel::erase::erase;
use crate::kernel::term::{Defs, Name, Oper, Term, TermData};
use crate::runtime::RtError;

// ============================================================================
// Pointers and memory
// ============================================================================

pub const VAR: u32 = 0x0;
pub const LAM: u32 = 0x1;
pub const APP: u32 = 0x2;
pub const REF: u32 = 0x3;
pub const NUM: u32 = 0x4;
pub const OP2: u32 = 0x5;
pub const ITE: u32 = 0x6;
/// Binder back-link: the address is the slot holding the variable.
pub const ARG: u32 = 0x7;
/// Binder depth marker, written when the walk goes under a lambda.
pub const DPT: u32 = 0x8;

pub const NIL: u32 = 0xFFFF_FFFF;

/// A 4-bit tag and a 28-bit address packed into one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Ptr(pub u32);

impl Ptr {
  pub const NIL: Ptr = Ptr(NIL);

  pub fn new(tag: u32, addr: u32) -> Ptr {
    Ptr((tag << 28) | (addr & 0x0FFF_FFFF))
  }

  pub fn tag(self) -> u32 {
    self.0 >> 28
  }

  pub fn addr(self) -> u32 {
    self.0 & 0x0FFF_FFFF
  }

  pub fn is_nil(self) -> bool {
    self.0 == NIL
  }
}

/// A runtime term: a memory and its entry pointer. Cell 0 is the root
/// slot, kept in sync with `ptr`.
#[derive(Debug, Clone)]
pub struct RtTerm {
  pub mem: Vec<u32>,
  pub ptr: Ptr,
}

/// Compiled definitions, indexed by definition id.
#[derive(Debug, Clone)]
pub struct RtBook {
  pub defs: Vec<RtTerm>,
  pub names: Vec<Name>,
  pub ids: FxHashMap<Name, u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStats {
  pub beta: u64,
  pub copy: u64,
  pub max_len: u64,
}

fn alloc(mem: &mut Vec<u32>, size: usize) -> u32 {
  let addr = mem.len() as u32;
  mem.resize(mem.len() + size, NIL);
  addr
}

/// Write `ptr` into `slot`, maintaining the binder back-link when the
/// pointer is a variable. A binder already walked under (DPT) keeps its
/// depth marker: no β can target it anymore.
fn link(mem: &mut [u32], slot: u32, ptr: Ptr) {
  mem[slot as usize] = ptr.0;
  if ptr.tag() == VAR {
    let cell = ptr.addr() as usize;
    if Ptr(mem[cell]).tag() != DPT {
      mem[cell] = Ptr::new(ARG, slot).0;
    }
  }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile every definition reachable from `main` into a book.
pub fn compile(defs: &Defs, main: &str) -> Result<RtBook, RtError> {
  let mut order: IndexSet<Name> = IndexSet::new();
  let mut queue = vec![main.to_string()];
  let mut bodies: FxHashMap<Name, Term> = FxHashMap::default();
  while let Some(name) = queue.pop() {
    if order.contains(&name) {
      continue;
    }
    let def = defs
      .get(&name)
      .ok_or_else(|| RtError::UndefinedReference(name.clone()))?;
    let body = erase(def);
    collect_refs(&body, &mut queue);
    bodies.insert(name.clone(), body);
    order.insert(name);
  }

  let mut ids = FxHashMap::default();
  let mut names = Vec::new();
  for (id, name) in order.iter().enumerate() {
    ids.insert(name.clone(), id as u32);
    names.push(name.clone());
  }

  let mut compiled = Vec::new();
  for name in &names {
    compiled.push(compile_term(&bodies[name], &ids)?);
  }
  Ok(RtBook { defs: compiled, names, ids })
}

fn collect_refs(term: &Term, out: &mut Vec<Name>) {
  match term.as_data() {
    TermData::Ref { name, .. } => out.push(name.clone()),
    TermData::Lam { body, .. } => collect_refs(body, out),
    TermData::App { func, argm, .. } => {
      collect_refs(func, out);
      collect_refs(argm, out);
    },
    TermData::Op1 { num0, .. } => collect_refs(num0, out),
    TermData::Op2 { num0, num1, .. } => {
      collect_refs(num0, out);
      collect_refs(num1, out);
    },
    TermData::Ite { cond, ift, iff } => {
      collect_refs(cond, out);
      collect_refs(ift, out);
      collect_refs(iff, out);
    },
    TermData::Log { expr, .. } => collect_refs(expr, out),
    _ => {},
  }
}

/// Flatten one erased body into a fresh memory.
fn compile_term(
  term: &Term,
  ids: &FxHashMap<Name, u32>,
) -> Result<RtTerm, RtError> {
  let mut mem = vec![NIL];
  let mut binders = Vec::new();
  let ptr = build(term, ids, &mut mem, &mut binders)?;
  link(&mut mem, 0, ptr);
  Ok(RtTerm { mem, ptr })
}

fn build(
  term: &Term,
  ids: &FxHashMap<Name, u32>,
  mem: &mut Vec<u32>,
  binders: &mut Vec<u32>,
) -> Result<Ptr, RtError> {
  match term.as_data() {
    TermData::Var { indx } => {
      let lam = binders
        .get(binders.len().wrapping_sub(indx + 1))
        .ok_or(RtError::Unsupported("open variable"))?;
      Ok(Ptr::new(VAR, *lam))
    },
    TermData::Lam { body, .. } => {
      let addr = alloc(mem, 2);
      binders.push(addr);
      let body = build(body, ids, mem, binders);
      binders.pop();
      link(mem, addr + 1, body?);
      Ok(Ptr::new(LAM, addr))
    },
    TermData::App { func, argm, .. } => {
      let addr = alloc(mem, 2);
      let func = build(func, ids, mem, binders)?;
      link(mem, addr, func);
      let argm = build(argm, ids, mem, binders)?;
      link(mem, addr + 1, argm);
      Ok(Ptr::new(APP, addr))
    },
    TermData::Ref { name, .. } => {
      let id = ids
        .get(name)
        .ok_or_else(|| RtError::UndefinedReference(name.clone()))?;
      Ok(Ptr::new(REF, *id))
    },
    TermData::Val { numb } => {
      let addr = alloc(mem, 1);
      mem[addr as usize] = *numb;
      Ok(Ptr::new(NUM, addr))
    },
    TermData::Op1 { oper, num0, num1 } => {
      // Partial applications flatten to a full operator node with a
      // literal right operand.
      let addr = alloc(mem, 3);
      mem[addr as usize] = oper.code() as u32;
      let num0 = build(num0, ids, mem, binders)?;
      link(mem, addr + 1, num0);
      let lit = alloc(mem, 1);
      mem[lit as usize] = *num1;
      link(mem, addr + 2, Ptr::new(NUM, lit));
      Ok(Ptr::new(OP2, addr))
    },
    TermData::Op2 { oper, num0, num1 } => {
      let addr = alloc(mem, 3);
      mem[addr as usize] = oper.code() as u32;
      let num0 = build(num0, ids, mem, binders)?;
      link(mem, addr + 1, num0);
      let num1 = build(num1, ids, mem, binders)?;
      link(mem, addr + 2, num1);
      Ok(Ptr::new(OP2, addr))
    },
    TermData::Ite { cond, ift, iff } => {
      let addr = alloc(mem, 3);
      let cond = build(cond, ids, mem, binders)?;
      link(mem, addr, cond);
      let ift = build(ift, ids, mem, binders)?;
      link(mem, addr + 1, ift);
      let iff = build(iff, ids, mem, binders)?;
      link(mem, addr + 2, iff);
      Ok(Ptr::new(ITE, addr))
    },
    TermData::Log { expr, .. } => build(expr, ids, mem, binders),
    TermData::Hol { .. } => Err(RtError::Unsupported("hole")),
    TermData::Typ
    | TermData::Num
    | TermData::All { .. }
    | TermData::Slf { .. } => Err(RtError::Unsupported("type-level term")),
    TermData::New { .. } | TermData::Use { .. } | TermData::Ann { .. } => {
      Err(RtError::Unsupported("unerased wrapper"))
    },
  }
}

// ============================================================================
// Reduction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
  Func,
  Argm,
  Body,
  OpRight,
  OpLeft,
  Cond,
  IfT,
  IfF,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
  slot: u32,
  depth: u32,
  side: Side,
}

/// Reduce a runtime term to normal form.
pub fn reduce(rt: &mut RtTerm, book: &RtBook) -> GraphStats {
  let mut stats = GraphStats::default();
  let mut last_size = rt.mem.len().max(1);
  let mut stack: Vec<Frame> = Vec::new();
  let mut slot: u32 = 0;
  let mut depth: u32 = 0;

  loop {
    stats.max_len = stats.max_len.max(rt.mem.len() as u64);
    let p = Ptr(rt.mem[slot as usize]);
    match p.tag() {
      APP => {
        let func = Ptr(rt.mem[p.addr() as usize]);
        if func.tag() == LAM {
          stats.beta += 1;
          let lam = func.addr() as usize;
          let back = Ptr(rt.mem[lam]);
          let argm = Ptr(rt.mem[p.addr() as usize + 1]);
          if !back.is_nil() {
            link(&mut rt.mem, back.addr(), argm);
          }
          let body = Ptr(rt.mem[lam + 1]);
          link(&mut rt.mem, slot, body);
        } else {
          stack.push(Frame { slot, depth, side: Side::Func });
          slot = p.addr();
        }
      },
      REF => {
        stats.copy += 1;
        let def = &book.defs[p.addr() as usize];
        let copied = copy_def(def, &mut rt.mem);
        link(&mut rt.mem, slot, copied);
        if rt.mem.len() > 8 * last_size {
          collect(rt, &mut stack, &mut slot);
          last_size = rt.mem.len().max(1);
        }
      },
      LAM => {
        // A lambda in function position belongs to its application.
        if let Some(top) = stack.last().copied() {
          if top.side == Side::Func {
            stack.pop();
            depth = top.depth;
            slot = top.slot;
            continue;
          }
        }
        // Otherwise the head is a lambda: mark its depth and normalize
        // the body under it.
        rt.mem[p.addr() as usize] = Ptr::new(DPT, depth).0;
        stack.push(Frame { slot, depth, side: Side::Body });
        slot = p.addr() + 1;
        depth += 1;
      },
      OP2 => {
        let lhs = Ptr(rt.mem[p.addr() as usize + 1]);
        let rhs = Ptr(rt.mem[p.addr() as usize + 2]);
        if lhs.tag() == NUM && rhs.tag() == NUM {
          let a = rt.mem[lhs.addr() as usize];
          let b = rt.mem[rhs.addr() as usize];
          let code = rt.mem[p.addr() as usize] as u16;
          // Codes come from the compiler, so they are always in range.
          let numb = match Oper::from_code(code) {
            Some(oper) => oper.eval(a, b),
            None => 0,
          };
          let out = alloc(&mut rt.mem, 1);
          rt.mem[out as usize] = numb;
          link(&mut rt.mem, slot, Ptr::new(NUM, out));
        } else {
          stack.push(Frame { slot, depth, side: Side::OpRight });
          slot = p.addr() + 2;
        }
      },
      ITE => {
        let cond = Ptr(rt.mem[p.addr() as usize]);
        if cond.tag() == NUM {
          let c = rt.mem[cond.addr() as usize];
          let branch = if c != 0 { 1 } else { 2 };
          let chosen = Ptr(rt.mem[p.addr() as usize + branch]);
          link(&mut rt.mem, slot, chosen);
        } else {
          stack.push(Frame { slot, depth, side: Side::Cond });
          slot = p.addr();
        }
      },
      // VAR, NUM: normal heads. Unwind until something remains to do.
      _ => loop {
        let Some(frame) = stack.pop() else {
          rt.ptr = Ptr(rt.mem[0]);
          return stats;
        };
        depth = frame.depth;
        let fp = Ptr(rt.mem[frame.slot as usize]);
        match (fp.tag(), frame.side) {
          (APP, Side::Func) => {
            // The function is stuck: normalize the argument on demand.
            stack.push(Frame {
              slot: frame.slot,
              depth,
              side: Side::Argm,
            });
            slot = fp.addr() + 1;
            break;
          },
          (OP2, Side::OpRight) => {
            let lhs = Ptr(rt.mem[fp.addr() as usize + 1]);
            let rhs = Ptr(rt.mem[fp.addr() as usize + 2]);
            if lhs.tag() == NUM && rhs.tag() == NUM {
              slot = frame.slot;
              break;
            }
            stack.push(Frame {
              slot: frame.slot,
              depth,
              side: Side::OpLeft,
            });
            slot = fp.addr() + 1;
            break;
          },
          (OP2, Side::OpLeft) => {
            let lhs = Ptr(rt.mem[fp.addr() as usize + 1]);
            let rhs = Ptr(rt.mem[fp.addr() as usize + 2]);
            if lhs.tag() == NUM && rhs.tag() == NUM {
              slot = frame.slot;
              break;
            }
          },
          (ITE, Side::Cond) => {
            let cond = Ptr(rt.mem[fp.addr() as usize]);
            if cond.tag() == NUM {
              slot = frame.slot;
              break;
            }
            // Stuck conditional: normalize both branches.
            stack.push(Frame { slot: frame.slot, depth, side: Side::IfT });
            slot = fp.addr() + 1;
            break;
          },
          (ITE, Side::IfT) => {
            stack.push(Frame { slot: frame.slot, depth, side: Side::IfF });
            slot = fp.addr() + 2;
            break;
          },
          _ => {},
        }
      },
    }
  }
}

/// Copy a pristine definition into the live memory, relocating as the
/// structure is walked.
fn copy_def(def: &RtTerm, mem: &mut Vec<u32>) -> Ptr {
  let mut lam_map = FxHashMap::default();
  copy_go(&def.mem, Ptr(def.mem[0]), mem, &mut lam_map)
}

fn copy_go(
  src: &[u32],
  p: Ptr,
  mem: &mut Vec<u32>,
  lam_map: &mut FxHashMap<u32, u32>,
) -> Ptr {
  match p.tag() {
    VAR => Ptr::new(VAR, lam_map[&p.addr()]),
    LAM => {
      let addr = alloc(mem, 2);
      lam_map.insert(p.addr(), addr);
      let body = copy_go(src, Ptr(src[p.addr() as usize + 1]), mem, lam_map);
      link(mem, addr + 1, body);
      Ptr::new(LAM, addr)
    },
    APP => {
      let addr = alloc(mem, 2);
      let func = copy_go(src, Ptr(src[p.addr() as usize]), mem, lam_map);
      link(mem, addr, func);
      let argm = copy_go(src, Ptr(src[p.addr() as usize + 1]), mem, lam_map);
      link(mem, addr + 1, argm);
      Ptr::new(APP, addr)
    },
    REF => p,
    NUM => {
      let addr = alloc(mem, 1);
      mem[addr as usize] = src[p.addr() as usize];
      Ptr::new(NUM, addr)
    },
    OP2 => {
      let addr = alloc(mem, 3);
      mem[addr as usize] = src[p.addr() as usize];
      let lhs = copy_go(src, Ptr(src[p.addr() as usize + 1]), mem, lam_map);
      link(mem, addr + 1, lhs);
      let rhs = copy_go(src, Ptr(src[p.addr() as usize + 2]), mem, lam_map);
      link(mem, addr + 2, rhs);
      Ptr::new(OP2, addr)
    },
    ITE => {
      let addr = alloc(mem, 3);
      let cond = copy_go(src, Ptr(src[p.addr() as usize]), mem, lam_map);
      link(mem, addr, cond);
      let ift = copy_go(src, Ptr(src[p.addr() as usize + 1]), mem, lam_map);
      link(mem, addr + 1, ift);
      let iff = copy_go(src, Ptr(src[p.addr() as usize + 2]), mem, lam_map);
      link(mem, addr + 2, iff);
      Ptr::new(ITE, addr)
    },
    _ => Ptr::NIL,
  }
}

// ============================================================================
// Collection
// ============================================================================

/// Compacting collection: retrace the live graph from the root into a
/// fresh memory and rewrite the walk's frames to the new addresses.
fn collect(rt: &mut RtTerm, stack: &mut [Frame], slot: &mut u32) {
  let mut mem = vec![NIL];
  let mut lam_map = FxHashMap::default();
  let mut slot_map = FxHashMap::default();
  slot_map.insert(0u32, 0u32);
  let root = gc_copy(
    &rt.mem,
    Ptr(rt.mem[0]),
    &mut mem,
    &mut lam_map,
    &mut slot_map,
  );
  link(&mut mem, 0, root);
  for frame in stack.iter_mut() {
    if let Some(new_slot) = slot_map.get(&frame.slot) {
      frame.slot = *new_slot;
    }
  }
  if let Some(new_slot) = slot_map.get(slot) {
    *slot = *new_slot;
  }
  rt.mem = mem;
  rt.ptr = Ptr(rt.mem[0]);
}

fn gc_copy(
  old: &[u32],
  p: Ptr,
  mem: &mut Vec<u32>,
  lam_map: &mut FxHashMap<u32, u32>,
  slot_map: &mut FxHashMap<u32, u32>,
) -> Ptr {
  match p.tag() {
    VAR => Ptr::new(VAR, lam_map[&p.addr()]),
    LAM => {
      let addr = alloc(mem, 2);
      lam_map.insert(p.addr(), addr);
      slot_map.insert(p.addr(), addr);
      slot_map.insert(p.addr() + 1, addr + 1);
      // Depth markers survive collection; back-links are rebuilt when
      // the occurrence is copied.
      let cell = Ptr(old[p.addr() as usize]);
      if cell.tag() == DPT {
        mem[addr as usize] = cell.0;
      }
      let body =
        gc_copy(old, Ptr(old[p.addr() as usize + 1]), mem, lam_map, slot_map);
      link(mem, addr + 1, body);
      Ptr::new(LAM, addr)
    },
    APP => {
      let addr = alloc(mem, 2);
      slot_map.insert(p.addr(), addr);
      slot_map.insert(p.addr() + 1, addr + 1);
      let func =
        gc_copy(old, Ptr(old[p.addr() as usize]), mem, lam_map, slot_map);
      link(mem, addr, func);
      let argm =
        gc_copy(old, Ptr(old[p.addr() as usize + 1]), mem, lam_map, slot_map);
      link(mem, addr + 1, argm);
      Ptr::new(APP, addr)
    },
    REF => p,
    NUM => {
      let addr = alloc(mem, 1);
      slot_map.insert(p.addr(), addr);
      mem[addr as usize] = old[p.addr() as usize];
      Ptr::new(NUM, addr)
    },
    OP2 => {
      let addr = alloc(mem, 3);
      slot_map.insert(p.addr(), addr);
      slot_map.insert(p.addr() + 1, addr + 1);
      slot_map.insert(p.addr() + 2, addr + 2);
      mem[addr as usize] = old[p.addr() as usize];
      let lhs =
        gc_copy(old, Ptr(old[p.addr() as usize + 1]), mem, lam_map, slot_map);
      link(mem, addr + 1, lhs);
      let rhs =
        gc_copy(old, Ptr(old[p.addr() as usize + 2]), mem, lam_map, slot_map);
      link(mem, addr + 2, rhs);
      Ptr::new(OP2, addr)
    },
    ITE => {
      let addr = alloc(mem, 3);
      slot_map.insert(p.addr(), addr);
      slot_map.insert(p.addr() + 1, addr + 1);
      slot_map.insert(p.addr() + 2, addr + 2);
      let cond =
        gc_copy(old, Ptr(old[p.addr() as usize]), mem, lam_map, slot_map);
      link(mem, addr, cond);
      let ift =
        gc_copy(old, Ptr(old[p.addr() as usize + 1]), mem, lam_map, slot_map);
      link(mem, addr + 1, ift);
      let iff =
        gc_copy(old, Ptr(old[p.addr() as usize + 2]), mem, lam_map, slot_map);
      link(mem, addr + 2, iff);
      Ptr::new(ITE, addr)
    },
    _ => Ptr::NIL,
  }
}

// ============================================================================
// Decompilation
// ============================================================================

/// Read a runtime term back as an erased term with fresh variable names.
pub fn decompile(rt: &RtTerm, book: &RtBook) -> Result<Term, RtError> {
  let mut lams = FxHashMap::default();
  decompile_go(&rt.mem, Ptr(rt.mem[0]), 0, &mut lams, book)
}

fn decompile_go(
  mem: &[u32],
  p: Ptr,
  depth: usize,
  lams: &mut FxHashMap<u32, usize>,
  book: &RtBook,
) -> Result<Term, RtError> {
  match p.tag() {
    VAR => {
      let bound = lams
        .get(&p.addr())
        .ok_or(RtError::Unsupported("unbound runtime variable"))?;
      Ok(Term::var(depth - 1 - bound))
    },
    LAM => {
      lams.insert(p.addr(), depth);
      let body = decompile_go(
        mem,
        Ptr(mem[p.addr() as usize + 1]),
        depth + 1,
        lams,
        book,
      )?;
      Ok(Term::lam(format!("x{}", depth), None, body, false))
    },
    APP => {
      let func =
        decompile_go(mem, Ptr(mem[p.addr() as usize]), depth, lams, book)?;
      let argm = decompile_go(
        mem,
        Ptr(mem[p.addr() as usize + 1]),
        depth,
        lams,
        book,
      )?;
      Ok(Term::app(func, argm, false))
    },
    REF => {
      let name = book
        .names
        .get(p.addr() as usize)
        .ok_or(RtError::Unsupported("unknown definition id"))?;
      Ok(Term::refer(name.clone(), true))
    },
    NUM => Ok(Term::val(mem[p.addr() as usize])),
    OP2 => {
      let code = mem[p.addr() as usize] as u16;
      let oper =
        Oper::from_code(code).ok_or(RtError::UnknownOperator(code))?;
      let lhs = Ptr(mem[p.addr() as usize + 1]);
      let rhs = Ptr(mem[p.addr() as usize + 2]);
      let num0 = decompile_go(mem, lhs, depth, lams, book)?;
      let num1 = decompile_go(mem, rhs, depth, lams, book)?;
      // A stuck operator with a literal right operand is the partial
      // application form at the term level.
      if rhs.tag() == NUM && lhs.tag() != NUM {
        if let TermData::Val { numb } = num1.as_data() {
          return Ok(Term::op1(oper, num0, *numb));
        }
      }
      Ok(Term::op2(oper, num0, num1))
    },
    ITE => {
      let cond =
        decompile_go(mem, Ptr(mem[p.addr() as usize]), depth, lams, book)?;
      let ift = decompile_go(
        mem,
        Ptr(mem[p.addr() as usize + 1]),
        depth,
        lams,
        book,
      )?;
      let iff = decompile_go(
        mem,
        Ptr(mem[p.addr() as usize + 2]),
        depth,
        lams,
        book,
      )?;
      Ok(Term::ite(cond, ift, iff))
    },
    _ => Err(RtError::Unsupported("dangling runtime pointer")),
  }
}

/// Compile, reduce, and read back a definition.
pub fn run(defs: &Defs, main: &str) -> Result<(Term, GraphStats), RtError> {
  let book = compile(defs, main)?;
  let id = book.ids[main] as usize;
  let mut rt = book.defs[id].clone();
  let stats = reduce(&mut rt, &book);
  let term = decompile(&rt, &book)?;
  Ok((term, stats))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::reduce::normalize;

  fn lam(name: &str, body: Term) -> Term {
    Term::lam(name.into(), None, body, false)
  }

  fn app(func: Term, argm: Term) -> Term {
    Term::app(func, argm, false)
  }

  fn defs_with_main(term: Term) -> Defs {
    let mut defs = Defs::default();
    defs.insert("main".into(), term);
    defs
  }

  #[test]
  fn pointers_pack_and_unpack() {
    let p = Ptr::new(OP2, 0x0ABCDEF);
    assert_eq!(p.tag(), OP2);
    assert_eq!(p.addr(), 0x0ABCDEF);
    assert!(Ptr::NIL.is_nil());
  }

  #[test]
  fn compile_decompile_round_trips_erasure() {
    let term = lam("x", app(Term::var(0), Term::val(7)));
    let defs = defs_with_main(term.clone());
    let book = compile(&defs, "main").unwrap();
    let rt = book.defs[0].clone();
    assert_eq!(decompile(&rt, &book).unwrap(), term);
  }

  #[test]
  fn identity_application_reduces() {
    let id = lam("x", Term::var(0));
    let defs = defs_with_main(app(id, Term::val(42)));
    let (nf, stats) = run(&defs, "main").unwrap();
    assert_eq!(nf, Term::val(42));
    assert_eq!(stats.beta, 1);
  }

  #[test]
  fn unused_binder_carries_nil() {
    let konst = lam("x", Term::val(1));
    let defs = defs_with_main(app(konst, Term::val(2)));
    let (nf, _) = run(&defs, "main").unwrap();
    assert_eq!(nf, Term::val(1));
  }

  #[test]
  fn reference_copies_count() {
    let mut defs = Defs::default();
    defs.insert("one".into(), Term::val(1));
    defs.insert(
      "main".into(),
      Term::op2(
        Oper::Add,
        Term::refer("one", false),
        Term::refer("one", false),
      ),
    );
    let (nf, stats) = run(&defs, "main").unwrap();
    assert_eq!(nf, Term::val(2));
    assert_eq!(stats.copy, 2);
  }

  #[test]
  fn stuck_terms_normalize_under_binders() {
    // (x) => |x .+. 1| stays stuck but normalizes in place.
    let t = lam("x", Term::op2(Oper::Add, Term::var(0), Term::val(1)));
    let defs = defs_with_main(t);
    let (nf, _) = run(&defs, "main").unwrap();
    assert_eq!(nf, Term::lam("x0".into(), None, Term::op1(Oper::Add, Term::var(0), 1), false));
  }

  #[test]
  fn conditionals_select_branches() {
    let t = Term::ite(Term::val(1), Term::val(10), Term::val(20));
    let (nf, _) = run(&defs_with_main(t), "main").unwrap();
    assert_eq!(nf, Term::val(10));
  }

  #[test]
  fn collection_compacts_and_resumes() {
    // Doubling through references: main is a single reference, so the
    // first expansions blow past the 8x threshold and force compaction
    // mid-walk.
    let mut defs = Defs::default();
    defs.insert("a0".into(), Term::val(1));
    for i in 1..=6 {
      defs.insert(
        format!("a{}", i),
        Term::op2(
          Oper::Add,
          Term::refer(format!("a{}", i - 1), false),
          Term::refer(format!("a{}", i - 1), false),
        ),
      );
    }
    defs.insert("main".into(), Term::refer("a6", false));
    let (nf, stats) = run(&defs, "main").unwrap();
    assert_eq!(nf, Term::val(64));
    assert_eq!(stats.copy, 127);
  }

  #[test]
  fn agrees_with_term_normalizer_on_affine_programs() {
    let mut defs = Defs::default();
    defs.insert(
      "compose".into(),
      lam("f", lam("g", lam("x", app(Term::var(2), app(Term::var(1), Term::var(0)))))),
    );
    defs.insert("inc".into(), lam("n", Term::op2(Oper::Add, Term::var(0), Term::val(1))));
    defs.insert(
      "main".into(),
      app(
        app(
          app(
            Term::refer("compose", false),
            Term::refer("inc", false),
          ),
          Term::refer("inc", false),
        ),
        Term::val(5),
      ),
    );
    let (nf, _) = run(&defs, "main").unwrap();
    let reference =
      normalize(&crate::kernel::erase::erase(defs.get("main").unwrap()), &defs);
    assert_eq!(nf, reference);
    assert_eq!(nf, Term::val(7));
  }
}
