//! The symmetric interaction-net machine.
//!
//! Nodes are four 32-bit words: three ports and a metadata word packing a
//! 3-bit node type, a 16-bit kind, and a per-port numeric bitmask. A port
//! holds either a packed (node, slot) pointer or an inline numeric word
//! when its mask bit is set. Two principal ports wired together form an
//! active pair; a numeric word sitting on a principal port is likewise
//! active.
//!
//! Rewrites read their targets lazily, immediately before each relink, so
//! wires internal to the dying pair thread through correctly. The strict
//! scheduler drains the redex list to a fixpoint; the lazy scheduler
//! walks principal ports from the root with warp and exit stacks and only
//! fires redexes on the path, matching the graph machine's call-by-need
//! order.

use rustc_hash::FxHashMap;

use crate::kernel::erase::erase;
use crate::kernel::term::{Defs, Name, Oper, Term, TermData};
use crate::runtime::RtError;

// ============================================================================
// Node and port encoding
// ============================================================================

pub const NOD: u32 = 0;
pub const OP1: u32 = 1;
pub const OP2: u32 = 2;
pub const ITE: u32 = 3;

/// Kind of the paired NOD holding a conditional's branches.
pub const PAIR: u32 = 0xFFFF;

/// Kind bit marking an OP1 whose stored literal is the first operand
/// (set when an OP2 demotes after receiving its first operand).
const SWAP: u32 = 0x100;

/// Sentinel for an unlinked port.
const FREE: u32 = u32::MAX;

fn port(node: u32, slot: u32) -> u32 {
  node * 4 + slot
}

fn node_of(p: u32) -> u32 {
  p / 4
}

fn slot_of(p: u32) -> u32 {
  p % 4
}

/// What a port points at: another port, or an inline number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
  Wire(u32),
  Num(u32),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetStats {
  pub rewrites: u64,
  pub loops: u64,
  pub max_len: u64,
}

/// An interaction net: a node arena, a free-list, and the active pairs.
#[derive(Debug, Clone)]
pub struct INet {
  nodes: Vec<u32>,
  reuse: Vec<u32>,
  redexes: Vec<(u32, u32)>,
  pub stats: NetStats,
}

impl INet {
  /// A net with only the root node; its principal port is the interface.
  pub fn new() -> INet {
    let mut net = INet {
      nodes: vec![FREE; 4],
      reuse: Vec::new(),
      redexes: Vec::new(),
      stats: NetStats::default(),
    };
    net.nodes[3] = NOD;
    // Tie off the unused root auxiliaries.
    net.link(port(0, 1), port(0, 2));
    net
  }

  fn new_node(&mut self, ntype: u32, kind: u32) -> u32 {
    let node = match self.reuse.pop() {
      Some(node) => node,
      None => {
        let node = (self.nodes.len() / 4) as u32;
        self.nodes.resize(self.nodes.len() + 4, FREE);
        node
      },
    };
    let base = node as usize * 4;
    self.nodes[base] = FREE;
    self.nodes[base + 1] = FREE;
    self.nodes[base + 2] = FREE;
    self.nodes[base + 3] = ntype | (kind << 3);
    let live = (self.nodes.len() / 4 - self.reuse.len()) as u64;
    self.stats.max_len = self.stats.max_len.max(live);
    node
  }

  fn free(&mut self, node: u32) {
    let base = node as usize * 4;
    self.nodes[base] = FREE;
    self.nodes[base + 1] = FREE;
    self.nodes[base + 2] = FREE;
    self.nodes[base + 3] = 0;
    self.reuse.push(node);
  }

  pub fn ntype(&self, node: u32) -> u32 {
    self.nodes[node as usize * 4 + 3] & 0b111
  }

  pub fn kind(&self, node: u32) -> u32 {
    (self.nodes[node as usize * 4 + 3] >> 3) & 0xFFFF
  }

  fn get(&self, p: u32) -> u32 {
    self.nodes[p as usize]
  }

  fn set(&mut self, p: u32, value: u32) {
    self.nodes[p as usize] = value;
  }

  /// Whether the port holds an inline number.
  pub fn is_num(&self, p: u32) -> bool {
    let meta = self.nodes[node_of(p) as usize * 4 + 3];
    meta & (1 << (19 + slot_of(p))) != 0
  }

  fn set_num_flag(&mut self, p: u32, on: bool) {
    let meta = &mut self.nodes[node_of(p) as usize * 4 + 3];
    let bit = 1 << (19 + slot_of(p));
    if on {
      *meta |= bit;
    } else {
      *meta &= !bit;
    }
  }

  /// Wire two ports together. Connecting two principal ports records an
  /// active pair; a port wired to itself is an eraser.
  fn link(&mut self, a: u32, b: u32) {
    if a == b {
      self.erase_port(a);
      return;
    }
    self.set(a, b);
    self.set_num_flag(a, false);
    self.set(b, a);
    self.set_num_flag(b, false);
    if slot_of(a) == 0
      && slot_of(b) == 0
      && node_of(a) != 0
      && node_of(b) != 0
    {
      self.redexes.push((node_of(a), node_of(b)));
    }
  }

  /// Put an inline number on a port. A number on a principal port is an
  /// active redex.
  fn set_num(&mut self, p: u32, value: u32) {
    self.set(p, value);
    self.set_num_flag(p, true);
    if slot_of(p) == 0 && node_of(p) != 0 {
      self.redexes.push((node_of(p), node_of(p)));
    }
  }

  /// Turn a port into an eraser (a port wired to itself).
  fn erase_port(&mut self, p: u32) {
    self.set(p, p);
    self.set_num_flag(p, false);
    if slot_of(p) == 0 && node_of(p) != 0 {
      self.redexes.push((node_of(p), node_of(p)));
    }
  }

  fn take_target(&self, p: u32) -> Target {
    if self.is_num(p) {
      Target::Num(self.get(p))
    } else {
      Target::Wire(self.get(p))
    }
  }

  fn join(&mut self, a: Target, b: Target) {
    match (a, b) {
      (Target::Wire(x), Target::Wire(y)) => self.link(x, y),
      (Target::Wire(x), Target::Num(v))
      | (Target::Num(v), Target::Wire(x)) => self.set_num(x, v),
      (Target::Num(_), Target::Num(_)) => {},
    }
  }

  // ==========================================================================
  // Rewrites
  // ==========================================================================

  /// Fire one redex. `(n, n)` redexes are numeric or eraser interactions
  /// on `n`'s principal port. Stale entries are skipped.
  fn rewrite(&mut self, x: u32, y: u32) {
    if x == y {
      let p0 = port(x, 0);
      if self.is_num(p0) {
        self.stats.rewrites += 1;
        self.numeric(x);
      } else if self.get(p0) == p0 {
        self.stats.rewrites += 1;
        self.erase(x);
      }
      return;
    }
    if self.is_num(port(x, 0))
      || self.is_num(port(y, 0))
      || self.get(port(x, 0)) != port(y, 0)
      || self.get(port(y, 0)) != port(x, 0)
    {
      return;
    }
    self.stats.rewrites += 1;
    match (self.ntype(x), self.ntype(y)) {
      (NOD, NOD) if self.kind(x) == self.kind(y) => self.annihilate(x, y),
      (NOD, NOD) => self.commute(x, y),
      (OP1, OP1) | (OP2, OP2) | (ITE, ITE) => self.annihilate(x, y),
      (NOD, _) => self.commute(x, y),
      (_, NOD) => self.commute(y, x),
      _ => {},
    }
  }

  /// Same type and kind: link the auxiliary sides pairwise and free both.
  /// Targets are read lazily so wires internal to the pair thread
  /// through the already-rewired cells.
  fn annihilate(&mut self, x: u32, y: u32) {
    let a = self.take_target(port(x, 1));
    let b = self.take_target(port(y, 1));
    self.join(a, b);
    let a = self.take_target(port(x, 2));
    let b = self.take_target(port(y, 2));
    self.join(a, b);
    self.free(x);
    self.free(y);
  }

  /// Distinct labels or node families: duplicate each node through the
  /// other. Four fresh nodes take over the four auxiliary sides and are
  /// wired crosswise.
  fn commute(&mut self, x: u32, y: u32) {
    let (xt, xk) = (self.ntype(x), self.kind(x));
    let (yt, yk) = (self.ntype(y), self.kind(y));
    let y1 = self.new_node(yt, yk);
    let y2 = self.new_node(yt, yk);
    let x1 = self.new_node(xt, xk);
    let x2 = self.new_node(xt, xk);
    let t = self.take_target(port(x, 1));
    self.join(Target::Wire(port(y1, 0)), t);
    let t = self.take_target(port(x, 2));
    self.join(Target::Wire(port(y2, 0)), t);
    let t = self.take_target(port(y, 1));
    self.join(Target::Wire(port(x1, 0)), t);
    let t = self.take_target(port(y, 2));
    self.join(Target::Wire(port(x2, 0)), t);
    self.link(port(y1, 1), port(x1, 1));
    self.link(port(y1, 2), port(x2, 1));
    self.link(port(y2, 1), port(x1, 2));
    self.link(port(y2, 2), port(x2, 2));
    self.free(x);
    self.free(y);
  }

  /// An eraser reached the principal port: propagate it to both aux
  /// sides and free the node. Targets inside the dying node are dropped.
  fn erase(&mut self, x: u32) {
    for slot in [1, 2] {
      if let Target::Wire(w) = self.take_target(port(x, slot)) {
        if node_of(w) != x {
          self.erase_port(w);
        }
      }
    }
    self.free(x);
  }

  /// A number reached the principal port of `x`.
  fn numeric(&mut self, x: u32) {
    let value = self.get(port(x, 0));
    match self.ntype(x) {
      NOD => {
        // Copy the number to both auxiliary targets.
        let t = self.take_target(port(x, 1));
        self.join(t, Target::Num(value));
        let t = self.take_target(port(x, 2));
        self.join(t, Target::Num(value));
        self.free(x);
      },
      OP1 => {
        let kind = self.kind(x);
        let code = (kind & 0xFF) as u16;
        let stored = self.get(port(x, 1));
        let result = match Oper::from_code(code) {
          Some(oper) if kind & SWAP != 0 => oper.eval(stored, value),
          Some(oper) => oper.eval(value, stored),
          None => 0,
        };
        let out = self.take_target(port(x, 2));
        self.join(out, Target::Num(result));
        self.free(x);
      },
      OP2 => {
        // Demote to a partial application: the second operand rotates
        // onto the principal port, the received first operand is stored.
        let second = self.take_target(port(x, 1));
        let kind = self.kind(x);
        let base = x as usize * 4 + 3;
        self.nodes[base] = OP1 | ((kind | SWAP) << 3);
        self.set_num(port(x, 1), value);
        self.join(Target::Wire(port(x, 0)), second);
      },
      ITE => {
        // The branches live on a paired NOD behind aux1; select by the
        // condition, close the other side with an eraser.
        let Target::Wire(pp) = self.take_target(port(x, 1)) else {
          self.free(x);
          return;
        };
        let pair = node_of(pp);
        let (sel, other) = if value != 0 { (1, 2) } else { (2, 1) };
        let result = self.take_target(port(x, 2));
        let chosen = self.take_target(port(pair, sel));
        self.join(result, chosen);
        if let Target::Wire(w) = self.take_target(port(pair, other)) {
          if node_of(w) != pair && node_of(w) != x {
            self.erase_port(w);
          }
        }
        self.free(x);
        self.free(pair);
      },
      _ => {},
    }
  }

  // ==========================================================================
  // Schedulers
  // ==========================================================================

  /// Fire redexes until none remain.
  pub fn reduce_strict(&mut self) {
    while let Some((x, y)) = self.redexes.pop() {
      self.stats.loops += 1;
      self.rewrite(x, y);
    }
  }

  /// Principal-port walk from the root, firing only redexes on the path.
  pub fn reduce_lazy(&mut self) {
    let mut warp: Vec<u32> = Vec::new();
    let mut exit: Vec<u32> = Vec::new();
    let mut prev: u32 = port(0, 0);
    loop {
      self.stats.loops += 1;
      if self.is_num(prev) {
        // A value reached this port. On a principal port it is itself a
        // redex: fire it and resume from the port we entered the node
        // through, which survives the rewrite. Elsewhere the path is
        // done.
        if slot_of(prev) == 0 && node_of(prev) != 0 {
          let n = node_of(prev);
          let Some(s) = exit.pop() else { break };
          let back = self.get(port(n, s));
          self.rewrite(n, n);
          prev = back;
          continue;
        }
        match warp.pop() {
          Some(p) => {
            prev = p;
            continue;
          },
          None => break,
        }
      }
      let next = self.get(prev);
      if next == FREE || next == prev || node_of(next) == 0 {
        // Dangling, erased, or back at the root: this path is done.
        match warp.pop() {
          Some(p) => {
            prev = p;
            continue;
          },
          None => break,
        }
      }
      if slot_of(next) == 0 {
        if slot_of(prev) == 0 && node_of(prev) != 0 {
          // Two principals on the path: fire, then resume from the port
          // outside the pair.
          let Some(s) = exit.pop() else { break };
          let back = self.get(port(node_of(prev), s));
          self.rewrite(node_of(prev), node_of(next));
          prev = back;
          continue;
        }
        // A head in normal position: explore its auxiliaries.
        let n = node_of(next);
        warp.push(port(n, 2));
        prev = port(n, 1);
      } else {
        // Arrived at an auxiliary: the node's principal interaction
        // comes first.
        let n = node_of(next);
        if self.is_num(port(n, 0)) {
          self.rewrite(n, n);
          continue;
        }
        exit.push(slot_of(next));
        prev = port(n, 0);
      }
    }
  }

  // ==========================================================================
  // Decompilation
  // ==========================================================================

  /// Read the net back as an erased term.
  pub fn decompile(&self) -> Result<Term, RtError> {
    let mut lams = FxHashMap::default();
    let mut exit = Vec::new();
    self.read_target(port(0, 0), 0, &mut lams, &mut exit)
  }

  fn read_target(
    &self,
    from: u32,
    depth: usize,
    lams: &mut FxHashMap<u32, usize>,
    exit: &mut Vec<u32>,
  ) -> Result<Term, RtError> {
    if self.is_num(from) {
      return Ok(Term::val(self.get(from)));
    }
    let dest = self.get(from);
    if dest == FREE || dest == from {
      return Err(RtError::Unsupported("disconnected net"));
    }
    self.read_at(dest, depth, lams, exit)
  }

  fn read_at(
    &self,
    p: u32,
    depth: usize,
    lams: &mut FxHashMap<u32, usize>,
    exit: &mut Vec<u32>,
  ) -> Result<Term, RtError> {
    let n = node_of(p);
    match self.ntype(n) {
      NOD => match self.kind(n) {
        0 => match slot_of(p) {
          // Entered from above: a lambda.
          0 => {
            lams.insert(n, depth);
            let body = self.read_target(port(n, 2), depth + 1, lams, exit)?;
            Ok(Term::lam(format!("x{}", depth), None, body, false))
          },
          // A bound variable occurrence.
          1 => {
            let bound = lams
              .get(&n)
              .ok_or(RtError::Unsupported("unbound net variable"))?;
            Ok(Term::var(depth - 1 - bound))
          },
          // Entered from the result side: an application.
          _ => {
            let func = self.read_target(port(n, 0), depth, lams, exit)?;
            let argm = self.read_target(port(n, 1), depth, lams, exit)?;
            Ok(Term::app(func, argm, false))
          },
        },
        PAIR => Err(RtError::Unsupported("dangling branch pair")),
        // Duplicator: resolve to a consistent side per path.
        _ => {
          if slot_of(p) == 0 {
            let took = exit
              .pop()
              .ok_or(RtError::Unsupported("dangling duplicator"))?;
            let out = self.read_target(port(n, took), depth, lams, exit);
            exit.push(took);
            out
          } else {
            exit.push(slot_of(p));
            let out = self.read_target(port(n, 0), depth, lams, exit);
            exit.pop();
            out
          }
        },
      },
      OP1 => {
        let kind = self.kind(n);
        let code = (kind & 0xFF) as u16;
        let oper =
          Oper::from_code(code).ok_or(RtError::UnknownOperator(code))?;
        let lit = self.get(port(n, 1));
        let operand = self.read_target(port(n, 0), depth, lams, exit)?;
        if kind & SWAP != 0 {
          Ok(Term::op2(oper, Term::val(lit), operand))
        } else {
          Ok(Term::op1(oper, operand, lit))
        }
      },
      OP2 => {
        let code = (self.kind(n) & 0xFF) as u16;
        let oper =
          Oper::from_code(code).ok_or(RtError::UnknownOperator(code))?;
        let num0 = self.read_target(port(n, 0), depth, lams, exit)?;
        let num1 = self.read_target(port(n, 1), depth, lams, exit)?;
        // A stuck operator with a literal second operand is the partial
        // application form at the term level.
        if self.is_num(port(n, 1)) && !self.is_num(port(n, 0)) {
          if let TermData::Val { numb } = num1.as_data() {
            return Ok(Term::op1(oper, num0, *numb));
          }
        }
        Ok(Term::op2(oper, num0, num1))
      },
      ITE => {
        let cond = self.read_target(port(n, 0), depth, lams, exit)?;
        let pp = self.get(port(n, 1));
        if self.is_num(port(n, 1)) || pp == FREE {
          return Err(RtError::Unsupported("malformed conditional"));
        }
        let pair = node_of(pp);
        let ift = self.read_target(port(pair, 1), depth, lams, exit)?;
        let iff = self.read_target(port(pair, 2), depth, lams, exit)?;
        Ok(Term::ite(cond, ift, iff))
      },
      _ => Err(RtError::Unsupported("unknown node type")),
    }
  }
}

impl Default for INet {
  fn default() -> INet {
    INet::new()
  }
}

// ============================================================================
// Compilation
// ============================================================================

struct VarEntry {
  port: u32,
  used: bool,
}

struct Compiler<'d> {
  net: INet,
  defs: &'d Defs,
  next_label: u32,
  refs: FxHashMap<Name, Target>,
  expanding: Vec<Name>,
}

impl<'d> Compiler<'d> {
  fn fresh_label(&mut self) -> u32 {
    let label = self.next_label;
    self.next_label += 1;
    label
  }

  fn link_target(&mut self, p: u32, t: Target) {
    self.net.join(Target::Wire(p), t);
  }

  /// Split an already-consumed output with a fresh duplicator, returning
  /// a new tap.
  fn split(&mut self, p: u32) -> Target {
    let consumer = self.net.get(p);
    let label = self.fresh_label();
    let dup = self.net.new_node(NOD, label);
    self.net.link(port(dup, 0), p);
    self.net.link(port(dup, 1), consumer);
    Target::Wire(port(dup, 2))
  }

  fn build(
    &mut self,
    term: &Term,
    scope: &mut Vec<VarEntry>,
  ) -> Result<Target, RtError> {
    match term.as_data() {
      TermData::Var { indx } => {
        let k = scope
          .len()
          .checked_sub(indx + 1)
          .ok_or(RtError::Unsupported("open variable"))?;
        if !scope[k].used {
          scope[k].used = true;
          Ok(Target::Wire(scope[k].port))
        } else {
          let p = scope[k].port;
          Ok(self.split(p))
        }
      },
      TermData::Lam { body, .. } => {
        let lam = self.net.new_node(NOD, 0);
        scope.push(VarEntry { port: port(lam, 1), used: false });
        let body = self.build(body, scope);
        let entry = scope.pop().unwrap();
        let body = body?;
        self.link_target(port(lam, 2), body);
        if !entry.used {
          self.net.erase_port(port(lam, 1));
        }
        Ok(Target::Wire(port(lam, 0)))
      },
      TermData::App { func, argm, .. } => {
        let app = self.net.new_node(NOD, 0);
        let func = self.build(func, scope)?;
        self.link_target(port(app, 0), func);
        let argm = self.build(argm, scope)?;
        self.link_target(port(app, 1), argm);
        Ok(Target::Wire(port(app, 2)))
      },
      TermData::Val { numb } => Ok(Target::Num(*numb)),
      TermData::Op1 { oper, num0, num1 } => {
        let node = self.net.new_node(OP1, oper.code() as u32);
        self.net.set_num(port(node, 1), *num1);
        let num0 = self.build(num0, scope)?;
        self.link_target(port(node, 0), num0);
        Ok(Target::Wire(port(node, 2)))
      },
      TermData::Op2 { oper, num0, num1 } => {
        let node = self.net.new_node(OP2, oper.code() as u32);
        let num0 = self.build(num0, scope)?;
        self.link_target(port(node, 0), num0);
        let num1 = self.build(num1, scope)?;
        self.link_target(port(node, 1), num1);
        Ok(Target::Wire(port(node, 2)))
      },
      TermData::Ite { cond, ift, iff } => {
        let node = self.net.new_node(ITE, 0);
        let pair = self.net.new_node(NOD, PAIR);
        self.net.link(port(node, 1), port(pair, 0));
        let cond = self.build(cond, scope)?;
        self.link_target(port(node, 0), cond);
        let ift = self.build(ift, scope)?;
        self.link_target(port(pair, 1), ift);
        let iff = self.build(iff, scope)?;
        self.link_target(port(pair, 2), iff);
        Ok(Target::Wire(port(node, 2)))
      },
      TermData::Ref { name, .. } => {
        if let Some(t) = self.refs.get(name).copied() {
          return Ok(match t {
            Target::Num(v) => Target::Num(v),
            Target::Wire(p) => self.split(p),
          });
        }
        if self.expanding.iter().any(|n| n == name) {
          return Err(RtError::RecursiveReference(name.clone()));
        }
        let def = self
          .defs
          .get(name)
          .ok_or_else(|| RtError::UndefinedReference(name.clone()))?;
        let body = erase(def);
        self.expanding.push(name.clone());
        let t = self.build(&body, &mut Vec::new());
        self.expanding.pop();
        let t = t?;
        self.refs.insert(name.clone(), t);
        Ok(t)
      },
      TermData::Log { expr, .. } => self.build(expr, scope),
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
}

/// Compile the definition `main` (and everything it references) into a
/// net whose root principal port is the program interface.
pub fn compile(defs: &Defs, main: &str) -> Result<INet, RtError> {
  let mut comp = Compiler {
    net: INet::new(),
    defs,
    next_label: 1,
    refs: FxHashMap::default(),
    expanding: Vec::new(),
  };
  let def = defs
    .get(main)
    .ok_or_else(|| RtError::UndefinedReference(main.to_string()))?;
  let body = erase(def);
  comp.expanding.push(main.to_string());
  let target = comp.build(&body, &mut Vec::new())?;
  comp.net.join(Target::Wire(port(0, 0)), target);
  Ok(comp.net)
}

/// Compile, reduce (strict or lazy), and read back a definition.
pub fn run(
  defs: &Defs,
  main: &str,
  lazy: bool,
) -> Result<(Term, NetStats), RtError> {
  let mut net = compile(defs, main)?;
  if lazy {
    net.reduce_lazy();
  } else {
    net.reduce_strict();
  }
  let term = net.decompile()?;
  Ok((term, net.stats))
}
