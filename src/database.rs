//! Gadget database seam.
//!
//! The engine never disassembles anything itself: it consumes a
//! [`GadgetDatabase`] as a pure query oracle. [`MemoryDatabase`] is the
//! in-memory implementation used by the test suite and by callers who build
//! small curated databases by hand.

use crate::arch::{Arch, Cst, RegId};
use crate::assertion::Assertion;
use crate::constraint::Constraint;
use crate::gadget::{Gadget, GadgetId};
use crate::query::{AssignArg, Binop, DestArg};

/// Query oracle over an indexed gadget collection.
///
/// Each finder returns up to `n` gadget identifiers whose semantics match the
/// query and which are acceptable under `constraint` and `assertion`.
pub trait GadgetDatabase {
    /// Fetch a gadget by identifier.
    fn get(&self, id: GadgetId) -> Option<&Gadget>;

    /// `dest_reg <- cst`
    fn find_cst_to_reg(
        &self,
        dest_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// `dest_reg <- src_reg op cst`
    #[allow(clippy::too_many_arguments)]
    fn find_reg_binop_cst_to_reg(
        &self,
        dest_reg: RegId,
        op: Binop,
        src_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// `dest_reg <- mem[addr_reg addr_op addr_cst] + cst`
    #[allow(clippy::too_many_arguments)]
    fn find_mem_binop_cst_to_reg(
        &self,
        dest_reg: RegId,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// `mem[addr_reg addr_op addr_cst] <- cst`
    #[allow(clippy::too_many_arguments)]
    fn find_cst_to_mem(
        &self,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// `mem[addr_reg addr_op addr_cst] <- src_reg op cst`
    #[allow(clippy::too_many_arguments)]
    fn find_reg_binop_cst_to_mem(
        &self,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        op: Binop,
        src_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// `mem[dest...] <- mem[src...] + cst`
    #[allow(clippy::too_many_arguments)]
    fn find_mem_binop_cst_to_mem(
        &self,
        dest_addr_op: Binop,
        dest_addr_reg: RegId,
        dest_addr_cst: Cst,
        src_addr_op: Binop,
        src_addr_reg: RegId,
        src_addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId>;

    /// Gadgets reaching a syscall entry. Databases without syscall indexing
    /// return nothing.
    fn find_syscall(&self, constraint: &Constraint, assertion: &Assertion, n: usize) -> Vec<GadgetId> {
        let _ = (constraint, assertion, n);
        Vec::new()
    }

    /// Gadgets reaching an `int 0x80` entry. Databases without interrupt
    /// indexing return nothing.
    fn find_int80(&self, constraint: &Constraint, assertion: &Assertion, n: usize) -> Vec<GadgetId> {
        let _ = (constraint, assertion, n);
        Vec::new()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    gadget: Gadget,
    effects: Vec<(DestArg, AssignArg)>,
}

#[derive(Debug, Clone)]
/// In-memory [`GadgetDatabase`] where every gadget is registered together
/// with the assignments it implements.
pub struct MemoryDatabase {
    arch: Arch,
    entries: Vec<Entry>,
}

impl MemoryDatabase {
    /// An empty database for the given architecture.
    pub const fn new(arch: Arch) -> Self {
        Self {
            arch,
            entries: Vec::new(),
        }
    }

    /// Register a gadget with the effects it implements; returns its
    /// identifier.
    pub fn insert<I>(&mut self, gadget: Gadget, effects: I) -> GadgetId
    where
        I: IntoIterator<Item = (DestArg, AssignArg)>,
    {
        let id = self.entries.len();
        self.entries.push(Entry {
            gadget,
            effects: effects.into_iter().collect(),
        });
        id
    }

    /// Number of registered gadgets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn assertion_allows(&self, dest: &DestArg, assign: &AssignArg, assertion: &Assertion) -> bool {
        let dest_ok = match dest {
            DestArg::Mem { addr_reg, .. } => assertion.valid_write(*addr_reg),
            DestArg::Reg(_) | DestArg::CstMem { .. } => true,
        };
        let assign_ok = match assign {
            AssignArg::MemBinopCst { addr_reg, .. } => assertion.valid_read(*addr_reg),
            _ => true,
        };
        dest_ok && assign_ok
    }

    fn find(
        &self,
        dest: DestArg,
        assign: AssignArg,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        if !self.assertion_allows(&dest, &assign, assertion) {
            return Vec::new();
        }
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.effects.contains(&(dest, assign)))
            .filter(|(_, e)| constraint.accepts(&e.gadget, &self.arch))
            .map(|(id, _)| id)
            .take(n)
            .collect()
    }
}

impl GadgetDatabase for MemoryDatabase {
    fn get(&self, id: GadgetId) -> Option<&Gadget> {
        self.entries.get(id).map(|e| &e.gadget)
    }

    fn find_cst_to_reg(
        &self,
        dest_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Reg(dest_reg),
            AssignArg::Cst(cst),
            constraint,
            assertion,
            n,
        )
    }

    fn find_reg_binop_cst_to_reg(
        &self,
        dest_reg: RegId,
        op: Binop,
        src_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Reg(dest_reg),
            AssignArg::RegBinopCst { reg: src_reg, op, cst },
            constraint,
            assertion,
            n,
        )
    }

    fn find_mem_binop_cst_to_reg(
        &self,
        dest_reg: RegId,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Reg(dest_reg),
            AssignArg::MemBinopCst {
                addr_reg,
                addr_op,
                addr_cst,
                cst,
            },
            constraint,
            assertion,
            n,
        )
    }

    fn find_cst_to_mem(
        &self,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Mem {
                addr_reg,
                addr_op,
                addr_cst,
            },
            AssignArg::Cst(cst),
            constraint,
            assertion,
            n,
        )
    }

    fn find_reg_binop_cst_to_mem(
        &self,
        addr_op: Binop,
        addr_reg: RegId,
        addr_cst: Cst,
        op: Binop,
        src_reg: RegId,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Mem {
                addr_reg,
                addr_op,
                addr_cst,
            },
            AssignArg::RegBinopCst { reg: src_reg, op, cst },
            constraint,
            assertion,
            n,
        )
    }

    fn find_mem_binop_cst_to_mem(
        &self,
        dest_addr_op: Binop,
        dest_addr_reg: RegId,
        dest_addr_cst: Cst,
        src_addr_op: Binop,
        src_addr_reg: RegId,
        src_addr_cst: Cst,
        cst: Cst,
        constraint: &Constraint,
        assertion: &Assertion,
        n: usize,
    ) -> Vec<GadgetId> {
        self.find(
            DestArg::Mem {
                addr_reg: dest_addr_reg,
                addr_op: dest_addr_op,
                addr_cst: dest_addr_cst,
            },
            AssignArg::MemBinopCst {
                addr_reg: src_addr_reg,
                addr_op: src_addr_op,
                addr_cst: src_addr_cst,
                cst,
            },
            constraint,
            assertion,
            n,
        )
    }

    fn find_syscall(&self, constraint: &Constraint, assertion: &Assertion, n: usize) -> Vec<GadgetId> {
        let _ = assertion;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.effects.iter().any(|(_, a)| matches!(a, AssignArg::Syscall)))
            .filter(|(_, e)| constraint.accepts(&e.gadget, &self.arch))
            .map(|(id, _)| id)
            .take(n)
            .collect()
    }

    fn find_int80(&self, constraint: &Constraint, assertion: &Assertion, n: usize) -> Vec<GadgetId> {
        let _ = assertion;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.effects.iter().any(|(_, a)| matches!(a, AssignArg::Int80)))
            .filter(|(_, e)| constraint.accepts(&e.gadget, &self.arch))
            .map(|(id, _)| id)
            .take(n)
            .collect()
    }
}
