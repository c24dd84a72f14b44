//! Assignment queries answered by the engine.
//!
//! A query is a pair `(DestArg, AssignArg)`: write *assign* into *dest*. The
//! engine decomposes queries it cannot satisfy with a single gadget into
//! sub-queries over intermediate registers and stack slots.

use crate::arch::{Cst, RegId};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Binary operation appearing in queries and address computations.
pub enum Binop {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Bit shift.
    Bsh,
}

impl Binop {
    /// Assembly-style symbol for rendering.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Binop::Add => "+",
            Binop::Sub => "-",
            Binop::Mul => "*",
            Binop::Div => "/",
            Binop::And => "&",
            Binop::Or => "|",
            Binop::Xor => "^",
            Binop::Bsh => "<<",
        }
    }
}

impl fmt::Display for Binop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Where the queried value must land.
pub enum DestArg {
    /// Write a register.
    Reg(RegId),
    /// Write memory at `[addr_reg addr_op addr_cst]`.
    Mem {
        /// Register holding the address base.
        addr_reg: RegId,
        /// Operation combining base and offset.
        addr_op: Binop,
        /// Address offset.
        addr_cst: Cst,
    },
    /// Write memory at an absolute address.
    CstMem {
        /// The absolute address.
        addr_cst: Cst,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// What must be written into the destination.
pub enum AssignArg {
    /// A constant.
    Cst(Cst),
    /// `reg op cst`.
    RegBinopCst {
        /// Source register.
        reg: RegId,
        /// Operation applied to the source.
        op: Binop,
        /// Constant operand.
        cst: Cst,
    },
    /// Value loaded from `[addr_reg addr_op addr_cst]`, plus `cst`.
    MemBinopCst {
        /// Register holding the address base.
        addr_reg: RegId,
        /// Operation combining base and offset.
        addr_op: Binop,
        /// Address offset.
        addr_cst: Cst,
        /// Constant added to the loaded value.
        cst: Cst,
    },
    /// Value loaded from an absolute address, plus `cst`.
    CstMem {
        /// The absolute address.
        addr_cst: Cst,
        /// Constant added to the loaded value.
        cst: Cst,
    },
    /// Value loaded from an absolute address combined with a constant through
    /// an explicit operation.
    CstMemBinopCst {
        /// The absolute address.
        addr_cst: Cst,
        /// Operation applied to the loaded value.
        op: Binop,
        /// Constant operand.
        cst: Cst,
    },
    /// Reach a syscall entry; resolved entirely by the database.
    Syscall,
    /// Reach an `int 0x80` entry; resolved entirely by the database.
    Int80,
}

/// Whether `dest_reg <- reg op cst` leaves `dest_reg` unchanged.
///
/// The engine must skip such assignments: they consume budget without moving
/// any data.
pub const fn is_identity_assign(dest_reg: RegId, reg: RegId, op: Binop, cst: Cst) -> bool {
    if dest_reg != reg {
        return false;
    }
    match op {
        Binop::Add | Binop::Sub | Binop::Bsh => cst == 0,
        Binop::Mul | Binop::Div => cst == 1,
        _ => false,
    }
}

impl fmt::Display for DestArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestArg::Reg(r) => write!(f, "r{r}"),
            DestArg::Mem {
                addr_reg,
                addr_op,
                addr_cst,
            } => write!(f, "mem[r{addr_reg} {addr_op} {addr_cst:#x}]"),
            DestArg::CstMem { addr_cst } => write!(f, "mem[{addr_cst:#x}]"),
        }
    }
}

impl fmt::Display for AssignArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignArg::Cst(c) => write!(f, "{c:#x}"),
            AssignArg::RegBinopCst { reg, op, cst } => write!(f, "r{reg} {op} {cst:#x}"),
            AssignArg::MemBinopCst {
                addr_reg,
                addr_op,
                addr_cst,
                cst,
            } => write!(f, "mem[r{addr_reg} {addr_op} {addr_cst:#x}] + {cst:#x}"),
            AssignArg::CstMem { addr_cst, cst } => write!(f, "mem[{addr_cst:#x}] + {cst:#x}"),
            AssignArg::CstMemBinopCst { addr_cst, op, cst } => {
                write!(f, "mem[{addr_cst:#x}] {op} {cst:#x}")
            }
            AssignArg::Syscall => f.write_str("syscall"),
            AssignArg::Int80 => f.write_str("int 0x80"),
        }
    }
}
