//! Gadget metadata consumed by the search engine.

use crate::arch::{Addr, RegId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// How a gadget transfers control when it finishes.
pub enum RetType {
    /// Plain `ret`: the next stack word becomes the next gadget.
    Ret,
    /// `jmp reg`: control goes wherever the pivot register points.
    Jmp,
    /// `call reg`: like `Jmp`, but a return address is pushed first.
    Call,
}

/// Identifier of a gadget inside its database.
pub type GadgetId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Semantic summary of one gadget: its terminator, stack effect, clobbered
/// registers, and the addresses it lives at in the target binary.
pub struct Gadget {
    asm: String,
    sp_inc: Option<i64>,
    ret_type: RetType,
    ret_reg: Option<RegId>,
    modified: Vec<RegId>,
    addresses: Vec<Addr>,
}

impl Gadget {
    /// A `ret`-terminated gadget with unknown stack effect; refine with the
    /// `with_*` builders.
    pub fn new<S: Into<String>>(asm: S) -> Self {
        Self {
            asm: asm.into(),
            sp_inc: None,
            ret_type: RetType::Ret,
            ret_reg: None,
            modified: Vec::new(),
            addresses: Vec::new(),
        }
    }

    /// Set the stack pointer increment, in bytes.
    pub fn with_sp_inc(mut self, sp_inc: i64) -> Self {
        self.sp_inc = Some(sp_inc);
        self
    }

    /// Set the terminator kind.
    pub fn with_ret_type(mut self, ret_type: RetType) -> Self {
        self.ret_type = ret_type;
        self
    }

    /// Set the pivot register of a jmp/call terminator.
    pub fn with_ret_reg(mut self, reg: RegId) -> Self {
        self.ret_reg = Some(reg);
        self
    }

    /// Add registers the gadget clobbers.
    pub fn with_modified<I>(mut self, regs: I) -> Self
    where
        I: IntoIterator<Item = RegId>,
    {
        self.modified.extend(regs);
        self
    }

    /// Add addresses the gadget is found at.
    pub fn with_addresses<I>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = Addr>,
    {
        self.addresses.extend(addrs);
        self
    }

    /// Disassembly text.
    pub fn asm(&self) -> &str {
        &self.asm
    }

    /// Stack pointer increment in bytes, when known.
    pub const fn sp_inc(&self) -> Option<i64> {
        self.sp_inc
    }

    /// Terminator kind.
    pub const fn ret_type(&self) -> RetType {
        self.ret_type
    }

    /// Pivot register, for jmp/call terminators.
    pub const fn ret_reg(&self) -> Option<RegId> {
        self.ret_reg
    }

    /// Whether the gadget clobbers `reg`.
    pub fn modifies(&self, reg: RegId) -> bool {
        self.modified.contains(&reg)
    }

    /// Addresses the gadget is found at.
    pub fn addresses(&self) -> &[Addr] {
        &self.addresses
    }
}
