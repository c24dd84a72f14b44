//! Target machine description consumed by the search engine.

/// Machine word, as placed on the stack.
pub type Word = u64;

/// Signed constant used inside queries (offsets, immediates).
pub type Cst = i64;

/// Address of a gadget inside the target binary.
pub type Addr = u64;

/// Register identifier.
///
/// Registers are dense indexes in `0..nb_regs`, following the numbering the
/// gadget database was built with.
pub type RegId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Read-only description of the target architecture.
///
/// The engine only needs to know how many registers exist, which ones are the
/// stack/instruction pointers, the word size, and which registers should never
/// be used as chaining intermediaries.
pub struct Arch {
    name: &'static str,
    nb_regs: usize,
    octets: usize,
    sp: RegId,
    ip: RegId,
    ignored: Vec<RegId>,
    call_pushes_return: bool,
}

impl Arch {
    /// Describe a custom architecture.
    pub fn new(name: &'static str, nb_regs: usize, octets: usize, sp: RegId, ip: RegId) -> Self {
        Self {
            name,
            nb_regs,
            octets,
            sp,
            ip,
            ignored: Vec::new(),
            call_pushes_return: true,
        }
    }

    /// 32-bit x86: `eax..edi`, `ebp`, `esp`, `eip`.
    pub fn x86() -> Self {
        Self::new("X86", 9, 4, 7, 8)
    }

    /// 64-bit x86: `rax..rbp`, `rsp`, `rip`, `r8..r15`.
    pub fn x86_64() -> Self {
        Self::new("X64", 17, 8, 7, 8)
    }

    /// Mark registers that must never be picked as chaining intermediaries
    /// (segment selectors, flags mirrors, etc.).
    pub fn with_ignored<I>(mut self, regs: I) -> Self
    where
        I: IntoIterator<Item = RegId>,
    {
        self.ignored.extend(regs);
        self
    }

    /// Architecture name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of registers.
    pub const fn nb_regs(&self) -> usize {
        self.nb_regs
    }

    /// Word size in bytes.
    pub const fn octets(&self) -> usize {
        self.octets
    }

    /// Stack pointer register.
    pub const fn sp(&self) -> RegId {
        self.sp
    }

    /// Instruction pointer register.
    pub const fn ip(&self) -> RegId {
        self.ip
    }

    /// Whether `reg` is excluded from chaining.
    pub fn is_ignored_reg(&self, reg: RegId) -> bool {
        self.ignored.contains(&reg)
    }

    /// Whether a `call reg` pushes a return address, consuming one stack
    /// slot.
    pub const fn call_pushes_return(&self) -> bool {
        self.call_pushes_return
    }

    /// Override the call semantics for targets whose calls do not push a
    /// return address.
    pub fn with_call_pushes_return(mut self, val: bool) -> Self {
        self.call_pushes_return = val;
        self
    }
}
