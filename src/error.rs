//! Search failure taxonomy.

use crate::arch::RegId;

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Proximate cause of the most recent strategy failure.
pub enum FailType {
    /// The chain length budget was exhausted.
    MaxLen,
    /// The database had no gadget for the leaf query.
    NoGadget,
    /// Every padding byte value was rejected by the bad-byte filter.
    NoValidPadding,
    /// A guarded precondition rejected the query.
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Diagnostic accumulated over one search: why the chain could not be built.
pub struct FailRecord {
    max_len: bool,
    no_valid_padding: bool,
    modified_regs: BTreeSet<RegId>,
    bad_bytes: BTreeSet<u8>,
}

impl FailRecord {
    /// A clean record.
    pub const fn new() -> Self {
        Self {
            max_len: false,
            no_valid_padding: false,
            modified_regs: BTreeSet::new(),
            bad_bytes: BTreeSet::new(),
        }
    }

    /// Whether the length budget was the blocking factor.
    pub const fn max_len(&self) -> bool {
        self.max_len
    }

    /// Whether no byte value survived the bad-byte filter.
    pub const fn no_valid_padding(&self) -> bool {
        self.no_valid_padding
    }

    /// Whether `reg` being clobbered blocked a candidate.
    pub fn modified_reg(&self, reg: RegId) -> bool {
        self.modified_regs.contains(&reg)
    }

    /// Registers whose clobbering blocked candidates.
    pub fn modified_regs(&self) -> impl Iterator<Item = RegId> + '_ {
        self.modified_regs.iter().copied()
    }

    /// Byte values discovered to block candidate addresses.
    pub fn bad_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.bad_bytes.iter().copied()
    }

    pub(crate) fn set_max_len(&mut self, val: bool) {
        self.max_len = val;
    }

    pub(crate) fn set_no_valid_padding(&mut self, val: bool) {
        self.no_valid_padding = val;
    }

    pub(crate) fn add_modified_reg(&mut self, reg: RegId) {
        self.modified_regs.insert(reg);
    }

    pub(crate) fn add_bad_byte(&mut self, byte: u8) {
        self.bad_bytes.insert(byte);
    }
}

impl fmt::Display for FailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut causes = Vec::new();
        if self.max_len {
            causes.push("chain length budget exhausted".to_string());
        }
        if self.no_valid_padding {
            causes.push("no padding byte survives the bad-byte filter".to_string());
        }
        if !self.modified_regs.is_empty() {
            let regs = self
                .modified_regs
                .iter()
                .map(|r| format!("r{r}"))
                .collect::<Vec<_>>()
                .join(", ");
            causes.push(format!("candidates clobber kept registers: {regs}"));
        }
        if !self.bad_bytes.is_empty() {
            let bytes = self
                .bad_bytes
                .iter()
                .map(|b| format!("{b:#04x}"))
                .collect::<Vec<_>>()
                .join(", ");
            causes.push(format!("candidate addresses carry bad bytes: {bytes}"));
        }
        if causes.is_empty() {
            f.write_str("no matching gadget")
        } else {
            f.write_str(&causes.join("; "))
        }
    }
}

/// Errors surfaced by the public search entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    /// No chain satisfies the query under the given constraints.
    #[error("no chain found: {0}")]
    NotFound(FailRecord),
    /// The chain length budget is zero or unreasonably large.
    #[error("invalid chain length budget: {0}")]
    InvalidLength(usize),
}

impl SearchError {
    /// The failure diagnostic, when the search ran and found nothing.
    pub const fn fail_record(&self) -> Option<&FailRecord> {
        match self {
            Self::NotFound(record) => Some(record),
            Self::InvalidLength(_) => None,
        }
    }
}
