//! Constraints restricting which gadgets a search may use.
//!
//! A [`Constraint`] is a stack of clauses, each one narrowing the set of
//! acceptable gadgets. Clauses accumulate (conjunction); strategies push
//! scoped clauses on a clone and restore the previous stack on exit.
//!
//! # Signatures
//!
//! A constraint stack is summarised by a [`CstrSig`] bitmask used as the
//! memoization key for learned infeasibility. The mapping is chosen so that a
//! constraint that accepts every gadget another accepts has a subset of its
//! bits — `a.is_weaker_than(b)` iff `a & b == a`:
//!
//! * bits 0–15: kept registers, bit `reg % 16`;
//! * bits 16–31: bad-byte buckets, bit `16 + (byte >> 4)`;
//! * bits 32–34: control-flow prohibitions (ret, jmp, call disallowed).
//!
//! Stack-pointer increment bounds contribute no bits: they are transient,
//! pushed around individual lookups and popped before any memoization write,
//! and a numeric bound has no monotone one-bit summary.

use crate::arch::{Addr, Arch, RegId, Word};
use crate::gadget::{Gadget, RetType};

use std::mem::discriminant;
use std::ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Compact summary of a constraint stack, ordered by implication.
pub struct CstrSig(u64);

impl CstrSig {
    /// Signature of the empty constraint.
    pub const EMPTY: Self = Self(0);

    /// Build a signature from raw bits, following the documented mapping.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Whether every gadget acceptable under `other` is acceptable under
    /// `self` — the bitmask rendition of "implied by".
    pub const fn is_weaker_than(&self, other: CstrSig) -> bool {
        self.0 & other.0 == self.0
    }

    /// Raw bits.
    pub const fn bits(&self) -> u64 {
        self.0
    }
}

impl ops::BitOr for CstrSig {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for CstrSig {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

const SIG_KEEP_BASE: u64 = 0;
const SIG_BAD_BYTE_BASE: u64 = 16;
const SIG_NO_RET: u64 = 1 << 32;
const SIG_NO_JMP: u64 = 1 << 33;
const SIG_NO_CALL: u64 = 1 << 34;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// A single restriction on acceptable gadgets.
pub enum ConstraintClause {
    /// The listed registers must not be modified.
    KeepRegs(Vec<RegId>),
    /// Gadget addresses and stack words must avoid these byte values.
    BadBytes(Vec<u8>),
    /// Which terminator kinds are acceptable.
    Return {
        /// Accept `ret`-terminated gadgets.
        ret: bool,
        /// Accept `jmp reg`-terminated gadgets.
        jmp: bool,
        /// Accept `call reg`-terminated gadgets.
        call: bool,
    },
    /// The gadget's stack pointer increment must be known and at most this
    /// many bytes.
    MaxSpInc(i64),
    /// The gadget's stack pointer increment must be known and at least this
    /// many bytes.
    MinSpInc(i64),
}

impl ConstraintClause {
    fn signature(&self) -> CstrSig {
        let mut bits = 0u64;
        match self {
            ConstraintClause::KeepRegs(regs) => {
                for r in regs {
                    bits |= 1 << (SIG_KEEP_BASE + (*r as u64 % 16));
                }
            }
            ConstraintClause::BadBytes(bytes) => {
                for b in bytes {
                    bits |= 1 << (SIG_BAD_BYTE_BASE + (*b as u64 >> 4));
                }
            }
            ConstraintClause::Return { ret, jmp, call } => {
                if !ret {
                    bits |= SIG_NO_RET;
                }
                if !jmp {
                    bits |= SIG_NO_JMP;
                }
                if !call {
                    bits |= SIG_NO_CALL;
                }
            }
            // Transient bounds carry no signature bits.
            ConstraintClause::MaxSpInc(_) | ConstraintClause::MinSpInc(_) => {}
        }
        CstrSig(bits)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// A stack of [`ConstraintClause`]s, checked as a conjunction.
pub struct Constraint {
    clauses: Vec<ConstraintClause>,
}

impl Constraint {
    /// The unconstrained stack.
    pub const fn new() -> Self {
        Self { clauses: Vec::new() }
    }

    /// Push a clause, keeping existing ones.
    pub fn add(&mut self, clause: ConstraintClause) {
        self.clauses.push(clause);
    }

    /// Replace every clause of the same class, then push.
    pub fn update(&mut self, clause: ConstraintClause) {
        let class = discriminant(&clause);
        self.clauses.retain(|c| discriminant(c) != class);
        self.clauses.push(clause);
    }

    /// Whether `reg` must be preserved.
    pub fn keep_reg(&self, reg: RegId) -> bool {
        self.clauses.iter().any(|c| match c {
            ConstraintClause::KeepRegs(regs) => regs.contains(&reg),
            _ => false,
        })
    }

    /// Whether `byte` is forbidden by a bad-byte clause.
    pub fn is_bad_byte(&self, byte: u8) -> bool {
        self.clauses.iter().any(|c| match c {
            ConstraintClause::BadBytes(bytes) => bytes.contains(&byte),
            _ => false,
        })
    }

    /// Whether the little-endian encoding of `addr` avoids every bad byte.
    pub fn verify_address(&self, addr: Addr, arch: &Arch) -> bool {
        addr.to_le_bytes()
            .iter()
            .take(arch.octets())
            .all(|b| !self.is_bad_byte(*b))
    }

    /// A byte-clean word usable as stack filler, if any byte value survives
    /// the bad-byte clauses.
    pub fn valid_padding(&self, arch: &Arch) -> Option<Word> {
        let byte = (0u8..=0xff).rev().find(|b| !self.is_bad_byte(*b))?;
        let mut word: Word = 0;
        for _ in 0..arch.octets() {
            word = (word << 8) | Word::from(byte);
        }
        Some(word)
    }

    /// Whether `gadget` satisfies every clause.
    pub fn accepts(&self, gadget: &Gadget, arch: &Arch) -> bool {
        self.clauses.iter().all(|c| match c {
            ConstraintClause::KeepRegs(regs) => regs.iter().all(|r| !gadget.modifies(*r)),
            ConstraintClause::BadBytes(_) => gadget
                .addresses()
                .iter()
                .any(|a| self.verify_address(*a, arch)),
            ConstraintClause::Return { ret, jmp, call } => match gadget.ret_type() {
                RetType::Ret => *ret,
                RetType::Jmp => *jmp,
                RetType::Call => *call,
            },
            ConstraintClause::MaxSpInc(max) => gadget.sp_inc().is_some_and(|inc| inc <= *max),
            ConstraintClause::MinSpInc(min) => gadget.sp_inc().is_some_and(|inc| inc >= *min),
        })
    }

    /// Signature of the whole stack.
    pub fn signature(&self) -> CstrSig {
        self.clauses
            .iter()
            .fold(CstrSig::EMPTY, |sig, c| sig | c.signature())
    }

    /// The stacked clauses, oldest first.
    pub fn clauses(&self) -> &[ConstraintClause] {
        &self.clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn update_replaces_same_class() {
        let mut c = Constraint::new();
        c.add(ConstraintClause::Return {
            ret: true,
            jmp: false,
            call: false,
        });
        c.update(ConstraintClause::Return {
            ret: false,
            jmp: true,
            call: true,
        });

        let returns: Vec<_> = c
            .clauses()
            .iter()
            .filter(|cl| matches!(cl, ConstraintClause::Return { .. }))
            .collect();
        assert_eq!(returns.len(), 1);
        assert_eq!(
            returns[0],
            &ConstraintClause::Return {
                ret: false,
                jmp: true,
                call: true
            }
        );
    }

    #[test]
    fn padding_avoids_bad_bytes() {
        let arch = Arch::x86_64();
        let mut c = Constraint::new();
        c.add(ConstraintClause::BadBytes(vec![0xff, 0xfe]));

        let word = c.valid_padding(&arch).unwrap();
        for b in word.to_le_bytes() {
            assert!(b != 0xff && b != 0xfe);
        }
    }

    #[test]
    fn padding_exhausted() {
        let arch = Arch::x86();
        let mut c = Constraint::new();
        c.add(ConstraintClause::BadBytes((0u8..=0xff).collect()));
        assert_eq!(c.valid_padding(&arch), None);
    }

    #[test]
    fn address_verification_is_per_width() {
        let mut c = Constraint::new();
        c.add(ConstraintClause::BadBytes(vec![0x41]));

        // 0x41 sits in byte 4, beyond a 4-byte encoding.
        let addr = 0x41_0000_0000u64;
        assert!(c.verify_address(addr, &Arch::x86()));
        assert!(!c.verify_address(addr, &Arch::x86_64()));
    }

    #[quickcheck]
    fn weaker_than_is_reflexive(bits: u64) -> bool {
        let sig = CstrSig(bits);
        sig.is_weaker_than(sig)
    }

    #[quickcheck]
    fn adding_clauses_strengthens_signature(keep: Vec<u8>, bad: Vec<u8>) -> bool {
        let mut c = Constraint::new();
        c.add(ConstraintClause::KeepRegs(
            keep.iter().map(|r| *r as RegId).collect(),
        ));
        let before = c.signature();
        c.add(ConstraintClause::BadBytes(bad));
        c.add(ConstraintClause::Return {
            ret: true,
            jmp: false,
            call: false,
        });
        before.is_weaker_than(c.signature())
    }

    #[quickcheck]
    fn sp_inc_bounds_leave_signature_unchanged(max: i64, min: i64) -> bool {
        let mut c = Constraint::new();
        c.add(ConstraintClause::KeepRegs(vec![3]));
        let before = c.signature();
        c.add(ConstraintClause::MaxSpInc(max));
        c.add(ConstraintClause::MinSpInc(min));
        before == c.signature()
    }
}
