//! Learned-failure records.
//!
//! [`RegTransitivityRecord`] memoizes register-move infeasibility across a
//! whole engine lifetime; [`AdjustRetRecord`] tracks pivot registers that
//! could not be adjusted within the current search.

use crate::arch::{Cst, RegId};
use crate::consts::MAX_SIGNATURES_PER_QUERY;
use crate::constraint::CstrSig;
use crate::query::Binop;

use std::collections::{BTreeSet, HashMap};

/// Constants memoizable for add/sub transitivity queries.
const RECORD_CST_ADDSUB: [Cst; 13] = [-32, -16, -8, -4, -2, -1, 0, 1, 2, 4, 8, 16, 32];

/// Constants memoizable for mul/div transitivity queries.
const RECORD_CST_MULDIV: [Cst; 13] = [2, 3, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4092];

/// Bucket index of `cst` for `op`, if the pair is memoizable.
fn cst_bucket(op: Binop, cst: Cst) -> Option<u8> {
    let table: &[Cst] = match op {
        Binop::Add | Binop::Sub => &RECORD_CST_ADDSUB,
        Binop::Mul | Binop::Div => &RECORD_CST_MULDIV,
        _ => return None,
    };
    table.iter().position(|c| *c == cst).map(|i| i as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransKey {
    dest: RegId,
    src: RegId,
    op: Binop,
    bucket: u8,
}

#[derive(Debug, Clone, Default)]
/// Memoized infeasibility of `dest <- src op cst` queries, keyed by
/// constraint signature.
///
/// Each bucket stores an antichain of signatures under the weaker-than order:
/// no stored signature implies another. A query is known impossible under a
/// constraint iff some stored signature is weaker than the constraint's —
/// anything that failed under fewer restrictions fails under more.
pub struct RegTransitivityRecord {
    queries: HashMap<TransKey, Vec<CstrSig>>,
}

impl RegTransitivityRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dest <- src op cst` was exhaustively searched and not
    /// found under a constraint with signature `sig`.
    pub fn add_fail(&mut self, dest: RegId, src: RegId, op: Binop, cst: Cst, sig: CstrSig) {
        let Some(bucket) = cst_bucket(op, cst) else {
            return;
        };
        let list = self
            .queries
            .entry(TransKey { dest, src, op, bucket })
            .or_default();

        // Already implied by a weaker stored failure.
        if list.iter().any(|s| s.is_weaker_than(sig)) {
            return;
        }
        // The new signature subsumes every stronger stored one.
        list.retain(|s| !sig.is_weaker_than(*s));
        if list.len() < MAX_SIGNATURES_PER_QUERY {
            list.push(sig);
        }
    }

    /// Whether `dest <- src op cst` is known impossible under a constraint
    /// with signature `sig`.
    pub fn is_impossible(&self, dest: RegId, src: RegId, op: Binop, cst: Cst, sig: CstrSig) -> bool {
        let Some(bucket) = cst_bucket(op, cst) else {
            return false;
        };
        self.queries
            .get(&TransKey { dest, src, op, bucket })
            .is_some_and(|list| list.iter().any(|s| s.is_weaker_than(sig)))
    }

    /// Forget every recorded failure.
    pub fn clear(&mut self) {
        self.queries.clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Registers for which no adjustment chain could be built in this search.
pub struct AdjustRetRecord {
    regs: BTreeSet<RegId>,
}

impl AdjustRetRecord {
    /// Record that `reg` cannot be seeded with an adjustment address.
    pub fn add_fail(&mut self, reg: RegId) {
        self.regs.insert(reg);
    }

    /// Whether seeding `reg` is known to fail.
    pub fn is_impossible(&self, reg: RegId) -> bool {
        self.regs.contains(&reg)
    }

    /// Forget every recorded register.
    pub fn reset(&mut self) {
        self.regs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn sig(bits: u64) -> CstrSig {
        CstrSig::from_bits(bits)
    }

    #[test]
    fn non_memoizable_ops_are_ignored() {
        let mut record = RegTransitivityRecord::new();
        record.add_fail(0, 1, Binop::Xor, 0, sig(0));
        record.add_fail(0, 1, Binop::Add, 7, sig(0));
        assert!(!record.is_impossible(0, 1, Binop::Xor, 0, sig(0)));
        assert!(!record.is_impossible(0, 1, Binop::Add, 7, sig(0)));
    }

    #[test]
    fn weaker_failure_subsumes_stronger() {
        let mut record = RegTransitivityRecord::new();
        record.add_fail(0, 1, Binop::Add, 0, sig(0b01));
        // Failing under fewer restrictions means failing under more.
        assert!(record.is_impossible(0, 1, Binop::Add, 0, sig(0b01)));
        assert!(record.is_impossible(0, 1, Binop::Add, 0, sig(0b11)));
        assert!(!record.is_impossible(0, 1, Binop::Add, 0, sig(0b10)));
    }

    #[test]
    fn stronger_entry_is_replaced_by_weaker() {
        let mut record = RegTransitivityRecord::new();
        record.add_fail(2, 3, Binop::Sub, 4, sig(0b111));
        record.add_fail(2, 3, Binop::Sub, 4, sig(0b001));
        let list = &record.queries[&TransKey {
            dest: 2,
            src: 3,
            op: Binop::Sub,
            bucket: cst_bucket(Binop::Sub, 4).unwrap(),
        }];
        assert_eq!(list.as_slice(), &[sig(0b001)]);
    }

    #[test]
    fn capacity_is_bounded() {
        let mut record = RegTransitivityRecord::new();
        // Pairwise-incomparable signatures: distinct single bits.
        for bit in 0..(MAX_SIGNATURES_PER_QUERY as u64 + 4) {
            record.add_fail(0, 1, Binop::Mul, 8, sig(1 << bit));
        }
        let list = &record.queries[&TransKey {
            dest: 0,
            src: 1,
            op: Binop::Mul,
            bucket: cst_bucket(Binop::Mul, 8).unwrap(),
        }];
        assert_eq!(list.len(), MAX_SIGNATURES_PER_QUERY);
    }

    #[quickcheck]
    fn antichain_invariant(sigs: Vec<u64>) -> bool {
        let mut record = RegTransitivityRecord::new();
        for bits in sigs {
            record.add_fail(0, 1, Binop::Add, 0, sig(bits));
        }
        record.queries.values().all(|list| {
            list.iter().enumerate().all(|(i, a)| {
                list.iter()
                    .enumerate()
                    .all(|(j, b)| i == j || (!a.is_weaker_than(*b) && !b.is_weaker_than(*a)))
            })
        })
    }

    #[quickcheck]
    fn memoization_is_monotone(sigs: Vec<u64>, probe: u64, extra: u64) -> bool {
        let mut record = RegTransitivityRecord::new();
        for bits in sigs {
            record.add_fail(0, 1, Binop::Add, 0, sig(bits));
        }
        if record.is_impossible(0, 1, Binop::Add, 0, sig(probe)) {
            record.is_impossible(0, 1, Binop::Add, 0, sig(probe | extra))
        } else {
            true
        }
    }
}
