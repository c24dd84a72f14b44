//! Mutable context threaded through one search.

use crate::arch::RegId;
use crate::assertion::Assertion;
use crate::consts::LMAX_HARD_LIMIT;
use crate::constraint::Constraint;
use crate::engine::record::AdjustRetRecord;
use crate::error::{FailRecord, FailType};

use strum::EnumCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
/// The chaining strategies, in the order the dispatcher tries them.
pub(crate) enum Strategy {
    RegTransitivity,
    PopConstant,
    AnyRegTransitivity,
    AdjustRet,
}

#[derive(Debug, Clone)]
/// Search context mutated in place across the recursion.
///
/// Every strategy must restore the constraint, the length budget, the padding
/// flag, the unusable-intermediary list, and the call history on every exit
/// path; only the failure diagnostics (`fail_record`, `last_fail`) and the
/// per-search records survive a strategy invocation.
pub(crate) struct SearchEnv {
    constraint: Constraint,
    assertion: Assertion,
    lmax: usize,
    max_depth: usize,
    depth: usize,
    no_padding: bool,
    calls_count: [u32; Strategy::COUNT],
    calls_history: Vec<Strategy>,
    reg_transitivity_unusable: Vec<RegId>,
    adjust_ret_record: AdjustRetRecord,
    fail_record: FailRecord,
    last_fail: Option<FailType>,
    comments: [Option<String>; Strategy::COUNT],
}

impl SearchEnv {
    pub(crate) fn new(
        constraint: Constraint,
        assertion: Assertion,
        lmax: usize,
        max_depth: usize,
        no_padding: bool,
    ) -> Self {
        Self {
            constraint,
            assertion,
            lmax,
            max_depth,
            depth: 0,
            no_padding,
            calls_count: [0; Strategy::COUNT],
            calls_history: Vec::new(),
            reg_transitivity_unusable: Vec::new(),
            adjust_ret_record: AdjustRetRecord::default(),
            fail_record: FailRecord::new(),
            last_fail: None,
            comments: std::array::from_fn(|_| None),
        }
    }

    /* Constraint and assertion stacks */

    pub(crate) const fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub(crate) fn constraint_mut(&mut self) -> &mut Constraint {
        &mut self.constraint
    }

    pub(crate) fn set_constraint(&mut self, constraint: Constraint) {
        self.constraint = constraint;
    }

    pub(crate) const fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /* Budgets */

    pub(crate) const fn lmax(&self) -> usize {
        self.lmax
    }

    pub(crate) fn set_lmax(&mut self, val: usize) {
        debug_assert!(val > 0 && val < LMAX_HARD_LIMIT);
        self.lmax = val;
    }

    #[cfg(test)]
    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) const fn reached_max_depth(&self) -> bool {
        self.depth > self.max_depth
    }

    pub(crate) fn enter_search(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn leave_search(&mut self) {
        self.depth -= 1;
    }

    pub(crate) const fn no_padding(&self) -> bool {
        self.no_padding
    }

    pub(crate) fn set_no_padding(&mut self, val: bool) {
        self.no_padding = val;
    }

    /* Strategy call bookkeeping */

    pub(crate) fn add_call(&mut self, strategy: Strategy) {
        tracing::trace!(strategy = %strategy, depth = self.depth, "strategy entered");
        self.calls_count[strategy as usize] += 1;
        self.calls_history.push(strategy);
    }

    pub(crate) fn remove_last_call(&mut self) {
        if let Some(strategy) = self.calls_history.pop() {
            self.calls_count[strategy as usize] -= 1;
        }
    }

    pub(crate) fn calls_history(&self) -> &[Strategy] {
        &self.calls_history
    }

    pub(crate) const fn calls_count(&self, strategy: Strategy) -> u32 {
        self.calls_count[strategy as usize]
    }

    /* Transitivity intermediary exclusions */

    pub(crate) fn is_reg_transitivity_unusable(&self, reg: RegId) -> bool {
        self.reg_transitivity_unusable.contains(&reg)
    }

    pub(crate) fn push_reg_transitivity_unusable(&mut self, reg: RegId) {
        self.reg_transitivity_unusable.push(reg);
    }

    pub(crate) fn pop_reg_transitivity_unusable(&mut self) {
        self.reg_transitivity_unusable.pop();
    }

    /// Swap in a fresh exclusion list, returning the previous one.
    pub(crate) fn take_reg_transitivity_unusable(&mut self) -> Vec<RegId> {
        std::mem::take(&mut self.reg_transitivity_unusable)
    }

    pub(crate) fn restore_reg_transitivity_unusable(&mut self, prev: Vec<RegId>) {
        self.reg_transitivity_unusable = prev;
    }

    #[cfg(test)]
    pub(crate) fn reg_transitivity_unusable(&self) -> &[RegId] {
        &self.reg_transitivity_unusable
    }

    /* Records and diagnostics */

    pub(crate) const fn adjust_ret_record(&self) -> &AdjustRetRecord {
        &self.adjust_ret_record
    }

    pub(crate) fn adjust_ret_record_mut(&mut self) -> &mut AdjustRetRecord {
        &mut self.adjust_ret_record
    }

    pub(crate) fn fail_record_mut(&mut self) -> &mut FailRecord {
        &mut self.fail_record
    }

    pub(crate) fn into_fail_record(self) -> FailRecord {
        self.fail_record
    }

    pub(crate) const fn last_fail(&self) -> Option<FailType> {
        self.last_fail
    }

    pub(crate) fn set_last_fail(&mut self, fail: FailType) {
        self.last_fail = Some(fail);
    }

    /// Record a length-budget failure.
    pub(crate) fn fail_max_len(&mut self) {
        self.fail_record.set_max_len(true);
        self.last_fail = Some(FailType::MaxLen);
    }

    /* Comment slots */

    pub(crate) fn push_comment(&mut self, strategy: Strategy, comment: String) {
        self.comments[strategy as usize] = Some(comment);
    }

    pub(crate) fn pop_comment(&mut self, strategy: Strategy) -> Option<String> {
        self.comments[strategy as usize].take()
    }
}
