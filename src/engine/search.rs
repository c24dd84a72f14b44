//! Recursive search driver and strategy dispatch.

use crate::assertion::{AssertClause, Assertion};
use crate::chain::RopChain;
use crate::consts::LMAX_HARD_LIMIT;
use crate::constraint::{Constraint, ConstraintClause};
use crate::database::GadgetDatabase;
use crate::engine::{ChainingEngine, SearchEnv, SearchParams};
use crate::error::SearchError;
use crate::query::{AssignArg, DestArg};

impl<D: GadgetDatabase> ChainingEngine<D> {
    /// Search for a chain realizing `dest <- assign` under `params`.
    ///
    /// Returns the first chain found, or the shortest one when
    /// [`SearchParams::with_shortest`] is set, or the failure diagnostic.
    pub fn search(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        params: &SearchParams,
    ) -> Result<RopChain, SearchError> {
        if params.lmax() == 0 || params.lmax() >= LMAX_HARD_LIMIT {
            return Err(SearchError::InvalidLength(params.lmax()));
        }

        let mut constraint = Constraint::new();
        if !params.keep_regs().is_empty() {
            constraint.add(ConstraintClause::KeepRegs(params.keep_regs().to_vec()));
        }
        if !params.bad_bytes().is_empty() {
            constraint.add(ConstraintClause::BadBytes(params.bad_bytes().to_vec()));
        }
        // The chain must keep control after every gadget.
        constraint.add(ConstraintClause::Return {
            ret: true,
            jmp: false,
            call: false,
        });

        let mut assertion = Assertion::new();
        assertion.add(AssertClause::ValidWrite(self.arch().sp()));
        if let DestArg::Mem { addr_reg, .. } = dest {
            assertion.add(AssertClause::ValidWrite(addr_reg));
        }
        if let AssignArg::MemBinopCst { addr_reg, .. } = assign {
            assertion.add(AssertClause::ValidRead(addr_reg));
        }

        let mut env = SearchEnv::new(
            constraint,
            assertion,
            params.lmax(),
            params.max_depth(),
            false,
        );

        tracing::debug!(
            %dest,
            %assign,
            lmax = params.lmax(),
            shortest = params.shortest(),
            "searching"
        );

        match self.search_inner(dest, assign, &mut env, params.shortest()) {
            Some(chain) => Ok(chain),
            None => Err(SearchError::NotFound(env.into_fail_record())),
        }
    }

    /// Recursive entry point; every sub-query goes through here.
    pub(crate) fn search_inner(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
        shortest: bool,
    ) -> Option<RopChain> {
        if env.reached_max_depth() {
            return None;
        }
        if env.lmax() == 0 {
            env.fail_max_len();
            return None;
        }

        env.enter_search();
        let res = if shortest {
            self.search_shortest(dest, assign, env)
        } else {
            self.search_first_hit(dest, assign, env)
        };
        env.leave_search();

        res
    }

    fn search_first_hit(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        let mut res = self.basic_db_lookup(dest, assign, env);
        if res.is_none() {
            res = self.try_chain(dest, assign, env);
        }
        res
    }

    /// Dichotomy over the length budget: shrink `lmax` below every found
    /// chain, raise `lmin` past every failed probe, until the bounds meet.
    fn search_shortest(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        let saved_lmax = env.lmax();
        let mut best: Option<RopChain> = None;
        let mut lmin = 1usize;
        let mut lmax = saved_lmax;
        let mut finished = false;

        while !finished && lmax > 0 {
            if lmin == lmax {
                finished = true;
            }
            let lmoy = (lmin + lmax + 1) / 2;
            env.set_lmax(lmoy);

            tracing::debug!(
                probe = lmoy,
                best = best.as_ref().map(RopChain::len),
                "shortest-chain probe"
            );

            match self.search_inner(dest, assign, env, false) {
                Some(chain) => {
                    lmax = chain.len().saturating_sub(1);
                    best = Some(chain);
                }
                None => lmin = lmoy,
            }
        }

        env.set_lmax(saved_lmax);
        best
    }

    /// Try the applicable strategies for `(dest, assign)` in order; first
    /// non-empty result wins.
    pub(crate) fn try_chain(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        match (dest, assign) {
            (DestArg::Reg(_), AssignArg::Cst(_)) => {
                let mut res = self.chain_adjust_ret(dest, assign, env);
                if res.is_none() {
                    res = self.chain_pop_constant(dest, assign, env);
                }
                if res.is_none() {
                    res = self.chain_any_reg_transitivity(dest, assign, env);
                }
                res
            }
            (DestArg::Reg(_), AssignArg::RegBinopCst { .. }) => {
                let mut res = self.chain_adjust_ret(dest, assign, env);
                if res.is_none() {
                    res = self.chain_reg_transitivity(dest, assign, env);
                }
                res
            }
            (
                DestArg::Reg(_),
                AssignArg::MemBinopCst { .. } | AssignArg::CstMemBinopCst { .. },
            ) => {
                let mut res = self.chain_adjust_ret(dest, assign, env);
                if res.is_none() {
                    res = self.chain_any_reg_transitivity(dest, assign, env);
                }
                res
            }
            (
                DestArg::Mem { .. },
                AssignArg::Cst(_)
                | AssignArg::RegBinopCst { .. }
                | AssignArg::MemBinopCst { .. }
                | AssignArg::CstMemBinopCst { .. },
            ) => {
                let mut res = self.chain_adjust_ret(dest, assign, env);
                if res.is_none() {
                    res = self.chain_any_reg_transitivity(dest, assign, env);
                }
                res
            }
            // Constant-address destinations, absolute loads, and kernel
            // entries have no chaining decomposition.
            (DestArg::Reg(_) | DestArg::Mem { .. }, _) => None,
            (DestArg::CstMem { .. }, _) => None,
        }
    }
}
