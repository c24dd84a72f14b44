//! Transitivity strategies: route an assignment through an intermediate
//! register when no direct gadget exists.

use crate::chain::RopChain;
use crate::constraint::ConstraintClause;
use crate::database::GadgetDatabase;
use crate::engine::{ChainingEngine, SearchEnv, Strategy};
use crate::error::FailType;
use crate::query::{is_identity_assign, AssignArg, Binop, DestArg};

impl<D: GadgetDatabase> ChainingEngine<D> {
    /// Synthesize `dest <- src op cst` as `dest <- inter` then
    /// `inter <- src op cst`.
    pub(crate) fn chain_reg_transitivity(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        let DestArg::Reg(dest_reg) = dest else {
            return None;
        };
        let AssignArg::RegBinopCst {
            reg: src_reg,
            op,
            cst,
        } = assign
        else {
            return None;
        };

        if is_identity_assign(dest_reg, src_reg, op, cst) {
            return None;
        }
        // Two consecutive transitivity frames already allow four intermediate
        // registers; beyond that the search only thrashes.
        let history = env.calls_history();
        if history.len() >= 2
            && history[history.len() - 1] == Strategy::RegTransitivity
            && history[history.len() - 2] == Strategy::RegTransitivity
        {
            return None;
        }
        if env.lmax() <= 1 {
            env.fail_max_len();
            return None;
        }

        // Entered from another strategy: the exclusion list belongs to that
        // chain of transitivity frames, not to this one.
        let fresh_exclusions = env
            .calls_history()
            .last()
            .is_some_and(|s| *s != Strategy::RegTransitivity);
        env.add_call(Strategy::RegTransitivity);
        let saved_exclusions = fresh_exclusions.then(|| env.take_reg_transitivity_unusable());

        let prev_lmax = env.lmax();
        let sig = env.constraint().signature();
        let mut res = None;

        for inter_reg in 0..self.arch().nb_regs() {
            if self.arch().is_ignored_reg(inter_reg)
                || env.is_reg_transitivity_unusable(inter_reg)
                || env.constraint().keep_reg(inter_reg)
                || inter_reg == self.arch().sp()
                || inter_reg == self.arch().ip()
                || inter_reg == dest_reg
                || is_identity_assign(inter_reg, src_reg, op, cst)
                || self
                    .transitivity_record()
                    .is_impossible(inter_reg, src_reg, op, cst, sig)
                || self
                    .transitivity_record()
                    .is_impossible(dest_reg, inter_reg, Binop::Add, 0, sig)
            {
                continue;
            }

            // 1. dest <- inter. For a plain move the intermediary must not be
            // the source itself, since dest <- inter would already finish the
            // job the long way around.
            let exclude_src = is_identity_assign(src_reg, src_reg, op, cst);
            if exclude_src {
                env.push_reg_transitivity_unusable(src_reg);
            }
            env.set_lmax(prev_lmax - 1);
            let inter_to_dest = self.search_inner(
                dest,
                AssignArg::RegBinopCst {
                    reg: inter_reg,
                    op: Binop::Add,
                    cst: 0,
                },
                env,
                false,
            );
            env.set_lmax(prev_lmax);
            if exclude_src {
                env.pop_reg_transitivity_unusable();
            }
            let Some(inter_to_dest) = inter_to_dest else {
                continue;
            };

            // 2. inter <- assign, without touching dest anymore.
            env.set_lmax(prev_lmax - inter_to_dest.len());
            env.push_reg_transitivity_unusable(dest_reg);
            let assign_to_inter = self.search_inner(DestArg::Reg(inter_reg), assign, env, false);
            env.set_lmax(prev_lmax);
            env.pop_reg_transitivity_unusable();
            let Some(mut assign_to_inter) = assign_to_inter else {
                continue;
            };

            // 3. Both halves found.
            assign_to_inter.append(inter_to_dest);
            res = Some(assign_to_inter);
            break;
        }

        // Exhausted every intermediary: learn the infeasibility, unless the
        // length budget was the blocking factor (a larger budget might still
        // succeed under the same signature).
        if res.is_none() && env.last_fail() != Some(FailType::MaxLen) {
            self.transitivity_record.add_fail(dest_reg, src_reg, op, cst, sig);
        }

        env.remove_last_call();
        if let Some(prev) = saved_exclusions {
            env.restore_reg_transitivity_unusable(prev);
        }

        res
    }

    /// Route any assignment through an intermediate register:
    /// `dest <- inter` then `inter <- assign`.
    pub(crate) fn chain_any_reg_transitivity(
        &mut self,
        dest: DestArg,
        assign: AssignArg,
        env: &mut SearchEnv,
    ) -> Option<RopChain> {
        // Repeating this strategy back-to-back adds nothing: register-move
        // transitivity is already handled by chain_reg_transitivity.
        if env.calls_history().last() == Some(&Strategy::AnyRegTransitivity) {
            env.set_last_fail(FailType::Other);
            return None;
        }
        if env.lmax() <= 1 {
            env.fail_max_len();
            return None;
        }

        env.add_call(Strategy::AnyRegTransitivity);

        // A memory destination keeps its address register intact across both
        // halves of the chain.
        let saved_constraint = match dest {
            DestArg::Mem { addr_reg, .. } => {
                let saved = env.constraint().clone();
                env.constraint_mut()
                    .add(ConstraintClause::KeepRegs(vec![addr_reg]));
                Some(saved)
            }
            DestArg::Reg(_) | DestArg::CstMem { .. } => None,
        };

        let dest_reg = match dest {
            DestArg::Reg(r) => Some(r),
            DestArg::Mem { .. } | DestArg::CstMem { .. } => None,
        };
        let prev_lmax = env.lmax();
        let sig = env.constraint().signature();
        let mut res = None;

        for inter_reg in 0..self.arch().nb_regs() {
            if self.arch().is_ignored_reg(inter_reg)
                || env.constraint().keep_reg(inter_reg)
                || inter_reg == self.arch().sp()
                || inter_reg == self.arch().ip()
                || dest_reg == Some(inter_reg)
                || dest_reg.is_some_and(|d| {
                    self.transitivity_record()
                        .is_impossible(d, inter_reg, Binop::Add, 0, sig)
                })
            {
                continue;
            }

            // 1. dest <- inter.
            env.set_lmax(prev_lmax - 1);
            let inter_to_dest = self.search_inner(
                dest,
                AssignArg::RegBinopCst {
                    reg: inter_reg,
                    op: Binop::Add,
                    cst: 0,
                },
                env,
                false,
            );
            env.set_lmax(prev_lmax);
            let Some(inter_to_dest) = inter_to_dest else {
                continue;
            };

            // 2. inter <- assign.
            env.set_lmax(prev_lmax - inter_to_dest.len());
            let assign_to_inter = self.search_inner(DestArg::Reg(inter_reg), assign, env, false);
            env.set_lmax(prev_lmax);
            let Some(mut assign_to_inter) = assign_to_inter else {
                continue;
            };

            // 3. Both halves found.
            assign_to_inter.append(inter_to_dest);
            res = Some(assign_to_inter);
            break;
        }

        env.remove_last_call();
        if let Some(saved) = saved_constraint {
            env.set_constraint(saved);
        }

        res
    }
}
